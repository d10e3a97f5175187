pub mod qr_renderer;

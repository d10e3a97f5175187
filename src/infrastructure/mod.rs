pub mod axum_http;
pub mod fallback_store;
pub mod local_store;
pub mod postgres;
pub mod qr_renderer;
pub mod storages;

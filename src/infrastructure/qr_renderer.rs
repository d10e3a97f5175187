use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ExtendedColorType, ImageEncoder, Luma, codecs::png::PngEncoder};
use qrcode::{EcLevel, QrCode};

use crate::{
    application::interfaces::qr_renderer::{MIN_QR_SIZE_PX, QrImage, QrRenderer},
    domain::value_objects::promptpay::validator::ValidatedPayload,
};

/// PNG renderer with high error correction and a quiet zone.
pub struct PngQrRenderer {
    size: u32,
}

impl PngQrRenderer {
    pub fn new(size: u32) -> Self {
        Self {
            size: size.max(MIN_QR_SIZE_PX),
        }
    }
}

impl QrRenderer for PngQrRenderer {
    fn render(&self, payload: &ValidatedPayload) -> Result<QrImage> {
        let code = QrCode::with_error_correction_level(payload.as_str().as_bytes(), EcLevel::H)
            .context("failed to encode payload as QR")?;

        let image = code
            .render::<Luma<u8>>()
            .quiet_zone(true)
            .min_dimensions(self.size, self.size)
            .build();

        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::L8,
            )
            .context("failed to encode QR as PNG")?;

        Ok(QrImage {
            data_uri: format!("data:image/png;base64,{}", STANDARD.encode(&bytes)),
            size: image.width(),
            is_placeholder: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::promptpay::payload::build_payload;
    use rust_decimal::Decimal;

    fn payload() -> ValidatedPayload {
        ValidatedPayload::try_from(build_payload("0812345678", Decimal::new(150000, 2)).unwrap())
            .unwrap()
    }

    #[test]
    fn renders_png_data_uri_at_least_min_size() {
        let image = PngQrRenderer::new(400).render(&payload()).unwrap();
        assert!(!image.is_placeholder);
        assert!(image.size >= 400);

        let encoded = image.data_uri.trim_start_matches("data:image/png;base64,");
        let bytes = STANDARD.decode(encoded).unwrap();
        assert!(bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]));
    }

    #[test]
    fn small_sizes_are_raised_to_scannable_minimum() {
        let image = PngQrRenderer::new(64).render(&payload()).unwrap();
        assert!(image.size >= MIN_QR_SIZE_PX);
    }
}

use anyhow::Result;
use base64::{Engine, engine::general_purpose::STANDARD};
use mockall::automock;
use serde::Serialize;

use crate::domain::value_objects::promptpay::validator::ValidatedPayload;

/// Banking apps fail to scan below this edge length.
pub const MIN_QR_SIZE_PX: u32 = 300;
pub const DEFAULT_QR_SIZE_PX: u32 = 400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrImage {
    pub data_uri: String,
    pub size: u32,
    /// Set when rendering failed and nothing scannable is shown.
    pub is_placeholder: bool,
}

/// Turns a checked payload into a displayable image. Only a
/// `ValidatedPayload` can be rendered.
#[automock]
pub trait QrRenderer: Send + Sync {
    fn render(&self, payload: &ValidatedPayload) -> Result<QrImage>;
}

pub fn placeholder_image(size: u32) -> QrImage {
    let svg = format!(
        concat!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {size} {size}">"##,
            r##"<rect width="100%" height="100%" fill="#f3f4f6"/>"##,
            r##"<text x="50%" y="50%" text-anchor="middle" dominant-baseline="middle" "##,
            r##"font-family="sans-serif" font-size="16" fill="#6b7280">QR code unavailable</text></svg>"##
        ),
        size = size
    );

    QrImage {
        data_uri: format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg)),
        size,
        is_placeholder: true,
    }
}

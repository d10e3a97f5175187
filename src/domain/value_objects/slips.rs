use serde::{Deserialize, Serialize};

use crate::domain::errors::PaymentError;

pub const MAX_SLIP_BYTES: usize = 5 * 1024 * 1024;
pub const SLIP_MIME_PREFIX: &str = "image/";

/// A transfer receipt photo as received from the paying user.
#[derive(Debug, Clone)]
pub struct SlipUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl SlipUpload {
    pub fn validate(&self) -> Result<(), PaymentError> {
        if !self
            .content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with(SLIP_MIME_PREFIX)
        {
            return Err(PaymentError::InvalidSlip(format!(
                "content type `{}` is not an image",
                self.content_type
            )));
        }
        if self.bytes.is_empty() {
            return Err(PaymentError::InvalidSlip("file is empty".to_string()));
        }
        if self.bytes.len() > MAX_SLIP_BYTES {
            return Err(PaymentError::InvalidSlip(format!(
                "file is {} bytes, the limit is {} bytes",
                self.bytes.len(),
                MAX_SLIP_BYTES
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlipReference {
    pub url: String,
    pub filename: String,
}

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::slips::{SlipReference, SlipUpload};

#[automock]
#[async_trait]
pub trait SlipStorage: Send + Sync {
    async fn upload_slip(&self, transaction_id: &str, slip: SlipUpload) -> Result<SlipReference>;
}

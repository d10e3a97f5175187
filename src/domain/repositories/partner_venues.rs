use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::partner_venues::PartnerVenue;

#[automock]
#[async_trait]
pub trait PartnerVenueRepository: Send + Sync {
    async fn find_venue(&self, venue_id: Uuid) -> Result<Option<PartnerVenue>>;
}

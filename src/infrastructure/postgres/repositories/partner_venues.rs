use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::partner_venues::PartnerVenueEntity,
        repositories::partner_venues::PartnerVenueRepository,
        value_objects::partner_venues::PartnerVenue,
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::partner_venues},
};

pub struct PartnerVenuePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PartnerVenuePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PartnerVenueRepository for PartnerVenuePostgres {
    async fn find_venue(&self, venue_id: Uuid) -> Result<Option<PartnerVenue>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let venue = partner_venues::table
            .find(venue_id)
            .select(PartnerVenueEntity::as_select())
            .first::<PartnerVenueEntity>(&mut conn)
            .optional()?;

        Ok(venue.map(PartnerVenue::from))
    }
}

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    application::usecases::payment_sessions::persistence_failure,
    domain::{
        errors::{PaymentError, PaymentResult},
        repositories::payment_store::PaymentStore,
        value_objects::{
            enums::transfer_statuses::TransferStatus, iam::AuthContext,
            settlements::TransferRecord,
        },
    },
};

pub struct PartnerTransferUseCase<S>
where
    S: PaymentStore + 'static,
{
    store: Arc<S>,
}

impl<S> PartnerTransferUseCase<S>
where
    S: PaymentStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// An empty filter lists every transfer.
    pub async fn list(
        &self,
        ctx: &AuthContext,
        statuses: Vec<TransferStatus>,
        now: DateTime<Utc>,
    ) -> PaymentResult<Vec<TransferRecord>> {
        ctx.require_admin(now)?;

        let statuses = if statuses.is_empty() {
            TransferStatus::ALL.to_vec()
        } else {
            statuses
        };
        let transfers = self
            .store
            .list_transfers(statuses)
            .await
            .map_err(|err| persistence_failure("*", "list_transfers", err))?;

        info!(count = transfers.len(), "transfers: listed");
        Ok(transfers)
    }

    pub async fn advance(
        &self,
        ctx: &AuthContext,
        transfer_id: Uuid,
        next: TransferStatus,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> PaymentResult<TransferRecord> {
        ctx.require_admin(now)?;

        let transfer = self
            .store
            .find_transfer(transfer_id)
            .await
            .map_err(|err| persistence_failure(&transfer_id.to_string(), "find_transfer", err))?
            .ok_or(PaymentError::TransferNotFound(transfer_id))?;

        if !transfer.status.can_transition_to(next) {
            return Err(PaymentError::TransferBlocked(format!(
                "cannot move transfer from {} to {}",
                transfer.status, next
            )));
        }
        if transfer.requires_venue_details && next != TransferStatus::Cancelled {
            warn!(%transfer_id, venue_id = %transfer.partner_venue_id, "transfers: venue payout details missing");
            return Err(PaymentError::TransferBlocked(
                "venue payout details are required first".to_string(),
            ));
        }

        let reference = reference.filter(|reference| !reference.trim().is_empty());
        let updated = self
            .store
            .update_transfer(transfer_id, transfer.status, next, reference, now)
            .await
            .map_err(|err| persistence_failure(&transfer_id.to_string(), "update_transfer", err))?
            .ok_or_else(|| {
                PaymentError::TransferBlocked("transfer changed concurrently".to_string())
            })?;

        info!(
            %transfer_id,
            payment_id = %updated.payment_id,
            from = %transfer.status,
            to = %updated.status,
            admin = %ctx.user_id,
            "transfers: status advanced"
        );
        Ok(updated)
    }
}

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::{
    enums::{payment_session_statuses::PaymentSessionStatus, transfer_statuses::TransferStatus},
    payment_sessions::{PaymentSession, SessionChange, TransitionOutcome},
    settlements::{Settlement, TransferRecord},
};

/// Persistence for payment sessions and their settlements.
///
/// `transition` is a conditional write: the change lands only when the
/// stored status is one of `change.allowed_from()`. Implementations must
/// make the check and the write a single step.
#[automock]
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert_session(&self, session: PaymentSession) -> Result<()>;

    async fn find_session(&self, transaction_id: &str) -> Result<Option<PaymentSession>>;

    async fn list_sessions(&self, statuses: Vec<PaymentSessionStatus>)
    -> Result<Vec<PaymentSession>>;

    /// `snapshot` is the caller's last read; a store that has never seen the
    /// session may adopt it before applying the change.
    async fn transition(
        &self,
        snapshot: PaymentSession,
        change: SessionChange,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome>;

    /// Idempotent on the transaction id; returns what ends up stored.
    async fn record_settlement(&self, settlement: Settlement) -> Result<Settlement>;

    async fn find_settlement(&self, transaction_id: &str) -> Result<Option<Settlement>>;

    async fn list_transfers(&self, statuses: Vec<TransferStatus>) -> Result<Vec<TransferRecord>>;

    /// Moves a transfer from `expected` to `next`. `None` when the transfer
    /// is missing or no longer in `expected`.
    async fn update_transfer(
        &self,
        transfer_id: Uuid,
        expected: TransferStatus,
        next: TransferStatus,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<TransferRecord>>;

    async fn find_transfer(&self, transfer_id: Uuid) -> Result<Option<TransferRecord>>;

    /// Drops everything held for `transaction_id` on behalf of another
    /// store. Durable stores keep their records.
    async fn evict(&self, _transaction_id: &str) -> Result<()> {
        Ok(())
    }
}

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    repositories::payment_store::PaymentStore,
    value_objects::{
        enums::{payment_session_statuses::PaymentSessionStatus, transfer_statuses::TransferStatus},
        payment_sessions::{PaymentSession, SessionChange, TransitionOutcome},
        settlements::{ApprovedPayment, Settlement, TransferRecord},
    },
};

#[derive(Default)]
struct LocalState {
    sessions: HashMap<String, PaymentSession>,
    approved: HashMap<String, ApprovedPayment>,
    /// Keyed by the approved session's transaction id.
    transfers: HashMap<String, TransferRecord>,
}

impl LocalState {
    fn settlement(&self, transaction_id: &str) -> Option<Settlement> {
        let approved = self.approved.get(transaction_id)?;
        let transfer = self.transfers.get(transaction_id)?;
        Some(Settlement {
            approved: approved.clone(),
            transfer: transfer.clone(),
        })
    }
}

/// Process-local store. Holds writes while the durable store is unreachable;
/// everything here is lost on restart.
#[derive(Default)]
pub struct LocalPaymentStore {
    state: RwLock<LocalState>,
}

impl LocalPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for LocalPaymentStore {
    async fn insert_session(&self, session: PaymentSession) -> Result<()> {
        let mut state = self.state.write().await;
        debug!(transaction_id = %session.transaction_id, "local store: session stored");
        state
            .sessions
            .insert(session.transaction_id.clone(), session);
        Ok(())
    }

    async fn find_session(&self, transaction_id: &str) -> Result<Option<PaymentSession>> {
        let state = self.state.read().await;
        Ok(state.sessions.get(transaction_id).cloned())
    }

    async fn list_sessions(
        &self,
        statuses: Vec<PaymentSessionStatus>,
    ) -> Result<Vec<PaymentSession>> {
        let state = self.state.read().await;
        let mut sessions: Vec<PaymentSession> = state
            .sessions
            .values()
            .filter(|session| statuses.contains(&session.status))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn transition(
        &self,
        snapshot: PaymentSession,
        change: SessionChange,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut state = self.state.write().await;
        let session = state
            .sessions
            .entry(snapshot.transaction_id.clone())
            .or_insert(snapshot);

        if !session.allows(&change) {
            return Ok(TransitionOutcome::Conflict(session.clone()));
        }

        session.mutate(&change, now);
        Ok(TransitionOutcome::Applied(session.clone()))
    }

    async fn record_settlement(&self, settlement: Settlement) -> Result<Settlement> {
        let mut state = self.state.write().await;
        let transaction_id = settlement.approved.transaction_id.clone();

        if let Some(existing) = state.settlement(&transaction_id) {
            return Ok(existing);
        }

        state
            .approved
            .insert(transaction_id.clone(), settlement.approved.clone());
        state
            .transfers
            .insert(transaction_id, settlement.transfer.clone());
        Ok(settlement)
    }

    async fn find_settlement(&self, transaction_id: &str) -> Result<Option<Settlement>> {
        let state = self.state.read().await;
        Ok(state.settlement(transaction_id))
    }

    async fn list_transfers(&self, statuses: Vec<TransferStatus>) -> Result<Vec<TransferRecord>> {
        let state = self.state.read().await;
        let mut transfers: Vec<TransferRecord> = state
            .transfers
            .values()
            .filter(|transfer| statuses.contains(&transfer.status))
            .cloned()
            .collect();
        transfers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transfers)
    }

    async fn update_transfer(
        &self,
        transfer_id: Uuid,
        expected: TransferStatus,
        next: TransferStatus,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<TransferRecord>> {
        let mut state = self.state.write().await;
        let Some(transfer) = state
            .transfers
            .values_mut()
            .find(|transfer| transfer.id == transfer_id)
        else {
            return Ok(None);
        };

        if transfer.status != expected {
            return Ok(None);
        }

        transfer.status = next;
        if reference.is_some() {
            transfer.transfer_reference = reference;
        }
        transfer.updated_at = now;
        Ok(Some(transfer.clone()))
    }

    async fn find_transfer(&self, transfer_id: Uuid) -> Result<Option<TransferRecord>> {
        let state = self.state.read().await;
        Ok(state
            .transfers
            .values()
            .find(|transfer| transfer.id == transfer_id)
            .cloned())
    }

    async fn evict(&self, transaction_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.sessions.remove(transaction_id);
        state.approved.remove(transaction_id);
        state.transfers.remove(transaction_id);
        debug!(%transaction_id, "local store: copy evicted");
        Ok(())
    }
}

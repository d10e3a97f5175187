use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{
    repositories::payment_store::PaymentStore,
    value_objects::{
        enums::{payment_session_statuses::PaymentSessionStatus, transfer_statuses::TransferStatus},
        payment_sessions::{PaymentSession, SessionChange, TransitionOutcome},
        settlements::{Settlement, TransferRecord},
    },
};

const FALLBACK_TARGET: &str = "payments::fallback";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    InsertSession,
    Transition,
    RecordSettlement,
    UpdateTransfer,
    Read,
}

impl StoreOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOperation::InsertSession => "insert_session",
            StoreOperation::Transition => "transition",
            StoreOperation::RecordSettlement => "record_settlement",
            StoreOperation::UpdateTransfer => "update_transfer",
            StoreOperation::Read => "read",
        }
    }
}

/// Counts every time the durable store was bypassed.
#[derive(Debug, Default)]
pub struct FallbackMetrics {
    insert_session: AtomicU64,
    transition: AtomicU64,
    record_settlement: AtomicU64,
    update_transfer: AtomicU64,
    read: AtomicU64,
    total_failures: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FallbackMetricsSnapshot {
    pub insert_session: u64,
    pub transition: u64,
    pub record_settlement: u64,
    pub update_transfer: u64,
    pub read: u64,
    /// Both stores refused the write.
    pub total_failures: u64,
}

impl FallbackMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, operation: StoreOperation) -> &AtomicU64 {
        match operation {
            StoreOperation::InsertSession => &self.insert_session,
            StoreOperation::Transition => &self.transition,
            StoreOperation::RecordSettlement => &self.record_settlement,
            StoreOperation::UpdateTransfer => &self.update_transfer,
            StoreOperation::Read => &self.read,
        }
    }

    pub fn record_fallback(&self, operation: StoreOperation) {
        self.counter(operation).fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_total_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FallbackMetricsSnapshot {
        FallbackMetricsSnapshot {
            insert_session: self.insert_session.load(Ordering::Relaxed),
            transition: self.transition.load(Ordering::Relaxed),
            record_settlement: self.record_settlement.load(Ordering::Relaxed),
            update_transfer: self.update_transfer.load(Ordering::Relaxed),
            read: self.read.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
        }
    }
}

/// Writes go to `primary` first and to `secondary` only after a definite
/// primary failure. Reads merge both, `primary` winning on the same key
/// whatever status either copy is in. Once `primary` answers for a key the
/// local copy is replayed into it and evicted.
pub struct FallbackStore<P, S>
where
    P: PaymentStore,
    S: PaymentStore,
{
    primary: Arc<P>,
    secondary: Arc<S>,
    metrics: Arc<FallbackMetrics>,
}

impl<P, S> FallbackStore<P, S>
where
    P: PaymentStore,
    S: PaymentStore,
{
    pub fn new(primary: Arc<P>, secondary: Arc<S>, metrics: Arc<FallbackMetrics>) -> Self {
        Self {
            primary,
            secondary,
            metrics,
        }
    }

    fn note_fallback(&self, operation: StoreOperation, key: &str, err: &anyhow::Error) {
        self.metrics.record_fallback(operation);
        warn!(
            target: FALLBACK_TARGET,
            operation = operation.as_str(),
            key,
            db_error = ?err,
            "fallback: durable store failed, using local store"
        );
    }

    fn both_failed(
        &self,
        operation: StoreOperation,
        key: &str,
        primary: anyhow::Error,
        secondary: anyhow::Error,
    ) -> anyhow::Error {
        self.metrics.record_total_failure();
        error!(
            target: FALLBACK_TARGET,
            operation = operation.as_str(),
            key,
            primary_error = ?primary,
            secondary_error = ?secondary,
            "fallback: durable and local store both failed"
        );
        anyhow!(
            "{} failed on both stores: {}; local store: {}",
            operation.as_str(),
            primary,
            secondary
        )
    }

    /// Brings `primary` up to what `secondary` accepted during an outage and
    /// evicts the local copy. Returns the freshest view of the session.
    async fn catch_up(
        &self,
        durable: Option<PaymentSession>,
        local: PaymentSession,
    ) -> PaymentSession {
        let transaction_id = local.transaction_id.clone();
        let (current, replayed) = match durable {
            Some(durable) => match self.replay_changes(durable, &local).await {
                Ok(done) => done,
                Err(err) => {
                    self.note_fallback(StoreOperation::Transition, &transaction_id, &err);
                    return local;
                }
            },
            None => match self.primary.insert_session(local.clone()).await {
                Ok(()) => (local.clone(), 1),
                Err(err) => {
                    self.note_fallback(StoreOperation::InsertSession, &transaction_id, &err);
                    return local;
                }
            },
        };

        match self.secondary.find_settlement(&transaction_id).await {
            Ok(Some(settlement)) => {
                if let Err(err) = self.primary.record_settlement(settlement).await {
                    self.note_fallback(StoreOperation::RecordSettlement, &transaction_id, &err);
                    return current;
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(target: FALLBACK_TARGET, %transaction_id, error = ?err, "fallback: local settlement unreadable, keeping local copy");
                return current;
            }
        }

        if current.status != local.status {
            debug!(
                target: FALLBACK_TARGET,
                %transaction_id,
                durable = %current.status,
                local = %local.status,
                "fallback: local copy superseded by durable record"
            );
        } else if replayed > 0 {
            info!(
                target: FALLBACK_TARGET,
                %transaction_id,
                replayed,
                status = %current.status,
                "fallback: local writes replayed to durable store"
            );
        }

        if let Err(err) = self.secondary.evict(&transaction_id).await {
            warn!(target: FALLBACK_TARGET, %transaction_id, error = ?err, "fallback: local copy eviction failed");
        }
        current
    }

    /// Conditional writes stop at the first conflict; the durable row wins.
    async fn replay_changes(
        &self,
        durable: PaymentSession,
        local: &PaymentSession,
    ) -> Result<(PaymentSession, usize)> {
        let mut current = durable;
        let mut replayed = 0;
        for change in local.changes_since(&current) {
            match self
                .primary
                .transition(current.clone(), change, local.updated_at)
                .await?
            {
                TransitionOutcome::Applied(next) => {
                    current = next;
                    replayed += 1;
                }
                TransitionOutcome::Conflict(_) | TransitionOutcome::NotFound => break,
            }
        }
        Ok((current, replayed))
    }

    /// Copies a settlement `primary` is missing. The local copy is served
    /// when the copy fails.
    async fn replay_settlement(&self, local: Settlement) -> Settlement {
        let transaction_id = local.approved.transaction_id.clone();
        match self.primary.record_settlement(local.clone()).await {
            Ok(stored) => {
                info!(target: FALLBACK_TARGET, %transaction_id, "fallback: settlement replayed to durable store");
                stored
            }
            Err(err) => {
                self.note_fallback(StoreOperation::RecordSettlement, &transaction_id, &err);
                local
            }
        }
    }
}

#[async_trait]
impl<P, S> PaymentStore for FallbackStore<P, S>
where
    P: PaymentStore,
    S: PaymentStore,
{
    async fn insert_session(&self, session: PaymentSession) -> Result<()> {
        let key = session.transaction_id.clone();
        match self.primary.insert_session(session.clone()).await {
            Ok(()) => Ok(()),
            Err(primary_err) => {
                self.note_fallback(StoreOperation::InsertSession, &key, &primary_err);
                self.secondary.insert_session(session).await.map_err(|secondary_err| {
                    self.both_failed(StoreOperation::InsertSession, &key, primary_err, secondary_err)
                })
            }
        }
    }

    async fn find_session(&self, transaction_id: &str) -> Result<Option<PaymentSession>> {
        match self.primary.find_session(transaction_id).await {
            Ok(durable) => match self.secondary.find_session(transaction_id).await? {
                Some(local) => Ok(Some(self.catch_up(durable, local).await)),
                None => Ok(durable),
            },
            Err(err) => {
                self.note_fallback(StoreOperation::Read, transaction_id, &err);
                self.secondary.find_session(transaction_id).await
            }
        }
    }

    async fn list_sessions(
        &self,
        statuses: Vec<PaymentSessionStatus>,
    ) -> Result<Vec<PaymentSession>> {
        let mut merged = match self.primary.list_sessions(statuses.clone()).await {
            Ok(sessions) => sessions,
            Err(err) => {
                self.note_fallback(StoreOperation::Read, "list_sessions", &err);
                return self.secondary.list_sessions(statuses).await;
            }
        };

        // Every local copy is resolved against the durable row, not just the
        // ones matching the filter.
        let local = self
            .secondary
            .list_sessions(PaymentSessionStatus::ALL.to_vec())
            .await?;
        for session in local {
            let transaction_id = session.transaction_id.clone();
            let view = match self.primary.find_session(&transaction_id).await {
                Ok(durable) => self.catch_up(durable, session).await,
                Err(err) => {
                    self.note_fallback(StoreOperation::Read, &transaction_id, &err);
                    session
                }
            };
            merged.retain(|listed| listed.transaction_id != transaction_id);
            if statuses.contains(&view.status) {
                merged.push(view);
            }
        }

        merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(merged)
    }

    async fn transition(
        &self,
        snapshot: PaymentSession,
        change: SessionChange,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let key = snapshot.transaction_id.clone();
        match self
            .primary
            .transition(snapshot.clone(), change.clone(), now)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(primary_err) => {
                self.note_fallback(StoreOperation::Transition, &key, &primary_err);
                self.secondary
                    .transition(snapshot, change, now)
                    .await
                    .map_err(|secondary_err| {
                        self.both_failed(StoreOperation::Transition, &key, primary_err, secondary_err)
                    })
            }
        }
    }

    async fn record_settlement(&self, settlement: Settlement) -> Result<Settlement> {
        let key = settlement.approved.transaction_id.clone();
        match self.primary.record_settlement(settlement.clone()).await {
            Ok(stored) => Ok(stored),
            Err(primary_err) => {
                self.note_fallback(StoreOperation::RecordSettlement, &key, &primary_err);
                self.secondary
                    .record_settlement(settlement)
                    .await
                    .map_err(|secondary_err| {
                        self.both_failed(
                            StoreOperation::RecordSettlement,
                            &key,
                            primary_err,
                            secondary_err,
                        )
                    })
            }
        }
    }

    async fn find_settlement(&self, transaction_id: &str) -> Result<Option<Settlement>> {
        match self.primary.find_settlement(transaction_id).await {
            Ok(Some(settlement)) => Ok(Some(settlement)),
            Ok(None) => match self.secondary.find_settlement(transaction_id).await? {
                Some(local) => Ok(Some(self.replay_settlement(local).await)),
                None => Ok(None),
            },
            Err(err) => {
                self.note_fallback(StoreOperation::Read, transaction_id, &err);
                self.secondary.find_settlement(transaction_id).await
            }
        }
    }

    async fn list_transfers(&self, statuses: Vec<TransferStatus>) -> Result<Vec<TransferRecord>> {
        let mut merged = match self.primary.list_transfers(statuses.clone()).await {
            Ok(transfers) => transfers,
            Err(err) => {
                self.note_fallback(StoreOperation::Read, "list_transfers", &err);
                return self.secondary.list_transfers(statuses).await;
            }
        };

        let local = self
            .secondary
            .list_transfers(TransferStatus::ALL.to_vec())
            .await?;
        for transfer in local {
            let payment_id = transfer.payment_id.clone();
            let view = match self.primary.find_settlement(&payment_id).await {
                Ok(Some(durable)) => durable.transfer,
                Ok(None) => match self.secondary.find_settlement(&payment_id).await? {
                    Some(settlement) => self.replay_settlement(settlement).await.transfer,
                    None => transfer,
                },
                Err(err) => {
                    self.note_fallback(StoreOperation::Read, &payment_id, &err);
                    transfer
                }
            };
            merged.retain(|listed| listed.payment_id != payment_id);
            if statuses.contains(&view.status) {
                merged.push(view);
            }
        }

        merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(merged)
    }

    async fn update_transfer(
        &self,
        transfer_id: Uuid,
        expected: TransferStatus,
        next: TransferStatus,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<TransferRecord>> {
        let key = transfer_id.to_string();
        match self
            .primary
            .update_transfer(transfer_id, expected, next, reference.clone(), now)
            .await
        {
            Ok(Some(transfer)) => Ok(Some(transfer)),
            // Transfers recorded during an outage only exist locally.
            Ok(None) => {
                self.secondary
                    .update_transfer(transfer_id, expected, next, reference, now)
                    .await
            }
            Err(primary_err) => {
                self.note_fallback(StoreOperation::UpdateTransfer, &key, &primary_err);
                self.secondary
                    .update_transfer(transfer_id, expected, next, reference, now)
                    .await
                    .map_err(|secondary_err| {
                        self.both_failed(
                            StoreOperation::UpdateTransfer,
                            &key,
                            primary_err,
                            secondary_err,
                        )
                    })
            }
        }
    }

    async fn find_transfer(&self, transfer_id: Uuid) -> Result<Option<TransferRecord>> {
        match self.primary.find_transfer(transfer_id).await {
            Ok(Some(transfer)) => Ok(Some(transfer)),
            Ok(None) => self.secondary.find_transfer(transfer_id).await,
            Err(err) => {
                self.note_fallback(StoreOperation::Read, &transfer_id.to_string(), &err);
                self.secondary.find_transfer(transfer_id).await
            }
        }
    }
}

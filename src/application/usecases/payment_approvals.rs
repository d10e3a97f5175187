use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    application::usecases::payment_sessions::persistence_failure,
    domain::{
        errors::{PaymentError, PaymentResult},
        repositories::{partner_venues::PartnerVenueRepository, payment_store::PaymentStore},
        value_objects::{
            enums::{
                payment_session_statuses::PaymentSessionStatus, transfer_statuses::TransferStatus,
            },
            iam::{Actor, AuthContext},
            partner_venues::PartnerVenue,
            payment_methods::PaymentMethodTable,
            payment_sessions::{PaymentSession, PaymentSessionDto, SessionChange, TransitionOutcome},
            revenue_split::compute_split,
            settlements::{ApprovedPayment, Settlement, TransferRecord},
        },
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApprovalOutcome {
    Approved { settlement: Settlement },
    /// Retried or raced approval; carries the settlement already on record.
    AlreadyApproved { settlement: Settlement },
    /// Another writer moved the session to a different terminal state first.
    Lost { status: PaymentSessionStatus },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RejectionOutcome {
    Rejected { session: PaymentSession },
    AlreadyRejected { session: PaymentSession },
    Lost { status: PaymentSessionStatus },
}

pub struct PaymentApprovalUseCase<S, V>
where
    S: PaymentStore + 'static,
    V: PartnerVenueRepository + 'static,
{
    store: Arc<S>,
    venues: Arc<V>,
    methods: PaymentMethodTable,
}

impl<S, V> PaymentApprovalUseCase<S, V>
where
    S: PaymentStore + 'static,
    V: PartnerVenueRepository + 'static,
{
    pub fn new(store: Arc<S>, venues: Arc<V>, methods: PaymentMethodTable) -> Self {
        Self {
            store,
            venues,
            methods,
        }
    }

    pub async fn list_pending(
        &self,
        ctx: &AuthContext,
        now: DateTime<Utc>,
    ) -> PaymentResult<Vec<PaymentSessionDto>> {
        ctx.require_admin(now)?;

        let sessions = self
            .store
            .list_sessions(vec![
                PaymentSessionStatus::Pending,
                PaymentSessionStatus::PendingApproval,
            ])
            .await
            .map_err(|err| persistence_failure("*", "list_sessions", err))?;

        let mut pending = Vec::with_capacity(sessions.len());
        for session in sessions {
            if !session.is_past_expiry(now) {
                pending.push(PaymentSessionDto::from_session(&session, now));
                continue;
            }
            let transaction_id = session.transaction_id.clone();
            match self
                .store
                .transition(session, SessionChange::Expire, now)
                .await
            {
                Ok(_) => info!(%transaction_id, "approvals: expired stale session"),
                Err(err) => {
                    warn!(%transaction_id, db_error = ?err, "approvals: could not persist expiry")
                }
            }
        }

        info!(count = pending.len(), "approvals: pending sessions listed");
        Ok(pending)
    }

    pub async fn approve(
        &self,
        actor: &Actor,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> PaymentResult<ApprovalOutcome> {
        actor.authorize(now)?;

        if let Some(settlement) = self
            .store
            .find_settlement(transaction_id)
            .await
            .map_err(|err| persistence_failure(transaction_id, "find_settlement", err))?
        {
            info!(%transaction_id, actor = %actor.label(), "approvals: already approved");
            return Ok(ApprovalOutcome::AlreadyApproved { settlement });
        }

        let session = self.load(transaction_id).await?;
        match session.status {
            // Approved earlier but the settlement write never landed.
            PaymentSessionStatus::Approved => {
                let settlement = self.settle(&session, now).await?;
                return Ok(ApprovalOutcome::AlreadyApproved { settlement });
            }
            status if status.is_terminal() => {
                info!(%transaction_id, %status, "approvals: approve lost to earlier terminal state");
                return Ok(ApprovalOutcome::Lost { status });
            }
            _ => {}
        }

        let change = SessionChange::Approve { by: actor.label() };
        let outcome = self
            .store
            .transition(session, change.clone(), now)
            .await
            .map_err(|err| persistence_failure(transaction_id, "approve", err))?;

        match outcome {
            TransitionOutcome::Applied(approved) => {
                info!(%transaction_id, actor = %actor.label(), "approvals: session approved");
                let settlement = self.settle(&approved, now).await?;
                Ok(ApprovalOutcome::Approved { settlement })
            }
            TransitionOutcome::Conflict(stored) if stored.status == PaymentSessionStatus::Approved => {
                let settlement = self.settle(&stored, now).await?;
                Ok(ApprovalOutcome::AlreadyApproved { settlement })
            }
            TransitionOutcome::Conflict(stored) if stored.status.is_terminal() => {
                info!(%transaction_id, status = %stored.status, "approvals: approve lost the race");
                Ok(ApprovalOutcome::Lost {
                    status: stored.status,
                })
            }
            TransitionOutcome::Conflict(stored) => Err(PaymentError::InvalidTransition {
                action: change.action(),
                status: stored.status,
            }),
            TransitionOutcome::NotFound => {
                Err(PaymentError::SessionNotFound(transaction_id.to_string()))
            }
        }
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        transaction_id: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> PaymentResult<RejectionOutcome> {
        actor.authorize(now)?;
        let reason = reason.filter(|reason| !reason.trim().is_empty());

        let session = self.load(transaction_id).await?;
        match session.status {
            PaymentSessionStatus::Rejected => {
                return Ok(RejectionOutcome::AlreadyRejected { session });
            }
            status if status.is_terminal() => {
                info!(%transaction_id, %status, "approvals: reject lost to earlier terminal state");
                return Ok(RejectionOutcome::Lost { status });
            }
            _ => {}
        }

        let change = SessionChange::Reject {
            by: actor.label(),
            reason,
        };
        let outcome = self
            .store
            .transition(session, change.clone(), now)
            .await
            .map_err(|err| persistence_failure(transaction_id, "reject", err))?;

        match outcome {
            TransitionOutcome::Applied(session) => {
                info!(
                    %transaction_id,
                    actor = %actor.label(),
                    reason = session.rejected_reason.as_deref().unwrap_or(""),
                    "approvals: session rejected"
                );
                Ok(RejectionOutcome::Rejected { session })
            }
            TransitionOutcome::Conflict(stored) if stored.status == PaymentSessionStatus::Rejected => {
                Ok(RejectionOutcome::AlreadyRejected { session: stored })
            }
            TransitionOutcome::Conflict(stored) if stored.status.is_terminal() => {
                info!(%transaction_id, status = %stored.status, "approvals: reject lost the race");
                Ok(RejectionOutcome::Lost {
                    status: stored.status,
                })
            }
            TransitionOutcome::Conflict(stored) => Err(PaymentError::InvalidTransition {
                action: change.action(),
                status: stored.status,
            }),
            TransitionOutcome::NotFound => {
                Err(PaymentError::SessionNotFound(transaction_id.to_string()))
            }
        }
    }

    /// Expires a session still waiting for payment. `None` when it already
    /// left `pending`.
    pub async fn expire(
        &self,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> PaymentResult<Option<PaymentSession>> {
        let session = self.load(transaction_id).await?;
        let outcome = self
            .store
            .transition(session, SessionChange::Expire, now)
            .await
            .map_err(|err| persistence_failure(transaction_id, "expire", err))?;

        match outcome {
            TransitionOutcome::Applied(expired) => {
                info!(%transaction_id, "approvals: session expired");
                Ok(Some(expired))
            }
            TransitionOutcome::Conflict(_) => Ok(None),
            TransitionOutcome::NotFound => {
                Err(PaymentError::SessionNotFound(transaction_id.to_string()))
            }
        }
    }

    async fn load(&self, transaction_id: &str) -> PaymentResult<PaymentSession> {
        self.store
            .find_session(transaction_id)
            .await
            .map_err(|err| persistence_failure(transaction_id, "find_session", err))?
            .ok_or_else(|| PaymentError::SessionNotFound(transaction_id.to_string()))
    }

    async fn find_venue(&self, session: &PaymentSession) -> Option<PartnerVenue> {
        match self.venues.find_venue(session.venue_id).await {
            Ok(Some(venue)) => Some(venue),
            Ok(None) => {
                warn!(
                    transaction_id = %session.transaction_id,
                    venue_id = %session.venue_id,
                    "approvals: venue not found, transfer needs venue details"
                );
                None
            }
            Err(err) => {
                warn!(
                    transaction_id = %session.transaction_id,
                    venue_id = %session.venue_id,
                    db_error = ?err,
                    "approvals: venue lookup failed, transfer needs venue details"
                );
                None
            }
        }
    }

    /// Writes the split and the transfer for an approved session. Safe to
    /// repeat: the store keeps the first settlement per transaction id.
    async fn settle(&self, session: &PaymentSession, now: DateTime<Utc>) -> PaymentResult<Settlement> {
        let venue = self.find_venue(session).await;
        let terms = self.methods.terms(session.method);

        let split_percentage = venue
            .as_ref()
            .and_then(|venue| venue.split_percentage)
            .unwrap_or(terms.split_percentage);
        let split = compute_split(session.amount, split_percentage)?;
        let processing_fee = (session.amount * terms.fee_percentage / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        let approved_at = session.approved_at.unwrap_or(now);
        let approved = ApprovedPayment {
            transaction_id: session.transaction_id.clone(),
            user_id: session.user_id,
            partner_venue_id: session.venue_id,
            description: session.description.clone(),
            slip_url: session.slip.as_ref().map(|slip| slip.url.clone()),
            booking_type: session.booking_type,
            method: session.method,
            fitness_name: venue
                .as_ref()
                .map(|venue| venue.name.clone())
                .unwrap_or_default(),
            partner_name: venue
                .as_ref()
                .map(|venue| venue.partner_name.clone())
                .unwrap_or_default(),
            split: split.clone(),
            processing_fee,
            approved_by: session
                .approved_by
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            approved_at,
        };

        let transfer = TransferRecord {
            id: Uuid::new_v4(),
            partner_venue_id: session.venue_id,
            payment_id: session.transaction_id.clone(),
            total_amount: split.total_amount,
            partner_amount: split.partner_amount,
            system_amount: split.system_amount,
            status: TransferStatus::Pending,
            transfer_reference: None,
            requires_venue_details: venue
                .as_ref()
                .is_none_or(|venue| venue.payout_bank.is_none()),
            created_at: now,
            updated_at: now,
        };

        let settlement = self
            .store
            .record_settlement(Settlement { approved, transfer })
            .await
            .map_err(|err| persistence_failure(&session.transaction_id, "record_settlement", err))?;

        info!(
            transaction_id = %session.transaction_id,
            transfer_id = %settlement.transfer.id,
            total = %settlement.approved.split.total_amount,
            partner_amount = %settlement.approved.split.partner_amount,
            system_amount = %settlement.approved.split.system_amount,
            split_percentage = %settlement.approved.split.split_percentage,
            requires_venue_details = settlement.transfer.requires_venue_details,
            "approvals: settlement recorded"
        );

        Ok(settlement)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::{
        domain::{
            repositories::partner_venues::MockPartnerVenueRepository,
            value_objects::{
                iam::fixtures::{admin, customer},
                payment_sessions::fixtures::{awaiting_approval, pending_session},
            },
        },
        infrastructure::local_store::LocalPaymentStore,
    };
    use anyhow::anyhow;

    fn amount(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    async fn seeded(session: &PaymentSession) -> Arc<LocalPaymentStore> {
        let store = Arc::new(LocalPaymentStore::new());
        store.insert_session(session.clone()).await.unwrap();
        store
    }

    fn all_transfer_statuses() -> Vec<TransferStatus> {
        vec![
            TransferStatus::Pending,
            TransferStatus::Processing,
            TransferStatus::Completed,
            TransferStatus::Failed,
            TransferStatus::Cancelled,
        ]
    }

    #[tokio::test]
    async fn approve_twice_creates_one_transfer_and_same_split() {
        let now = Utc::now();
        let session = awaiting_approval(amount("1500.00"), now);
        let store = seeded(&session).await;
        let usecase = PaymentApprovalUseCase::new(
            Arc::clone(&store),
            Arc::new(venues_returning(Some(venue(None, true)))),
            PaymentMethodTable::default(),
        );
        let actor = Actor::Admin(admin());

        let first = usecase
            .approve(&actor, &session.transaction_id, now)
            .await
            .unwrap();
        let second = usecase
            .approve(&actor, &session.transaction_id, now)
            .await
            .unwrap();

        let ApprovalOutcome::Approved { settlement: first } = first else {
            panic!("first approval should apply");
        };
        let ApprovalOutcome::AlreadyApproved { settlement: second } = second else {
            panic!("second approval should be idempotent");
        };
        assert_eq!(first, second);
        assert_eq!(first.approved.split.partner_amount, amount("1200.00"));
        assert_eq!(first.approved.split.system_amount, amount("300.00"));
        assert!(!first.transfer.requires_venue_details);

        let transfers = store.list_transfers(all_transfer_statuses()).await.unwrap();
        assert_eq!(transfers.len(), 1);
    }

    #[tokio::test]
    async fn venue_split_overrides_method_default() {
        let now = Utc::now();
        let session = awaiting_approval(amount("1500.00"), now);
        let usecase = PaymentApprovalUseCase::new(
            seeded(&session).await,
            Arc::new(venues_returning(Some(venue(Some(amount("70.00")), true)))),
            PaymentMethodTable::default(),
        );

        let outcome = usecase
            .approve(&Actor::Admin(admin()), &session.transaction_id, now)
            .await
            .unwrap();
        let ApprovalOutcome::Approved { settlement } = outcome else {
            panic!("expected approval");
        };
        assert_eq!(settlement.approved.split.partner_amount, amount("1050.00"));
        assert_eq!(settlement.approved.split.system_amount, amount("450.00"));
        assert_eq!(settlement.approved.fitness_name, "Lumpini Strength");
        assert_eq!(settlement.approved.processing_fee, Decimal::ZERO);
    }

    #[tokio::test]
    async fn missing_payout_details_flag_the_transfer() {
        let now = Utc::now();
        let session = awaiting_approval(amount("999.99"), now);
        let usecase = PaymentApprovalUseCase::new(
            seeded(&session).await,
            Arc::new(venues_returning(Some(venue(None, false)))),
            PaymentMethodTable::default(),
        );

        let outcome = usecase
            .approve(&Actor::Admin(admin()), &session.transaction_id, now)
            .await
            .unwrap();
        let ApprovalOutcome::Approved { settlement } = outcome else {
            panic!("expected approval");
        };
        assert!(settlement.transfer.requires_venue_details);
        assert_eq!(settlement.transfer.status, TransferStatus::Pending);
        assert_eq!(
            settlement.transfer.partner_amount + settlement.transfer.system_amount,
            settlement.transfer.total_amount
        );
    }

    #[tokio::test]
    async fn venue_lookup_failure_does_not_block_approval() {
        let now = Utc::now();
        let session = awaiting_approval(amount("100.00"), now);
        let mut venues = MockPartnerVenueRepository::new();
        venues
            .expect_find_venue()
            .returning(|_| Err(anyhow!("connection reset")));
        let usecase = PaymentApprovalUseCase::new(
            seeded(&session).await,
            Arc::new(venues),
            PaymentMethodTable::with_split(amount("75.00")).unwrap(),
        );

        let outcome = usecase
            .approve(&Actor::Admin(admin()), &session.transaction_id, now)
            .await
            .unwrap();
        let ApprovalOutcome::Approved { settlement } = outcome else {
            panic!("expected approval");
        };
        assert_eq!(settlement.approved.split.partner_amount, amount("75.00"));
        assert!(settlement.transfer.requires_venue_details);
    }

    #[tokio::test]
    async fn concurrent_approve_and_reject_settle_on_one_winner() {
        let now = Utc::now();
        let session = awaiting_approval(amount("1500.00"), now);
        let store = seeded(&session).await;
        let usecase = PaymentApprovalUseCase::new(
            Arc::clone(&store),
            Arc::new(venues_returning(Some(venue(None, true)))),
            PaymentMethodTable::default(),
        );
        let approver = Actor::Admin(admin());
        let rejecter = Actor::Webhook {
            payment_id: "pay_1".to_string(),
        };

        let (approval, rejection) = tokio::join!(
            usecase.approve(&approver, &session.transaction_id, now),
            usecase.reject(
                &rejecter,
                &session.transaction_id,
                Some("payment failed".to_string()),
                now
            ),
        );

        let approval = approval.unwrap();
        let rejection = rejection.unwrap();
        let transfers = store.list_transfers(all_transfer_statuses()).await.unwrap();
        match (&approval, &rejection) {
            (ApprovalOutcome::Approved { .. }, RejectionOutcome::Lost { status }) => {
                assert_eq!(*status, PaymentSessionStatus::Approved);
                assert_eq!(transfers.len(), 1);
            }
            (ApprovalOutcome::Lost { status }, RejectionOutcome::Rejected { .. }) => {
                assert_eq!(*status, PaymentSessionStatus::Rejected);
                assert!(transfers.is_empty());
            }
            other => panic!("exactly one writer must win, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn rejection_keeps_reason_and_creates_no_transfer() {
        let now = Utc::now();
        let session = awaiting_approval(amount("500.00"), now);
        let store = seeded(&session).await;
        let usecase = PaymentApprovalUseCase::new(
            Arc::clone(&store),
            Arc::new(MockPartnerVenueRepository::new()),
            PaymentMethodTable::default(),
        );
        let actor = Actor::Admin(admin());

        let outcome = usecase
            .reject(
                &actor,
                &session.transaction_id,
                Some("Slip amount does not match".to_string()),
                now,
            )
            .await
            .unwrap();
        let RejectionOutcome::Rejected { session: rejected } = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(
            rejected.rejected_reason.as_deref(),
            Some("Slip amount does not match")
        );
        assert!(store
            .list_transfers(all_transfer_statuses())
            .await
            .unwrap()
            .is_empty());

        let again = usecase
            .reject(&actor, &session.transaction_id, None, now)
            .await
            .unwrap();
        assert!(matches!(again, RejectionOutcome::AlreadyRejected { .. }));

        let approve_after = usecase
            .approve(&actor, &session.transaction_id, now)
            .await
            .unwrap();
        assert_eq!(
            approve_after,
            ApprovalOutcome::Lost {
                status: PaymentSessionStatus::Rejected
            }
        );
    }

    #[tokio::test]
    async fn only_admins_may_approve() {
        let now = Utc::now();
        let session = awaiting_approval(amount("10.00"), now);
        let usecase = PaymentApprovalUseCase::new(
            seeded(&session).await,
            Arc::new(MockPartnerVenueRepository::new()),
            PaymentMethodTable::default(),
        );

        let result = usecase
            .approve(
                &Actor::Admin(customer(session.user_id)),
                &session.transaction_id,
                now,
            )
            .await;
        assert!(matches!(result, Err(PaymentError::Forbidden)));
    }

    #[tokio::test]
    async fn cannot_approve_before_slip_is_submitted() {
        let now = Utc::now();
        let session = pending_session(amount("10.00"), now);
        let usecase = PaymentApprovalUseCase::new(
            seeded(&session).await,
            Arc::new(MockPartnerVenueRepository::new()),
            PaymentMethodTable::default(),
        );

        let result = usecase
            .approve(&Actor::Admin(admin()), &session.transaction_id, now)
            .await;
        assert!(matches!(
            result,
            Err(PaymentError::InvalidTransition {
                status: PaymentSessionStatus::Pending,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn pending_queue_drops_and_persists_timed_out_sessions() {
        let now = Utc::now();
        let stale = pending_session(amount("10.00"), now - chrono::Duration::minutes(20));
        let waiting = awaiting_approval(amount("20.00"), now);
        let store = seeded(&stale).await;
        store.insert_session(waiting.clone()).await.unwrap();

        let usecase = PaymentApprovalUseCase::new(
            Arc::clone(&store),
            Arc::new(MockPartnerVenueRepository::new()),
            PaymentMethodTable::default(),
        );

        let queue = usecase.list_pending(&admin(), now).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].transaction_id, waiting.transaction_id);

        let stored = store
            .find_session(&stale.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, PaymentSessionStatus::Expired);
    }
}

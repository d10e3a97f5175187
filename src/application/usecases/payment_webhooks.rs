use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    application::usecases::{
        payment_approvals::{ApprovalOutcome, PaymentApprovalUseCase, RejectionOutcome},
        payment_sessions::persistence_failure,
    },
    domain::{
        errors::{PaymentError, PaymentResult},
        repositories::{partner_venues::PartnerVenueRepository, payment_store::PaymentStore},
        value_objects::{
            enums::payment_session_statuses::PaymentSessionStatus,
            iam::Actor,
            payment_sessions::PaymentSession,
            payment_webhooks::{PaymentNotification, SignedWebhook, WebhookStatus},
        },
    },
};

pub const DEFAULT_FAILURE_REASON: &str = "payment failed";
pub const EXPIRED_REASON: &str = "payment expired";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAction {
    Approved,
    Rejected,
    Expired,
    /// Verified but nothing to change: duplicate, unknown session or status.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub transaction_id: String,
    pub action: WebhookAction,
}

impl WebhookAck {
    fn new(transaction_id: &str, action: WebhookAction) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            action,
        }
    }
}

pub struct PaymentWebhookUseCase<S, V>
where
    S: PaymentStore + 'static,
    V: PartnerVenueRepository + 'static,
{
    approvals: Arc<PaymentApprovalUseCase<S, V>>,
    store: Arc<S>,
    secret: String,
}

impl<S, V> PaymentWebhookUseCase<S, V>
where
    S: PaymentStore + 'static,
    V: PartnerVenueRepository + 'static,
{
    pub fn new(
        approvals: Arc<PaymentApprovalUseCase<S, V>>,
        store: Arc<S>,
        secret: String,
    ) -> Self {
        Self {
            approvals,
            store,
            secret,
        }
    }

    /// Verifies the body against the shared secret, then reconciles it.
    /// Nothing is read or written before the signature checks out.
    pub async fn handle(
        &self,
        body: &[u8],
        header_signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> PaymentResult<WebhookAck> {
        let notification = SignedWebhook::parse(body, header_signature)
            .and_then(|webhook| webhook.verify(&self.secret))
            .inspect_err(|err| warn!(error = %err, "webhooks: rejected notification"))?;

        self.reconcile(notification, now).await
    }

    async fn reconcile(
        &self,
        notification: PaymentNotification,
        now: DateTime<Utc>,
    ) -> PaymentResult<WebhookAck> {
        let transaction_id = notification.reference_id.as_str();
        let payment_id = notification.payment_id.as_str();

        let Some(session) = self
            .store
            .find_session(transaction_id)
            .await
            .map_err(|err| persistence_failure(transaction_id, "find_session", err))?
        else {
            warn!(%transaction_id, %payment_id, "webhooks: unknown transaction, ignored");
            return Ok(WebhookAck::new(transaction_id, WebhookAction::Ignored));
        };

        let actor = Actor::Webhook {
            payment_id: payment_id.to_string(),
        };

        let action = match &notification.status {
            WebhookStatus::Success => self.approve(&actor, &session, &notification, now).await?,
            WebhookStatus::Failed => {
                let reason = notification
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string());
                self.reject(&actor, &session, reason, now).await?
            }
            WebhookStatus::Expired => match session.status {
                PaymentSessionStatus::Pending => {
                    match self.approvals.expire(transaction_id, now).await? {
                        Some(_) => WebhookAction::Expired,
                        None => WebhookAction::Ignored,
                    }
                }
                _ => {
                    self.reject(&actor, &session, EXPIRED_REASON.to_string(), now)
                        .await?
                }
            },
            WebhookStatus::Other(status) => {
                info!(%transaction_id, %payment_id, %status, "webhooks: unhandled status, ignored");
                WebhookAction::Ignored
            }
        };

        info!(%transaction_id, %payment_id, ?action, "webhooks: notification reconciled");
        Ok(WebhookAck::new(transaction_id, action))
    }

    async fn approve(
        &self,
        actor: &Actor,
        session: &PaymentSession,
        notification: &PaymentNotification,
        now: DateTime<Utc>,
    ) -> PaymentResult<WebhookAction> {
        let transaction_id = session.transaction_id.as_str();
        if !amount_matches(notification.amount.as_deref(), session.amount) {
            warn!(
                %transaction_id,
                expected = %session.amount,
                reported = notification.amount.as_deref().unwrap_or(""),
                "webhooks: amount mismatch, success ignored"
            );
            return Ok(WebhookAction::Ignored);
        }

        match self.approvals.approve(actor, transaction_id, now).await {
            Ok(ApprovalOutcome::Approved { .. }) => Ok(WebhookAction::Approved),
            Ok(ApprovalOutcome::AlreadyApproved { .. }) | Ok(ApprovalOutcome::Lost { .. }) => {
                Ok(WebhookAction::Ignored)
            }
            Err(PaymentError::InvalidTransition { status, .. }) => {
                info!(%transaction_id, %status, "webhooks: session not awaiting approval, ignored");
                Ok(WebhookAction::Ignored)
            }
            Err(err) => Err(err),
        }
    }

    async fn reject(
        &self,
        actor: &Actor,
        session: &PaymentSession,
        reason: String,
        now: DateTime<Utc>,
    ) -> PaymentResult<WebhookAction> {
        let transaction_id = session.transaction_id.as_str();
        match self
            .approvals
            .reject(actor, transaction_id, Some(reason), now)
            .await
        {
            Ok(RejectionOutcome::Rejected { .. }) => Ok(WebhookAction::Rejected),
            Ok(RejectionOutcome::AlreadyRejected { .. }) | Ok(RejectionOutcome::Lost { .. }) => {
                Ok(WebhookAction::Ignored)
            }
            Err(PaymentError::InvalidTransition { status, .. }) => {
                info!(%transaction_id, %status, "webhooks: session not awaiting approval, ignored");
                Ok(WebhookAction::Ignored)
            }
            Err(err) => Err(err),
        }
    }
}

/// A missing amount is accepted; a reported one must equal the session's.
fn amount_matches(reported: Option<&str>, expected: Decimal) -> bool {
    match reported {
        None => true,
        Some(text) => text
            .trim()
            .parse::<Decimal>()
            .map(|amount| amount == expected)
            .unwrap_or(false),
    }
}

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    application::interfaces::qr_renderer::{QrImage, QrRenderer, placeholder_image},
    domain::{
        errors::{PaymentError, PaymentResult},
        repositories::{payment_store::PaymentStore, slip_storage::SlipStorage},
        value_objects::{
            iam::AuthContext,
            payment_sessions::{
                CreatePaymentModel, OpenPaymentSession, PaymentSession, PaymentSessionDto,
                SessionChange, TransitionOutcome,
            },
            promptpay::{
                payload::{build_payload, parse_amount},
                validator::ValidatedPayload,
            },
            slips::SlipUpload,
        },
    },
};

#[derive(Debug, Clone)]
pub struct PaymentSessionSettings {
    /// Already normalized.
    pub payee_identifier: String,
    pub session_timeout: Duration,
    pub qr_size: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedPayment {
    pub session: PaymentSessionDto,
    pub qr: QrImage,
}

pub(crate) fn persistence_failure(
    transaction_id: &str,
    operation: &'static str,
    err: anyhow::Error,
) -> PaymentError {
    error!(%transaction_id, operation, db_error = ?err, "payments: store unavailable");
    PaymentError::PersistenceFailure(err)
}

/// Resolves a conditional write into the updated session or the error the
/// caller should see.
pub(crate) fn applied_or_conflict(
    transaction_id: &str,
    change: &SessionChange,
    outcome: TransitionOutcome,
) -> PaymentResult<PaymentSession> {
    match outcome {
        TransitionOutcome::Applied(session) => Ok(session),
        TransitionOutcome::Conflict(stored) => Err(PaymentError::InvalidTransition {
            action: change.action(),
            status: stored.status,
        }),
        TransitionOutcome::NotFound => Err(PaymentError::SessionNotFound(transaction_id.to_string())),
    }
}

pub struct PaymentSessionUseCase<S, St, R>
where
    S: PaymentStore + 'static,
    St: SlipStorage + 'static,
    R: QrRenderer + 'static,
{
    store: Arc<S>,
    slip_storage: Arc<St>,
    renderer: Arc<R>,
    settings: PaymentSessionSettings,
}

impl<S, St, R> PaymentSessionUseCase<S, St, R>
where
    S: PaymentStore + 'static,
    St: SlipStorage + 'static,
    R: QrRenderer + 'static,
{
    pub fn new(
        store: Arc<S>,
        slip_storage: Arc<St>,
        renderer: Arc<R>,
        settings: PaymentSessionSettings,
    ) -> Self {
        Self {
            store,
            slip_storage,
            renderer,
            settings,
        }
    }

    pub async fn create_session(
        &self,
        ctx: &AuthContext,
        request: CreatePaymentModel,
        now: DateTime<Utc>,
    ) -> PaymentResult<CreatedPayment> {
        ctx.ensure_active(now)?;
        let amount = parse_amount(&request.amount)?;

        let payload = build_payload(&self.settings.payee_identifier, amount)?;
        let payload = ValidatedPayload::try_from(payload).map_err(|err| {
            error!(
                user_id = %ctx.user_id,
                %amount,
                error = %err,
                "payments: generated payload failed self-check, refusing to display"
            );
            err
        })?;

        let qr = match self.renderer.render(&payload) {
            Ok(image) => image,
            Err(err) => {
                warn!(user_id = %ctx.user_id, error = ?err, "payments: QR render failed, showing placeholder");
                placeholder_image(self.settings.qr_size)
            }
        };

        let session = PaymentSession::open(
            OpenPaymentSession {
                user_id: ctx.user_id,
                venue_id: request.venue_id,
                booking_type: request.booking_type,
                description: request.description,
                amount,
                payee_identifier: self.settings.payee_identifier.clone(),
                payload,
                timeout: self.settings.session_timeout,
            },
            now,
        );

        self.store
            .insert_session(session.clone())
            .await
            .map_err(|err| persistence_failure(&session.transaction_id, "insert_session", err))?;

        info!(
            transaction_id = %session.transaction_id,
            user_id = %ctx.user_id,
            %amount,
            expires_at = %session.expires_at,
            "payments: session opened"
        );

        Ok(CreatedPayment {
            session: PaymentSessionDto::from_session(&session, now),
            qr,
        })
    }

    pub async fn get_session(
        &self,
        ctx: &AuthContext,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> PaymentResult<PaymentSessionDto> {
        let session = self.load_owned(ctx, transaction_id, now).await?;
        let session = self.settle_expiry(session, now).await?;
        Ok(PaymentSessionDto::from_session(&session, now))
    }

    pub async fn upload_slip(
        &self,
        ctx: &AuthContext,
        transaction_id: &str,
        slip: SlipUpload,
        now: DateTime<Utc>,
    ) -> PaymentResult<PaymentSessionDto> {
        slip.validate()?;
        let session = self.load_owned(ctx, transaction_id, now).await?;
        let session = self.reject_if_expired(session, now).await?;

        session.ensure_accepts_slip()?;

        let slip_ref = self
            .slip_storage
            .upload_slip(transaction_id, slip)
            .await
            .map_err(|err| {
                error!(%transaction_id, error = ?err, "payments: slip upload failed");
                PaymentError::Internal(err)
            })?;

        let attach = SessionChange::AttachSlip(slip_ref);
        let outcome = self
            .store
            .transition(session, attach.clone(), now)
            .await
            .map_err(|err| persistence_failure(transaction_id, "attach_slip", err))?;
        let uploaded = applied_or_conflict(transaction_id, &attach, outcome)?;
        info!(%transaction_id, "payments: slip attached");

        let submit = SessionChange::SubmitForApproval;
        let outcome = self
            .store
            .transition(uploaded, submit.clone(), now)
            .await
            .map_err(|err| persistence_failure(transaction_id, "submit_for_approval", err))?;
        let submitted = applied_or_conflict(transaction_id, &submit, outcome)?;
        info!(%transaction_id, "payments: session awaiting admin approval");

        Ok(PaymentSessionDto::from_session(&submitted, now))
    }

    pub async fn cancel(
        &self,
        ctx: &AuthContext,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> PaymentResult<PaymentSessionDto> {
        let session = self.load_owned(ctx, transaction_id, now).await?;
        let session = self.reject_if_expired(session, now).await?;

        let cancel = SessionChange::Cancel;
        session.apply(&cancel, now)?;
        let outcome = self
            .store
            .transition(session, cancel.clone(), now)
            .await
            .map_err(|err| persistence_failure(transaction_id, "cancel", err))?;
        let cancelled = applied_or_conflict(transaction_id, &cancel, outcome)?;
        info!(%transaction_id, user_id = %ctx.user_id, "payments: session cancelled");

        Ok(PaymentSessionDto::from_session(&cancelled, now))
    }

    async fn load_owned(
        &self,
        ctx: &AuthContext,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> PaymentResult<PaymentSession> {
        ctx.ensure_active(now)?;
        let session = self
            .store
            .find_session(transaction_id)
            .await
            .map_err(|err| persistence_failure(transaction_id, "find_session", err))?
            .ok_or_else(|| PaymentError::SessionNotFound(transaction_id.to_string()))?;

        if !ctx.can_access(session.user_id) {
            warn!(%transaction_id, user_id = %ctx.user_id, "payments: access to another user's session denied");
            return Err(PaymentError::Forbidden);
        }
        Ok(session)
    }

    /// Persists the timeout the first time a read notices it.
    async fn settle_expiry(
        &self,
        session: PaymentSession,
        now: DateTime<Utc>,
    ) -> PaymentResult<PaymentSession> {
        if !session.is_past_expiry(now) {
            return Ok(session);
        }

        let transaction_id = session.transaction_id.clone();
        let outcome = self
            .store
            .transition(session, SessionChange::Expire, now)
            .await
            .map_err(|err| persistence_failure(&transaction_id, "expire", err))?;

        match outcome {
            TransitionOutcome::Applied(expired) => {
                info!(%transaction_id, "payments: session expired");
                Ok(expired)
            }
            TransitionOutcome::Conflict(stored) => Ok(stored),
            TransitionOutcome::NotFound => Err(PaymentError::SessionNotFound(transaction_id)),
        }
    }

    async fn reject_if_expired(
        &self,
        session: PaymentSession,
        now: DateTime<Utc>,
    ) -> PaymentResult<PaymentSession> {
        if !session.is_past_expiry(now) {
            return Ok(session);
        }
        let expired = self.settle_expiry(session, now).await?;
        Err(PaymentError::ExpiredSession(expired.transaction_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        application::interfaces::qr_renderer::MockQrRenderer,
        domain::{
            repositories::{payment_store::MockPaymentStore, slip_storage::MockSlipStorage},
            value_objects::{
                enums::{
                    booking_types::BookingType,
                    payment_session_statuses::PaymentSessionStatus,
                },
                iam::fixtures::{admin, customer},
                payment_sessions::{
                    DEFAULT_SESSION_TIMEOUT_SECS,
                    fixtures::{awaiting_approval, pending_session},
                },
                slips::SlipReference,
            },
        },
        infrastructure::local_store::LocalPaymentStore,
    };
    use anyhow::anyhow;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn settings() -> PaymentSessionSettings {
        PaymentSessionSettings {
            payee_identifier: "66812345678".to_string(),
            session_timeout: Duration::seconds(DEFAULT_SESSION_TIMEOUT_SECS),
            qr_size: 400,
        }
    }

    fn rendering_qr() -> MockQrRenderer {
        let mut renderer = MockQrRenderer::new();
        renderer.expect_render().returning(|_| {
            Ok(QrImage {
                data_uri: "data:image/png;base64,AAAA".to_string(),
                size: 400,
                is_placeholder: false,
            })
        });
        renderer
    }

    fn storing_slips() -> MockSlipStorage {
        let mut storage = MockSlipStorage::new();
        storage.expect_upload_slip().returning(|transaction_id, slip| {
            Ok(SlipReference {
                url: format!("https://storage.test/slips/{}/x.png", transaction_id),
                filename: slip.filename,
            })
        });
        storage
    }

    fn request(amount: &str) -> CreatePaymentModel {
        CreatePaymentModel {
            venue_id: Uuid::new_v4(),
            booking_type: BookingType::Membership,
            description: "Monthly membership".to_string(),
            amount: amount.to_string(),
        }
    }

    fn slip_upload() -> SlipUpload {
        SlipUpload {
            filename: "slip.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1u8; 4 * 1024 * 1024],
        }
    }

    #[tokio::test]
    async fn creates_pending_session_with_scannable_payload() {
        let store = Arc::new(LocalPaymentStore::new());
        let usecase = PaymentSessionUseCase::new(
            Arc::clone(&store),
            Arc::new(MockSlipStorage::new()),
            Arc::new(rendering_qr()),
            settings(),
        );
        let user = customer(Uuid::new_v4());
        let now = Utc::now();

        let created = usecase
            .create_session(&user, request("1500"), now)
            .await
            .unwrap();

        assert_eq!(created.session.status, PaymentSessionStatus::Pending);
        assert_eq!(created.session.amount, "1500.00");
        assert!(created.session.payload.contains("54071500.00"));
        assert!(!created.qr.is_placeholder);
        assert!(store
            .find_session(&created.session.transaction_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn invalid_amount_does_not_create_anything() {
        let store = Arc::new(LocalPaymentStore::new());
        let usecase = PaymentSessionUseCase::new(
            Arc::clone(&store),
            Arc::new(MockSlipStorage::new()),
            Arc::new(MockQrRenderer::new()),
            settings(),
        );
        let now = Utc::now();

        for amount in ["0", "-5", "12.345", "abc"] {
            let result = usecase
                .create_session(&customer(Uuid::new_v4()), request(amount), now)
                .await;
            assert!(
                matches!(result, Err(PaymentError::InvalidAmount(_))),
                "{}",
                amount
            );
        }
        assert!(store
            .list_sessions(vec![PaymentSessionStatus::Pending])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn render_failure_falls_back_to_placeholder() {
        let mut renderer = MockQrRenderer::new();
        renderer
            .expect_render()
            .returning(|_| Err(anyhow!("encoder exploded")));
        let usecase = PaymentSessionUseCase::new(
            Arc::new(LocalPaymentStore::new()),
            Arc::new(MockSlipStorage::new()),
            Arc::new(renderer),
            settings(),
        );

        let created = usecase
            .create_session(&customer(Uuid::new_v4()), request("99.50"), Utc::now())
            .await
            .unwrap();
        assert!(created.qr.is_placeholder);
    }

    #[tokio::test]
    async fn slip_upload_moves_session_to_pending_approval() {
        let store = Arc::new(LocalPaymentStore::new());
        let usecase = PaymentSessionUseCase::new(
            Arc::clone(&store),
            Arc::new(storing_slips()),
            Arc::new(rendering_qr()),
            settings(),
        );
        let user = customer(Uuid::new_v4());
        let now = Utc::now();
        let created = usecase
            .create_session(&user, request("1500"), now)
            .await
            .unwrap();
        let transaction_id = created.session.transaction_id;

        let view = usecase
            .upload_slip(&user, &transaction_id, slip_upload(), now)
            .await
            .unwrap();
        assert_eq!(view.status, PaymentSessionStatus::PendingApproval);
        assert!(view.slip.unwrap().url.contains(&transaction_id));
    }

    #[tokio::test]
    async fn oversized_slip_is_rejected_before_upload() {
        let usecase = PaymentSessionUseCase::new(
            Arc::new(LocalPaymentStore::new()),
            Arc::new(MockSlipStorage::new()),
            Arc::new(rendering_qr()),
            settings(),
        );
        let mut slip = slip_upload();
        slip.bytes = vec![0u8; 6 * 1024 * 1024];

        let result = usecase
            .upload_slip(&customer(Uuid::new_v4()), "TXN-ANY", slip, Utc::now())
            .await;
        assert!(matches!(result, Err(PaymentError::InvalidSlip(_))));
    }

    #[tokio::test]
    async fn reading_after_timeout_persists_expiry() {
        let store = Arc::new(LocalPaymentStore::new());
        let now = Utc::now();
        let session = pending_session(Decimal::ONE, now);
        store.insert_session(session.clone()).await.unwrap();
        let owner = customer(session.user_id);

        let usecase = PaymentSessionUseCase::new(
            Arc::clone(&store),
            Arc::new(MockSlipStorage::new()),
            Arc::new(rendering_qr()),
            settings(),
        );

        let later = now + Duration::seconds(900);
        let view = usecase
            .get_session(&owner, &session.transaction_id, later)
            .await
            .unwrap();
        assert_eq!(view.status, PaymentSessionStatus::Expired);

        let stored = store
            .find_session(&session.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, PaymentSessionStatus::Expired);

        let upload = usecase
            .upload_slip(&owner, &session.transaction_id, slip_upload(), later)
            .await;
        assert!(upload.is_err());
    }

    #[tokio::test]
    async fn slip_upload_after_timeout_reports_expired_session() {
        let store = Arc::new(LocalPaymentStore::new());
        let now = Utc::now();
        let session = pending_session(Decimal::ONE, now);
        store.insert_session(session.clone()).await.unwrap();

        let usecase = PaymentSessionUseCase::new(
            Arc::clone(&store),
            Arc::new(MockSlipStorage::new()),
            Arc::new(rendering_qr()),
            settings(),
        );

        let result = usecase
            .upload_slip(
                &customer(session.user_id),
                &session.transaction_id,
                slip_upload(),
                now + Duration::seconds(901),
            )
            .await;
        assert!(matches!(result, Err(PaymentError::ExpiredSession(_))));
    }

    #[tokio::test]
    async fn other_users_cannot_touch_a_session() {
        let store = Arc::new(LocalPaymentStore::new());
        let now = Utc::now();
        let session = pending_session(Decimal::ONE, now);
        store.insert_session(session.clone()).await.unwrap();

        let usecase = PaymentSessionUseCase::new(
            Arc::clone(&store),
            Arc::new(MockSlipStorage::new()),
            Arc::new(rendering_qr()),
            settings(),
        );

        let stranger = customer(Uuid::new_v4());
        assert!(matches!(
            usecase.cancel(&stranger, &session.transaction_id, now).await,
            Err(PaymentError::Forbidden)
        ));
        assert!(usecase
            .get_session(&admin(), &session.transaction_id, now)
            .await
            .is_ok());

        let cancelled = usecase
            .cancel(&customer(session.user_id), &session.transaction_id, now)
            .await
            .unwrap();
        assert_eq!(cancelled.status, PaymentSessionStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_is_refused_once_awaiting_approval() {
        let now = Utc::now();
        let session = awaiting_approval(Decimal::ONE, now);
        let owner = customer(session.user_id);

        let mut store = MockPaymentStore::new();
        let stored = session.clone();
        store
            .expect_find_session()
            .returning(move |_| Ok(Some(stored.clone())));
        store.expect_transition().never();

        let usecase = PaymentSessionUseCase::new(
            Arc::new(store),
            Arc::new(MockSlipStorage::new()),
            Arc::new(rendering_qr()),
            settings(),
        );

        let result = usecase.cancel(&owner, &session.transaction_id, now).await;
        assert!(matches!(
            result,
            Err(PaymentError::InvalidTransition {
                action: "cancel",
                status: PaymentSessionStatus::PendingApproval,
            })
        ));
    }
}

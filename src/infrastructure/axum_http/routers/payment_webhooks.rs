use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};

use crate::{
    application::usecases::payment_webhooks::PaymentWebhookUseCase,
    domain::{
        errors::PaymentError,
        repositories::{partner_venues::PartnerVenueRepository, payment_store::PaymentStore},
    },
};

pub const SIGNATURE_HEADER: &str = "x-payment-signature";

pub fn routes<S, V>(usecase: Arc<PaymentWebhookUseCase<S, V>>) -> Router
where
    S: PaymentStore + 'static,
    V: PartnerVenueRepository + 'static,
{
    Router::new()
        .route("/payment", post(handle_payment_webhook))
        .with_state(usecase)
}

/// Provider callback. The body is read raw so the signature covers exactly
/// what was sent.
pub async fn handle_payment_webhook<S, V>(
    State(usecase): State<Arc<PaymentWebhookUseCase<S, V>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: PaymentStore + 'static,
    V: PartnerVenueRepository + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match usecase.handle(&body, signature, Utc::now()).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(PaymentError::InvalidSignature) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "Invalid signature" })),
        )
            .into_response(),
        Err(PaymentError::MalformedWebhook(reason)) => {
            warn!(%reason, "payment webhook: malformed payload");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": "Malformed payload" })),
            )
                .into_response()
        }
        Err(err) => {
            error!(error = ?err, "payment webhook: processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        application::usecases::payment_approvals::{
            PaymentApprovalUseCase,
            fixtures::{venue, venues_returning},
        },
        domain::{
            repositories::partner_venues::MockPartnerVenueRepository,
            value_objects::{
                enums::payment_session_statuses::PaymentSessionStatus,
                payment_methods::PaymentMethodTable,
                payment_sessions::fixtures::awaiting_approval,
                payment_webhooks::sign_body,
            },
        },
        infrastructure::local_store::LocalPaymentStore,
    };
    use axum::{body::to_bytes, http::HeaderValue};
    use rust_decimal::Decimal;
    use serde_json::Value;

    const SECRET: &str = "whsec_test";

    fn usecase(
        store: Arc<LocalPaymentStore>,
        venues: MockPartnerVenueRepository,
    ) -> Arc<PaymentWebhookUseCase<LocalPaymentStore, MockPartnerVenueRepository>> {
        let approvals = Arc::new(PaymentApprovalUseCase::new(
            Arc::clone(&store),
            Arc::new(venues),
            PaymentMethodTable::default(),
        ));
        Arc::new(PaymentWebhookUseCase::new(approvals, store, SECRET.to_string()))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn verified_success_answers_200() {
        let session = awaiting_approval(Decimal::new(150000, 2), Utc::now());
        let store = Arc::new(LocalPaymentStore::new());
        store.insert_session(session.clone()).await.unwrap();
        let usecase = usecase(Arc::clone(&store), venues_returning(Some(venue(None, true))));

        let body = json!({
            "payment_id": "pay_9",
            "reference_id": session.transaction_id,
            "status": "success",
            "amount": "1500.00",
            "paid_at": "2026-10-18T09:30:00Z",
        });
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&sign_body(&body, SECRET)).unwrap(),
        );

        let response = handle_payment_webhook(
            State(usecase),
            headers,
            Bytes::from(serde_json::to_vec(&body).unwrap()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "success": true }));
        let stored = store
            .find_session(&session.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, PaymentSessionStatus::Approved);
    }

    #[tokio::test]
    async fn bad_signature_answers_401() {
        let session = awaiting_approval(Decimal::new(150000, 2), Utc::now());
        let store = Arc::new(LocalPaymentStore::new());
        store.insert_session(session.clone()).await.unwrap();
        let usecase = usecase(Arc::clone(&store), MockPartnerVenueRepository::new());

        let body = json!({
            "payment_id": "pay_9",
            "reference_id": session.transaction_id,
            "status": "success",
            "signature": "0000",
        });

        let response = handle_payment_webhook(
            State(usecase),
            HeaderMap::new(),
            Bytes::from(serde_json::to_vec(&body).unwrap()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "success": false, "error": "Invalid signature" })
        );
        let stored = store
            .find_session(&session.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, PaymentSessionStatus::PendingApproval);
    }

    #[tokio::test]
    async fn non_json_body_answers_400() {
        let usecase = usecase(
            Arc::new(LocalPaymentStore::new()),
            MockPartnerVenueRepository::new(),
        );

        let response =
            handle_payment_webhook(State(usecase), HeaderMap::new(), Bytes::from_static(b"oops"))
                .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

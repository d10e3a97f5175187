use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    application::usecases::payment_approvals::PaymentApprovalUseCase,
    domain::{
        repositories::{partner_venues::PartnerVenueRepository, payment_store::PaymentStore},
        value_objects::iam::Actor,
    },
    infrastructure::axum_http::{auth::AuthUser, error_responses::AppError},
};

#[derive(Debug, Default, Deserialize)]
pub struct RejectPaymentRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub fn routes<S, V>(usecase: Arc<PaymentApprovalUseCase<S, V>>) -> Router
where
    S: PaymentStore + 'static,
    V: PartnerVenueRepository + 'static,
{
    Router::new()
        .route("/pending", get(list_pending))
        .route("/:transaction_id/approve", post(approve_payment))
        .route("/:transaction_id/reject", post(reject_payment))
        .with_state(usecase)
}

pub async fn list_pending<S, V>(
    State(usecase): State<Arc<PaymentApprovalUseCase<S, V>>>,
    AuthUser(ctx): AuthUser,
) -> Result<impl IntoResponse, AppError>
where
    S: PaymentStore + 'static,
    V: PartnerVenueRepository + 'static,
{
    Ok(Json(usecase.list_pending(&ctx, Utc::now()).await?))
}

pub async fn approve_payment<S, V>(
    State(usecase): State<Arc<PaymentApprovalUseCase<S, V>>>,
    AuthUser(ctx): AuthUser,
    Path(transaction_id): Path<String>,
) -> Result<impl IntoResponse, AppError>
where
    S: PaymentStore + 'static,
    V: PartnerVenueRepository + 'static,
{
    let outcome = usecase
        .approve(&Actor::Admin(ctx), &transaction_id, Utc::now())
        .await?;
    Ok(Json(outcome))
}

pub async fn reject_payment<S, V>(
    State(usecase): State<Arc<PaymentApprovalUseCase<S, V>>>,
    AuthUser(ctx): AuthUser,
    Path(transaction_id): Path<String>,
    request: Option<Json<RejectPaymentRequest>>,
) -> Result<impl IntoResponse, AppError>
where
    S: PaymentStore + 'static,
    V: PartnerVenueRepository + 'static,
{
    let Json(request) = request.unwrap_or_default();
    let outcome = usecase
        .reject(
            &Actor::Admin(ctx),
            &transaction_id,
            request.reason,
            Utc::now(),
        )
        .await?;
    Ok(Json(outcome))
}

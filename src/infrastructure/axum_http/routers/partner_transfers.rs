use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    application::usecases::partner_transfers::PartnerTransferUseCase,
    domain::{
        repositories::payment_store::PaymentStore,
        value_objects::enums::transfer_statuses::TransferStatus,
    },
    infrastructure::axum_http::{auth::AuthUser, error_responses::AppError},
};

#[derive(Debug, Deserialize)]
pub struct TransfersQuery {
    /// Comma separated, e.g. `pending,processing`.
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceTransferRequest {
    pub status: String,
    #[serde(default)]
    pub reference: Option<String>,
}

pub fn routes<S>(usecase: Arc<PartnerTransferUseCase<S>>) -> Router
where
    S: PaymentStore + 'static,
{
    Router::new()
        .route("/", get(list_transfers))
        .route("/:id/status", post(advance_transfer))
        .with_state(usecase)
}

pub async fn list_transfers<S>(
    State(usecase): State<Arc<PartnerTransferUseCase<S>>>,
    AuthUser(ctx): AuthUser,
    Query(query): Query<TransfersQuery>,
) -> Result<impl IntoResponse, AppError>
where
    S: PaymentStore + 'static,
{
    let statuses = parse_statuses(query.status.as_deref())?;
    Ok(Json(usecase.list(&ctx, statuses, Utc::now()).await?))
}

pub async fn advance_transfer<S>(
    State(usecase): State<Arc<PartnerTransferUseCase<S>>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AdvanceTransferRequest>,
) -> Result<impl IntoResponse, AppError>
where
    S: PaymentStore + 'static,
{
    let next = TransferStatus::from_str(request.status.trim()).ok_or_else(|| {
        AppError::BadRequest(format!("unknown transfer status `{}`", request.status))
    })?;
    let transfer = usecase
        .advance(&ctx, id, next, request.reference, Utc::now())
        .await?;
    Ok(Json(transfer))
}

fn parse_statuses(raw: Option<&str>) -> Result<Vec<TransferStatus>, AppError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|status| !status.is_empty())
        .map(|status| {
            TransferStatus::from_str(status)
                .ok_or_else(|| AppError::BadRequest(format!("unknown transfer status `{}`", status)))
        })
        .collect()
}

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, State,
        multipart::MultipartError,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use tracing::info;

use crate::{
    application::{
        interfaces::qr_renderer::QrRenderer,
        usecases::payment_sessions::PaymentSessionUseCase,
    },
    domain::{
        errors::PaymentError,
        repositories::{payment_store::PaymentStore, slip_storage::SlipStorage},
        value_objects::{
            payment_sessions::CreatePaymentModel,
            slips::{MAX_SLIP_BYTES, SlipUpload},
        },
    },
    infrastructure::axum_http::{auth::AuthUser, error_responses::AppError},
};

pub const SLIP_FIELD: &str = "slip";

/// Room for one full-size slip plus multipart framing. Anything larger is
/// cut off while streaming and reported as an invalid slip.
pub const SLIP_BODY_LIMIT: usize = MAX_SLIP_BYTES + 1024 * 1024;

pub fn routes<S, St, R>(usecase: Arc<PaymentSessionUseCase<S, St, R>>) -> Router
where
    S: PaymentStore + 'static,
    St: SlipStorage + 'static,
    R: QrRenderer + 'static,
{
    Router::new()
        .route("/qr", post(create_qr_payment))
        .route("/:transaction_id", get(get_payment))
        .route(
            "/:transaction_id/slip",
            post(upload_slip).layer(DefaultBodyLimit::max(SLIP_BODY_LIMIT)),
        )
        .route("/:transaction_id/cancel", post(cancel_payment))
        .with_state(usecase)
}

pub async fn create_qr_payment<S, St, R>(
    State(usecase): State<Arc<PaymentSessionUseCase<S, St, R>>>,
    AuthUser(ctx): AuthUser,
    Json(request): Json<CreatePaymentModel>,
) -> Result<impl IntoResponse, AppError>
where
    S: PaymentStore + 'static,
    St: SlipStorage + 'static,
    R: QrRenderer + 'static,
{
    let created = usecase.create_session(&ctx, request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_payment<S, St, R>(
    State(usecase): State<Arc<PaymentSessionUseCase<S, St, R>>>,
    AuthUser(ctx): AuthUser,
    Path(transaction_id): Path<String>,
) -> Result<impl IntoResponse, AppError>
where
    S: PaymentStore + 'static,
    St: SlipStorage + 'static,
    R: QrRenderer + 'static,
{
    let session = usecase
        .get_session(&ctx, &transaction_id, Utc::now())
        .await?;
    Ok(Json(session))
}

pub async fn upload_slip<S, St, R>(
    State(usecase): State<Arc<PaymentSessionUseCase<S, St, R>>>,
    AuthUser(ctx): AuthUser,
    Path(transaction_id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError>
where
    S: PaymentStore + 'static,
    St: SlipStorage + 'static,
    R: QrRenderer + 'static,
{
    let slip = read_slip(multipart).await?;
    info!(%transaction_id, filename = %slip.filename, size = slip.bytes.len(), "payments router: slip received");

    let session = usecase
        .upload_slip(&ctx, &transaction_id, slip, Utc::now())
        .await?;
    Ok(Json(session))
}

pub async fn cancel_payment<S, St, R>(
    State(usecase): State<Arc<PaymentSessionUseCase<S, St, R>>>,
    AuthUser(ctx): AuthUser,
    Path(transaction_id): Path<String>,
) -> Result<impl IntoResponse, AppError>
where
    S: PaymentStore + 'static,
    St: SlipStorage + 'static,
    R: QrRenderer + 'static,
{
    let session = usecase.cancel(&ctx, &transaction_id, Utc::now()).await?;
    Ok(Json(session))
}

/// Takes the `slip` part, or the first part carrying a filename.
async fn read_slip(mut multipart: Multipart) -> Result<SlipUpload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_failure)?
    {
        let is_slip = field.name() == Some(SLIP_FIELD) || field.file_name().is_some();
        if !is_slip {
            continue;
        }

        let filename = field.file_name().unwrap_or("slip").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(multipart_failure)?;

        return Ok(SlipUpload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(AppError::BadRequest(format!(
        "multipart field `{}` is required",
        SLIP_FIELD
    )))
}

fn multipart_failure(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return PaymentError::InvalidSlip(format!(
            "upload exceeds the {} byte limit",
            MAX_SLIP_BYTES
        ))
        .into();
    }
    AppError::BadRequest(err.body_text())
}

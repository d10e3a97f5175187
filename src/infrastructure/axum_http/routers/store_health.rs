use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use chrono::Utc;

use crate::infrastructure::{
    axum_http::{auth::AuthUser, error_responses::AppError},
    fallback_store::FallbackMetrics,
};

pub fn routes(metrics: Arc<FallbackMetrics>) -> Router {
    Router::new()
        .route("/", get(store_health))
        .with_state(metrics)
}

/// Fallback counters since process start.
pub async fn store_health(
    State(metrics): State<Arc<FallbackMetrics>>,
    AuthUser(ctx): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    ctx.require_admin(Utc::now())?;
    Ok(Json(metrics.snapshot()))
}

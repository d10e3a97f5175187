use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Extension, Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE, HeaderName},
    },
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::{
    application::usecases::{
        partner_transfers::PartnerTransferUseCase,
        payment_approvals::PaymentApprovalUseCase,
        payment_sessions::{PaymentSessionSettings, PaymentSessionUseCase},
        payment_webhooks::PaymentWebhookUseCase,
    },
    config::config_model::DotEnvyConfig,
    infrastructure::{
        axum_http::{
            auth::JwtSecret,
            default_routers,
            routers::{
                admin_payments, partner_transfers, payment_webhooks, payments, store_health,
            },
        },
        fallback_store::{FallbackMetrics, FallbackStore},
        local_store::LocalPaymentStore,
        postgres::{
            postgres_connection::PgPoolSquad,
            repositories::{partner_venues::PartnerVenuePostgres, payment_store::PaymentPostgres},
        },
        qr_renderer::PngQrRenderer,
        storages::supabase_storage::SupabaseSlipStorage,
    },
};

/// Durable Postgres first, in-process store when it is unreachable.
pub type PaymentStoreSquad = FallbackStore<PaymentPostgres, LocalPaymentStore>;

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let metrics = Arc::new(FallbackMetrics::new());
    let store: Arc<PaymentStoreSquad> = Arc::new(FallbackStore::new(
        Arc::new(PaymentPostgres::new(Arc::clone(&db_pool))),
        Arc::new(LocalPaymentStore::new()),
        Arc::clone(&metrics),
    ));
    let venues = Arc::new(PartnerVenuePostgres::new(Arc::clone(&db_pool)));
    let slip_storage = Arc::new(SupabaseSlipStorage::new(config.supabase.storage.clone()).await?);
    let renderer = Arc::new(PngQrRenderer::new(config.promptpay.qr_size));

    let sessions_usecase = Arc::new(PaymentSessionUseCase::new(
        Arc::clone(&store),
        slip_storage,
        renderer,
        PaymentSessionSettings {
            payee_identifier: config.promptpay.payee_identifier.clone(),
            session_timeout: chrono::Duration::seconds(config.promptpay.session_timeout_secs),
            qr_size: config.promptpay.qr_size,
        },
    ));
    let approvals_usecase = Arc::new(PaymentApprovalUseCase::new(
        Arc::clone(&store),
        venues,
        config.payment_methods.clone(),
    ));
    let webhooks_usecase = Arc::new(PaymentWebhookUseCase::new(
        Arc::clone(&approvals_usecase),
        Arc::clone(&store),
        config.payment_webhook.secret.clone(),
    ));
    let transfers_usecase = Arc::new(PartnerTransferUseCase::new(Arc::clone(&store)));

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/v1/payments", payments::routes(sessions_usecase))
        .nest(
            "/api/v1/admin/payments",
            admin_payments::routes(approvals_usecase),
        )
        .nest(
            "/api/v1/admin/transfers",
            partner_transfers::routes(transfers_usecase),
        )
        .nest("/api/v1/admin/store-health", store_health::routes(metrics))
        .nest("/api/v1/webhooks", payment_webhooks::routes(webhooks_usecase))
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(Extension(Arc::new(JwtSecret(
            config.supabase.jwt_secret.clone(),
        ))))
        .layer(TimeoutLayer::new(Duration::from_secs(config.server.timeout)))
        .layer(RequestBodyLimitLayer::new(
            (config.server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([
                    AUTHORIZATION,
                    CONTENT_TYPE,
                    HeaderName::from_static(payment_webhooks::SIGNATURE_HEADER),
                ])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(port = config.server.port, stage = %config.stage, "http: server is running");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "http: failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "http: failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("http: received ctrl+C signal"),
        _ = terminate => info!("http: received terminate signal"),
    }
}

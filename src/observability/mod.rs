mod config;
mod discord;
mod layer;
mod notifier;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use config::ObservabilityConfig;
use discord::DiscordWebhookProvider;
use layer::ErrorNotifyLayer;
use notifier::Notifier;

/// Installs the global subscriber: `RUST_LOG` filtered fmt output with local
/// timestamps, plus the Discord alert layer when `DISCORD_WEBHOOK_URL` is set.
/// Must run inside the tokio runtime.
pub fn init_observability(component: &str) -> Result<()> {
    let mut config = ObservabilityConfig::from_env(component);

    let notify_layer = match config.discord.as_ref() {
        Some(discord) => match DiscordWebhookProvider::new(discord.webhook_url.clone()) {
            Ok(provider) => {
                let notifier = Notifier::new(vec![Arc::new(provider)]);
                Some(
                    ErrorNotifyLayer::new(
                        notifier,
                        config.service_context.clone(),
                        discord.min_level,
                    )
                    .with_filter(LevelFilter::from_level(discord.min_level)),
                )
            }
            Err(err) => {
                config
                    .warnings
                    .push(format!("alerts disabled: {err}"));
                None
            }
        },
        None => None,
    };
    let alerts_enabled = notify_layer.is_some();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(notify_layer)
        .with(env_filter)
        .try_init()?;

    let context = &config.service_context;
    for warning in &config.warnings {
        warn!(
            service = %context.service_name,
            environment = %context.environment,
            component = %context.component,
            %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %context.service_name,
        environment = %context.environment,
        component = %context.component,
        alerts_enabled,
        "observability: tracing initialized"
    );

    Ok(())
}

use tracing::Level;
use url::Url;

pub(crate) const DEFAULT_SERVICE_NAME: &str = "fitbook-payments";

#[derive(Debug, Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone)]
pub(crate) struct DiscordConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) discord: Option<DiscordConfig>,
    /// Logged once tracing is up.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let component = component.trim().to_string();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let service_context = ServiceContext {
            service_name: non_empty("SERVICE_NAME")
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            environment: non_empty("STAGE").unwrap_or_else(|| "unknown".to_string()),
            component,
        };

        let (discord, warnings) = discord_from(&non_empty);

        Self {
            service_context,
            discord,
            warnings,
        }
    }
}

fn discord_from(lookup: &impl Fn(&str) -> Option<String>) -> (Option<DiscordConfig>, Vec<String>) {
    let mut warnings = Vec::new();

    let enabled = lookup("DISCORD_NOTIFY_ENABLED")
        .and_then(|raw| parse_bool(&raw))
        .unwrap_or(true);
    if !enabled {
        return (None, warnings);
    }

    let Some(raw_url) = lookup("DISCORD_WEBHOOK_URL") else {
        return (None, warnings);
    };
    let webhook_url = match Url::parse(raw_url.trim()) {
        Ok(url) => url,
        Err(err) => {
            // The raw URL carries the webhook token; keep it out of the logs.
            warnings.push(format!(
                "DISCORD_WEBHOOK_URL is invalid; alerts disabled (parse error: {err})"
            ));
            return (None, warnings);
        }
    };

    let min_level = match lookup("DISCORD_NOTIFY_LEVEL") {
        Some(raw) => parse_level(&raw).unwrap_or_else(|| {
            warnings.push(format!(
                "DISCORD_NOTIFY_LEVEL is invalid (value: {raw}); defaulting to WARN"
            ));
            Level::WARN
        }),
        None => Level::WARN,
    };

    (
        Some(DiscordConfig {
            webhook_url,
            min_level,
        }),
        warnings,
    )
}

pub(crate) fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> ObservabilityConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ObservabilityConfig::from_lookup("api", |key| env.get(key).cloned())
    }

    #[test]
    fn alerts_default_to_warn() {
        let config = config(&[("DISCORD_WEBHOOK_URL", "https://discord.test/api/webhooks/1/abc")]);
        let discord = config.discord.unwrap();
        assert_eq!(discord.min_level, Level::WARN);
        assert_eq!(config.service_context.service_name, DEFAULT_SERVICE_NAME);
        assert_eq!(config.service_context.environment, "unknown");
    }

    #[test]
    fn invalid_url_disables_alerts_with_a_warning() {
        let config = config(&[("DISCORD_WEBHOOK_URL", "not a url"), ("STAGE", "production")]);
        assert!(config.discord.is_none());
        assert_eq!(config.warnings.len(), 1);
        assert!(!config.warnings[0].contains("not a url"));
    }

    #[test]
    fn alerts_can_be_switched_off() {
        let config = config(&[
            ("DISCORD_WEBHOOK_URL", "https://discord.test/api/webhooks/1/abc"),
            ("DISCORD_NOTIFY_ENABLED", "off"),
        ]);
        assert!(config.discord.is_none());
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn bad_level_falls_back_to_warn() {
        let config = config(&[
            ("DISCORD_WEBHOOK_URL", "https://discord.test/api/webhooks/1/abc"),
            ("DISCORD_NOTIFY_LEVEL", "loud"),
        ]);
        assert_eq!(config.discord.unwrap().min_level, Level::WARN);
        assert_eq!(config.warnings.len(), 1);
    }
}

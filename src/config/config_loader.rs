use std::str::FromStr;

use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;

use crate::{
    application::interfaces::qr_renderer::{DEFAULT_QR_SIZE_PX, MIN_QR_SIZE_PX},
    config::{
        config_model::{
            Database, DotEnvyConfig, PaymentWebhook, PromptPay, Server, Supabase,
        },
        stage::Stage,
    },
    domain::value_objects::{
        payment_methods::PaymentMethodTable,
        payment_sessions::DEFAULT_SESSION_TIMEOUT_SECS,
        promptpay::payload::normalize_identifier,
        revenue_split::{DEFAULT_SPLIT_PERCENTAGE, is_valid_percentage},
    },
    infrastructure::storages::supabase_storage::SupabaseStorageConfig,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

pub(crate) fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let required = |key: &str| -> Result<String> {
        lookup(key)
            .filter(|value| !value.trim().is_empty())
            .with_context(|| format!("{} is invalid", key))
    };
    let optional = |key: &str, default: &str| -> String {
        lookup(key)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    let server = Server {
        port: parse(&required("SERVER_PORT")?, "SERVER_PORT")?,
        body_limit: parse(&optional("SERVER_BODY_LIMIT", "10"), "SERVER_BODY_LIMIT")?,
        timeout: parse(&optional("SERVER_TIMEOUT", "30"), "SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: parse(&optional("DATABASE_MAX_CONNECTIONS", "10"), "DATABASE_MAX_CONNECTIONS")?,
        connect_timeout_secs: parse(
            &optional("DATABASE_CONNECT_TIMEOUT", "5"),
            "DATABASE_CONNECT_TIMEOUT",
        )?,
    };

    let supabase = Supabase {
        jwt_secret: required("SUPABASE_JWT_SECRET")?,
        storage: SupabaseStorageConfig {
            project_url: required("SUPABASE_PROJECT_URL")?,
            endpoint: required("SUPABASE_STORAGE_ENDPOINT")?,
            region: optional("SUPABASE_STORAGE_REGION", "ap-southeast-1"),
            bucket: optional("SUPABASE_SLIP_BUCKET", "payment_slips"),
            access_key: required("SUPABASE_STORAGE_ACCESS_KEY")?,
            secret_key: required("SUPABASE_STORAGE_SECRET_KEY")?,
        },
    };

    let payee_identifier = normalize_identifier(&required("PROMPTPAY_PAYEE_ID")?)
        .context("PROMPTPAY_PAYEE_ID is invalid")?;
    let session_timeout_secs: i64 = parse(
        &optional(
            "PROMPTPAY_SESSION_TIMEOUT",
            &DEFAULT_SESSION_TIMEOUT_SECS.to_string(),
        ),
        "PROMPTPAY_SESSION_TIMEOUT",
    )?;
    if session_timeout_secs <= 0 {
        bail!("PROMPTPAY_SESSION_TIMEOUT must be positive");
    }
    let qr_size: u32 = parse(
        &optional("PROMPTPAY_QR_SIZE", &DEFAULT_QR_SIZE_PX.to_string()),
        "PROMPTPAY_QR_SIZE",
    )?;
    if qr_size < MIN_QR_SIZE_PX {
        bail!("PROMPTPAY_QR_SIZE must be at least {} px", MIN_QR_SIZE_PX);
    }
    let promptpay = PromptPay {
        payee_identifier,
        session_timeout_secs,
        qr_size,
    };

    let payment_webhook = PaymentWebhook {
        secret: required("PAYMENT_WEBHOOK_SECRET")?,
    };

    let default_split_percentage: Decimal = parse(
        &optional(
            "REVENUE_SPLIT_PERCENTAGE",
            &DEFAULT_SPLIT_PERCENTAGE.to_string(),
        ),
        "REVENUE_SPLIT_PERCENTAGE",
    )?;
    if !is_valid_percentage(default_split_percentage) {
        bail!("REVENUE_SPLIT_PERCENTAGE must be within 0..=100 with at most 2 decimals");
    }

    let payment_methods = match lookup("PAYMENT_METHOD_TABLE").filter(|raw| !raw.trim().is_empty())
    {
        Some(raw) => PaymentMethodTable::from_json(&raw).context("PAYMENT_METHOD_TABLE is invalid")?,
        None => PaymentMethodTable::with_split(default_split_percentage)?,
    };

    let stage = lookup("STAGE")
        .and_then(|raw| Stage::try_from(&raw).ok())
        .unwrap_or_default();

    Ok(DotEnvyConfig {
        stage,
        server,
        database,
        supabase,
        promptpay,
        payment_webhook,
        payment_methods,
    })
}

fn parse<T>(raw: &str, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{} is invalid", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<String, String> {
        [
            ("SERVER_PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/fitbook"),
            ("SUPABASE_JWT_SECRET", "jwt-secret"),
            ("SUPABASE_PROJECT_URL", "https://project.supabase.co"),
            ("SUPABASE_STORAGE_ENDPOINT", "https://project.supabase.co/storage/v1/s3"),
            ("SUPABASE_STORAGE_ACCESS_KEY", "access"),
            ("SUPABASE_STORAGE_SECRET_KEY", "secret"),
            ("PROMPTPAY_PAYEE_ID", "081-234-5678"),
            ("PAYMENT_WEBHOOK_SECRET", "whsec_test"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
    }

    fn load_env(env: &HashMap<String, String>) -> Result<DotEnvyConfig> {
        load_from(|key| env.get(key).cloned())
    }

    #[test]
    fn fills_defaults() {
        let config = load_env(&base_env()).unwrap();
        assert_eq!(config.promptpay.payee_identifier, "0812345678");
        assert_eq!(config.promptpay.session_timeout_secs, 900);
        assert_eq!(config.promptpay.qr_size, 400);
        assert_eq!(config.server.body_limit, 10);
        assert_eq!(config.stage, Stage::Local);
        assert_eq!(config.supabase.storage.bucket, "payment_slips");
        assert_eq!(
            config.payment_methods.qr.split_percentage,
            Decimal::new(80, 0)
        );
    }

    #[test]
    fn split_default_flows_into_method_table() {
        let mut env = base_env();
        env.insert("REVENUE_SPLIT_PERCENTAGE".to_string(), "72.50".to_string());
        let config = load_env(&env).unwrap();
        assert_eq!(
            config.payment_methods.card.split_percentage,
            Decimal::new(7250, 2)
        );
    }

    #[test]
    fn rejects_bad_payee_identifier() {
        let mut env = base_env();
        env.insert("PROMPTPAY_PAYEE_ID".to_string(), "12345".to_string());
        let err = load_env(&env).unwrap_err();
        assert!(err.to_string().contains("PROMPTPAY_PAYEE_ID"));
    }

    #[test]
    fn rejects_out_of_range_split() {
        let mut env = base_env();
        env.insert("REVENUE_SPLIT_PERCENTAGE".to_string(), "120".to_string());
        assert!(load_env(&env).is_err());
    }

    #[test]
    fn rejects_small_qr_and_missing_secret() {
        let mut env = base_env();
        env.insert("PROMPTPAY_QR_SIZE".to_string(), "120".to_string());
        assert!(load_env(&env).is_err());

        let mut env = base_env();
        env.remove("PAYMENT_WEBHOOK_SECRET");
        let err = load_env(&env).unwrap_err();
        assert!(err.to_string().contains("PAYMENT_WEBHOOK_SECRET"));
    }
}

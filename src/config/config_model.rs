use crate::{
    config::stage::Stage, domain::value_objects::payment_methods::PaymentMethodTable,
    infrastructure::storages::supabase_storage::SupabaseStorageConfig,
};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub server: Server,
    pub database: Database,
    pub supabase: Supabase,
    pub promptpay: PromptPay,
    pub payment_webhook: PaymentWebhook,
    pub payment_methods: PaymentMethodTable,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    /// Megabytes.
    pub body_limit: u64,
    /// Seconds.
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Supabase {
    pub jwt_secret: String,
    pub storage: SupabaseStorageConfig,
}

#[derive(Debug, Clone)]
pub struct PromptPay {
    /// Normalized at load time.
    pub payee_identifier: String,
    pub session_timeout_secs: i64,
    pub qr_size: u32,
}

#[derive(Debug, Clone)]
pub struct PaymentWebhook {
    pub secret: String,
}

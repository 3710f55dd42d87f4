use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Cancellations at least this far ahead of class start are refunded.
    pub cancellation_grace_hours: i64,
    /// Per-class waitlist admission bound.
    pub waitlist_max_size: usize,
    /// Waitlist entries older than this are swept.
    pub waitlist_entry_ttl_days: i64,
    /// Lease on the per-class lock.
    #[serde(default = "default_lock_lease")]
    pub lock_lease_seconds: u64,
}

fn default_lock_lease() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Environment-specific overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides stay out of version control
            .add_source(config::File::with_name("config/local").required(false))
            // E.g. STRIVE__SERVER__PORT=8080
            .add_source(config::Environment::with_prefix("STRIVE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

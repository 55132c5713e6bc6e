use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    pub auth: AuthConfig,
    pub booking: BookingRules,
    pub payment: PaymentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    /// Minutes between order creation and the payment deadline
    pub hold_minutes: i64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_code_attempts")]
    pub code_retry_attempts: u32,
}

fn default_sweep_interval() -> u64 { 60 }
fn default_code_attempts() -> u32 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    /// Pre-shared token the gateway sends in `x-callback-token`
    pub webhook_token: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String { "IDR".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `SKYHOLD__PAYMENT__WEBHOOK_TOKEN=...` sets `payment.webhook_token`
            .add_source(config::Environment::with_prefix("SKYHOLD").separator("__"))
            .build()?;

        s.try_deserialize::<Config>()?.validate()
    }

    /// Reject values that would only fail later (a zero interval panics the
    /// sweep timer).
    fn validate(self) -> Result<Self, config::ConfigError> {
        let rules = &self.booking;
        if rules.hold_minutes <= 0 {
            return Err(config::ConfigError::Message("booking.hold_minutes must be positive".into()));
        }
        if rules.sweep_interval_seconds == 0 {
            return Err(config::ConfigError::Message(
                "booking.sweep_interval_seconds must be positive".into(),
            ));
        }
        if rules.code_retry_attempts == 0 {
            return Err(config::ConfigError::Message(
                "booking.code_retry_attempts must be at least 1".into(),
            ));
        }
        Ok(self)
    }
}

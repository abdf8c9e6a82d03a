use common::{Environment, LogLevel};
use inference::InferenceConfig;
use serde::Deserialize;
use std::env;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: LogLevel,
    pub environment: Environment,
    /// OTLP collector endpoint. Traces and metrics are exported only when set.
    pub otel_endpoint: Option<String>,
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub inference: InferenceConfig,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Build the configuration from defaults and `GATEWAY_*` variables.
///
/// A plain `PORT` variable wins over `GATEWAY_PORT`, matching what hosting
/// platforms inject.
pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let config = config::Config::builder()
        .set_default("host", DEFAULT_HOST)?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("log_level", "info")?
        .set_default("environment", "development")?
        .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES as i64)?
        .add_source(
            config::Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("port", env::var("PORT").ok())?
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}

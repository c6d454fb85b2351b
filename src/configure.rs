use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub listen_addr: String,
    /// CORS allow-list origin. Absent means any origin is allowed.
    pub allowed_origin: Option<String>,
    /// Base URL of the atomic counter store.
    pub counter_url: String,
    /// Static bearer credential for the counter store.
    pub counter_token: String,
    pub log_level: String,
    pub log_to_file: bool,
    pub log_file: String,
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    let s = Config::builder()
        // Set defaults
        .set_default("listen_addr", "0.0.0.0:8080")?
        .set_default("counter_url", "http://localhost:8079")?
        .set_default("counter_token", "")?
        .set_default("log_level", "info")?
        .set_default("log_to_file", false)?
        .set_default("log_file", "log/caseid_server.log")?
        // Add configuration from a file
        .add_source(File::with_name("config/config.yaml").required(false))
        // Add configuration from environment variables
        .add_source(config::Environment::with_prefix("APP"))
        .build()?;

    s.try_deserialize()
}

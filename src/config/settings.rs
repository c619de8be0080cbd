use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::notification::DispatcherConfig;

/// Flat variable names accepted for compatibility with existing deployments,
/// mapped to their nested settings key.
const LEGACY_ENV_KEYS: [(&str, &str); 10] = [
    ("PORT", "server.port"),
    ("NUM_WORKERS", "dispatch.num_workers"),
    ("CHANNEL_BUFFER", "dispatch.channel_buffer"),
    ("SVIX_API_KEY", "svix.api_key"),
    ("SVIX_APP_ID", "svix.app_id"),
    ("SVIX_SERVER_URL", "svix.server_url"),
    ("SVIX_API_MAX_RATE", "svix.max_rate"),
    ("SVIX_API_MAX_BURST", "svix.max_burst"),
    ("SVIX_TIMEOUT_SECONDS", "svix.timeout_seconds"),
    ("LOG_FORMAT", "logging.format"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    pub svix: SvixConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted request body
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Number of delivery workers
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// Capacity of the primary and retry queues
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
    /// Upper bound on waiting for workers during shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SvixConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub app_id: String,
    /// Overrides the API endpoint derived from the key's region
    #[serde(default)]
    pub server_url: Option<String>,
    /// Requests per second
    #[serde(default = "default_max_rate")]
    pub max_rate: u32,
    #[serde(default = "default_max_burst")]
    pub max_burst: u32,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_num_workers() -> usize {
    5
}

fn default_channel_buffer() -> usize {
    100
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_rate() -> u32 {
    5 // requests per second
}

fn default_max_burst() -> u32 {
    10
}

fn default_timeout() -> u64 {
    30
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Self::defaults()?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // RELAY_SERVER__PORT, RELAY_SVIX__APP_ID, RELAY_DISPATCH__NUM_WORKERS, etc.
            .add_source(
                Environment::with_prefix("RELAY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings = Self::with_legacy_overrides(builder, |key| env::var(key).ok())?
            .build()?
            .try_deserialize::<Self>()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Build settings from defaults plus values for the flat variable names,
    /// resolved through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Self::with_legacy_overrides(Self::defaults()?, lookup)?
            .build()?
            .try_deserialize::<Self>()?;

        settings.validate()?;
        Ok(settings)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("dispatch.num_workers", default_num_workers() as i64)?
            .set_default("dispatch.channel_buffer", default_channel_buffer() as i64)?
            .set_default("svix.max_rate", i64::from(default_max_rate()))?
            .set_default("svix.max_burst", i64::from(default_max_burst()))
    }

    fn with_legacy_overrides<F>(
        mut builder: ConfigBuilder<DefaultState>,
        lookup: F,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (var, key) in LEGACY_ENV_KEYS {
            builder = builder.set_override_option(key, lookup(var))?;
        }
        Ok(builder)
    }

    /// Reject settings the service can not run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.svix.api_key.trim().is_empty() {
            return Err(ConfigError::Message("svix.api_key (SVIX_API_KEY) is required".into()));
        }
        if self.svix.app_id.trim().is_empty() {
            return Err(ConfigError::Message("svix.app_id (SVIX_APP_ID) is required".into()));
        }
        if self.dispatch.num_workers == 0 {
            return Err(ConfigError::Message("dispatch.num_workers must be at least 1".into()));
        }
        if self.svix.max_rate == 0 || self.svix.max_burst == 0 {
            return Err(ConfigError::Message(
                "svix.max_rate and svix.max_burst must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Engine sizing derived from the dispatch and provider settings
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            worker_count: self.dispatch.num_workers,
            queue_capacity: self.dispatch.channel_buffer,
            rate_limit: self.svix.max_rate,
            burst_limit: self.svix.max_burst,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            channel_buffer: default_channel_buffer(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

impl Default for SvixConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            app_id: String::new(),
            server_url: None,
            max_rate: default_max_rate(),
            max_burst: default_max_burst(),
            timeout_seconds: default_timeout(),
        }
    }
}

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::domain::PriorityPolicy;
use crate::protocol::compute_register_output_url;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub rescan: RescanConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Coordinator base URL (e.g., "https://coordinator.example/")
    pub url: String,
}

impl ServerConfig {
    /// URL the output registration is submitted to
    pub fn register_output_url(&self) -> Result<Url, url::ParseError> {
        compute_register_output_url(&Url::parse(&self.url)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum rounds running at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Minimum spacing between two round starts in milliseconds
    #[serde(default = "default_per_start_delay_ms")]
    pub per_start_delay_ms: u64,
    /// Loop period in milliseconds
    #[serde(default = "default_mix_loop_delay_ms")]
    pub loop_delay_ms: u64,
    /// Confirmations required before an entry may start a round
    #[serde(default = "default_min_confirmations")]
    pub min_confirmations: u32,
    #[serde(default)]
    pub priority: PriorityPolicy,
}

fn default_max_concurrency() -> usize {
    1
}

fn default_per_start_delay_ms() -> u64 {
    30_000
}

fn default_mix_loop_delay_ms() -> u64 {
    60_000
}

fn default_min_confirmations() -> u32 {
    1
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            per_start_delay_ms: default_per_start_delay_ms(),
            loop_delay_ms: default_mix_loop_delay_ms(),
            min_confirmations: default_min_confirmations(),
            priority: PriorityPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn per_start_delay(&self) -> Duration {
        Duration::from_millis(self.per_start_delay_ms)
    }

    pub fn loop_delay(&self) -> Duration {
        Duration::from_millis(self.loop_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescanConfig {
    /// Premix rescan period in milliseconds
    #[serde(default = "default_rescan_loop_delay_ms")]
    pub loop_delay_ms: u64,
}

fn default_rescan_loop_delay_ms() -> u64 {
    180_000
}

impl Default for RescanConfig {
    fn default() -> Self {
        Self {
            loop_delay_ms: default_rescan_loop_delay_ms(),
        }
    }
}

impl RescanConfig {
    pub fn loop_delay(&self) -> Duration {
        Duration::from_millis(self.loop_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily-rolling log files; console only when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("scheduler.max_concurrency", 1)?
            .set_default("scheduler.per_start_delay_ms", 30_000)?
            .set_default("scheduler.loop_delay_ms", 60_000)?
            .set_default("scheduler.min_confirmations", 1)?
            .set_default("rescan.loop_delay_ms", 180_000)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("MIX_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (MIX__SERVER__URL, etc.)
            .add_source(
                Environment::with_prefix("MIX")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Configuration with defaults for everything but the server URL
    pub fn with_server(url: &str) -> Self {
        Self {
            server: ServerConfig {
                url: url.to_string(),
            },
            scheduler: SchedulerConfig::default(),
            rescan: RescanConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.server.register_output_url() {
            errors.push(format!("server.url is invalid: {e}"));
        }

        if self.scheduler.max_concurrency == 0 {
            errors.push("scheduler.max_concurrency must be at least 1".to_string());
        }

        if self.scheduler.per_start_delay_ms == 0 {
            errors.push("scheduler.per_start_delay_ms must be positive".to_string());
        }

        if self.scheduler.loop_delay_ms == 0 {
            errors.push("scheduler.loop_delay_ms must be positive".to_string());
        }

        if self.rescan.loop_delay_ms == 0 {
            errors.push("rescan.loop_delay_ms must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::with_server("https://coordinator.example");
        assert_eq!(config.scheduler.max_concurrency, 1);
        assert_eq!(config.scheduler.per_start_delay(), Duration::from_secs(30));
        assert_eq!(config.scheduler.loop_delay(), Duration::from_secs(60));
        assert_eq!(config.rescan.loop_delay(), Duration::from_secs(180));
        assert_eq!(config.scheduler.priority, PriorityPolicy::LargestPoolFirst);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_register_output_url() {
        let config = ClientConfig::with_server("https://coordinator.example/api");
        assert_eq!(
            config.server.register_output_url().unwrap().as_str(),
            "https://coordinator.example/api/rest/registerOutput"
        );
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = ClientConfig::with_server("not a url");
        config.scheduler.max_concurrency = 0;
        config.rescan.loop_delay_ms = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].starts_with("server.url"));
    }

    #[test]
    fn test_load_from_missing_dir_uses_defaults() {
        std::env::set_var("MIX__SERVER__URL", "https://coordinator.example");
        let config = ClientConfig::load_from("does-not-exist").unwrap();
        std::env::remove_var("MIX__SERVER__URL");

        assert_eq!(config.server.url, "https://coordinator.example");
        assert_eq!(config.scheduler.min_confirmations, 1);
        assert_eq!(config.rescan.loop_delay_ms, 180_000);
        assert!(!config.logging.json);
    }
}

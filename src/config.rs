use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use anyhow::Result;
use tokio::fs;

/// Environment variable naming the JSON config file.
pub const CONFIG_ENV: &str = "PINGCHECK_CONFIG";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProbeConfig {
    #[serde(default = "default_host")]
    pub default_host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_host() -> String {
    "8.8.8.8".to_string()
}

fn default_port() -> u16 {
    53
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            default_host: default_host(),
            port: default_port(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ProbeConfig {
    /// Build a validated config.
    pub fn new(default_host: impl Into<String>, port: u16, timeout_ms: u64) -> Result<Self> {
        let config = Self {
            default_host: default_host.into(),
            port,
            timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }

    /// Bound applied to each network step of a probe.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow::anyhow!("Invalid port: 0. Port must be in 1..=65535"));
        }
        if self.timeout_ms == 0 {
            return Err(anyhow::anyhow!("Invalid timeout_ms: 0. Timeout must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(flatten)]
    pub probe: ProbeConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            probe: ProbeConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!(
                "Invalid log level: {}. Valid levels are: trace, debug, info, warn, error",
                self.log_level
            )),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.probe.validate()?;
        self.get_tracing_level().map(|_| ())
    }

    /// Load from an explicit path, else from `PINGCHECK_CONFIG`, else defaults.
    ///
    /// A path that was named but does not exist is an error.
    pub async fn load(path: Option<&str>) -> Result<Self> {
        let from_env = std::env::var(CONFIG_ENV).ok();
        match path.map(str::to_string).or(from_env) {
            Some(file) => Self::load_file_config(&file).await,
            None => Ok(Self::default()),
        }
    }

    pub async fn load_file_config(file_path: &str) -> Result<Self> {
        if !Path::new(file_path).exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", file_path));
        }

        let content = fs::read_to_string(file_path).await?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(content)?;
        Ok(config)
    }
}

use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engine::CANDIDATE_LINK_TYPE;

/// Main configuration structure for flowgate
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GateConfig {
    /// Authorization rules
    pub authorization: AuthorizationConfig,
    /// Logging settings
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Identity link type that makes a user a candidate of a task
    pub candidate_link_type: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Log level directive, used when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            candidate_link_type: CANDIDATE_LINK_TYPE.to_string(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: true,
        }
    }
}

impl GateConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (flowgate.toml, .flowgate-rc)
    /// 3. Environment variables (prefixed with FLOWGATE_), including a `.env` file
    pub fn load() -> Result<Self> {
        Self::load_env_file()?;
        let mut builder = Config::builder();

        if Path::new("flowgate.toml").exists() {
            builder = builder.add_source(File::with_name("flowgate"));
        }

        if Path::new(".flowgate-rc").exists() {
            builder = builder.add_source(File::new(".flowgate-rc", config::FileFormat::Toml));
        }

        builder = builder.add_source(Self::environment());
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load from one explicit file, still honouring environment overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Self::environment())
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    fn environment() -> Environment {
        Environment::with_prefix("FLOWGATE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }
}

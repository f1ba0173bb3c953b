//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles file discovery in the
//! configuration directory, environment-specific overrides and `DISPATCH__*`
//! environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::DispatchConfig;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Base configuration file name inside the configuration directory
pub const BASE_CONFIG_FILE: &str = "dispatch.yaml";

/// Prefix for environment variable overrides, e.g. `DISPATCH__EXECUTOR__QUEUE_CAPACITY`
pub const ENV_PREFIX: &str = "DISPATCH";

/// Loaded configuration plus where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: DispatchConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;

        // Validate the loaded configuration
        config.validate()?;

        info!(
            environment = %environment,
            core_pool_size = config.executor.core_pool_size,
            max_pool_size = config.executor.max_pool_size,
            queue_capacity = config.executor.queue_capacity,
            audit_mode = %String::from(config.audit.mode.clone()),
            "⚙️ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration (tests, embedding)
    pub fn from_config(config: DispatchConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("DISPATCH_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// File holding overrides for one environment
    pub fn environment_file(config_directory: &Path, environment: &str) -> PathBuf {
        config_directory.join(format!("dispatch.{environment}.yaml"))
    }

    /// Load and merge configuration with environment-specific overrides
    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<DispatchConfig> {
        let base_file = config_directory.join(BASE_CONFIG_FILE);
        let env_file = Self::environment_file(config_directory, environment);

        if base_file.exists() {
            debug!("Found configuration file: {}", base_file.display());
        }
        if env_file.exists() {
            debug!(
                "Applying environment-specific overrides for: {}",
                environment
            );
        }

        let merged = config::Config::builder()
            .add_source(config::File::from(base_file).required(false))
            .add_source(config::File::from(env_file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(config_directory.display().to_string(), e))?;

        merged
            .try_deserialize::<DispatchConfig>()
            .map_err(ConfigurationError::deserialization_error)
    }
}

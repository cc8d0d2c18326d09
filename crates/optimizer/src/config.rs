//! Optimizer configuration loaded from environment variables

use std::collections::HashMap;
use std::env;

use crate::error::ConfigError;

/// Configuration trait for environment-backed settings
pub trait ConfigTrait: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Configuration source information for debugging
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    EnvVar(String),
    Default(String),
    Nested,
}

/// Settings consulted while planning and applying fetch plans
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Never restrict the fetched columns; joins and follow-ups still apply
    pub disable_column_restriction: bool,
    /// Largest complexity score a walker accepts
    pub max_complexity: usize,
    /// Page size for paginated relations requested without `first`
    pub default_page_size: usize,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            disable_column_restriction: false,
            max_complexity: 10,
            default_page_size: 100,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl ConfigTrait for OptimizerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let disable_column_restriction =
            get_env_or_default("QUERY_OPTIMIZER_DISABLE_ONLY_FIELDS", "false");
        let disable_column_restriction =
            parse_bool("disable_column_restriction", &disable_column_restriction)?;

        let max_complexity = get_env_or_default("QUERY_OPTIMIZER_MAX_COMPLEXITY", "10");
        let max_complexity = parse_usize("max_complexity", &max_complexity)?;

        let default_page_size = get_env_or_default("QUERY_OPTIMIZER_DEFAULT_PAGE_SIZE", "100");
        let default_page_size = parse_usize("default_page_size", &default_page_size)?;

        let logging = LoggingConfig::from_env()?;

        Ok(OptimizerConfig {
            disable_column_restriction,
            max_complexity,
            default_page_size,
            logging,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_complexity == 0 {
            return Err(ConfigError::ValidationFailed {
                field: "max_complexity".to_string(),
                reason: "Maximum complexity must allow at least one relation".to_string(),
            });
        }

        if self.default_page_size == 0 {
            return Err(ConfigError::ValidationFailed {
                field: "default_page_size".to_string(),
                reason: "Default page size cannot be 0".to_string(),
            });
        }

        self.logging.validate()?;

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        sources.insert(
            "disable_column_restriction".to_string(),
            env_source("QUERY_OPTIMIZER_DISABLE_ONLY_FIELDS", "false"),
        );
        sources.insert(
            "max_complexity".to_string(),
            env_source("QUERY_OPTIMIZER_MAX_COMPLEXITY", "10"),
        );
        sources.insert(
            "default_page_size".to_string(),
            env_source("QUERY_OPTIMIZER_DEFAULT_PAGE_SIZE", "100"),
        );
        sources.insert("logging".to_string(), ConfigSource::Nested);
        sources
    }
}

impl ConfigTrait for LoggingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let level = get_env_or_default("LOG_LEVEL", "info");
        let format = get_env_or_default("LOG_FORMAT", "compact");

        Ok(LoggingConfig { level, format })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "level".to_string(),
                value: self.level.clone(),
                expected: "trace, debug, info, warn, or error".to_string(),
            });
        }

        // Validate log format
        let valid_formats = ["compact", "pretty", "json"];
        if !valid_formats.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "format".to_string(),
                value: self.format.clone(),
                expected: "compact, pretty, or json".to_string(),
            });
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        sources.insert("level".to_string(), env_source("LOG_LEVEL", "info"));
        sources.insert("format".to_string(), env_source("LOG_FORMAT", "compact"));
        sources
    }
}

// Helper functions for environment variable handling
fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_source(key: &str, default: &str) -> ConfigSource {
    if env::var(key).is_ok() {
        ConfigSource::EnvVar(key.to_string())
    } else {
        ConfigSource::Default(default.to_string())
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: "true or false".to_string(),
        }),
    }
}

fn parse_usize(field: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: "valid number".to_string(),
    })
}

// Engine configuration

use crate::logging::{LogConfig, LogFormat, LogLevel};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Prefix of the environment variables read by [`EngineConfig::from_env`]
pub const ENV_PREFIX: &str = "STENCIL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value `{value}` for `{key}`")]
    InvalidValue { key: String, value: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// What binding does with a missing non-nullable simple parameter that has
/// no declared default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingParamPolicy {
    /// Bind the type's zero value (`0`, `""`, `false`, ...)
    #[default]
    ZeroValue,
    /// Reject the request with a 400 validation error
    Reject,
}

/// How an operation name becomes a route segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStyle {
    /// Lower-cased with underscores removed: `get_user_by_id` -> `getuserbyid`
    #[default]
    Compact,
    /// Lower-cased, underscores kept: `get_user_by_id` -> `get_user_by_id`
    Snake,
}

impl RouteStyle {
    pub fn segment(&self, operation: &str) -> String {
        let lower = operation.to_lowercase();
        match self {
            RouteStyle::Compact => lower.replace('_', ""),
            RouteStyle::Snake => lower,
        }
    }
}

/// Runtime configuration of the engine and its HTTP adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,
    /// Run declarative rules and registered validators before invocation
    pub validation_enabled: bool,
    pub missing_params: MissingParamPolicy,
    pub route_style: RouteStyle,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            validation_enabled: false,
            missing_params: MissingParamPolicy::ZeroValue,
            route_style: RouteStyle::Compact,
            log_level: LogLevel::Info,
            log_format: LogFormat::Json,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    pub fn with_missing_params(mut self, policy: MissingParamPolicy) -> Self {
        self.missing_params = policy;
        self
    }

    pub fn with_route_style(mut self, style: RouteStyle) -> Self {
        self.route_style = style;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Socket address string for the HTTP adapter
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Logging configuration matching this engine configuration
    pub fn log_config(&self) -> LogConfig {
        LogConfig::new().level(self.log_level).format(self.log_format)
    }

    /// Load defaults overridden by `.env` and `STENCIL_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::from_vars(std::env::vars())
    }

    /// Apply `STENCIL_*` variables from an arbitrary source on top of the defaults.
    ///
    /// Recognised keys: `HOST`, `PORT`, `VALIDATION`, `MISSING_PARAMS`
    /// (`zero_value`/`reject`), `ROUTE_STYLE` (`compact`/`snake`),
    /// `LOG_LEVEL`, `LOG_FORMAT`. Other keys are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        let prefix = format!("{}_", ENV_PREFIX);

        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(&prefix) else {
                continue;
            };
            config.apply(&name.to_lowercase(), value.as_ref())?;
        }

        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "host" => self.host = value.to_string(),
            "port" => self.port = value.trim().parse().map_err(|_| invalid())?,
            "validation" | "validation_enabled" => {
                self.validation_enabled = parse_flag(value).ok_or_else(invalid)?
            }
            "missing_params" => {
                self.missing_params = match value.trim().to_lowercase().as_str() {
                    "zero_value" | "zero" => MissingParamPolicy::ZeroValue,
                    "reject" | "strict" => MissingParamPolicy::Reject,
                    _ => return Err(invalid()),
                }
            }
            "route_style" => {
                self.route_style = match value.trim().to_lowercase().as_str() {
                    "compact" => RouteStyle::Compact,
                    "snake" => RouteStyle::Snake,
                    _ => return Err(invalid()),
                }
            }
            "log_level" => self.log_level = LogLevel::from_str(value).ok_or_else(invalid)?,
            "log_format" => self.log_format = LogFormat::from_str(value).ok_or_else(invalid)?,
            _ => {}
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

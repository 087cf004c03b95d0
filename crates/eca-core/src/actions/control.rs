//! Flow-control and diagnostic actions.

use std::str::FromStr;

use tracing::{debug, error, info, trace, warn};

use super::Action;
use crate::error::{ActionError, ConfigError};
use crate::plugin::PluginConfig;
use crate::scope::Scope;
use crate::tokens::store::normalize_name;

pub const REQUIRE_TOKEN_ID: &str = "require-token";
pub const LOG_MESSAGE_ID: &str = "log-message";
pub const STOP_ID: &str = "stop";

/// Fail with [`ActionError::MissingValue`] when a token renders empty.
#[derive(Debug, Clone)]
pub struct RequireToken {
    pub name: String,
    pub message: String,
}

impl RequireToken {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        let raw = config.require_non_empty(REQUIRE_TOKEN_ID, "token_name")?;
        Ok(Self {
            name: normalize_name(&raw).to_string(),
            message: config
                .text("message")
                .unwrap_or_else(|| "a value is required".to_string()),
        })
    }
}

impl Action for RequireToken {
    fn execute(&self, scope: &mut Scope<'_>) -> Result<(), ActionError> {
        let rendered = scope.resolve_to_string(&format!("[{}]", self.name));
        if rendered.trim().is_empty() {
            return Err(ActionError::MissingValue {
                token: self.name.clone(),
                message: scope.resolve_to_string(&self.message),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" | "notice" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" | "critical" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Emit a resolved message through `tracing`.
#[derive(Debug, Clone)]
pub struct LogMessage {
    pub level: LogLevel,
    pub message: String,
}

impl LogMessage {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            level: config.parse_or(LOG_MESSAGE_ID, "level", LogLevel::Info)?,
            message: config.require_text(LOG_MESSAGE_ID, "message")?,
        })
    }
}

impl Action for LogMessage {
    fn execute(&self, scope: &mut Scope<'_>) -> Result<(), ActionError> {
        let message = scope.resolve_to_string(&self.message);
        let rule = scope.rule_id();
        match self.level {
            LogLevel::Trace => trace!(rule, "{message}"),
            LogLevel::Debug => debug!(rule, "{message}"),
            LogLevel::Info => info!(rule, "{message}"),
            LogLevel::Warn => warn!(rule, "{message}"),
            LogLevel::Error => error!(rule, "{message}"),
        }
        Ok(())
    }
}

/// Raise the stop-processing signal.
#[derive(Debug, Clone, Copy)]
pub struct Stop;

impl Action for Stop {
    fn execute(&self, _scope: &mut Scope<'_>) -> Result<(), ActionError> {
        Err(ActionError::Stop)
    }
}

//! Core error types for eca-core.
//!
//! Errors are split by the moment they can happen:
//! - [`ConfigError`]: detected while a rule is registered, the rule is rejected
//! - [`ActionError`]: raised by an action while a rule graph is walked
//! - [`FatalError`]: an engine invariant was violated, the dispatch is aborted
//!
//! [`EcaError`] wraps all of them together with the store layer's IO and
//! parse failures.

use thiserror::Error;

/// Core error type for eca-core.
#[derive(Error, Debug)]
pub enum EcaError {
    /// A rule document was rejected at registration time
    #[error("Configuration error in rule '{rule}': {source}")]
    Config {
        rule: String,
        #[source]
        source: ConfigError,
    },

    /// An action failed and its rule does not handle its own errors
    #[error("Action '{node}' of rule '{rule}' failed: {source}")]
    Action {
        rule: String,
        node: String,
        #[source]
        source: ActionError,
    },

    /// Engine invariant violation
    #[error("Fatal engine error: {0}")]
    Fatal(#[from] FatalError),

    /// Event kind unknown to the kind registry
    #[error("Dispatch rejected: {0}")]
    Dispatch(ConfigError),

    /// Rule lookup by id failed
    #[error("Rule '{0}' not found")]
    NotFound(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

impl EcaError {
    /// Wrap a configuration error with the id of the rule it belongs to.
    pub fn config(rule: impl Into<String>, source: ConfigError) -> Self {
        EcaError::Config {
            rule: rule.into(),
            source,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, EcaError::Fatal(_))
    }
}

/// Registration-time configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported event kind '{0}'")]
    UnsupportedEventKind(String),

    #[error("wildcard for '{kind}' has {found} segments, expected {expected}")]
    WildcardArity {
        kind: String,
        expected: usize,
        found: usize,
    },

    #[error("event kind '{kind}' has no dimension '{dimension}'")]
    UnknownDimension { kind: String, dimension: String },

    #[error("invalid value '{value}' for dimension '{dimension}': {message}")]
    InvalidDimensionValue {
        dimension: String,
        value: String,
        message: String,
    },

    #[error("rule id '{0}' may only contain letters, digits, '_', '-' and '.'")]
    InvalidRuleId(String),

    #[error("rule must declare exactly one event node, found {0}")]
    EventNodeCount(usize),

    #[error("rule must declare at least one action node")]
    NoActions,

    #[error("node id '{0}' is declared more than once")]
    DuplicateNodeId(String),

    #[error("rule '{0}' is already registered")]
    DuplicateRule(String),

    #[error("unknown {family} plugin '{id}'")]
    UnknownPlugin { family: &'static str, id: String },

    #[error("plugin '{plugin}' requires configuration key '{key}'")]
    MissingKey { plugin: String, key: String },

    #[error("plugin '{plugin}' has invalid '{key}': {message}")]
    InvalidValue {
        plugin: String,
        key: String,
        message: String,
    },

    #[error("successor of '{from}' points to unknown node '{to}'")]
    UnknownNode { from: String, to: String },

    #[error("successor of '{from}' cannot target '{to}': only actions and gateways are reachable")]
    InvalidTarget { from: String, to: String },

    #[error("successor of '{from}' references unknown condition '{condition}'")]
    UnknownCondition { from: String, condition: String },

    #[error("condition '{0}' cannot have successors, reference it from an edge instead")]
    ConditionSuccessors(String),

    #[error("cycle detected in rule graph at node '{0}'")]
    Cycle(String),
}

/// Errors raised by an action node while it executes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),

    #[error("token '{token}' is empty: {message}")]
    MissingValue { token: String, message: String },

    /// The designated "stop processing" signal. Not a failure.
    #[error("processing stopped")]
    Stop,
}

impl ActionError {
    pub fn failed(message: impl Into<String>) -> Self {
        ActionError::Failed(message.into())
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, ActionError::Stop)
    }
}

/// Engine invariant violations. Never swallowed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("context switch stack has nothing to pop for '{entity}'")]
    UnbalancedPop { entity: String },

    #[error("context switch by '{pushed_by}' in '{entity}' was already restored")]
    DoubleRelease { entity: String, pushed_by: String },

    #[error("rule '{rule}' has no node '{node}'")]
    MissingNode { rule: String, node: String },
}

/// Result type alias for EcaError
pub type Result<T, E = EcaError> = std::result::Result<T, E>;

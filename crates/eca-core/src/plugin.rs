//! Plugin configuration and the condition/action registry.
//!
//! Plugins are looked up by string id when a rule is registered. A factory
//! reads the node's [`PluginConfig`], validates it, and returns a boxed
//! [`Condition`] or [`Action`]. Built-ins are registered by
//! [`PluginRegistry::with_builtins`]; hosts add their own through the same
//! `register_*` methods.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::actions::{self, Action};
use crate::conditions::{self, Condition};
use crate::error::ConfigError;

/// Free-form configuration of a plugin node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginConfig(serde_json::Map<String, serde_json::Value>);

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter, mostly for tests and programmatic rules.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Text form of a key. Scalars are rendered, arrays are comma-joined,
    /// `null` counts as unset.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            serde_json::Value::Array(items) => Some(
                items
                    .iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            other @ serde_json::Value::Object(_) => Some(other.to_string()),
        }
    }

    pub fn require_text(&self, plugin: &str, key: &str) -> Result<String, ConfigError> {
        self.text(key).ok_or_else(|| ConfigError::MissingKey {
            plugin: plugin.to_string(),
            key: key.to_string(),
        })
    }

    /// Like [`require_text`](Self::require_text), but blank values are missing too.
    pub fn require_non_empty(&self, plugin: &str, key: &str) -> Result<String, ConfigError> {
        self.require_text(plugin, key).and_then(|text| {
            if text.trim().is_empty() {
                Err(ConfigError::MissingKey {
                    plugin: plugin.to_string(),
                    key: key.to_string(),
                })
            } else {
                Ok(text)
            }
        })
    }

    pub fn flag(&self, plugin: &str, key: &str, default: bool) -> Result<bool, ConfigError> {
        let invalid = |found: &serde_json::Value| ConfigError::InvalidValue {
            plugin: plugin.to_string(),
            key: key.to_string(),
            message: format!("expected a boolean, found {found}"),
        };
        match self.0.get(key) {
            None | Some(serde_json::Value::Null) => Ok(default),
            Some(serde_json::Value::Bool(b)) => Ok(*b),
            Some(serde_json::Value::Number(n)) if n.as_u64() == Some(0) => Ok(false),
            Some(serde_json::Value::Number(n)) if n.as_u64() == Some(1) => Ok(true),
            Some(found @ serde_json::Value::String(s)) => {
                match s.trim().to_lowercase().as_str() {
                    "" => Ok(default),
                    "true" | "1" | "yes" => Ok(true),
                    "false" | "0" | "no" => Ok(false),
                    _ => Err(invalid(found)),
                }
            }
            Some(found) => Err(invalid(found)),
        }
    }

    /// Parse a key through `FromStr`, falling back to `default` when unset.
    pub fn parse_or<T>(&self, plugin: &str, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.text(key) {
            None => Ok(default),
            Some(text) if text.trim().is_empty() => Ok(default),
            Some(text) => text.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                plugin: plugin.to_string(),
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Builds a condition from its node configuration.
pub type ConditionFactory =
    Box<dyn Fn(&PluginConfig) -> Result<Box<dyn Condition>, ConfigError> + Send + Sync>;

/// Builds an action from its node configuration.
pub type ActionFactory =
    Box<dyn Fn(&PluginConfig) -> Result<Box<dyn Action>, ConfigError> + Send + Sync>;

/// String id → factory tables for conditions and actions.
#[derive(Default)]
pub struct PluginRegistry {
    conditions: BTreeMap<String, ConditionFactory>,
    actions: BTreeMap<String, ActionFactory>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in condition and action.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        conditions::register_builtins(&mut registry);
        actions::register_builtins(&mut registry);
        registry
    }

    pub fn register_condition<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&PluginConfig) -> Result<Box<dyn Condition>, ConfigError> + Send + Sync + 'static,
    {
        self.conditions.insert(id.into(), Box::new(factory));
    }

    pub fn register_action<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&PluginConfig) -> Result<Box<dyn Action>, ConfigError> + Send + Sync + 'static,
    {
        self.actions.insert(id.into(), Box::new(factory));
    }

    pub fn build_condition(
        &self,
        id: &str,
        config: &PluginConfig,
    ) -> Result<Box<dyn Condition>, ConfigError> {
        let factory = self
            .conditions
            .get(id)
            .ok_or_else(|| ConfigError::UnknownPlugin {
                family: "condition",
                id: id.to_string(),
            })?;
        factory(config)
    }

    pub fn build_action(
        &self,
        id: &str,
        config: &PluginConfig,
    ) -> Result<Box<dyn Action>, ConfigError> {
        let factory = self.actions.get(id).ok_or_else(|| ConfigError::UnknownPlugin {
            family: "action",
            id: id.to_string(),
        })?;
        factory(config)
    }

    pub fn condition_ids(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(String::as_str)
    }

    pub fn action_ids(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("conditions", &self.conditions.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

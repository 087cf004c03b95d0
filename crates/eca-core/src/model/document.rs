//! Declarative rule documents.
//!
//! A document is what operators write and what the store persists. It is
//! checked and compiled into a [`Rule`](super::Rule) when registered.
//!
//! ```toml
//! id = "allow_article_view"
//! label = "Allow viewing articles"
//!
//! [events.access]
//! plugin = "entity-access"
//! configuration = { type = "node", bundle = ["article", "page"], operation = "view" }
//! successors = [{ id = "allow", condition = "published" }]
//!
//! [conditions.published]
//! plugin = "scalar"
//! configuration = { left = "[status]", right = "1" }
//!
//! [actions.allow]
//! plugin = "set-result"
//! configuration = { value = "allow" }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::plugin::PluginConfig;

/// A complete rule graph as written by an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    /// Stable machine id
    pub id: String,

    /// Human-readable label
    #[serde(default)]
    pub label: String,

    #[serde(default = "default_version")]
    pub version: String,

    /// Whether this rule takes part in dispatch
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Execution priority; lower runs first, ties keep registration order
    #[serde(default)]
    pub weight: i32,

    /// Action errors are logged instead of being reported to the caller
    #[serde(default)]
    pub handles_exceptions: bool,

    /// Entry node, keyed by node id. Exactly one is allowed.
    #[serde(default)]
    pub events: BTreeMap<String, NodeDocument>,

    #[serde(default)]
    pub conditions: BTreeMap<String, NodeDocument>,

    #[serde(default)]
    pub gateways: BTreeMap<String, NodeDocument>,

    #[serde(default)]
    pub actions: BTreeMap<String, NodeDocument>,
}

/// One node of a rule graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    /// Plugin id. For event nodes this is the event kind, for gateways
    /// `and` or `or`.
    pub plugin: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,

    #[serde(default, skip_serializing_if = "PluginConfig::is_empty")]
    pub configuration: PluginConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub successors: Vec<SuccessorDocument>,

    /// Errors raised by this action are logged instead of reported
    #[serde(default, skip_serializing_if = "is_false")]
    pub handles_errors: bool,
}

/// A successor edge, optionally guarded by a condition or gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessorDocument {
    /// Target node id
    pub id: String,

    /// Guarding condition or gateway id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Guard value required to traverse the edge
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub expect: bool,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl RuleDocument {
    /// An empty, enabled document.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            version: default_version(),
            enabled: true,
            weight: 0,
            handles_exceptions: false,
            events: BTreeMap::new(),
            conditions: BTreeMap::new(),
            gateways: BTreeMap::new(),
            actions: BTreeMap::new(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Total number of nodes across all sections.
    pub fn node_count(&self) -> usize {
        self.events.len() + self.conditions.len() + self.gateways.len() + self.actions.len()
    }

    pub fn with_event(mut self, id: impl Into<String>, node: NodeDocument) -> Self {
        self.events.insert(id.into(), node);
        self
    }

    pub fn with_condition(mut self, id: impl Into<String>, node: NodeDocument) -> Self {
        self.conditions.insert(id.into(), node);
        self
    }

    pub fn with_gateway(mut self, id: impl Into<String>, node: NodeDocument) -> Self {
        self.gateways.insert(id.into(), node);
        self
    }

    pub fn with_action(mut self, id: impl Into<String>, node: NodeDocument) -> Self {
        self.actions.insert(id.into(), node);
        self
    }
}

impl NodeDocument {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            label: String::new(),
            configuration: PluginConfig::new(),
            successors: Vec::new(),
            handles_errors: false,
        }
    }

    pub fn with_config(mut self, configuration: PluginConfig) -> Self {
        self.configuration = configuration;
        self
    }

    /// Add an unguarded successor.
    pub fn then(mut self, target: impl Into<String>) -> Self {
        self.successors.push(SuccessorDocument::new(target));
        self
    }

    /// Add a successor traversed when `condition` is true.
    pub fn then_if(mut self, target: impl Into<String>, condition: impl Into<String>) -> Self {
        self.successors
            .push(SuccessorDocument::new(target).guarded(condition, true));
        self
    }

    /// Add a successor traversed when `condition` is false.
    pub fn then_unless(mut self, target: impl Into<String>, condition: impl Into<String>) -> Self {
        self.successors
            .push(SuccessorDocument::new(target).guarded(condition, false));
        self
    }

    pub fn handling_errors(mut self) -> Self {
        self.handles_errors = true;
        self
    }
}

impl SuccessorDocument {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            id: target.into(),
            condition: None,
            expect: true,
        }
    }

    pub fn guarded(mut self, condition: impl Into<String>, expect: bool) -> Self {
        self.condition = Some(condition.into());
        self.expect = expect;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const ARTICLE_RULE: &str = indoc! {r#"
        id = "allow_article_view"
        label = "Allow viewing articles"

        [events.access]
        plugin = "entity-access"
        configuration = { type = "node", bundle = ["article", "page"], operation = "view" }
        successors = [{ id = "allow", condition = "published" }]

        [conditions.published]
        plugin = "scalar"
        configuration = { left = "[status]", right = "1" }

        [actions.allow]
        plugin = "set-result"
        configuration = { value = "allow" }
    "#};

    #[test]
    fn test_parse_toml_defaults() {
        let doc = RuleDocument::from_toml_str(ARTICLE_RULE).unwrap();
        assert_eq!(doc.id, "allow_article_view");
        assert_eq!(doc.version, "1.0");
        assert!(doc.enabled);
        assert!(!doc.handles_exceptions);
        assert_eq!(doc.node_count(), 3);

        let edge = &doc.events["access"].successors[0];
        assert_eq!(edge.id, "allow");
        assert_eq!(edge.condition.as_deref(), Some("published"));
        assert!(edge.expect);
    }

    #[test]
    fn test_toml_roundtrip_keeps_graph() {
        let doc = RuleDocument::from_toml_str(ARTICLE_RULE).unwrap();
        let text = doc.to_toml_string().unwrap();
        assert_eq!(RuleDocument::from_toml_str(&text).unwrap(), doc);
    }

    #[test]
    fn test_parse_json() {
        let doc = RuleDocument::from_json_str(
            r#"{
                "id": "login",
                "enabled": false,
                "events": { "e": { "plugin": "user-login", "successors": [{ "id": "a" }] } },
                "actions": { "a": { "plugin": "stop" } }
            }"#,
        )
        .unwrap();
        assert!(!doc.enabled);
        assert!(doc.events["e"].configuration.is_empty());
    }

    #[test]
    fn test_missing_id_rejected() {
        assert!(RuleDocument::from_toml_str("label = \"x\"").is_err());
    }
}

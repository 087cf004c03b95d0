//! Compiled rule graphs.
//!
//! [`Rule::compile`] turns a [`RuleDocument`] into an executable graph. Every
//! configuration problem is caught here so that dispatch never sees a broken
//! rule: plugin ids and their configuration, the event kind and its wildcard,
//! edge targets, guard references, and cycles.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use super::document::{NodeDocument, RuleDocument, SuccessorDocument};
use crate::actions::Action;
use crate::conditions::Condition;
use crate::error::ConfigError;
use crate::plugin::PluginRegistry;
use crate::scope::Scope;
use crate::wildcard::{KindRegistry, Wildcard};

/// Condition key flipping the plugin's verdict.
pub const NEGATE_KEY: &str = "negate";

/// Guard of a successor edge: a condition or gateway and the verdict it must give.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub node: String,
    pub expect: bool,
}

/// A directed edge to an action or gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub target: String,
    pub guard: Option<Guard>,
}

#[derive(Debug, Clone)]
pub struct EventNode {
    pub id: String,
    pub kind: String,
    pub wildcard: Wildcard,
    pub successors: Vec<Edge>,
}

pub struct ConditionNode {
    pub id: String,
    pub plugin_id: String,
    pub negate: bool,
    pub plugin: Box<dyn Condition>,
}

impl ConditionNode {
    /// Evaluate the plugin and apply negation.
    pub fn evaluate(&self, scope: &Scope<'_>) -> bool {
        self.plugin.evaluate(scope) != self.negate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayLogic {
    And,
    Or,
}

impl GatewayLogic {
    fn parse(plugin: &str) -> Option<Self> {
        match plugin.trim().to_lowercase().as_str() {
            "and" => Some(GatewayLogic::And),
            "or" => Some(GatewayLogic::Or),
            _ => None,
        }
    }
}

/// Merges the guards of every inbound edge into one boolean.
#[derive(Debug, Clone)]
pub struct GatewayNode {
    pub id: String,
    pub logic: GatewayLogic,
    /// Guards of all edges pointing at this gateway; `None` for unguarded edges.
    pub inbound: Vec<Option<Guard>>,
    pub successors: Vec<Edge>,
}

pub struct ActionNode {
    pub id: String,
    pub plugin_id: String,
    pub handles_errors: bool,
    pub plugin: Box<dyn Action>,
    pub successors: Vec<Edge>,
}

/// A validated, executable rule.
pub struct Rule {
    pub id: String,
    pub label: String,
    pub version: String,
    pub enabled: bool,
    pub weight: i32,
    pub handles_exceptions: bool,
    pub event: EventNode,
    pub conditions: BTreeMap<String, ConditionNode>,
    pub gateways: BTreeMap<String, GatewayNode>,
    pub actions: BTreeMap<String, ActionNode>,
    document: RuleDocument,
}

impl Rule {
    /// Validate a document and build its graph.
    pub fn compile(
        document: RuleDocument,
        kinds: &KindRegistry,
        plugins: &PluginRegistry,
    ) -> Result<Self, ConfigError> {
        validate_id(&document.id)?;
        check_node_ids(&document)?;

        if document.events.len() != 1 {
            return Err(ConfigError::EventNodeCount(document.events.len()));
        }
        if document.actions.is_empty() {
            return Err(ConfigError::NoActions);
        }

        let mut conditions = BTreeMap::new();
        for (id, node) in &document.conditions {
            if let Some(successor) = node.successors.first() {
                debug!(condition = %id, successor = %successor.id, "condition declares successors");
                return Err(ConfigError::ConditionSuccessors(id.clone()));
            }
            let negate = node.configuration.flag(&node.plugin, NEGATE_KEY, false)?;
            let plugin = plugins.build_condition(&node.plugin, &node.configuration)?;
            conditions.insert(
                id.clone(),
                ConditionNode {
                    id: id.clone(),
                    plugin_id: node.plugin.clone(),
                    negate,
                    plugin,
                },
            );
        }

        let mut gateways = BTreeMap::new();
        for (id, node) in &document.gateways {
            let logic =
                GatewayLogic::parse(&node.plugin).ok_or_else(|| ConfigError::UnknownPlugin {
                    family: "gateway",
                    id: node.plugin.clone(),
                })?;
            gateways.insert(
                id.clone(),
                GatewayNode {
                    id: id.clone(),
                    logic,
                    inbound: Vec::new(),
                    successors: edges(id, node, &document)?,
                },
            );
        }

        let mut actions = BTreeMap::new();
        for (id, node) in &document.actions {
            let plugin = plugins.build_action(&node.plugin, &node.configuration)?;
            actions.insert(
                id.clone(),
                ActionNode {
                    id: id.clone(),
                    plugin_id: node.plugin.clone(),
                    handles_errors: node.handles_errors,
                    plugin,
                    successors: edges(id, node, &document)?,
                },
            );
        }

        let (event_id, event_doc) = document
            .events
            .iter()
            .next()
            .ok_or(ConfigError::EventNodeCount(0))?;
        let kind = kinds.get(&event_doc.plugin)?;
        let event = EventNode {
            id: event_id.clone(),
            kind: kind.id.clone(),
            wildcard: kind.rule_wildcard(&event_doc.configuration)?,
            successors: edges(event_id, event_doc, &document)?,
        };

        // Inbound guards of every gateway, from all edge sources.
        let sources = std::iter::once(&event.successors)
            .chain(gateways.values().map(|g| &g.successors))
            .chain(actions.values().map(|a| &a.successors))
            .flat_map(|list| list.iter())
            .filter(|edge| gateways.contains_key(&edge.target))
            .map(|edge| (edge.target.clone(), edge.guard.clone()))
            .collect::<Vec<_>>();
        for (target, guard) in sources {
            if let Some(gateway) = gateways.get_mut(&target) {
                gateway.inbound.push(guard);
            }
        }

        let rule = Self {
            id: document.id.clone(),
            label: document.label.clone(),
            version: document.version.clone(),
            enabled: document.enabled,
            weight: document.weight,
            handles_exceptions: document.handles_exceptions,
            event,
            conditions,
            gateways,
            actions,
            document,
        };
        rule.check_acyclic()?;
        rule.check_guards_acyclic()?;
        Ok(rule)
    }

    /// The document this rule was compiled from.
    pub fn document(&self) -> &RuleDocument {
        &self.document
    }

    pub fn wildcard(&self) -> &Wildcard {
        &self.event.wildcard
    }

    pub fn kind(&self) -> &str {
        &self.event.kind
    }

    /// Outgoing edges of an event, gateway or action node.
    pub fn successors(&self, node: &str) -> Option<&[Edge]> {
        if node == self.event.id {
            return Some(&self.event.successors);
        }
        self.gateways
            .get(node)
            .map(|g| g.successors.as_slice())
            .or_else(|| self.actions.get(node).map(|a| a.successors.as_slice()))
    }

    /// Whether an error raised by `node` is handled by the rule itself.
    pub fn handles_error_of(&self, node: &str) -> bool {
        self.handles_exceptions || self.actions.get(node).is_some_and(|a| a.handles_errors)
    }

    /// Depth-first search over successor edges with a recursion stack.
    fn check_acyclic(&self) -> Result<(), ConfigError> {
        let mut visited = BTreeSet::new();
        let mut stack = BTreeSet::new();
        self.visit_successors(&self.event.id, &mut visited, &mut stack)?;
        // Nodes not reachable from the event can still form a cycle among themselves.
        let others: Vec<&str> = self
            .gateways
            .keys()
            .chain(self.actions.keys())
            .map(String::as_str)
            .collect();
        for node in others {
            self.visit_successors(node, &mut visited, &mut stack)?;
        }
        Ok(())
    }

    fn visit_successors<'r>(
        &'r self,
        node: &'r str,
        visited: &mut BTreeSet<&'r str>,
        stack: &mut BTreeSet<&'r str>,
    ) -> Result<(), ConfigError> {
        if stack.contains(node) {
            return Err(ConfigError::Cycle(node.to_string()));
        }
        if !visited.insert(node) {
            return Ok(());
        }
        stack.insert(node);
        for edge in self.successors(node).unwrap_or_default() {
            self.visit_successors(&edge.target, visited, stack)?;
        }
        stack.remove(node);
        Ok(())
    }

    /// A gateway whose merged value depends on itself could never be evaluated.
    fn check_guards_acyclic(&self) -> Result<(), ConfigError> {
        let mut visited = BTreeSet::new();
        let mut stack = BTreeSet::new();
        for id in self.gateways.keys() {
            self.visit_guards(id, &mut visited, &mut stack)?;
        }
        Ok(())
    }

    fn visit_guards<'r>(
        &'r self,
        gateway: &'r str,
        visited: &mut BTreeSet<&'r str>,
        stack: &mut BTreeSet<&'r str>,
    ) -> Result<(), ConfigError> {
        if stack.contains(gateway) {
            return Err(ConfigError::Cycle(gateway.to_string()));
        }
        if !visited.insert(gateway) {
            return Ok(());
        }
        stack.insert(gateway);
        if let Some(node) = self.gateways.get(gateway) {
            for guard in node.inbound.iter().flatten() {
                if self.gateways.contains_key(&guard.node) {
                    self.visit_guards(&guard.node, visited, stack)?;
                }
            }
        }
        stack.remove(gateway);
        Ok(())
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("enabled", &self.enabled)
            .field("weight", &self.weight)
            .field("wildcard", &self.event.wildcard.to_string())
            .field("conditions", &self.conditions.keys().collect::<Vec<_>>())
            .field("gateways", &self.gateways.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn validate_id(id: &str) -> Result<(), ConfigError> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidRuleId(id.to_string()))
    }
}

fn check_node_ids(document: &RuleDocument) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    let ids = document
        .events
        .keys()
        .chain(document.conditions.keys())
        .chain(document.gateways.keys())
        .chain(document.actions.keys());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(ConfigError::DuplicateNodeId(id.clone()));
        }
    }
    Ok(())
}

fn edges(from: &str, node: &NodeDocument, document: &RuleDocument) -> Result<Vec<Edge>, ConfigError> {
    node.successors
        .iter()
        .map(|successor| edge(from, successor, document))
        .collect()
}

fn edge(from: &str, successor: &SuccessorDocument, document: &RuleDocument) -> Result<Edge, ConfigError> {
    let target = successor.id.trim();
    if !document.actions.contains_key(target) && !document.gateways.contains_key(target) {
        let known = document.events.contains_key(target) || document.conditions.contains_key(target);
        return Err(if known {
            ConfigError::InvalidTarget {
                from: from.to_string(),
                to: target.to_string(),
            }
        } else {
            ConfigError::UnknownNode {
                from: from.to_string(),
                to: target.to_string(),
            }
        });
    }

    let guard = match successor.condition.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(condition) => {
            if !document.conditions.contains_key(condition)
                && !document.gateways.contains_key(condition)
            {
                return Err(ConfigError::UnknownCondition {
                    from: from.to_string(),
                    condition: condition.to_string(),
                });
            }
            Some(Guard {
                node: condition.to_string(),
                expect: successor.expect,
            })
        }
    };

    Ok(Edge {
        target: target.to_string(),
        guard,
    })
}

//! Wildcard matching between rules and events.
//!
//! Every event kind declares a fixed, ordered list of dimensions. A rule's
//! event node encodes its filter as a [`Wildcard`] with one segment per
//! dimension; the router encodes each dispatched event the same way and
//! compares the two before any condition runs.
//!
//! The string form is colon-delimited, e.g. `node:article,page:view`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::plugin::PluginConfig;
use crate::value::Value;

/// One dimension of an event kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(default = "default_true")]
    pub case_insensitive: bool,
}

fn default_true() -> bool {
    true
}

impl Dimension {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            case_insensitive: true,
        }
    }

    pub fn case_sensitive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            case_insensitive: false,
        }
    }

    fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if self.case_insensitive {
            trimmed.to_lowercase()
        } else {
            trimmed.to_string()
        }
    }
}

/// An event kind and the dimensions its wildcard is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventKind {
    pub id: String,
    pub dimensions: Vec<Dimension>,
}

impl EventKind {
    /// A kind whose dimensions are all case-insensitive.
    pub fn new(id: impl Into<String>, dimensions: &[&str]) -> Self {
        Self {
            id: id.into(),
            dimensions: dimensions.iter().map(|d| Dimension::new(*d)).collect(),
        }
    }

    pub fn arity(&self) -> usize {
        self.dimensions.len()
    }

    /// Encode a rule filter. Missing or empty dimensions become `*`.
    pub fn rule_wildcard(&self, filter: &PluginConfig) -> Result<Wildcard, ConfigError> {
        for key in filter.keys() {
            if !self.dimensions.iter().any(|d| d.name == key) {
                return Err(ConfigError::UnknownDimension {
                    kind: self.id.clone(),
                    dimension: key.to_string(),
                });
            }
        }

        let mut segments = Vec::with_capacity(self.arity());
        for dimension in &self.dimensions {
            let raw = filter.text(&dimension.name).unwrap_or_default();
            let mut values = Vec::new();
            for part in raw.split(',') {
                let value = dimension.normalize(part);
                if value.is_empty() {
                    continue;
                }
                if value == "*" {
                    values.clear();
                    break;
                }
                if value.contains(':') {
                    return Err(ConfigError::InvalidDimensionValue {
                        dimension: dimension.name.clone(),
                        value,
                        message: "':' is the segment delimiter".to_string(),
                    });
                }
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            segments.push(if values.is_empty() {
                Segment::Any
            } else {
                Segment::Values(values)
            });
        }

        Ok(Wildcard {
            kind: self.id.clone(),
            segments,
        })
    }

    /// Encode an event context. A segment holds one literal, or one per item
    /// when the dimension is a list; a missing dimension is the empty literal,
    /// which only `*` matches.
    pub fn event_wildcard(&self, context: &BTreeMap<String, Value>) -> Wildcard {
        let segments = self
            .dimensions
            .iter()
            .map(|dimension| {
                let literals = match context.get(&dimension.name) {
                    Some(Value::List(items)) if !items.is_empty() => items
                        .iter()
                        .map(|item| dimension.normalize(&event_literal(item)))
                        .collect(),
                    Some(value) => vec![dimension.normalize(&event_literal(value))],
                    None => vec![String::new()],
                };
                Segment::Values(literals)
            })
            .collect();
        Wildcard {
            kind: self.id.clone(),
            segments,
        }
    }

    /// Parse the string form, enforcing this kind's arity.
    pub fn parse_wildcard(&self, encoded: &str) -> Result<Wildcard, ConfigError> {
        if self.dimensions.is_empty() {
            return match encoded.trim() {
                "" | "*" => Ok(Wildcard {
                    kind: self.id.clone(),
                    segments: Vec::new(),
                }),
                _ => Err(ConfigError::WildcardArity {
                    kind: self.id.clone(),
                    expected: 0,
                    found: encoded.split(':').count(),
                }),
            };
        }

        let raw: Vec<&str> = encoded.split(':').collect();
        if raw.len() != self.arity() {
            return Err(ConfigError::WildcardArity {
                kind: self.id.clone(),
                expected: self.arity(),
                found: raw.len(),
            });
        }

        let segments = raw
            .iter()
            .zip(&self.dimensions)
            .map(|(segment, dimension)| {
                let mut values: Vec<String> = Vec::new();
                for value in segment.split(',').map(|v| dimension.normalize(v)) {
                    if value == "*" {
                        return Segment::Any;
                    }
                    if !value.is_empty() && !values.contains(&value) {
                        values.push(value);
                    }
                }
                if values.is_empty() {
                    Segment::Any
                } else {
                    Segment::Values(values)
                }
            })
            .collect();

        Ok(Wildcard {
            kind: self.id.clone(),
            segments,
        })
    }
}

fn event_literal(value: &Value) -> String {
    match value {
        Value::Opaque(object) => object.id(),
        other => other.to_text(","),
    }
}

/// One wildcard segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `*`: matches every value.
    Any,
    /// Literal set, in registration order.
    Values(Vec<String>),
}

impl Segment {
    fn covers(&self, event: &Segment) -> bool {
        match (self, event) {
            (Segment::Any, _) => true,
            // Events never carry `*`.
            (Segment::Values(_), Segment::Any) => false,
            (Segment::Values(allowed), Segment::Values(actual)) => {
                actual.iter().any(|value| allowed.contains(value))
            }
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Any => f.write_str("*"),
            Segment::Values(values) => f.write_str(&values.join(",")),
        }
    }
}

/// Encoded filter: one segment per dimension of an event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wildcard {
    kind: String,
    segments: Vec<Segment>,
}

impl Wildcard {
    /// Id of the event kind this wildcard was built for.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn arity(&self) -> usize {
        self.segments.len()
    }

    /// Whether a rule wildcard (`self`) admits an event wildcard.
    pub fn matches(&self, event: &Wildcard) -> Result<bool, ConfigError> {
        if self.arity() != event.arity() {
            return Err(ConfigError::WildcardArity {
                kind: self.kind.clone(),
                expected: event.arity(),
                found: self.arity(),
            });
        }
        Ok(self
            .segments
            .iter()
            .zip(&event.segments)
            .all(|(rule, actual)| rule.covers(actual)))
    }
}

impl fmt::Display for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("*");
        }
        let encoded: Vec<String> = self.segments.iter().map(ToString::to_string).collect();
        f.write_str(&encoded.join(":"))
    }
}

/// Registry of event kinds known to an engine.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<String, EventKind>,
}

impl KindRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in entity, user, form and custom event kinds.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(EventKind::new("entity-access", &["type", "bundle", "operation"]));
        registry.register(EventKind::new(
            "entity-field-access",
            &["type", "bundle", "field", "operation"],
        ));
        for kind in [
            "entity-create",
            "entity-presave",
            "entity-insert",
            "entity-update",
            "entity-delete",
        ] {
            registry.register(EventKind::new(kind, &["type", "bundle"]));
        }
        for kind in ["entity-translation-insert", "entity-translation-delete"] {
            registry.register(EventKind::new(kind, &["type", "bundle", "locale"]));
        }
        for kind in ["user-login", "user-logout"] {
            registry.register(EventKind::new(kind, &[]));
        }
        for kind in ["form-build", "form-validate", "form-submit"] {
            registry.register(EventKind::new(kind, &["form_id", "operation"]));
        }
        registry.register(EventKind::new("custom", &["event_id"]));
        registry
    }

    /// Add or replace a kind.
    pub fn register(&mut self, kind: EventKind) {
        self.kinds.insert(kind.id.clone(), kind);
    }

    pub fn get(&self, id: &str) -> Result<&EventKind, ConfigError> {
        self.kinds
            .get(id)
            .ok_or_else(|| ConfigError::UnsupportedEventKind(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn access() -> EventKind {
        EventKind::new("entity-access", &["type", "bundle", "operation"])
    }

    fn filter(value: serde_json::Value) -> PluginConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_build_rule_wildcard() {
        let wildcard = access()
            .rule_wildcard(&filter(json!({"type": " Node ", "bundle": "article, page"})))
            .unwrap();
        assert_eq!(wildcard.to_string(), "node:article,page:*");
    }

    #[test]
    fn test_star_in_list_means_any() {
        let wildcard = access()
            .rule_wildcard(&filter(json!({"type": "node, *"})))
            .unwrap();
        assert_eq!(wildcard.segments()[0], Segment::Any);
    }

    #[test]
    fn test_unknown_dimension_rejected() {
        let err = access()
            .rule_wildcard(&filter(json!({"langcode": "en"})))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDimension { .. }));
    }

    #[test]
    fn test_colon_rejected() {
        let err = access()
            .rule_wildcard(&filter(json!({"type": "a:b"})))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDimensionValue { .. }));
    }

    #[test]
    fn test_matching() {
        let kind = access();
        let rule = kind.parse_wildcard("node:article,page:view").unwrap();

        let mut context = BTreeMap::new();
        context.insert("type".to_string(), Value::from("node"));
        context.insert("bundle".to_string(), Value::from("Article"));
        context.insert("operation".to_string(), Value::from("view"));
        assert!(rule.matches(&kind.event_wildcard(&context)).unwrap());

        context.insert("operation".to_string(), Value::from("edit"));
        assert!(!rule.matches(&kind.event_wildcard(&context)).unwrap());
    }

    #[test]
    fn test_missing_event_dimension_only_matches_any() {
        let kind = access();
        let event = kind.event_wildcard(&BTreeMap::new());
        assert_eq!(event.to_string(), "::");
        assert!(kind.parse_wildcard("*:*:*").unwrap().matches(&event).unwrap());
        assert!(!kind.parse_wildcard("node:*:*").unwrap().matches(&event).unwrap());
    }

    #[test]
    fn test_parse_star_in_list_means_any() {
        let kind = access();
        let parsed = kind.parse_wildcard("node:article,*:view").unwrap();
        assert_eq!(parsed.segments()[1], Segment::Any);
        let registered = kind
            .rule_wildcard(&filter(json!({"type": "node", "bundle": "article,*", "operation": "view"})))
            .unwrap();
        assert_eq!(parsed, registered);

        let mut context = BTreeMap::new();
        context.insert("type".to_string(), Value::from("node"));
        context.insert("bundle".to_string(), Value::from("page"));
        context.insert("operation".to_string(), Value::from("view"));
        assert!(parsed.matches(&kind.event_wildcard(&context)).unwrap());
    }

    #[test]
    fn test_list_valued_event_dimension() {
        let kind = access();
        let mut context = BTreeMap::new();
        context.insert("type".to_string(), Value::from("node"));
        context.insert(
            "bundle".to_string(),
            Value::List(vec![Value::from("Article"), Value::from("page")]),
        );
        context.insert("operation".to_string(), Value::from("view"));
        let event = kind.event_wildcard(&context);
        assert_eq!(event.to_string(), "node:article,page:view");

        assert!(kind.parse_wildcard("node:article:view").unwrap().matches(&event).unwrap());
        assert!(kind.parse_wildcard("node:page,blog:view").unwrap().matches(&event).unwrap());
        assert!(!kind.parse_wildcard("node:blog:view").unwrap().matches(&event).unwrap());

        context.insert("bundle".to_string(), Value::List(Vec::new()));
        let empty = kind.event_wildcard(&context);
        assert_eq!(empty.to_string(), "node::view");
        assert!(!kind.parse_wildcard("node:article:view").unwrap().matches(&empty).unwrap());
    }

    #[test]
    fn test_parse_arity_error() {
        let err = access().parse_wildcard("node:article").unwrap_err();
        assert_eq!(
            err,
            ConfigError::WildcardArity {
                kind: "entity-access".into(),
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_matches_arity_error() {
        let rule = access().parse_wildcard("*:*:*").unwrap();
        let event = EventKind::new("custom", &["event_id"]).event_wildcard(&BTreeMap::new());
        assert!(rule.matches(&event).is_err());
    }

    #[test]
    fn test_zero_dimension_kind() {
        let kind = EventKind::new("user-login", &[]);
        let rule = kind.rule_wildcard(&PluginConfig::new()).unwrap();
        assert_eq!(rule.to_string(), "*");
        assert!(rule.matches(&kind.event_wildcard(&BTreeMap::new())).unwrap());
    }

    #[test]
    fn test_unsupported_kind() {
        let registry = KindRegistry::with_builtins();
        assert!(registry.get("entity-access").is_ok());
        assert_eq!(
            registry.get("bogus").unwrap_err(),
            ConfigError::UnsupportedEventKind("bogus".into())
        );
    }
}

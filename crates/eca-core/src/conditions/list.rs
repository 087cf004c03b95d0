//! Conditions over list-like tokens.

use std::str::FromStr;

use super::{Comparison, Condition, Mode, Operator};
use crate::error::ConfigError;
use crate::plugin::PluginConfig;
use crate::scope::Scope;
use crate::value::Value;

pub const CONTAINS_PLUGIN_ID: &str = "list-contains";
pub const COUNT_PLUGIN_ID: &str = "list-count";

/// What `list-contains` looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainsMethod {
    /// A list index or map key exists.
    Index,
    /// A value occurs anywhere, nested structures included.
    Value,
}

impl FromStr for ContainsMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "index" | "key" => Ok(ContainsMethod::Index),
            "value" => Ok(ContainsMethod::Value),
            other => Err(format!("unknown method '{other}', expected 'index' or 'value'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListContains {
    pub list: String,
    pub method: ContainsMethod,
    pub value: String,
    pub trim: bool,
}

impl ListContains {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            list: config.require_non_empty(CONTAINS_PLUGIN_ID, "list")?,
            method: config.parse_or(CONTAINS_PLUGIN_ID, "method", ContainsMethod::Value)?,
            value: config.require_text(CONTAINS_PLUGIN_ID, "value")?,
            trim: config.flag(CONTAINS_PLUGIN_ID, "trim", true)?,
        })
    }
}

impl Condition for ListContains {
    fn evaluate(&self, scope: &Scope<'_>) -> bool {
        let list = scope.resolve_token(&self.list);
        let needle = scope.resolve_to_string(&self.value);
        match self.method {
            ContainsMethod::Index => has_index(&list, needle.trim()),
            ContainsMethod::Value => {
                let needle = if self.trim { needle.trim() } else { needle.as_str() };
                contains_deep(&list, needle, self.trim, scope)
            }
        }
    }
}

fn has_index(list: &Value, key: &str) -> bool {
    match list {
        Value::List(items) => key.parse::<usize>().is_ok_and(|idx| idx < items.len()),
        Value::Map(map) => map.contains_key(key),
        Value::Opaque(object) => !object.property(key).is_absent(),
        _ => false,
    }
}

fn contains_deep(haystack: &Value, needle: &str, trim: bool, scope: &Scope<'_>) -> bool {
    match haystack {
        Value::Absent => false,
        Value::List(items) => items.iter().any(|item| contains_deep(item, needle, trim, scope)),
        Value::Map(map) => map.values().any(|item| contains_deep(item, needle, trim, scope)),
        Value::Opaque(object) => object.id() == needle || object.label() == needle,
        scalar => {
            let text = scope.stringify(scalar);
            if trim {
                text.trim() == needle
            } else {
                text == needle
            }
        }
    }
}

/// Compare the number of items in a list against a threshold.
#[derive(Debug, Clone)]
pub struct ListCount {
    pub list: String,
    pub operator: Operator,
    pub value: String,
}

impl ListCount {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            list: config.require_non_empty(COUNT_PLUGIN_ID, "list")?,
            operator: config.parse_or(COUNT_PLUGIN_ID, "operator", Operator::Equals)?,
            // `right` mirrors the scalar comparison's key name.
            value: match config.text("value") {
                Some(value) => value,
                None => config.require_text(COUNT_PLUGIN_ID, "right")?,
            },
        })
    }
}

impl Condition for ListCount {
    fn evaluate(&self, scope: &Scope<'_>) -> bool {
        let count = scope.resolve_token(&self.list).count();
        let threshold = scope.resolve_to_string(&self.value);
        Comparison::new(self.operator, Mode::Numeric).test(&count.to_string(), &threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::testing::Fixture;
    use crate::events::Event;
    use serde_json::json;

    fn event() -> Event {
        Event::new("custom")
            .with("tags", Value::from(json!(["news", " featured ", {"nested": ["deep"]}])))
            .with("fields", Value::from(json!({"title": "x"})))
    }

    fn contains(list: &str, method: &str, value: &str) -> ListContains {
        ListContains::from_config(
            &PluginConfig::new()
                .with("list", list)
                .with("method", method)
                .with("value", value),
        )
        .unwrap()
    }

    #[test]
    fn test_contains_value_trimmed_and_nested() {
        let mut fixture = Fixture::new(event());
        let scope = fixture.scope();
        assert!(contains("tags", "value", "featured").evaluate(&scope));
        assert!(contains("tags", "value", "deep").evaluate(&scope));
        assert!(!contains("tags", "value", "missing").evaluate(&scope));
    }

    #[test]
    fn test_untrimmed_match_is_exact() {
        let mut fixture = Fixture::new(event());
        let scope = fixture.scope();
        let config = PluginConfig::new()
            .with("list", "tags")
            .with("value", "featured")
            .with("trim", false);
        assert!(!ListContains::from_config(&config).unwrap().evaluate(&scope));
    }

    #[test]
    fn test_contains_index() {
        let mut fixture = Fixture::new(event());
        let scope = fixture.scope();
        assert!(contains("tags", "index", "2").evaluate(&scope));
        assert!(!contains("tags", "index", "3").evaluate(&scope));
        assert!(contains("[fields]", "index", "title").evaluate(&scope));
        assert!(!contains("missing", "index", "0").evaluate(&scope));
    }

    #[test]
    fn test_count_at_least() {
        let count = ListCount::from_config(
            &PluginConfig::new()
                .with("list", "items")
                .with("operator", "at-least")
                .with("value", "3"),
        )
        .unwrap();

        let mut long = Fixture::new(Event::new("custom").with("items", Value::from(json!([1, 2, 3, 4]))));
        assert!(count.evaluate(&long.scope()));

        let mut short = Fixture::new(Event::new("custom").with("items", Value::from(json!([1, 2]))));
        assert!(!count.evaluate(&short.scope()));
    }

    #[test]
    fn test_count_of_missing_list_is_zero() {
        let count = ListCount::from_config(
            &PluginConfig::new().with("list", "nothing").with("value", 0),
        )
        .unwrap();
        let mut fixture = Fixture::new(Event::new("custom"));
        assert!(count.evaluate(&fixture.scope()));
    }

    #[test]
    fn test_bad_method() {
        let config = PluginConfig::new()
            .with("list", "tags")
            .with("method", "fuzzy")
            .with("value", "x");
        assert!(ListContains::from_config(&config).is_err());
    }
}

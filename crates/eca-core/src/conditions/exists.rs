//! Does a token produce any output?

use super::Condition;
use crate::error::ConfigError;
use crate::plugin::PluginConfig;
use crate::scope::Scope;
use crate::tokens::store::normalize_name;
use crate::value::Value;

pub const PLUGIN_ID: &str = "token-exists";

/// True when the named token would render as non-empty text.
///
/// Answers from the stored value's shape where it can and only falls back to
/// full textual resolution for property paths.
#[derive(Debug, Clone)]
pub struct TokenExists {
    pub name: String,
    pub path: Vec<String>,
}

impl TokenExists {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        let raw = config.require_non_empty(PLUGIN_ID, "token_name")?;
        let mut parts = normalize_name(&raw).split(':').map(str::trim);
        let name = parts.next().unwrap_or_default().to_string();
        if name.is_empty() {
            return Err(ConfigError::MissingKey {
                plugin: PLUGIN_ID.to_string(),
                key: "token_name".to_string(),
            });
        }
        Ok(Self {
            name,
            path: parts.map(str::to_string).collect(),
        })
    }
}

impl Condition for TokenExists {
    fn evaluate(&self, scope: &Scope<'_>) -> bool {
        let Some(root) = scope.tokens.get(&self.name) else {
            return false;
        };
        if root.is_empty() {
            return false;
        }
        if self.path.is_empty() {
            return match root {
                Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Opaque(_) => true,
                Value::List(items) => items.iter().any(|item| !item.is_empty()),
                Value::Map(_) => true,
                Value::Absent => false,
            };
        }
        let expr = format!("[{}:{}]", self.name, self.path.join(":"));
        !scope.resolve_to_string(&expr).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::testing::Fixture;
    use crate::events::Event;
    use serde_json::json;

    fn exists(name: &str) -> TokenExists {
        TokenExists::from_config(&PluginConfig::new().with("token_name", name)).unwrap()
    }

    #[test]
    fn test_missing_token_skips_resolution() {
        let mut fixture = Fixture::new(Event::new("custom"));
        let scope = fixture.scope();
        assert!(!exists("never_set").evaluate(&scope));
        assert!(!exists("[never_set:title]").evaluate(&scope));
        assert_eq!(scope.resolver().resolutions(), 0);
    }

    #[test]
    fn test_structural_answers() {
        let mut fixture = Fixture::new(
            Event::new("custom")
                .with("empty_list", Value::List(vec![]))
                .with("blank", "")
                .with("zero", 0i64)
                .with("list_of_blanks", Value::from(json!(["", ""]))),
        );
        let scope = fixture.scope();
        assert!(!exists("empty_list").evaluate(&scope));
        assert!(!exists("blank").evaluate(&scope));
        assert!(exists("zero").evaluate(&scope));
        assert!(!exists("list_of_blanks").evaluate(&scope));
        assert_eq!(scope.resolver().resolutions(), 0);
    }

    #[test]
    fn test_property_path_resolves() {
        let mut fixture = Fixture::new(
            Event::new("custom").with("node", Value::from(json!({"title": "Hi", "body": ""}))),
        );
        let scope = fixture.scope();
        assert!(exists("node:title").evaluate(&scope));
        assert!(!exists("node:body").evaluate(&scope));
        assert_eq!(scope.resolver().resolutions(), 2);
    }
}

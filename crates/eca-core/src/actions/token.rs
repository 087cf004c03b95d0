//! Actions writing the token store and the result slot.

use tracing::debug;

use super::Action;
use crate::error::{ActionError, ConfigError};
use crate::plugin::PluginConfig;
use crate::scope::Scope;
use crate::tokens::store::normalize_name;
use crate::value::Value;

pub const SET_RESULT_ID: &str = "set-result";
pub const TOKEN_SET_ID: &str = "token-set";
pub const TOKEN_UNSET_ID: &str = "token-unset";
pub const LIST_ADD_ID: &str = "list-add";
pub const LIST_REMOVE_ID: &str = "list-remove";

fn token_name(plugin: &str, config: &PluginConfig, key: &str) -> Result<String, ConfigError> {
    let raw = config.require_non_empty(plugin, key)?;
    Ok(normalize_name(&raw).to_string())
}

/// Write a resolved value into the event's result slot.
#[derive(Debug, Clone)]
pub struct SetResult {
    pub value: String,
}

impl SetResult {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            value: config.require_text(SET_RESULT_ID, "value")?,
        })
    }
}

impl Action for SetResult {
    fn execute(&self, scope: &mut Scope<'_>) -> Result<(), ActionError> {
        let value = scope.resolve(&self.value);
        debug!(rule = scope.rule_id(), result = %scope.stringify(&value), "result slot set");
        *scope.result = value;
        Ok(())
    }
}

/// Store a resolved value under a token name.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub name: String,
    pub value: String,
}

impl TokenSet {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            name: token_name(TOKEN_SET_ID, config, "token_name")?,
            value: config.require_text(TOKEN_SET_ID, "value")?,
        })
    }
}

impl Action for TokenSet {
    fn execute(&self, scope: &mut Scope<'_>) -> Result<(), ActionError> {
        let value = scope.resolve(&self.value);
        scope.tokens.insert(&self.name, value);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TokenUnset {
    pub name: String,
}

impl TokenUnset {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            name: token_name(TOKEN_UNSET_ID, config, "token_name")?,
        })
    }
}

impl Action for TokenUnset {
    fn execute(&self, scope: &mut Scope<'_>) -> Result<(), ActionError> {
        scope.tokens.remove(&self.name);
        Ok(())
    }
}

/// Append to a list token, creating it when missing.
#[derive(Debug, Clone)]
pub struct ListAdd {
    pub list: String,
    pub value: String,
}

impl ListAdd {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            list: token_name(LIST_ADD_ID, config, "list")?,
            value: config.require_text(LIST_ADD_ID, "value")?,
        })
    }
}

impl Action for ListAdd {
    fn execute(&self, scope: &mut Scope<'_>) -> Result<(), ActionError> {
        let item = scope.resolve(&self.value);
        let list = match scope.tokens.remove(&self.list) {
            None | Some(Value::Absent) => vec![item],
            Some(Value::List(mut items)) => {
                items.push(item);
                items
            }
            Some(single) => vec![single, item],
        };
        scope.tokens.insert(&self.list, Value::List(list));
        Ok(())
    }
}

/// Remove every item whose text equals the resolved value.
#[derive(Debug, Clone)]
pub struct ListRemove {
    pub list: String,
    pub value: String,
}

impl ListRemove {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            list: token_name(LIST_REMOVE_ID, config, "list")?,
            value: config.require_text(LIST_REMOVE_ID, "value")?,
        })
    }
}

impl Action for ListRemove {
    fn execute(&self, scope: &mut Scope<'_>) -> Result<(), ActionError> {
        let needle = scope.resolve_to_string(&self.value);
        let Some(Value::List(items)) = scope.tokens.get(&self.list) else {
            return Ok(());
        };
        let kept: Vec<Value> = items
            .iter()
            .filter(|item| scope.stringify(item).trim() != needle.trim())
            .cloned()
            .collect();
        scope.tokens.insert(&self.list, Value::List(kept));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::testing::Fixture;
    use crate::events::Event;
    use serde_json::json;

    #[test]
    fn test_set_result() {
        let mut fixture = Fixture::new(Event::new("custom").with("verdict", "allow"));
        let action = SetResult::from_config(&PluginConfig::new().with("value", "[verdict]")).unwrap();
        action.execute(&mut fixture.scope()).unwrap();
        assert_eq!(fixture.result, Value::from("allow"));
    }

    #[test]
    fn test_token_set_keeps_type() {
        let mut fixture = Fixture::new(Event::new("custom").with("ids", Value::from(json!([1, 2]))));
        let mut scope = fixture.scope();
        TokenSet::from_config(&PluginConfig::new().with("token_name", "[copy]").with("value", "[ids]"))
            .unwrap()
            .execute(&mut scope)
            .unwrap();
        assert_eq!(scope.tokens.get("copy").map(Value::count), Some(2));
    }

    #[test]
    fn test_list_add_and_remove() {
        let mut fixture = Fixture::new(Event::new("custom"));
        let mut scope = fixture.scope();
        let add = |value: &str| {
            ListAdd::from_config(&PluginConfig::new().with("list", "seen").with("value", value)).unwrap()
        };
        add("a").execute(&mut scope).unwrap();
        add("b").execute(&mut scope).unwrap();
        add("a").execute(&mut scope).unwrap();
        assert_eq!(scope.tokens.get("seen").map(Value::count), Some(3));

        ListRemove::from_config(&PluginConfig::new().with("list", "seen").with("value", "a"))
            .unwrap()
            .execute(&mut scope)
            .unwrap();
        assert_eq!(scope.tokens.get("seen"), Some(&Value::from(json!(["b"]))));
    }

    #[test]
    fn test_token_unset() {
        let mut fixture = Fixture::new(Event::new("custom").with("x", "1"));
        let mut scope = fixture.scope();
        TokenUnset::from_config(&PluginConfig::new().with("token_name", "x"))
            .unwrap()
            .execute(&mut scope)
            .unwrap();
        assert!(!scope.tokens.contains("x"));
    }
}

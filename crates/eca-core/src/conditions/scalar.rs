//! Compare two resolved values.

use regex::Regex;

use super::{Comparison, Condition, Mode, Operator};
use crate::error::ConfigError;
use crate::plugin::PluginConfig;
use crate::scope::Scope;
use crate::tokens::placeholders;

pub const PLUGIN_ID: &str = "scalar";

/// `left <operator> right`, as strings or as numbers.
///
/// An unset left-hand side is never a match.
///
/// A `regex-match` pattern without placeholders is compiled once, when the
/// rule is registered; an invalid one rejects the rule.
#[derive(Debug, Clone)]
pub struct ScalarComparison {
    pub left: String,
    pub right: String,
    pub comparison: Comparison,
    pattern: Option<Regex>,
}

impl ScalarComparison {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        let operator = config.parse_or(PLUGIN_ID, "operator", Operator::Equals)?;
        let mode = config.parse_or(PLUGIN_ID, "type", Mode::String)?;
        let case_sensitive = config.flag(PLUGIN_ID, "case_sensitive", true)?;
        let comparison = Comparison {
            operator,
            mode,
            case_sensitive,
        };
        let right = config.text("right").unwrap_or_default();

        let pattern = if operator == Operator::RegexMatch && placeholders(&right).is_empty() {
            let compiled = comparison
                .regex(&right)
                .map_err(|e| ConfigError::InvalidValue {
                    plugin: PLUGIN_ID.to_string(),
                    key: "right".to_string(),
                    message: e.to_string(),
                })?;
            Some(compiled)
        } else {
            None
        };

        Ok(Self {
            left: config.require_text(PLUGIN_ID, "left")?,
            right,
            comparison,
            pattern,
        })
    }
}

impl Condition for ScalarComparison {
    fn evaluate(&self, scope: &Scope<'_>) -> bool {
        let left = scope.resolve(&self.left);
        if left.is_absent() {
            return false;
        }
        let left = scope.stringify(&left);
        match &self.pattern {
            Some(pattern) => pattern.is_match(left.trim()),
            None => {
                let right = scope.resolve_to_string(&self.right);
                self.comparison.test(&left, &right)
            }
        }
    }
}

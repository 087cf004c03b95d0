//! Condition plugins.
//!
//! A condition is a pure predicate over a [`Scope`]. Negation is not the
//! plugin's business: the rule graph applies the node's `negate` flag after
//! the plugin answers, the same way for every plugin.

pub mod account;
pub mod exists;
pub mod list;
pub mod scalar;

use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::plugin::PluginRegistry;
use crate::scope::Scope;

pub use account::{AccountIs, AccountPermission, AccountRole};
pub use exists::TokenExists;
pub use list::{ListContains, ListCount};
pub use scalar::ScalarComparison;

/// A condition plugin instance, built from its node configuration.
pub trait Condition: Send + Sync {
    /// Evaluate against the current scope. Must not have side effects.
    fn evaluate(&self, scope: &Scope<'_>) -> bool;
}

/// Register every built-in condition.
pub fn register_builtins(registry: &mut PluginRegistry) {
    registry.register_condition(scalar::PLUGIN_ID, |config| {
        Ok(Box::new(ScalarComparison::from_config(config)?))
    });
    registry.register_condition(list::CONTAINS_PLUGIN_ID, |config| {
        Ok(Box::new(ListContains::from_config(config)?))
    });
    registry.register_condition(list::COUNT_PLUGIN_ID, |config| {
        Ok(Box::new(ListCount::from_config(config)?))
    });
    registry.register_condition(exists::PLUGIN_ID, |config| {
        Ok(Box::new(TokenExists::from_config(config)?))
    });
    registry.register_condition(account::ROLE_PLUGIN_ID, |config| {
        Ok(Box::new(AccountRole::from_config(config)?))
    });
    registry.register_condition(account::PERMISSION_PLUGIN_ID, |config| {
        Ok(Box::new(AccountPermission::from_config(config)?))
    });
    registry.register_condition(account::IS_PLUGIN_ID, |config| {
        Ok(Box::new(AccountIs::from_config(config)?))
    });
}

/// Comparison operators shared by scalar and list-count conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    AtLeast,
    AtMost,
    RegexMatch,
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "equals" | "equal" | "eq" | "==" => Ok(Operator::Equals),
            "contains" => Ok(Operator::Contains),
            "starts-with" | "beginswith" => Ok(Operator::StartsWith),
            "ends-with" | "endswith" => Ok(Operator::EndsWith),
            "greater-than" | "greater" | "gt" | ">" => Ok(Operator::GreaterThan),
            "less-than" | "less" | "lt" | "<" => Ok(Operator::LessThan),
            "at-least" | "atleast" | "gte" | ">=" => Ok(Operator::AtLeast),
            "at-most" | "atmost" | "lte" | "<=" => Ok(Operator::AtMost),
            "regex-match" | "regex" => Ok(Operator::RegexMatch),
            other => Err(format!("unknown operator '{other}'")),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operator::Equals => "equals",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts-with",
            Operator::EndsWith => "ends-with",
            Operator::GreaterThan => "greater-than",
            Operator::LessThan => "less-than",
            Operator::AtLeast => "at-least",
            Operator::AtMost => "at-most",
            Operator::RegexMatch => "regex-match",
        };
        f.write_str(name)
    }
}

/// How operands are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    String,
    Numeric,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" | "value" => Ok(Mode::String),
            "numeric" | "number" => Ok(Mode::Numeric),
            other => Err(format!("unknown comparison type '{other}'")),
        }
    }
}

/// Operator plus mode, applied to two already-resolved operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub operator: Operator,
    pub mode: Mode,
    pub case_sensitive: bool,
}

impl Comparison {
    pub fn new(operator: Operator, mode: Mode) -> Self {
        Self {
            operator,
            mode,
            case_sensitive: true,
        }
    }

    /// Compare trimmed operands. Numeric mode falls back to `false` when
    /// either side is not a number.
    pub fn test(&self, left: &str, right: &str) -> bool {
        let (left, right) = (left.trim(), right.trim());
        match self.mode {
            Mode::Numeric => match self.operator {
                Operator::Contains
                | Operator::StartsWith
                | Operator::EndsWith
                | Operator::RegexMatch => self.test_text(left, right),
                _ => match (left.parse::<f64>(), right.parse::<f64>()) {
                    (Ok(l), Ok(r)) => self.test_numbers(l, r),
                    _ => false,
                },
            },
            Mode::String => self.test_text(left, right),
        }
    }

    fn test_numbers(&self, left: f64, right: f64) -> bool {
        match self.operator {
            Operator::Equals => left == right,
            Operator::GreaterThan => left > right,
            Operator::LessThan => left < right,
            Operator::AtLeast => left >= right,
            Operator::AtMost => left <= right,
            _ => false,
        }
    }

    /// Compile `pattern` the way the regex operator reads it.
    pub fn regex(&self, pattern: &str) -> Result<Regex, regex::Error> {
        RegexBuilder::new(pattern.trim())
            .case_insensitive(!self.case_sensitive)
            .build()
    }

    fn test_text(&self, left: &str, right: &str) -> bool {
        if self.operator == Operator::RegexMatch {
            return self
                .regex(right)
                .map(|re| re.is_match(left))
                .unwrap_or(false);
        }

        let (left, right) = if self.case_sensitive {
            (left.to_string(), right.to_string())
        } else {
            (left.to_lowercase(), right.to_lowercase())
        };
        match self.operator {
            Operator::Equals => left == right,
            Operator::Contains => left.contains(&right),
            Operator::StartsWith => left.starts_with(&right),
            Operator::EndsWith => left.ends_with(&right),
            Operator::GreaterThan => left > right,
            Operator::LessThan => left < right,
            Operator::AtLeast => left >= right,
            Operator::AtMost => left <= right,
            Operator::RegexMatch => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scope fixture shared by the condition tests.

    use crate::account::AccountDirectory;
    use crate::context::ContextStack;
    use crate::events::Event;
    use crate::scope::Scope;
    use crate::tokens::Resolver;
    use crate::value::Value;

    pub struct Fixture {
        pub event: Event,
        pub contexts: ContextStack,
        pub result: Value,
        pub resolver: Resolver,
        pub accounts: AccountDirectory,
    }

    impl Fixture {
        pub fn new(event: Event) -> Self {
            let contexts = ContextStack::new(event.account());
            Self {
                event,
                contexts,
                result: Value::Absent,
                resolver: Resolver::new(),
                accounts: AccountDirectory::new(),
            }
        }

        pub fn scope(&mut self) -> Scope<'_> {
            Scope::new(
                "test-rule",
                &self.event,
                &mut self.contexts,
                &mut self.result,
                &self.resolver,
                &self.accounts,
            )
        }
    }
}

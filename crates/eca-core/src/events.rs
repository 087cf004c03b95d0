use std::collections::BTreeMap;

use crate::value::Value;

/// Context entry naming the acting identity of an event.
pub const ACCOUNT_KEY: &str = "account";

/// An application-emitted event.
///
/// The host builds one immediately before dispatch: a stable `kind`, a context
/// of named dimensions, and the caller's default for the result slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: String,
    context: BTreeMap<String, Value>,
    result: Value,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            context: BTreeMap::new(),
            result: Value::Absent,
        }
    }

    /// Build an event from a host-supplied context map.
    pub fn from_context(kind: impl Into<String>, context: BTreeMap<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            context,
            result: Value::Absent,
        }
    }

    /// Add a context dimension.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(name.into(), value.into());
        self
    }

    /// Set the default value of the result slot.
    pub fn with_result(mut self, result: impl Into<Value>) -> Self {
        self.result = result.into();
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn context(&self) -> &BTreeMap<String, Value> {
        &self.context
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.context.get(name)
    }

    pub fn default_result(&self) -> &Value {
        &self.result
    }

    /// Id of the acting identity, if the event names one.
    pub fn account(&self) -> Option<String> {
        match self.context.get(ACCOUNT_KEY)? {
            Value::Absent => None,
            Value::Opaque(object) => Some(object.id()),
            other => Some(other.to_text(",")).filter(|id| !id.is_empty()),
        }
    }
}

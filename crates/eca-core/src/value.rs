//! Typed values stored in the token store.
//!
//! [`Value`] is a closed sum type. Host objects (accounts, entities, ...) are
//! carried as [`HostRef`] so the engine never needs to know their concrete type.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An object owned by the host application, exposed to tokens and conditions.
pub trait HostObject: fmt::Debug + Send + Sync {
    /// Type of the object, e.g. "user" or "node".
    fn kind(&self) -> &str;

    /// Stable identifier within its kind.
    fn id(&self) -> String;

    /// Human-readable form used when the object is rendered as text.
    fn label(&self) -> String {
        self.id()
    }

    /// Read a named property; unknown properties are [`Value::Absent`].
    fn property(&self, _name: &str) -> Value {
        Value::Absent
    }
}

/// Shared handle to a host object. Equality is by kind and id.
#[derive(Clone)]
pub struct HostRef(Arc<dyn HostObject>);

impl HostRef {
    pub fn new(object: impl HostObject + 'static) -> Self {
        Self(Arc::new(object))
    }

    pub fn kind(&self) -> &str {
        self.0.kind()
    }

    pub fn id(&self) -> String {
        self.0.id()
    }

    pub fn label(&self) -> String {
        self.0.label()
    }

    pub fn property(&self, name: &str) -> Value {
        self.0.property(name)
    }
}

impl fmt::Debug for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostRef({}:{})", self.kind(), self.id())
    }
}

impl PartialEq for HostRef {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.id() == other.id()
    }
}

/// A value held by the token store or produced by token resolution.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Opaque(HostRef),
    /// Marker for a token that is not set. Equal only to itself.
    #[default]
    Absent,
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Structural emptiness: absent, empty string, empty list or empty map.
    ///
    /// Numbers, bools and host objects are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Absent => true,
            Value::String(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            Value::Number(_) | Value::Bool(_) | Value::Opaque(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view: numbers as-is, strings parsed after trimming.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Number of items for collections; scalars count as one, absent as zero.
    pub fn count(&self) -> usize {
        match self {
            Value::Absent => 0,
            Value::List(items) => items.len(),
            Value::Map(map) => map.len(),
            _ => 1,
        }
    }

    /// Read a child by key (maps), index (lists) or property (host objects).
    pub fn child(&self, key: &str) -> Value {
        match self {
            Value::Map(map) => map.get(key).cloned().unwrap_or_default(),
            Value::List(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx).cloned())
                .unwrap_or_default(),
            Value::Opaque(object) => object.property(key),
            _ => Value::Absent,
        }
    }

    /// Render as text; lists are joined with `separator`.
    pub fn to_text(&self, separator: &str) -> String {
        match self {
            Value::Absent => String::new(),
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
            Value::List(items) => items
                .iter()
                .map(|item| item.to_text(separator))
                .collect::<Vec<_>>()
                .join(separator),
            Value::Map(_) => self.to_json().to_string(),
            Value::Opaque(object) => object.label(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Absent => serde_json::Value::Null,
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Number(n) => number_to_json(*n),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Opaque(object) => serde_json::Value::String(object.label()),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Absent,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or_default(),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<HostRef> for Value {
    fn from(object: HostRef) -> Self {
        Value::Opaque(object)
    }
}

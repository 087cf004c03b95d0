//! Per-dispatch token storage.

use std::collections::BTreeMap;

use crate::events::Event;
use crate::value::Value;

/// Name of the token holding the whole event context as a map.
pub const EVENT_TOKEN: &str = "event";

/// Mutable mapping from token name to value, scoped to one rule run.
///
/// Not shared between dispatches; every rule run starts from a fresh store
/// seeded from the event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStore {
    tokens: BTreeMap<String, Value>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from an event: every context entry becomes a token, and
    /// the `event` token holds the context plus the event kind.
    pub fn seeded(event: &Event) -> Self {
        let mut store = Self::new();
        let mut summary = BTreeMap::new();
        summary.insert("kind".to_string(), Value::from(event.kind()));
        for (name, value) in event.context() {
            store.insert(name, value.clone());
            summary.insert(name.clone(), value.clone());
        }
        store.insert(EVENT_TOKEN, Value::Map(summary));
        store
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.tokens.get(normalize_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tokens.contains_key(normalize_name(name))
    }

    /// Store a value. Writing [`Value::Absent`] removes the token.
    pub fn insert(&mut self, name: impl AsRef<str>, value: Value) {
        let name = normalize_name(name.as_ref()).to_string();
        if value.is_absent() {
            self.tokens.remove(&name);
        } else {
            self.tokens.insert(name, value);
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.tokens.remove(normalize_name(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Accept both `name` and `[name]` spellings.
pub(crate) fn normalize_name(name: &str) -> &str {
    let trimmed = name.trim();
    trimmed
        .strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .map(str::trim)
        .unwrap_or(trimmed)
}

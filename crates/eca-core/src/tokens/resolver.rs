//! Placeholder resolution against a [`TokenStore`].
//!
//! An expression is plain text with zero or more `[name]` / `[name:property]`
//! placeholders. An expression that is exactly one placeholder resolves to the
//! typed value; anything else is resolved by textual substitution.

use std::cell::Cell;
use std::ops::Range;

use super::store::TokenStore;
use crate::value::Value;

/// Default separator for rendering lists as text.
pub const DEFAULT_LIST_SEPARATOR: &str = ", ";

/// A placeholder found in an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder<'a> {
    pub name: &'a str,
    pub path: Vec<&'a str>,
    pub span: Range<usize>,
}

/// Find all well-formed placeholders in `expr`, left to right.
///
/// Bracketed text that is not a valid placeholder (`[ x ]`, `[]`, `[a::b]`)
/// stays literal.
pub fn placeholders(expr: &str) -> Vec<Placeholder<'_>> {
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(open) = expr[cursor..].find('[').map(|i| cursor + i) {
        let Some(close) = expr[open + 1..].find(']').map(|i| open + 1 + i) else {
            break;
        };
        let inner = &expr[open + 1..close];
        // A nested '[' restarts the scan at the inner bracket.
        if let Some(nested) = inner.rfind('[') {
            cursor = open + 1 + nested;
            continue;
        }
        let mut parts = inner.split(':');
        let valid = !inner.is_empty() && inner.split(':').all(is_token_part);
        if valid {
            if let Some(name) = parts.next() {
                found.push(Placeholder {
                    name,
                    path: parts.collect(),
                    span: open..close + 1,
                });
            }
        }
        cursor = close + 1;
    }

    found
}

fn is_token_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Resolves expressions against a token store.
///
/// Keeps a count of resolutions so callers can observe how much work a
/// condition did. Not thread-safe; one resolver per dispatch.
#[derive(Debug)]
pub struct Resolver {
    separator: String,
    resolutions: Cell<u64>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::with_separator(DEFAULT_LIST_SEPARATOR)
    }

    pub fn with_separator(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            resolutions: Cell::new(0),
        }
    }

    /// Number of `resolve`/`resolve_to_string` calls so far.
    pub fn resolutions(&self) -> u64 {
        self.resolutions.get()
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Structural resolution. A lone placeholder yields its typed value
    /// (or [`Value::Absent`]); other expressions yield a string.
    pub fn resolve(&self, expr: &str, tokens: &TokenStore) -> Value {
        self.bump();
        let trimmed = expr.trim();
        let found = placeholders(trimmed);

        match found.as_slice() {
            [] => Value::String(expr.to_string()),
            [single] if single.span == (0..trimmed.len()) => lookup(single, tokens),
            _ => Value::String(self.substitute(expr, tokens)),
        }
    }

    /// Textual resolution. Missing tokens render as the empty string.
    pub fn resolve_to_string(&self, expr: &str, tokens: &TokenStore) -> String {
        self.bump();
        self.substitute(expr, tokens)
    }

    /// Render a value the way textual substitution would.
    pub fn stringify(&self, value: &Value) -> String {
        value.to_text(&self.separator)
    }

    fn substitute(&self, expr: &str, tokens: &TokenStore) -> String {
        let mut out = String::with_capacity(expr.len());
        let mut last = 0;
        for placeholder in placeholders(expr) {
            out.push_str(&expr[last..placeholder.span.start]);
            out.push_str(&self.stringify(&lookup(&placeholder, tokens)));
            last = placeholder.span.end;
        }
        out.push_str(&expr[last..]);
        out
    }

    fn bump(&self) {
        self.resolutions.set(self.resolutions.get() + 1);
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup(placeholder: &Placeholder<'_>, tokens: &TokenStore) -> Value {
    let root = tokens.get(placeholder.name).cloned().unwrap_or_default();
    placeholder
        .path
        .iter()
        .fold(root, |value, key| value.child(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> TokenStore {
        let mut tokens = TokenStore::new();
        tokens.insert("name", Value::from("Ada"));
        tokens.insert("items", Value::from(json!([1, 2, 3])));
        tokens.insert("node", Value::from(json!({"title": "Hello", "tags": ["a", "b"]})));
        tokens
    }

    #[test]
    fn test_finds_placeholders() {
        let found = placeholders("Hi [name], see [node:tags:0] [ bad ] []");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "name");
        assert_eq!(found[1].path, vec!["tags", "0"]);
    }

    #[test]
    fn test_nested_bracket_restarts_scan() {
        let found = placeholders("[[name]]");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].span, 1..7);
    }

    #[test]
    fn test_single_placeholder_keeps_type() {
        let resolver = Resolver::new();
        let value = resolver.resolve("[items]", &store());
        assert_eq!(value, Value::from(json!([1, 2, 3])));
        let value = resolver.resolve(" [node:tags] ", &store());
        assert_eq!(value.count(), 2);
    }

    #[test]
    fn test_mixed_text_is_stringified() {
        let resolver = Resolver::new();
        let value = resolver.resolve("[name] has [items]", &store());
        assert_eq!(value, Value::from("Ada has 1, 2, 3"));
    }

    #[test]
    fn test_missing_tokens() {
        let resolver = Resolver::new();
        assert_eq!(resolver.resolve("[nope]", &store()), Value::Absent);
        assert_eq!(resolver.resolve_to_string("<[nope]>", &store()), "<>");
        assert_eq!(resolver.resolve("[node:missing]", &store()), Value::Absent);
    }

    #[test]
    fn test_plain_text_passthrough() {
        let resolver = Resolver::new();
        assert_eq!(resolver.resolve("allow", &store()), Value::from("allow"));
    }

    #[test]
    fn test_counts_resolutions() {
        let resolver = Resolver::with_separator("|");
        resolver.resolve("[name]", &store());
        assert_eq!(resolver.resolve_to_string("[items]", &store()), "1|2|3");
        assert_eq!(resolver.resolutions(), 2);
    }
}

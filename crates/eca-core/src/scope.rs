//! Everything a condition or action can see while one rule runs.

use crate::account::{Account, AccountProvider};
use crate::context::ContextStack;
use crate::events::Event;
use crate::tokens::{store::normalize_name, Resolver, TokenStore};
use crate::value::Value;

/// Reference to the acting identity itself.
pub const CURRENT_ACCOUNT: &str = "current";

/// State of one rule run inside a dispatch.
///
/// The token store is owned and fresh per rule; the context stack and the
/// result slot belong to the dispatch and are borrowed. Conditions receive
/// `&Scope` and cannot mutate anything; actions receive `&mut Scope`.
pub struct Scope<'a> {
    rule_id: &'a str,
    node_id: String,
    event: &'a Event,
    /// Per-rule data bag.
    pub tokens: TokenStore,
    /// Dispatch-wide context switch stack.
    pub contexts: &'a mut ContextStack,
    /// Dispatch-wide result slot.
    pub result: &'a mut Value,
    resolver: &'a Resolver,
    accounts: &'a dyn AccountProvider,
}

impl<'a> Scope<'a> {
    pub fn new(
        rule_id: &'a str,
        event: &'a Event,
        contexts: &'a mut ContextStack,
        result: &'a mut Value,
        resolver: &'a Resolver,
        accounts: &'a dyn AccountProvider,
    ) -> Self {
        Self {
            rule_id,
            node_id: String::new(),
            event,
            tokens: TokenStore::seeded(event),
            contexts,
            result,
            resolver,
            accounts,
        }
    }

    /// Id of the rule being walked; also the switching entity for context pushes.
    pub fn rule_id(&self) -> &str {
        self.rule_id
    }

    /// Id of the action node currently executing.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub(crate) fn enter_node(&mut self, node_id: &str) {
        self.node_id.clear();
        self.node_id.push_str(node_id);
    }

    pub fn event(&self) -> &Event {
        self.event
    }

    pub fn resolver(&self) -> &Resolver {
        self.resolver
    }

    /// Structural resolution against this rule's tokens.
    pub fn resolve(&self, expr: &str) -> Value {
        self.resolver.resolve(expr, &self.tokens)
    }

    pub fn resolve_to_string(&self, expr: &str) -> String {
        self.resolver.resolve_to_string(expr, &self.tokens)
    }

    /// Resolve a token given by name (`name`, `[name]` or `name:prop`).
    pub fn resolve_token(&self, name: &str) -> Value {
        self.resolve(&format!("[{}]", normalize_name(name)))
    }

    pub fn stringify(&self, value: &Value) -> String {
        self.resolver.stringify(value)
    }

    /// Id of the acting identity after any context switches.
    pub fn actor(&self) -> Option<&str> {
        self.contexts.active()
    }

    /// Resolve an account reference: `current` (or blank), a placeholder
    /// expression yielding an id or account object, or a literal id.
    pub fn account(&self, reference: &str) -> Option<Account> {
        let id = self.account_id(reference)?;
        self.accounts.load(&id)
    }

    /// Id an account reference points at, without loading the account.
    pub fn account_id(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if reference.is_empty() || reference == CURRENT_ACCOUNT {
            return self.actor().map(str::to_string);
        }
        if !reference.contains('[') {
            return Some(reference.to_string());
        }
        match self.resolve(reference) {
            Value::Opaque(object) if object.kind() == "user" => Some(object.id()),
            Value::Absent | Value::Opaque(_) | Value::List(_) | Value::Map(_) => None,
            other => Some(self.stringify(&other).trim().to_string()).filter(|id| !id.is_empty()),
        }
    }
}

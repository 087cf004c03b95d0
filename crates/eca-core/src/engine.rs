//! Event router.
//!
//! The [`Engine`] owns the registered rules together with the event kind and
//! plugin registries used to compile them. [`Engine::dispatch`] matches an
//! event against every enabled rule of its kind and walks the matching rule
//! graphs one after the other.
//!
//! Registered rules are read-only during dispatch. Everything a dispatch
//! mutates (result slot, context stack, token stores, log) is created inside
//! it, so an `Engine` can serve concurrent dispatches behind an `Arc`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, debug_span, error, info, info_span, warn};
use uuid::Uuid;

use crate::account::{AccountDirectory, AccountProvider};
use crate::config::EngineConfig;
use crate::context::ContextStack;
use crate::error::{ConfigError, EcaError, Result};
use crate::events::Event;
use crate::executor::{Completion, GraphExecutor};
use crate::log::ExecutionLog;
use crate::model::{Rule, RuleDocument};
use crate::plugin::PluginRegistry;
use crate::scope::Scope;
use crate::tokens::Resolver;
use crate::value::Value;
use crate::wildcard::KindRegistry;

/// What a dispatch produced.
#[derive(Debug)]
pub struct Outcome {
    /// Final value of the result slot
    pub result: Value,
    /// Errors of rules that did not handle their own
    pub errors: Vec<EcaError>,
    /// Per-action execution records
    pub log: ExecutionLog,
}

impl Outcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

struct Registered {
    seq: u64,
    rule: Rule,
}

/// The rule engine.
pub struct Engine {
    config: EngineConfig,
    kinds: KindRegistry,
    plugins: PluginRegistry,
    accounts: Arc<dyn AccountProvider>,
    /// Sorted by weight, then registration order.
    rules: Vec<Registered>,
    /// Event kind → positions in `rules`.
    by_kind: BTreeMap<String, Vec<usize>>,
    next_seq: u64,
}

impl Engine {
    /// An engine with the built-in event kinds and plugins and no accounts.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            kinds: KindRegistry::with_builtins(),
            plugins: PluginRegistry::with_builtins(),
            accounts: Arc::new(AccountDirectory::new()),
            rules: Vec::new(),
            by_kind: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Use `accounts` to look up identities for account conditions.
    pub fn with_accounts(mut self, accounts: Arc<dyn AccountProvider>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    /// Register additional event kinds. Affects rules registered afterwards.
    pub fn kinds_mut(&mut self) -> &mut KindRegistry {
        &mut self.kinds
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Register additional plugins. Affects rules registered afterwards.
    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    /// Check a document without registering it.
    pub fn validate(&self, document: &RuleDocument) -> Result<()> {
        self.compile(document.clone()).map(|_| ())
    }

    /// Compile and add one rule.
    pub fn register(&mut self, document: RuleDocument) -> Result<()> {
        if self.get(&document.id).is_some() {
            return Err(EcaError::config(
                document.id.clone(),
                ConfigError::DuplicateRule(document.id),
            ));
        }
        let rule = self.compile(document)?;
        info!(rule = %rule.id, kind = rule.kind(), wildcard = %rule.wildcard(), "rule registered");
        let seq = self.next_seq;
        self.next_seq += 1;
        self.rules.push(Registered { seq, rule });
        self.reindex();
        Ok(())
    }

    /// Replace the whole rule set. Nothing changes unless every document is valid.
    pub fn import(&mut self, documents: Vec<RuleDocument>) -> Result<usize> {
        let mut seen = BTreeSet::new();
        let mut compiled = Vec::with_capacity(documents.len());
        for document in documents {
            if !seen.insert(document.id.clone()) {
                return Err(EcaError::config(
                    document.id.clone(),
                    ConfigError::DuplicateRule(document.id),
                ));
            }
            compiled.push(self.compile(document)?);
        }

        let count = compiled.len();
        self.rules = compiled
            .into_iter()
            .enumerate()
            .map(|(seq, rule)| Registered {
                seq: seq as u64,
                rule,
            })
            .collect();
        self.next_seq = count as u64;
        self.reindex();
        info!(count, "rule set imported");
        Ok(count)
    }

    /// Unregister a rule, returning its document.
    pub fn remove(&mut self, id: &str) -> Result<RuleDocument> {
        let position = self
            .rules
            .iter()
            .position(|r| r.rule.id == id)
            .ok_or_else(|| EcaError::NotFound(id.to_string()))?;
        let removed = self.rules.remove(position);
        self.reindex();
        Ok(removed.rule.document().clone())
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        let entry = self
            .rules
            .iter_mut()
            .find(|r| r.rule.id == id)
            .ok_or_else(|| EcaError::NotFound(id.to_string()))?;
        entry.rule.enabled = enabled;
        Ok(())
    }

    /// Rules in execution order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|r| &r.rule)
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Dispatch an event built from a kind and a context map.
    pub fn dispatch_event(
        &self,
        kind: impl Into<String>,
        context: BTreeMap<String, Value>,
    ) -> Result<Outcome> {
        self.dispatch(Event::from_context(kind, context))
    }

    /// Run every enabled rule matching `event`.
    ///
    /// Returns the final result slot with the errors of rules that did not
    /// handle their own. Fails only when the event kind is unknown or an
    /// engine invariant is violated.
    pub fn dispatch(&self, event: Event) -> Result<Outcome> {
        let dispatch_id = Uuid::new_v4();
        let span = info_span!("dispatch", id = %dispatch_id, kind = event.kind());
        let _enter = span.enter();

        let kind = self.kinds.get(event.kind()).map_err(EcaError::Dispatch)?;
        let event_wildcard = kind.event_wildcard(event.context());
        debug!(wildcard = %event_wildcard, "event encoded");

        let resolver = Resolver::with_separator(self.config.list_separator.clone());
        let mut contexts = ContextStack::new(event.account());
        let mut result = if event.default_result().is_absent() {
            self.config.default_result()
        } else {
            event.default_result().clone()
        };
        let mut errors = Vec::new();
        let mut log = ExecutionLog::new();

        let candidates = self.by_kind.get(&kind.id).map(Vec::as_slice).unwrap_or_default();
        for &position in candidates {
            let rule = &self.rules[position].rule;
            if !rule.enabled {
                continue;
            }
            match rule.wildcard().matches(&event_wildcard) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(rule = %rule.id, wildcard = %rule.wildcard(), "rule does not match");
                    continue;
                }
                Err(e) => {
                    error!(rule = %rule.id, error = %e, "rule wildcard is inconsistent with its kind");
                    errors.push(EcaError::config(rule.id.clone(), e));
                    continue;
                }
            }

            let rule_span = debug_span!("rule", id = %rule.id);
            let _rule_enter = rule_span.enter();

            let completion = {
                let mut scope = Scope::new(
                    &rule.id,
                    &event,
                    &mut contexts,
                    &mut result,
                    &resolver,
                    self.accounts.as_ref(),
                );
                GraphExecutor::new(rule, &mut log).run(&mut scope)?
            };

            let leftover = contexts.unwind_all(&rule.id);
            if leftover > 0 {
                warn!(rule = %rule.id, leftover, "context switches left after walk, unwound");
            }

            match completion {
                Completion::Finished => debug!(rule = %rule.id, "rule finished"),
                Completion::Stopped { node } => {
                    debug!(rule = %rule.id, node = %node, "rule stopped");
                }
                Completion::Failed {
                    node,
                    error,
                    handled: true,
                } => {
                    warn!(rule = %rule.id, node = %node, error = %error, "action failed, handled by rule");
                }
                Completion::Failed {
                    node,
                    error,
                    handled: false,
                } => {
                    error!(rule = %rule.id, node = %node, error = %error, "action failed");
                    errors.push(EcaError::Action {
                        rule: rule.id.clone(),
                        node,
                        source: error,
                    });
                }
            }
        }

        debug!(
            result = %resolver.stringify(&result),
            errors = errors.len(),
            resolutions = resolver.resolutions(),
            "dispatch complete"
        );
        Ok(Outcome {
            result,
            errors,
            log,
        })
    }

    fn compile(&self, document: RuleDocument) -> Result<Rule> {
        let id = document.id.clone();
        let mut rule = Rule::compile(document, &self.kinds, &self.plugins)
            .map_err(|e| EcaError::config(id, e))?;
        if self.config.is_disabled(&rule.id) {
            debug!(rule = %rule.id, "disabled by configuration");
            rule.enabled = false;
        }
        Ok(rule)
    }

    fn reindex(&mut self) {
        self.rules
            .sort_by(|a, b| (a.rule.weight, a.seq).cmp(&(b.rule.weight, b.seq)));
        self.by_kind.clear();
        for (position, entry) in self.rules.iter().enumerate() {
            self.by_kind
                .entry(entry.rule.kind().to_string())
                .or_default()
                .push(position);
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::actions::Action;
    use crate::error::{ActionError, FatalError};
    use crate::events::ACCOUNT_KEY;
    use crate::model::NodeDocument;
    use crate::plugin::PluginConfig;
    use crate::wildcard::EventKind;

    /// Pops a context switch it never pushed.
    struct StrayPop;

    impl Action for StrayPop {
        fn execute(&self, _scope: &mut Scope<'_>) -> std::result::Result<(), ActionError> {
            Ok(())
        }

        fn cleanup(&self, scope: &mut Scope<'_>) -> std::result::Result<(), FatalError> {
            let rule = scope.rule_id().to_string();
            scope.contexts.pop(&rule).map(|_| ())
        }
    }

    struct Counter(Arc<AtomicUsize>);

    impl Action for Counter {
        fn execute(&self, _scope: &mut Scope<'_>) -> std::result::Result<(), ActionError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn set_result(value: &str) -> NodeDocument {
        NodeDocument::new("set-result").with_config(PluginConfig::new().with("value", value))
    }

    fn login_rule(id: &str, value: &str) -> RuleDocument {
        RuleDocument::new(id)
            .with_event("e", NodeDocument::new("user-login").then("a"))
            .with_action("a", set_result(value))
    }

    #[test]
    fn test_unknown_kind_rejected_at_dispatch() {
        let engine = Engine::default();
        let err = engine.dispatch(Event::new("bogus")).unwrap_err();
        assert!(matches!(
            err,
            EcaError::Dispatch(ConfigError::UnsupportedEventKind(_))
        ));
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let mut engine = Engine::default();
        engine.register(login_rule("r", "x")).unwrap();
        let err = engine.register(login_rule("r", "y")).unwrap_err();
        assert!(matches!(
            err,
            EcaError::Config {
                source: ConfigError::DuplicateRule(_),
                ..
            }
        ));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_weight_then_registration_order() {
        let mut engine = Engine::default();
        engine.register(login_rule("first", "first")).unwrap();
        let mut heavy = login_rule("heavy", "heavy");
        heavy.weight = 10;
        engine.register(heavy).unwrap();
        let mut light = login_rule("light", "light");
        light.weight = -5;
        engine.register(light).unwrap();
        engine.register(login_rule("second", "second")).unwrap();

        let order: Vec<_> = engine.rules().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["light", "first", "second", "heavy"]);

        let outcome = engine.dispatch(Event::new("user-login")).unwrap();
        assert_eq!(outcome.result, Value::from("heavy"));
        assert_eq!(outcome.log.success_count(), 4);
    }

    #[test]
    fn test_disabled_rules_skipped() {
        let config = EngineConfig {
            disabled_rules: vec!["off".to_string()],
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config);
        engine.register(login_rule("off", "off")).unwrap();
        let mut doc_disabled = login_rule("doc_off", "doc_off");
        doc_disabled.enabled = false;
        engine.register(doc_disabled).unwrap();

        let outcome = engine
            .dispatch(Event::new("user-login").with_result("default"))
            .unwrap();
        assert_eq!(outcome.result, Value::from("default"));
        assert!(outcome.log.is_empty());

        engine.set_enabled("doc_off", true).unwrap();
        let outcome = engine.dispatch(Event::new("user-login")).unwrap();
        assert_eq!(outcome.result, Value::from("doc_off"));
    }

    #[test]
    fn test_config_default_result() {
        let config = EngineConfig {
            default_result: Some(serde_json::json!("neutral")),
            ..EngineConfig::default()
        };
        let engine = Engine::new(config);
        let outcome = engine.dispatch(Event::new("user-logout")).unwrap();
        assert_eq!(outcome.result, Value::from("neutral"));
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_import_is_all_or_nothing() {
        let mut engine = Engine::default();
        engine.register(login_rule("keep", "keep")).unwrap();

        let broken = RuleDocument::new("broken").with_event("e", NodeDocument::new("user-login"));
        let err = engine
            .import(vec![login_rule("new", "new"), broken])
            .unwrap_err();
        assert!(err.to_string().contains("broken"));
        assert!(engine.get("keep").is_some());
        assert!(engine.get("new").is_none());

        let count = engine
            .import(vec![login_rule("a", "a"), login_rule("b", "b")])
            .unwrap();
        assert_eq!(count, 2);
        assert!(engine.get("keep").is_none());
    }

    #[test]
    fn test_remove() {
        let mut engine = Engine::default();
        engine.register(login_rule("r", "x")).unwrap();
        let document = engine.remove("r").unwrap();
        assert_eq!(document.id, "r");
        assert!(engine.is_empty());
        assert!(matches!(engine.remove("r"), Err(EcaError::NotFound(_))));
    }

    #[test]
    fn test_handled_errors_not_reported() {
        let mut engine = Engine::default();
        let failing = |id: &str, handles: bool| {
            let mut doc = RuleDocument::new(id)
                .with_event("e", NodeDocument::new("user-login").then("need"))
                .with_action(
                    "need",
                    NodeDocument::new("require-token")
                        .with_config(PluginConfig::new().with("token_name", "ticket")),
                );
            doc.handles_exceptions = handles;
            doc
        };
        engine.register(failing("quiet", true)).unwrap();
        engine.register(failing("loud", false)).unwrap();
        engine.register(login_rule("after", "ran")).unwrap();

        let outcome = engine.dispatch(Event::new("user-login")).unwrap();
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            &outcome.errors[0],
            EcaError::Action { rule, node, .. } if rule == "loud" && node == "need"
        ));
        assert_eq!(outcome.result, Value::from("ran"));
        assert_eq!(outcome.log.failure_count(), 2);
    }

    #[test]
    fn test_stop_ends_only_its_rule() {
        let mut engine = Engine::default();
        engine
            .register(
                RuleDocument::new("halt")
                    .with_event("e", NodeDocument::new("user-login").then("s").then("a"))
                    .with_action("s", NodeDocument::new("stop"))
                    .with_action("a", set_result("unreachable")),
            )
            .unwrap();
        engine.register(login_rule("next", "next")).unwrap();

        let outcome = engine.dispatch(Event::new("user-login")).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.result, Value::from("next"));
    }

    #[test]
    fn test_account_seeds_context() {
        let accounts = AccountDirectory::new().with(
            crate::account::Account::new("7", "editor").with_role("editor"),
        );
        let mut engine = Engine::default().with_accounts(Arc::new(accounts));
        engine
            .register(
                RuleDocument::new("editors")
                    .with_event("e", NodeDocument::new("user-login").then_if("a", "is_editor"))
                    .with_condition(
                        "is_editor",
                        NodeDocument::new("account-role")
                            .with_config(PluginConfig::new().with("role", "editor")),
                    )
                    .with_action("a", set_result("welcome")),
            )
            .unwrap();

        let outcome = engine
            .dispatch(Event::new("user-login").with(ACCOUNT_KEY, "7"))
            .unwrap();
        assert_eq!(outcome.result, Value::from("welcome"));

        let outcome = engine.dispatch(Event::new("user-login")).unwrap();
        assert_eq!(outcome.result, Value::Absent);
    }

    #[test]
    fn test_host_registered_kind() {
        let mut engine = Engine::default();
        engine
            .kinds_mut()
            .register(EventKind::new("cron", &["schedule"]));
        engine
            .register(
                RuleDocument::new("nightly")
                    .with_event(
                        "e",
                        NodeDocument::new("cron")
                            .with_config(PluginConfig::new().with("schedule", "Nightly"))
                            .then("a"),
                    )
                    .with_action("a", set_result("ran")),
            )
            .unwrap();

        let mut context = BTreeMap::new();
        context.insert("schedule".to_string(), Value::from("nightly"));
        let outcome = engine.dispatch_event("cron", context).unwrap();
        assert_eq!(outcome.result, Value::from("ran"));

        let mut context = BTreeMap::new();
        context.insert("schedule".to_string(), Value::from("hourly"));
        let outcome = engine.dispatch_event("cron", context).unwrap();
        assert_eq!(outcome.result, Value::Absent);
    }

    #[test]
    fn test_fatal_error_aborts_dispatch() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut engine = Engine::default();
        engine
            .plugins_mut()
            .register_action("stray-pop", |_| Ok(Box::new(StrayPop)));
        let counter = Arc::clone(&runs);
        engine
            .plugins_mut()
            .register_action("count", move |_| Ok(Box::new(Counter(Arc::clone(&counter)))));

        engine
            .register(
                RuleDocument::new("broken")
                    .with_event("e", NodeDocument::new("user-login").then("a"))
                    .with_action("a", NodeDocument::new("stray-pop")),
            )
            .unwrap();
        let mut later = RuleDocument::new("later")
            .with_event("e", NodeDocument::new("user-login").then("a"))
            .with_action("a", NodeDocument::new("count"));
        later.weight = 10;
        engine.register(later).unwrap();

        let err = engine.dispatch(Event::new("user-login")).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            EcaError::Fatal(FatalError::UnbalancedPop { ref entity }) if entity == "broken"
        ));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_regex_rejects_rule() {
        let mut engine = Engine::default();
        let err = engine
            .register(
                RuleDocument::new("titles")
                    .with_event("e", NodeDocument::new("user-login").then_if("a", "c"))
                    .with_condition(
                        "c",
                        NodeDocument::new("scalar").with_config(
                            PluginConfig::new()
                                .with("left", "[title]")
                                .with("operator", "regex-match")
                                .with("right", "(unclosed"),
                        ),
                    )
                    .with_action("a", set_result("x")),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EcaError::Config {
                source: ConfigError::InvalidValue { .. },
                ..
            }
        ));
        assert!(engine.is_empty());
    }
}

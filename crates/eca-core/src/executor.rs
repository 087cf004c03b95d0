//! Rule graph interpreter.
//!
//! Walks one compiled [`Rule`] depth-first from its event node. Guards are
//! evaluated fresh every time an edge is considered; conditions are pure, so
//! this never changes the data bag. Each action runs at most once per walk.
//!
//! After an action's successor subtree has been walked the interpreter calls
//! [`Action::cleanup`](crate::actions::Action::cleanup) for that action, also
//! when the subtree ended in an error or a stop signal. This is where context
//! switches are restored.
//!
//! A guard that fails on an edge into an action only marks that action as a
//! skip candidate. Candidates still unexecuted when the walk ends are logged
//! as skipped, so an action reached through another edge is logged once.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{ActionError, FatalError};
use crate::log::{ExecutionLog, ExecutionStatus};
use crate::model::{Edge, GatewayLogic, GatewayNode, Guard, Rule};
use crate::scope::Scope;

/// How a rule walk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Every reachable node was visited.
    Finished,
    /// An action raised the stop-processing signal.
    Stopped { node: String },
    /// An action failed; the rest of the walk was abandoned.
    Failed {
        node: String,
        error: ActionError,
        handled: bool,
    },
}

enum Interrupt {
    Stop(String),
    Failed {
        node: String,
        error: ActionError,
        handled: bool,
    },
    Fatal(FatalError),
}

/// Interpreter state for one walk of one rule.
pub struct GraphExecutor<'r, 'l> {
    rule: &'r Rule,
    log: &'l mut ExecutionLog,
    executed: BTreeSet<&'r str>,
    opened: BTreeSet<&'r str>,
    skipped: Vec<(&'r str, String)>,
}

impl<'r, 'l> GraphExecutor<'r, 'l> {
    pub fn new(rule: &'r Rule, log: &'l mut ExecutionLog) -> Self {
        Self {
            rule,
            log,
            executed: BTreeSet::new(),
            opened: BTreeSet::new(),
            skipped: Vec::new(),
        }
    }

    /// Walk the rule graph. Only invariant violations are returned as errors.
    pub fn run(mut self, scope: &mut Scope<'_>) -> Result<Completion, FatalError> {
        let rule = self.rule;
        let walked = self.walk(&rule.event.successors, scope);
        if !matches!(walked, Err(Interrupt::Fatal(_))) {
            self.record_skips();
        }
        match walked {
            Ok(()) => Ok(Completion::Finished),
            Err(Interrupt::Stop(node)) => Ok(Completion::Stopped { node }),
            Err(Interrupt::Failed {
                node,
                error,
                handled,
            }) => Ok(Completion::Failed {
                node,
                error,
                handled,
            }),
            Err(Interrupt::Fatal(fatal)) => Err(fatal),
        }
    }

    fn walk(&mut self, edges: &'r [Edge], scope: &mut Scope<'_>) -> Result<(), Interrupt> {
        for edge in edges {
            if let Some(guard) = &edge.guard {
                let passed = self.guard(guard, scope);
                debug!(target_node = %edge.target, guard = %guard.node, passed, "edge guard");
                if !passed {
                    self.mark_skipped(&edge.target, guard);
                    continue;
                }
            }
            self.visit(&edge.target, scope)?;
        }
        Ok(())
    }

    fn visit(&mut self, target: &'r str, scope: &mut Scope<'_>) -> Result<(), Interrupt> {
        let rule = self.rule;

        if let Some(gateway) = rule.gateways.get(target) {
            if self.opened.contains(target) {
                return Ok(());
            }
            if !self.gateway_open(gateway, scope) {
                debug!(gateway = target, "gateway closed");
                return Ok(());
            }
            self.opened.insert(target);
            return self.walk(&gateway.successors, scope);
        }

        let action = rule.actions.get(target).ok_or_else(|| {
            Interrupt::Fatal(FatalError::MissingNode {
                rule: rule.id.clone(),
                node: target.to_string(),
            })
        })?;
        if !self.executed.insert(target) {
            debug!(action = target, "already executed");
            return Ok(());
        }

        scope.enter_node(target);
        debug!(action = target, plugin = %action.plugin_id, "executing action");
        match action.plugin.execute(scope) {
            Ok(()) => {
                self.log
                    .push(&rule.id, target, &action.plugin_id, ExecutionStatus::Success);
            }
            Err(ActionError::Stop) => {
                self.log
                    .push(&rule.id, target, &action.plugin_id, ExecutionStatus::Stopped);
                return Err(Interrupt::Stop(target.to_string()));
            }
            Err(error) => {
                let handled = rule.handles_error_of(target);
                self.log.push(
                    &rule.id,
                    target,
                    &action.plugin_id,
                    ExecutionStatus::Failed {
                        reason: error.to_string(),
                        handled,
                    },
                );
                return Err(Interrupt::Failed {
                    node: target.to_string(),
                    error,
                    handled,
                });
            }
        }

        let walked = self.walk(&action.successors, scope);

        scope.enter_node(target);
        let cleaned = action.plugin.cleanup(scope);
        match (walked, cleaned) {
            (Err(Interrupt::Fatal(fatal)), _) | (_, Err(fatal)) => Err(Interrupt::Fatal(fatal)),
            (walked, Ok(())) => walked,
        }
    }

    fn guard(&self, guard: &Guard, scope: &Scope<'_>) -> bool {
        let rule = self.rule;
        let verdict = if let Some(condition) = rule.conditions.get(&guard.node) {
            condition.evaluate(scope)
        } else if let Some(gateway) = rule.gateways.get(&guard.node) {
            self.gateway_open(gateway, scope)
        } else {
            false
        };
        verdict == guard.expect
    }

    /// Merged boolean of a gateway's inbound edges. Unguarded edges count as true.
    fn gateway_open(&self, gateway: &GatewayNode, scope: &Scope<'_>) -> bool {
        let mut verdicts = gateway
            .inbound
            .iter()
            .map(|guard| guard.as_ref().map_or(true, |g| self.guard(g, scope)));
        match gateway.logic {
            GatewayLogic::And => verdicts.all(|v| v),
            GatewayLogic::Or => verdicts.any(|v| v),
        }
    }

    fn mark_skipped(&mut self, target: &'r str, guard: &Guard) {
        if !self.rule.actions.contains_key(target)
            || self.executed.contains(target)
            || self.skipped.iter().any(|(node, _)| *node == target)
        {
            return;
        }
        self.skipped
            .push((target, format!("guard '{}' was not {}", guard.node, guard.expect)));
    }

    fn record_skips(&mut self) {
        let rule = self.rule;
        for (target, reason) in std::mem::take(&mut self.skipped) {
            if self.executed.contains(target) {
                continue;
            }
            let plugin = rule
                .actions
                .get(target)
                .map(|a| a.plugin_id.as_str())
                .unwrap_or_default();
            self.log
                .push(&rule.id, target, plugin, ExecutionStatus::Skipped { reason });
        }
    }
}

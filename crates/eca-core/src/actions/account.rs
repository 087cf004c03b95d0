//! Switch the acting identity for the rest of a graph walk.

use tracing::debug;

use super::Action;
use crate::error::{ActionError, ConfigError, FatalError};
use crate::plugin::PluginConfig;
use crate::scope::Scope;

pub const SWITCH_ACCOUNT_ID: &str = "switch-account";

/// Push a context switch to another account.
///
/// The switch stays active while the successors of this node are walked and
/// is restored by [`Action::cleanup`] once that subtree is done.
#[derive(Debug, Clone)]
pub struct SwitchAccount {
    pub account: String,
}

impl SwitchAccount {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            account: config.require_non_empty(SWITCH_ACCOUNT_ID, "account")?,
        })
    }
}

impl Action for SwitchAccount {
    fn execute(&self, scope: &mut Scope<'_>) -> Result<(), ActionError> {
        let id = scope
            .account_id(&self.account)
            .ok_or_else(|| ActionError::MissingValue {
                token: self.account.clone(),
                message: "account to switch to is unknown".to_string(),
            })?;
        debug!(
            rule = scope.rule_id(),
            node = scope.node_id(),
            from = ?scope.actor(),
            to = %id,
            "switching account"
        );
        let entity = scope.rule_id().to_string();
        let node = scope.node_id().to_string();
        scope.contexts.push(entity, node, Some(id));
        Ok(())
    }

    fn cleanup(&self, scope: &mut Scope<'_>) -> Result<(), FatalError> {
        let entity = scope.rule_id().to_string();
        let node = scope.node_id().to_string();
        let entry = scope.contexts.release(&entity, &node)?;
        debug!(rule = %entity, node = %node, restored = ?entry.previous, "account switch restored");
        Ok(())
    }
}

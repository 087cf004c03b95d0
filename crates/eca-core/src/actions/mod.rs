//! Action plugins.
//!
//! Actions define what happens when the graph walk reaches them: they write
//! tokens, set the event's result slot, switch the acting identity, or stop
//! processing.

pub mod account;
pub mod control;
pub mod token;

use crate::error::{ActionError, FatalError};
use crate::plugin::PluginRegistry;
use crate::scope::Scope;

pub use account::SwitchAccount;
pub use control::{LogMessage, RequireToken, Stop};
pub use token::{ListAdd, ListRemove, SetResult, TokenSet, TokenUnset};

/// An action plugin instance, built from its node configuration.
pub trait Action: Send + Sync {
    /// Run the action.
    fn execute(&self, scope: &mut Scope<'_>) -> Result<(), ActionError>;

    /// Called once the whole successor subtree of this node has been walked,
    /// whether that walk succeeded or not. Only called if `execute` succeeded.
    fn cleanup(&self, _scope: &mut Scope<'_>) -> Result<(), FatalError> {
        Ok(())
    }
}

/// Register every built-in action.
pub fn register_builtins(registry: &mut PluginRegistry) {
    registry.register_action(token::SET_RESULT_ID, |config| {
        Ok(Box::new(SetResult::from_config(config)?))
    });
    registry.register_action(token::TOKEN_SET_ID, |config| {
        Ok(Box::new(TokenSet::from_config(config)?))
    });
    registry.register_action(token::TOKEN_UNSET_ID, |config| {
        Ok(Box::new(TokenUnset::from_config(config)?))
    });
    registry.register_action(token::LIST_ADD_ID, |config| {
        Ok(Box::new(ListAdd::from_config(config)?))
    });
    registry.register_action(token::LIST_REMOVE_ID, |config| {
        Ok(Box::new(ListRemove::from_config(config)?))
    });
    registry.register_action(control::REQUIRE_TOKEN_ID, |config| {
        Ok(Box::new(RequireToken::from_config(config)?))
    });
    registry.register_action(control::LOG_MESSAGE_ID, |config| {
        Ok(Box::new(LogMessage::from_config(config)?))
    });
    registry.register_action(control::STOP_ID, |_| Ok(Box::new(Stop)));
    registry.register_action(account::SWITCH_ACCOUNT_ID, |config| {
        Ok(Box::new(SwitchAccount::from_config(config)?))
    });
}

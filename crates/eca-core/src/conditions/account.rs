//! Identity, role and permission checks.
//!
//! An account reference that cannot be resolved makes the check false.

use super::Condition;
use crate::error::ConfigError;
use crate::plugin::PluginConfig;
use crate::scope::{Scope, CURRENT_ACCOUNT};

pub const ROLE_PLUGIN_ID: &str = "account-role";
pub const PERMISSION_PLUGIN_ID: &str = "account-permission";
pub const IS_PLUGIN_ID: &str = "account-is";

fn account_reference(config: &PluginConfig) -> String {
    config
        .text("account")
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| CURRENT_ACCOUNT.to_string())
}

/// The referenced account has a role.
#[derive(Debug, Clone)]
pub struct AccountRole {
    pub account: String,
    pub role: String,
}

impl AccountRole {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            account: account_reference(config),
            role: config.require_non_empty(ROLE_PLUGIN_ID, "role")?,
        })
    }
}

impl Condition for AccountRole {
    fn evaluate(&self, scope: &Scope<'_>) -> bool {
        let Some(account) = scope.account(&self.account) else {
            return false;
        };
        account.has_role(&scope.resolve_to_string(&self.role))
    }
}

/// The referenced account holds a permission.
#[derive(Debug, Clone)]
pub struct AccountPermission {
    pub account: String,
    pub permission: String,
}

impl AccountPermission {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            account: account_reference(config),
            permission: config.require_non_empty(PERMISSION_PLUGIN_ID, "permission")?,
        })
    }
}

impl Condition for AccountPermission {
    fn evaluate(&self, scope: &Scope<'_>) -> bool {
        let Some(account) = scope.account(&self.account) else {
            return false;
        };
        account.has_permission(&scope.resolve_to_string(&self.permission))
    }
}

/// The referenced account is a given user.
#[derive(Debug, Clone)]
pub struct AccountIs {
    pub account: String,
    pub user_id: String,
}

impl AccountIs {
    pub fn from_config(config: &PluginConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            account: account_reference(config),
            user_id: config.require_non_empty(IS_PLUGIN_ID, "user_id")?,
        })
    }
}

impl Condition for AccountIs {
    fn evaluate(&self, scope: &Scope<'_>) -> bool {
        let Some(account) = scope.account(&self.account) else {
            return false;
        };
        let expected = scope.resolve_to_string(&self.user_id);
        !expected.trim().is_empty() && account.id == expected.trim()
    }
}

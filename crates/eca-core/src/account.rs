//! Accounts as seen by identity and permission conditions.
//!
//! The engine never owns user storage; it asks an [`AccountProvider`] supplied
//! by the host. [`AccountDirectory`] is an in-memory provider for tests,
//! the CLI and small embeddings.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::value::{HostObject, Value};

/// An acting identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Permissions granted to the account, already flattened from its roles.
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            roles: BTreeSet::new(),
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role.trim())
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission.trim())
    }
}

impl HostObject for Account {
    fn kind(&self) -> &str {
        "user"
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn label(&self) -> String {
        if self.name.is_empty() {
            self.id.clone()
        } else {
            self.name.clone()
        }
    }

    fn property(&self, name: &str) -> Value {
        match name {
            "id" | "uid" => Value::from(self.id.as_str()),
            "name" => Value::from(self.name.as_str()),
            "roles" => Value::List(self.roles.iter().map(|r| Value::from(r.as_str())).collect()),
            "permissions" => Value::List(
                self.permissions
                    .iter()
                    .map(|p| Value::from(p.as_str()))
                    .collect(),
            ),
            _ => Value::Absent,
        }
    }
}

/// Host lookup of accounts by id.
pub trait AccountProvider: Send + Sync {
    fn load(&self, id: &str) -> Option<Account>;
}

/// In-memory account provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountDirectory {
    #[serde(default)]
    accounts: BTreeMap<String, Account>,
}

impl AccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    pub fn with(mut self, account: Account) -> Self {
        self.insert(account);
        self
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl AccountProvider for AccountDirectory {
    fn load(&self, id: &str) -> Option<Account> {
        self.accounts.get(id.trim()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_and_permissions() {
        let account = Account::new("3", "editor")
            .with_role("editor")
            .with_permission("edit any article");
        assert!(account.has_role("editor"));
        assert!(!account.has_role("administrator"));
        assert!(account.has_permission(" edit any article "));
    }

    #[test]
    fn test_directory_lookup() {
        let directory = AccountDirectory::new().with(Account::new("1", "admin"));
        assert_eq!(directory.load("1").map(|a| a.name), Some("admin".to_string()));
        assert!(directory.load("2").is_none());
    }

    #[test]
    fn test_account_properties() {
        let account = Account::new("7", "").with_role("a");
        assert_eq!(account.label(), "7");
        assert_eq!(account.property("roles").count(), 1);
    }
}

//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use eca_core::{Account, AccountDirectory, Engine, EngineConfig, NodeDocument, PluginConfig};

/// Engine with the built-ins and two known accounts: `1` (admin) and `5` (editor).
pub fn engine() -> Engine {
    let accounts = AccountDirectory::new()
        .with(
            Account::new("1", "admin")
                .with_role("administrator")
                .with_permission("bypass node access"),
        )
        .with(Account::new("5", "editor").with_role("editor"));
    Engine::new(EngineConfig::default()).with_accounts(Arc::new(accounts))
}

/// A node with string configuration values.
pub fn node(plugin: &str, config: &[(&str, &str)]) -> NodeDocument {
    let configuration = config
        .iter()
        .fold(PluginConfig::new(), |acc, (key, value)| acc.with(*key, *value));
    NodeDocument::new(plugin).with_config(configuration)
}

pub fn set_result(value: &str) -> NodeDocument {
    node("set-result", &[("value", value)])
}

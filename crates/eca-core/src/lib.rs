//! # ECA Core Library
//!
//! An embeddable event-condition-action rule engine. Hosts register rule
//! documents, then hand every application event to [`Engine::dispatch`]. Rules
//! whose wildcard matches the event have their graph walked: guarded edges are
//! followed when their condition agrees, actions write tokens or the event's
//! result slot, and may switch the acting identity for the rest of their
//! subtree.
//!
//! ## Architecture
//!
//! - **Wildcard matching**: each event kind has fixed dimensions; rules and
//!   events are encoded the same way and compared before any condition runs
//! - **Token resolution**: `[name]` and `[name:property]` placeholders in
//!   plugin configuration are resolved against a per-rule data bag
//! - **Graph interpreter**: depth-first walk with fresh guard evaluation,
//!   AND/OR gateways, and per-action cleanup after the subtree
//! - **Context switch stack**: restores the acting identity when a switching
//!   action's subtree is done, on success or failure
//!
//! ## Key Components
//!
//! - [`Engine`]: rule registration and event dispatch
//! - [`RuleDocument`]: declarative rule graph, TOML or JSON
//! - [`PluginRegistry`]: condition and action plugins by id
//! - [`KindRegistry`]: event kinds and their wildcard dimensions
//! - [`RuleStore`]: rule documents on disk

pub mod account;
pub mod actions;
pub mod conditions;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod log;
pub mod model;
pub mod plugin;
pub mod scope;
pub mod store;
pub mod tokens;
pub mod value;
pub mod wildcard;

pub use account::{Account, AccountDirectory, AccountProvider};
pub use actions::Action;
pub use conditions::{Comparison, Condition, Mode, Operator};
pub use config::{data_dir, EngineConfig};
pub use context::{ContextStack, SwitchEntry};
pub use engine::{Engine, Outcome};
pub use error::{ActionError, ConfigError, EcaError, FatalError, Result};
pub use events::Event;
pub use executor::{Completion, GraphExecutor};
pub use log::{ActionRecord, ExecutionLog, ExecutionStatus};
pub use model::{NodeDocument, Rule, RuleDocument, SuccessorDocument};
pub use plugin::{PluginConfig, PluginRegistry};
pub use scope::Scope;
pub use store::RuleStore;
pub use tokens::{Resolver, TokenStore};
pub use value::{HostObject, HostRef, Value};
pub use wildcard::{EventKind, KindRegistry, Wildcard};

//! Rule documents and the graphs compiled from them.

pub mod document;
pub mod rule;

pub use document::{NodeDocument, RuleDocument, SuccessorDocument};
pub use rule::{ActionNode, ConditionNode, Edge, EventNode, GatewayLogic, GatewayNode, Guard, Rule};

//! Token store and resolver.
//!
//! The token store is the per-dispatch data bag: seeded from the event,
//! extended by actions, read by conditions through the [`Resolver`].

pub mod resolver;
pub mod store;

pub use resolver::{placeholders, Placeholder, Resolver};
pub use store::TokenStore;

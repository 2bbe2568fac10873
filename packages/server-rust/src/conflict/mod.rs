//! Publish-time uniqueness of resolution parameters.
//!
//! Every published service answers to a set of `(uri, soap_action, urn)`
//! tuples. Two services sharing a tuple could never be told apart by the
//! resolvers, so [`ResolutionManager`] refuses the second registration before
//! anything is persisted.

pub mod manager;
pub mod store;

pub use manager::ResolutionManager;
pub use store::{InMemoryParameterStore, ResolutionParameterStore};

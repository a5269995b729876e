//! Reinforce: validation and declarative relations for ORM models.
//!
//! This crate holds the storage-independent pieces:
//!
//! - [`Elegant`] entity over a [`Model`] definition, with case-insensitive
//!   dirty tracking and a validation gate in front of persistence.
//! - [`validation`] rule tables, the rule evaluator and the [`Checker`]
//!   validator that adds the `ini` rule.
//! - [`relation`] declarative relationship tables dispatched onto a
//!   [`RelationBuilder`].
//! - [`scope`] range and sort-by query scopes.
//! - [`ReinforceServiceProvider`] registering the validator with a factory.
//!
//! [`Checker`]: validation::Checker
//! [`RelationBuilder`]: relation::RelationBuilder

pub mod compare;
pub mod config;
pub mod dirty;
pub mod error;
pub mod helpers;
pub mod model;
pub mod provider;
pub mod relation;
pub mod scope;
pub mod types;
pub mod validation;

pub use config::ReinforceConfig;
pub use error::{CoreError, SaveError, ValidationFailed};
pub use model::{Elegant, Model, Persister, SaveOptions};
pub use provider::ReinforceServiceProvider;

//! Rule-based attribute validation.
//!
//! Provides rule tables, a rule-dispatching evaluator, the application's
//! custom validator and the factory that builds validators. Database-backed
//! rules (`unique`, `exists`) go through a [`presence::PresenceVerifier`].

pub mod checker;
pub mod evaluator;
pub mod factory;
pub mod messages;
pub mod presence;
pub mod rules;

pub use checker::Checker;
pub use evaluator::RuleValidator;
pub use factory::{Validator, ValidatorFactory};
pub use rules::{prune_unique_rules, FieldViolation, Rule, RuleSpec, RuleTable};

//! Wires the application validator into a [`ValidatorFactory`].

use crate::validation::{Checker, ValidatorFactory};

/// Service name advertised by [`ReinforceServiceProvider::provides`].
pub const SERVICE_NAME: &str = "reinforce";

/// Registers [`Checker`] as the factory's validator, making the `ini` rule
/// available to every validator the factory builds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReinforceServiceProvider;

impl ReinforceServiceProvider {
    pub fn new() -> Self {
        Self
    }

    /// Install the resolver. Call once while building the application.
    pub fn boot(&self, factory: &mut ValidatorFactory) {
        factory.resolver(|translator, data, rules, messages| {
            Box::new(Checker::new(translator, data, rules, messages))
        });
        tracing::info!(service = SERVICE_NAME, "Custom validator registered");
    }

    /// Convenience: a default factory with the provider already booted.
    pub fn factory(&self) -> ValidatorFactory {
        let mut factory = ValidatorFactory::new();
        self.boot(&mut factory);
        factory
    }

    pub fn provides(&self) -> Vec<&'static str> {
        vec![SERVICE_NAME]
    }
}

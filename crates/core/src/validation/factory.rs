//! Validator contract and the factory that builds validators.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::types::Attributes;

use super::evaluator::RuleValidator;
use super::messages::{EnglishTranslator, Messages, Translator};
use super::presence::PresenceVerifier;
use super::rules::{FieldViolation, RuleTable};

/// A validator built over one attribute map and one rule table.
#[async_trait]
pub trait Validator: fmt::Debug + Send + Sync {
    /// Run every rule, replacing any previously collected violations.
    async fn passes(&mut self) -> bool;

    async fn fails(&mut self) -> bool {
        !self.passes().await
    }

    /// Violations collected by the last run.
    fn errors(&self) -> &[FieldViolation];

    fn data(&self) -> &Attributes;

    fn rules(&self) -> &RuleTable;

    fn set_presence_verifier(&mut self, verifier: Arc<dyn PresenceVerifier>);
}

/// Constructor installed with [`ValidatorFactory::resolver`].
pub type Resolver = Arc<
    dyn Fn(Arc<dyn Translator>, Attributes, RuleTable, Messages) -> Box<dyn Validator>
        + Send
        + Sync,
>;

/// Builds validators for the application.
///
/// Owned by the composition root and handed to whatever needs to validate,
/// so swapping in a custom validator never touches global state.
#[derive(Clone)]
pub struct ValidatorFactory {
    translator: Arc<dyn Translator>,
    presence: Option<Arc<dyn PresenceVerifier>>,
    resolver: Option<Resolver>,
}

impl ValidatorFactory {
    pub fn new() -> Self {
        Self {
            translator: Arc::new(EnglishTranslator),
            presence: None,
            resolver: None,
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn set_presence_verifier(&mut self, verifier: Arc<dyn PresenceVerifier>) {
        self.presence = Some(verifier);
    }

    /// Replace the validator constructor.
    pub fn resolver<F>(&mut self, resolver: F)
    where
        F: Fn(Arc<dyn Translator>, Attributes, RuleTable, Messages) -> Box<dyn Validator>
            + Send
            + Sync
            + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
    }

    pub fn has_resolver(&self) -> bool {
        self.resolver.is_some()
    }

    pub fn make(&self, data: &Attributes, rules: &RuleTable) -> Box<dyn Validator> {
        self.make_with_messages(data, rules, Messages::new())
    }

    pub fn make_with_messages(
        &self,
        data: &Attributes,
        rules: &RuleTable,
        messages: Messages,
    ) -> Box<dyn Validator> {
        let translator = Arc::clone(&self.translator);
        let mut validator = match &self.resolver {
            Some(resolver) => resolver(translator, data.clone(), rules.clone(), messages),
            None => Box::new(RuleValidator::new(
                translator,
                data.clone(),
                rules.clone(),
                messages,
            )),
        };

        if let Some(presence) = &self.presence {
            validator.set_presence_verifier(Arc::clone(presence));
        }
        validator
    }
}

impl Default for ValidatorFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ValidatorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorFactory")
            .field("translator", &self.translator)
            .field("presence", &self.presence)
            .field("resolver", &self.resolver.as_ref().map(|_| "custom"))
            .finish()
    }
}

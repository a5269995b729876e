use crate::validation::factory::Validator;
use crate::validation::rules::FieldViolation;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid relation constant `{kind}` for relation `{method}`")]
    InvalidRelation { method: String, kind: String },

    #[error("Relation `{method}` is missing required argument `{argument}`")]
    MissingRelationArgument {
        method: String,
        argument: &'static str,
    },

    #[error("Call to undefined method {model}::{method}()")]
    UndefinedMethod { model: &'static str, method: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Raised by the pre-save gate when the entity's attributes break its rules.
///
/// Carries the model name and the failed validator so callers can read the
/// violations back (e.g. to redisplay a form).
#[derive(Debug, thiserror::Error)]
#[error("{model} failed to validate")]
pub struct ValidationFailed {
    pub model: &'static str,
    validator: Box<dyn Validator>,
}

impl ValidationFailed {
    pub fn new(model: &'static str, validator: Box<dyn Validator>) -> Self {
        Self { model, validator }
    }

    pub fn validator(&self) -> &dyn Validator {
        self.validator.as_ref()
    }

    pub fn into_validator(self) -> Box<dyn Validator> {
        self.validator
    }

    pub fn errors(&self) -> &[FieldViolation] {
        self.validator.errors()
    }
}

/// Outcome of a failed `Elegant::save` call.
///
/// Persistence errors are passed through untouched in `Persist`.
#[derive(Debug, thiserror::Error)]
pub enum SaveError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Validation(#[from] ValidationFailed),

    #[error(transparent)]
    Persist(E),
}

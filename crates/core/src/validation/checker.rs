//! The application validator: the base rule set plus case-insensitive rules.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::helpers::in_arrayi;
use crate::types::Attributes;

use super::evaluator::{scalar_text, RuleValidator};
use super::factory::Validator;
use super::messages::{Messages, Translator};
use super::presence::PresenceVerifier;
use super::rules::{FieldViolation, RuleTable};

const INI_MESSAGE: &str = "The selected :attribute is invalid.";

/// Validator installed by the service provider.
///
/// Adds the `ini` rule: the field under validation must be included in the
/// given list of values, compared case-insensitively
/// (`"role" => "ini:admin,user"` accepts `"ADMIN"`).
#[derive(Debug)]
pub struct Checker {
    inner: RuleValidator,
}

impl Checker {
    pub fn new(
        translator: Arc<dyn Translator>,
        data: Attributes,
        rules: RuleTable,
        messages: Messages,
    ) -> Self {
        let mut inner = RuleValidator::new(translator, data, rules, messages);
        inner.extend("ini", INI_MESSAGE, validate_ini);
        Self { inner }
    }

    /// Register an additional custom rule.
    pub fn extend<F>(&mut self, rule: &str, message: &str, check: F)
    where
        F: Fn(&str, &Value, &[String]) -> bool + Send + Sync + 'static,
    {
        self.inner.extend(rule, message, check);
    }
}

/// `ini` rule: scalar value matches one of `parameters`, ignoring case.
pub fn validate_ini(_attribute: &str, value: &Value, parameters: &[String]) -> bool {
    scalar_text(value).is_some_and(|text| in_arrayi(&text, parameters))
}

#[async_trait]
impl Validator for Checker {
    async fn passes(&mut self) -> bool {
        self.inner.passes().await
    }

    fn errors(&self) -> &[FieldViolation] {
        self.inner.errors()
    }

    fn data(&self) -> &Attributes {
        self.inner.data()
    }

    fn rules(&self) -> &RuleTable {
        self.inner.rules()
    }

    fn set_presence_verifier(&mut self, verifier: Arc<dyn PresenceVerifier>) {
        self.inner.set_presence_verifier(verifier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::messages::EnglishTranslator;
    use serde_json::json;

    fn checker(data: Value, rules: RuleTable) -> Checker {
        Checker::new(
            Arc::new(EnglishTranslator),
            data.as_object().cloned().unwrap_or_default(),
            rules,
            Messages::new(),
        )
    }

    #[test]
    fn ini_ignores_case() {
        let allowed = vec!["admin".to_string(), "user".to_string()];
        assert!(validate_ini("role", &json!("ADMIN"), &allowed));
        assert!(validate_ini("role", &json!("User"), &allowed));
        assert!(!validate_ini("role", &json!("guest"), &allowed));
    }

    #[test]
    fn ini_stringifies_scalars() {
        let allowed = vec!["1".to_string(), "TRUE".to_string()];
        assert!(validate_ini("flag", &json!(1), &allowed));
        assert!(validate_ini("flag", &json!(true), &allowed));
        assert!(!validate_ini("flag", &json!(["1"]), &allowed));
        assert!(!validate_ini("flag", &Value::Null, &allowed));
    }

    #[tokio::test]
    async fn ini_rule_passes_for_mixed_case_value() {
        let rules = RuleTable::new().with("role", "required|ini:admin,user");
        let mut v = checker(json!({"role": "Admin"}), rules);
        assert!(v.passes().await);
    }

    #[tokio::test]
    async fn ini_rule_reports_violation() {
        let rules = RuleTable::new().with("role", "ini:admin,user");
        let mut v = checker(json!({"role": "guest"}), rules);

        assert!(v.fails().await);
        let errors = v.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, "ini");
        assert_eq!(errors[0].message, "The selected role is invalid.");
    }

    #[tokio::test]
    async fn base_rules_still_apply() {
        let rules = RuleTable::new().with("email", "required|email");
        let mut v = checker(json!({"email": "nope"}), rules);
        assert!(v.fails().await);
        assert_eq!(v.errors()[0].rule, "email");
    }

    #[tokio::test]
    async fn case_sensitive_in_rule_is_unchanged() {
        let rules = RuleTable::new().with("role", "in:admin,user");
        let mut v = checker(json!({"role": "ADMIN"}), rules);
        assert!(v.fails().await);
    }
}

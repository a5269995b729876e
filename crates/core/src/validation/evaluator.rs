//! Rule evaluator: dispatches rule names to checks over an attribute map.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use validator::{ValidateEmail, ValidateUrl};

use crate::compare::numeric;
use crate::types::Attributes;

use super::factory::Validator;
use super::messages::{display_attribute, fill, Messages, Translator};
use super::presence::{Exclusion, PresenceVerifier};
use super::rules::{FieldViolation, Rule, RuleTable};

/// Signature of a custom rule: `(attribute, value, parameters) -> passes`.
pub type RuleCheck = Arc<dyn Fn(&str, &Value, &[String]) -> bool + Send + Sync>;

/// Rules that run even when the attribute is absent or blank.
const IMPLICIT_RULES: &[&str] = &["required", "present", "filled"];

/// Rules that only modify how the other rules of an attribute run.
const MODIFIER_RULES: &[&str] = &["bail", "nullable", "sometimes"];

const FALLBACK_MESSAGE: &str = "The :attribute is invalid.";

#[derive(Clone)]
struct Extension {
    check: RuleCheck,
    message: String,
}

/// The base validator.
///
/// Every attribute in the rule table is checked against each of its rules in
/// order. Unknown rules pass with a warning. Custom rules are added with
/// [`RuleValidator::extend`] and take precedence over built-in ones.
pub struct RuleValidator {
    translator: Arc<dyn Translator>,
    data: Attributes,
    rules: RuleTable,
    messages: Messages,
    extensions: HashMap<String, Extension>,
    presence: Option<Arc<dyn PresenceVerifier>>,
    errors: Vec<FieldViolation>,
}

impl RuleValidator {
    pub fn new(
        translator: Arc<dyn Translator>,
        data: Attributes,
        rules: RuleTable,
        messages: Messages,
    ) -> Self {
        Self {
            translator,
            data,
            rules,
            messages,
            extensions: HashMap::new(),
            presence: None,
            errors: Vec::new(),
        }
    }

    /// Register a custom rule under `rule`.
    pub fn extend<F>(&mut self, rule: &str, message: &str, check: F)
    where
        F: Fn(&str, &Value, &[String]) -> bool + Send + Sync + 'static,
    {
        self.extensions.insert(
            rule.to_lowercase(),
            Extension {
                check: Arc::new(check),
                message: message.to_string(),
            },
        );
    }

    pub fn has_extension(&self, rule: &str) -> bool {
        self.extensions.contains_key(rule)
    }

    async fn run(&mut self) -> bool {
        self.errors.clear();
        let rules = self.rules.clone();

        for (attribute, spec) in rules.iter() {
            let parsed = spec.parsed();
            let has = |name: &str| parsed.iter().any(|rule| rule.name == name);
            let bail = has("bail");
            let nullable = has("nullable");
            let numeric_context = has("numeric") || has("integer");

            let value = self.data.get(attribute.as_str()).cloned();
            if has("sometimes") && value.is_none() {
                continue;
            }

            for rule in &parsed {
                if MODIFIER_RULES.contains(&rule.name.as_str()) {
                    continue;
                }
                if !is_validatable(rule, value.as_ref(), nullable) {
                    continue;
                }

                if !self.check(attribute, rule, value.as_ref(), numeric_context).await {
                    self.add_failure(attribute, rule, value.as_ref());
                    if bail {
                        break;
                    }
                }
            }
        }

        self.errors.is_empty()
    }

    async fn check(
        &self,
        attribute: &str,
        rule: &Rule,
        value: Option<&Value>,
        numeric_context: bool,
    ) -> bool {
        if let Some(extension) = self.extensions.get(&rule.name) {
            return (extension.check)(attribute, value.unwrap_or(&Value::Null), &rule.parameters);
        }

        match rule.name.as_str() {
            "unique" => self.verify_presence(attribute, rule, value, true).await,
            "exists" => self.verify_presence(attribute, rule, value, false).await,
            _ => match evaluate_builtin(attribute, rule, value, &self.data, numeric_context) {
                Some(passed) => passed,
                None => {
                    tracing::warn!(rule = %rule.name, attribute, "Unknown validation rule");
                    true
                }
            },
        }
    }

    async fn verify_presence(
        &self,
        attribute: &str,
        rule: &Rule,
        value: Option<&Value>,
        expect_unique: bool,
    ) -> bool {
        let Some(verifier) = &self.presence else {
            tracing::error!(rule = %rule.name, attribute, "Presence verifier has not been set");
            return false;
        };
        let Some(table) = rule.parameter(0) else {
            tracing::warn!(rule = %rule.name, attribute, "Rule is missing its table parameter");
            return false;
        };
        let column = rule.parameter(1).unwrap_or(attribute);
        let value = value.unwrap_or(&Value::Null);
        let exclusion = if expect_unique {
            Exclusion::from_parameters(rule.parameter(2), rule.parameter(3))
        } else {
            None
        };

        match verifier.count(table, column, value, exclusion.as_ref()).await {
            Ok(count) if expect_unique => count == 0,
            Ok(count) => count > 0,
            Err(err) => {
                tracing::error!(error = %err, table, column, "Presence verification failed");
                false
            }
        }
    }

    fn add_failure(&mut self, attribute: &str, rule: &Rule, value: Option<&Value>) {
        let template = self
            .messages
            .get(&format!("{attribute}.{}", rule.name))
            .or_else(|| self.messages.get(&rule.name))
            .cloned()
            .or_else(|| self.translator.template(&rule.name))
            .or_else(|| {
                self.extensions
                    .get(&rule.name)
                    .map(|extension| extension.message.clone())
            })
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());

        let message = fill(&template, &replacements(attribute, rule));
        self.errors.push(FieldViolation {
            field: attribute.to_string(),
            rule: rule.name.clone(),
            message,
            value: value.cloned(),
        });
    }
}

#[async_trait]
impl Validator for RuleValidator {
    async fn passes(&mut self) -> bool {
        self.run().await
    }

    fn errors(&self) -> &[FieldViolation] {
        &self.errors
    }

    fn data(&self) -> &Attributes {
        &self.data
    }

    fn rules(&self) -> &RuleTable {
        &self.rules
    }

    fn set_presence_verifier(&mut self, verifier: Arc<dyn PresenceVerifier>) {
        self.presence = Some(verifier);
    }
}

impl fmt::Debug for RuleValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut extensions: Vec<&String> = self.extensions.keys().collect();
        extensions.sort();
        f.debug_struct("RuleValidator")
            .field("data", &self.data)
            .field("rules", &self.rules)
            .field("extensions", &extensions)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

/// Absent and blank values are only checked by implicit rules; null values
/// are skipped when the attribute is `nullable`.
fn is_validatable(rule: &Rule, value: Option<&Value>, nullable: bool) -> bool {
    if IMPLICIT_RULES.contains(&rule.name.as_str()) {
        return true;
    }
    match value {
        None => false,
        Some(Value::String(s)) if s.trim().is_empty() => false,
        Some(Value::Null) => !nullable,
        Some(_) => true,
    }
}

fn replacements(attribute: &str, rule: &Rule) -> Vec<(&'static str, String)> {
    let param = |index: usize| rule.parameter(index).unwrap_or_default().to_string();
    let mut pairs = vec![("attribute", display_attribute(attribute))];

    match rule.name.as_str() {
        "min" => pairs.push(("min", param(0))),
        "max" => pairs.push(("max", param(0))),
        "size" => pairs.push(("size", param(0))),
        "between" => {
            pairs.push(("min", param(0)));
            pairs.push(("max", param(1)));
        }
        "same" | "different" => pairs.push(("other", display_attribute(&param(0)))),
        _ => {}
    }
    pairs.push(("values", rule.parameters.join(", ")));
    pairs
}

/// Evaluate a built-in rule. Returns `None` for rules this evaluator does not
/// know.
pub fn evaluate_builtin(
    attribute: &str,
    rule: &Rule,
    value: Option<&Value>,
    data: &Attributes,
    numeric_context: bool,
) -> Option<bool> {
    let passed = match rule.name.as_str() {
        "required" => value.is_some_and(is_filled),
        "present" => value.is_some(),
        "filled" => value.map_or(true, is_filled),
        "string" => value.is_some_and(Value::is_string),
        "numeric" => value.is_some_and(is_numeric),
        "integer" => value.is_some_and(is_integer),
        "boolean" => value.is_some_and(is_boolean),
        "array" => value.is_some_and(|v| v.is_array() || v.is_object()),
        "email" => matches!(value, Some(Value::String(s)) if s.validate_email()),
        "url" => matches!(value, Some(Value::String(s)) if s.validate_url()),
        "uuid" => matches!(value, Some(Value::String(s)) if uuid::Uuid::parse_str(s).is_ok()),
        "alpha" => text_matches(value, |c| c.is_alphabetic()),
        "alpha_num" => text_matches(value, |c| c.is_alphanumeric()),
        "alpha_dash" => text_matches(value, |c| c.is_alphanumeric() || c == '-' || c == '_'),
        "min" => compare_size(value, rule, numeric_context, |size, min| size >= min),
        "max" => compare_size(value, rule, numeric_context, |size, max| size <= max),
        "size" => compare_size(value, rule, numeric_context, |size, expected| size == expected),
        "between" => evaluate_between(value, rule, numeric_context),
        "in" => value.is_some_and(|v| in_list(v, &rule.parameters)),
        "not_in" => value.is_some_and(|v| !in_list(v, &rule.parameters)),
        "regex" => evaluate_regex(value, rule).unwrap_or(true),
        "not_regex" => evaluate_regex(value, rule).map_or(true, |matched| !matched),
        "date" => matches!(value, Some(Value::String(s)) if is_date(s)),
        "confirmed" => {
            value.is_some() && data.get(&format!("{attribute}_confirmation")) == value
        }
        "same" => rule
            .parameter(0)
            .is_some_and(|other| data.get(other) == value),
        "different" => rule
            .parameter(0)
            .is_some_and(|other| data.get(other) != value),
        _ => return None,
    };
    Some(passed)
}

fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => numeric(s).is_some(),
        _ => false,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

fn is_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(n) => n.as_i64().is_some_and(|i| i == 0 || i == 1),
        Value::String(s) => matches!(s.as_str(), "0" | "1"),
        _ => false,
    }
}

fn text_matches(value: Option<&Value>, allowed: impl Fn(char) -> bool) -> bool {
    match value {
        Some(Value::String(s)) => !s.is_empty() && s.chars().all(allowed),
        _ => false,
    }
}

/// Size of a value: numeric value, string length in characters, or element
/// count.
fn size_of(value: &Value, numeric_context: bool) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if numeric_context => numeric(s),
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(a) => Some(a.len() as f64),
        Value::Object(o) => Some(o.len() as f64),
        _ => None,
    }
}

fn compare_size(
    value: Option<&Value>,
    rule: &Rule,
    numeric_context: bool,
    predicate: impl Fn(f64, f64) -> bool,
) -> bool {
    let Some(bound) = rule.parameter(0).and_then(numeric) else {
        tracing::warn!(rule = %rule.name, "Rule requires a numeric parameter");
        return false;
    };
    value
        .and_then(|v| size_of(v, numeric_context))
        .is_some_and(|size| predicate(size, bound))
}

fn evaluate_between(value: Option<&Value>, rule: &Rule, numeric_context: bool) -> bool {
    let (Some(min), Some(max)) = (
        rule.parameter(0).and_then(numeric),
        rule.parameter(1).and_then(numeric),
    ) else {
        tracing::warn!(rule = %rule.name, "Rule requires two numeric parameters");
        return false;
    };
    value
        .and_then(|v| size_of(v, numeric_context))
        .is_some_and(|size| size >= min && size <= max)
}

/// Scalar values are compared as text; arrays pass when every element does.
fn in_list(value: &Value, allowed: &[String]) -> bool {
    match value {
        Value::Array(items) => items.iter().all(|item| in_list(item, allowed)),
        other => scalar_text(other).is_some_and(|text| allowed.iter().any(|a| *a == text)),
    }
}

/// Text form of a scalar value, `None` for containers and null.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `Some(matched)` for a usable pattern, `None` when the pattern is invalid.
///
/// Accepts `/pattern/flags` delimiters; the `i`, `m`, `s` and `x` flags are
/// translated to inline flags.
fn evaluate_regex(value: Option<&Value>, rule: &Rule) -> Option<bool> {
    let pattern = rule.parameter(0)?;
    let text = value.and_then(scalar_text)?;

    let compiled = match compile_pattern(pattern) {
        Ok(re) => re,
        Err(err) => {
            tracing::warn!(pattern, error = %err, "Invalid regex rule pattern");
            return None;
        }
    };
    Some(compiled.is_match(&text))
}

fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let delimited = pattern
        .strip_prefix('/')
        .and_then(|rest| rest.rfind('/').map(|end| (&rest[..end], &rest[end + 1..])));

    match delimited {
        Some((body, flags)) => {
            let inline: String = flags.chars().filter(|c| "imsx".contains(*c)).collect();
            if inline.is_empty() {
                Regex::new(body)
            } else {
                Regex::new(&format!("(?{inline}){body}"))
            }
        }
        None => Regex::new(pattern),
    }
}

fn is_date(s: &str) -> bool {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};

    let s = s.trim();
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

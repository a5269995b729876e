//! Violation message templates.

use std::collections::BTreeMap;

/// Custom messages keyed by `"attribute.rule"` or by bare `"rule"`.
///
/// An attribute-specific key wins over a rule-wide one.
pub type Messages = BTreeMap<String, String>;

/// Source of default message templates.
///
/// Templates may contain `:attribute` and rule-specific placeholders such as
/// `:min`, `:max`, `:size`, `:values` and `:other`.
pub trait Translator: std::fmt::Debug + Send + Sync {
    fn template(&self, rule: &str) -> Option<String>;
}

/// Built-in English templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishTranslator;

impl Translator for EnglishTranslator {
    fn template(&self, rule: &str) -> Option<String> {
        let template = match rule {
            "required" => "The :attribute field is required.",
            "present" => "The :attribute field must be present.",
            "filled" => "The :attribute field must have a value.",
            "string" => "The :attribute must be a string.",
            "numeric" => "The :attribute must be a number.",
            "integer" => "The :attribute must be an integer.",
            "boolean" => "The :attribute field must be true or false.",
            "array" => "The :attribute must be an array.",
            "email" => "The :attribute must be a valid email address.",
            "url" => "The :attribute format is invalid.",
            "uuid" => "The :attribute must be a valid UUID.",
            "alpha" => "The :attribute may only contain letters.",
            "alpha_num" => "The :attribute may only contain letters and numbers.",
            "alpha_dash" => {
                "The :attribute may only contain letters, numbers, dashes and underscores."
            }
            "min" => "The :attribute must be at least :min.",
            "max" => "The :attribute may not be greater than :max.",
            "between" => "The :attribute must be between :min and :max.",
            "size" => "The :attribute must be :size.",
            "in" | "ini" => "The selected :attribute is invalid.",
            "not_in" => "The selected :attribute is invalid.",
            "regex" | "not_regex" => "The :attribute format is invalid.",
            "date" => "The :attribute is not a valid date.",
            "confirmed" => "The :attribute confirmation does not match.",
            "same" => "The :attribute and :other must match.",
            "different" => "The :attribute and :other must be different.",
            "unique" => "The :attribute has already been taken.",
            "exists" => "The selected :attribute is invalid.",
            _ => return None,
        };
        Some(template.to_string())
    }
}

/// Human-readable attribute name: `first_name` becomes `first name`.
pub fn display_attribute(attribute: &str) -> String {
    attribute.replace('_', " ")
}

/// Substitute `:placeholder` tokens.
///
/// Longer placeholders are replaced first so `:attribute` is never clobbered
/// by a shorter token sharing its prefix.
pub fn fill(template: &str, replacements: &[(&str, String)]) -> String {
    let mut ordered: Vec<&(&str, String)> = replacements.iter().collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut message = template.to_string();
    for (placeholder, value) in ordered {
        message = message.replace(&format!(":{placeholder}"), value);
    }
    message
}

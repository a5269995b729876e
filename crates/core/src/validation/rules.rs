//! Rule expressions, rule tables and violation types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Attributes;

/// Marker identifying a database uniqueness rule inside a rule list.
pub const UNIQUE_MARKER: &str = "unique:";

/// The rules declared for one attribute.
///
/// Either a pipe-delimited string (`"required|unique:users"`) or an ordered
/// list of rule strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSpec {
    Pipe(String),
    List(Vec<String>),
}

impl RuleSpec {
    /// Normalise to an ordered list, splitting a pipe-delimited string.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            RuleSpec::Pipe(s) => s.split('|').map(str::to_string).collect(),
            RuleSpec::List(rules) => rules.clone(),
        }
    }

    /// Parsed rules, skipping blank segments.
    pub fn parsed(&self) -> Vec<Rule> {
        self.to_list()
            .iter()
            .filter(|rule| !rule.trim().is_empty())
            .map(|rule| Rule::parse(rule))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RuleSpec::Pipe(s) => s.trim().is_empty(),
            RuleSpec::List(rules) => rules.iter().all(|rule| rule.trim().is_empty()),
        }
    }
}

impl From<&str> for RuleSpec {
    fn from(value: &str) -> Self {
        RuleSpec::Pipe(value.to_string())
    }
}

impl From<String> for RuleSpec {
    fn from(value: String) -> Self {
        RuleSpec::Pipe(value)
    }
}

impl From<Vec<String>> for RuleSpec {
    fn from(value: Vec<String>) -> Self {
        RuleSpec::List(value)
    }
}

impl From<Vec<&str>> for RuleSpec {
    fn from(value: Vec<&str>) -> Self {
        RuleSpec::List(value.into_iter().map(str::to_string).collect())
    }
}

/// Mapping from attribute name to its rules.
///
/// Empty entries are discarded on construction and insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, RuleSpec>",
    into = "BTreeMap<String, RuleSpec>"
)]
pub struct RuleTable {
    rules: BTreeMap<String, RuleSpec>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the rules of `attribute`. Empty rule sets are ignored.
    pub fn insert(&mut self, attribute: impl Into<String>, spec: impl Into<RuleSpec>) {
        let spec = spec.into();
        if spec.is_empty() {
            return;
        }
        self.rules.insert(attribute.into(), spec);
    }

    /// Builder form of [`RuleTable::insert`].
    pub fn with(mut self, attribute: impl Into<String>, spec: impl Into<RuleSpec>) -> Self {
        self.insert(attribute, spec);
        self
    }

    pub fn get(&self, attribute: &str) -> Option<&RuleSpec> {
        self.rules.get(attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RuleSpec)> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<BTreeMap<String, RuleSpec>> for RuleTable {
    fn from(rules: BTreeMap<String, RuleSpec>) -> Self {
        rules.into_iter().collect()
    }
}

impl From<RuleTable> for BTreeMap<String, RuleSpec> {
    fn from(table: RuleTable) -> Self {
        table.rules
    }
}

impl<K: Into<String>, V: Into<RuleSpec>> FromIterator<(K, V)> for RuleTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = RuleTable::new();
        for (attribute, spec) in iter {
            table.insert(attribute, spec);
        }
        table
    }
}

/// Derive the rule table used for one save.
///
/// Every rule containing `unique:` is dropped from columns that are not in
/// `dirty`, so an unchanged stored value is never checked against itself.
/// Columns whose rules are all dropped keep an empty list so the table still
/// reflects every declared column.
pub fn prune_unique_rules(rules: &RuleTable, dirty: &Attributes) -> RuleTable {
    let mut pruned = BTreeMap::new();

    for (column, spec) in rules.iter() {
        if dirty.contains_key(column.as_str()) {
            pruned.insert(column.clone(), spec.clone());
            continue;
        }

        let list = spec.to_list();
        if !list.iter().any(|rule| rule.contains(UNIQUE_MARKER)) {
            pruned.insert(column.clone(), spec.clone());
            continue;
        }

        let kept: Vec<String> = list
            .into_iter()
            .filter(|rule| !rule.contains(UNIQUE_MARKER))
            .collect();
        tracing::debug!(column = %column, "Skipping unique rule for clean attribute");
        pruned.insert(column.clone(), RuleSpec::List(kept));
    }

    RuleTable { rules: pruned }
}

/// A single parsed rule such as `between:1,10`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub parameters: Vec<String>,
}

impl Rule {
    /// Parse `name[:param1,param2,...]`.
    ///
    /// Pattern rules keep their parameter whole since regular expressions
    /// commonly contain commas.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (name, params) = match raw.split_once(':') {
            Some((name, params)) => (name.trim().to_lowercase(), Some(params)),
            None => (raw.to_lowercase(), None),
        };

        let parameters = match params {
            None => Vec::new(),
            Some(p) if matches!(name.as_str(), "regex" | "not_regex") => vec![p.to_string()],
            Some(p) => p.split(',').map(|s| s.trim().to_string()).collect(),
        };

        Self { name, parameters }
    }

    pub fn parameter(&self, index: usize) -> Option<&str> {
        self.parameters
            .get(index)
            .map(String::as_str)
            .filter(|p| !p.is_empty())
    }
}

/// A single field-level rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub rule: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::Comparison;
    use serde_json::json;

    fn dirty(value: serde_json::Value) -> Attributes {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn empty_entries_are_discarded() {
        let table = RuleTable::new()
            .with("name", "required")
            .with("nickname", "")
            .with("tags", Vec::<String>::new())
            .with("bio", vec!["", " "]);

        assert_eq!(table.len(), 1);
        assert!(table.get("name").is_some());
    }

    #[test]
    fn deserializes_both_shapes_and_drops_empties() {
        let table: RuleTable = serde_json::from_value(json!({
            "email": "required|email",
            "role": ["required", "ini:admin,user"],
            "notes": ""
        }))
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get("role").unwrap().to_list(),
            vec!["required", "ini:admin,user"]
        );
    }

    #[test]
    fn pipe_string_splits_in_order() {
        let spec = RuleSpec::from("required|unique:users|max:255");
        assert_eq!(spec.to_list(), vec!["required", "unique:users", "max:255"]);
    }

    #[test]
    fn unique_rule_removed_when_column_clean() {
        let rules = RuleTable::new().with("email", "required|unique:users");
        let pruned = prune_unique_rules(&rules, &dirty(json!({})));

        assert_eq!(pruned.get("email").unwrap().to_list(), vec!["required"]);
        // The declared table is left untouched.
        assert_eq!(
            rules.get("email").unwrap().to_list(),
            vec!["required", "unique:users"]
        );
    }

    #[test]
    fn unique_rule_kept_when_column_dirty() {
        let rules = RuleTable::new().with("email", "required|unique:users");
        let pruned = prune_unique_rules(&rules, &dirty(json!({"email": "new@example.com"})));

        assert_eq!(
            pruned.get("email").unwrap().to_list(),
            vec!["required", "unique:users"]
        );
    }

    #[test]
    fn changed_large_integer_keeps_unique_rule() {
        let rules = RuleTable::new().with("external_id", "required|unique:accounts");
        let current = dirty(json!({"external_id": 9007199254740993_i64}));
        let original = dirty(json!({"external_id": "9007199254740992"}));
        let changed = crate::dirty::get_dirty(&current, &original, Comparison::Loose);

        let pruned = prune_unique_rules(&rules, &changed);
        assert_eq!(
            pruned.get("external_id").unwrap().to_list(),
            vec!["required", "unique:accounts"]
        );
    }

    #[test]
    fn pruning_ignores_columns_without_unique() {
        let rules = RuleTable::new().with("name", "required|max:10");
        let pruned = prune_unique_rules(&rules, &dirty(json!({})));
        assert_eq!(pruned, rules);
    }

    #[test]
    fn parse_rule_with_parameters() {
        let rule = Rule::parse("between:1, 10");
        assert_eq!(rule.name, "between");
        assert_eq!(rule.parameters, vec!["1", "10"]);
    }

    #[test]
    fn parse_rule_without_parameters() {
        let rule = Rule::parse(" Required ");
        assert_eq!(rule.name, "required");
        assert!(rule.parameters.is_empty());
    }

    #[test]
    fn regex_parameter_is_not_split() {
        let rule = Rule::parse("regex:^[a-z]{1,3}$");
        assert_eq!(rule.parameters, vec!["^[a-z]{1,3}$"]);
    }
}

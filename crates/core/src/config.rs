use crate::scope::{DEFAULT_RANGE_DELIMITER, DEFAULT_SORT_COLUMN, DEFAULT_SORT_DELIMITER};

/// Scope defaults loaded from environment variables.
///
/// All fields fall back to the built-in delimiters, so an application that
/// sets nothing behaves like `"1 ~ 10"` / `"column:desc"` input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReinforceConfig {
    /// Separator between the two bounds of a range (default: `~`).
    pub range_delimiter: String,
    /// Separator between column and direction of a sort (default: `:`).
    pub sort_delimiter: String,
    /// Column ordered by when no sort input is given (default: `id`).
    pub default_sort_column: String,
}

impl ReinforceConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default |
    /// |----------------------------------|---------|
    /// | `REINFORCE_RANGE_DELIMITER`      | `~`     |
    /// | `REINFORCE_SORT_DELIMITER`       | `:`     |
    /// | `REINFORCE_DEFAULT_SORT_COLUMN`  | `id`    |
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from any variable source, e.g. a parsed file.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str, default: &str| non_empty(lookup(name), default);
        Self {
            range_delimiter: var("REINFORCE_RANGE_DELIMITER", DEFAULT_RANGE_DELIMITER),
            sort_delimiter: var("REINFORCE_SORT_DELIMITER", DEFAULT_SORT_DELIMITER),
            default_sort_column: var("REINFORCE_DEFAULT_SORT_COLUMN", DEFAULT_SORT_COLUMN),
        }
    }

    /// Like [`from_env`](Self::from_env), reading a `.env` file first if one exists.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }
}

impl Default for ReinforceConfig {
    fn default() -> Self {
        Self {
            range_delimiter: DEFAULT_RANGE_DELIMITER.into(),
            sort_delimiter: DEFAULT_SORT_DELIMITER.into(),
            default_sort_column: DEFAULT_SORT_COLUMN.into(),
        }
    }
}

// An empty delimiter would split every character apart.
fn non_empty(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.into())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_scope_constants() {
        let config = ReinforceConfig::default();
        assert_eq!(config.range_delimiter, "~");
        assert_eq!(config.sort_delimiter, ":");
        assert_eq!(config.default_sort_column, "id");
    }

    #[test]
    fn empty_values_fall_back() {
        let vars = HashMap::from([("REINFORCE_SORT_DELIMITER", "")]);
        let config = ReinforceConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config, ReinforceConfig::default());
    }

    #[test]
    fn variables_override_defaults() {
        let vars = HashMap::from([
            ("REINFORCE_RANGE_DELIMITER", ".."),
            ("REINFORCE_DEFAULT_SORT_COLUMN", "created_at"),
        ]);
        let config = ReinforceConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.range_delimiter, "..");
        assert_eq!(config.sort_delimiter, ":");
        assert_eq!(config.default_sort_column, "created_at");
    }

    #[test]
    fn from_env_reads_process_environment() {
        let config = ReinforceConfig::from_env();
        let expected = std::env::var("REINFORCE_RANGE_DELIMITER")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "~".into());
        assert_eq!(config.range_delimiter, expected);
    }
}

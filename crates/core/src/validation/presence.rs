//! Storage lookups backing the `unique` and `exists` rules.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CoreError;

/// A row to leave out of a uniqueness count, usually the record being
/// updated (`unique:users,email,42` or `unique:users,email,42,user_id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub id: String,
    pub column: String,
}

impl Exclusion {
    /// Build an exclusion from rule parameters, treating `NULL` as absent.
    pub fn from_parameters(id: Option<&str>, column: Option<&str>) -> Option<Self> {
        let id = id.filter(|id| !id.eq_ignore_ascii_case("null"))?;
        Some(Self {
            id: id.to_string(),
            column: column.unwrap_or("id").to_string(),
        })
    }
}

/// Counts matching rows in backing storage.
#[async_trait]
pub trait PresenceVerifier: std::fmt::Debug + Send + Sync {
    async fn count(
        &self,
        table: &str,
        column: &str,
        value: &Value,
        exclude: Option<&Exclusion>,
    ) -> Result<u64, CoreError>;
}

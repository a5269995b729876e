//! Database lookups for the `unique` and `exists` rules.

use async_trait::async_trait;
use reinforce_core::error::CoreError;
use reinforce_core::validation::evaluator::scalar_text;
use reinforce_core::validation::presence::{Exclusion, PresenceVerifier};
use serde_json::Value;
use sqlx::PgPool;

use crate::select::quote_ident;

/// Counts rows with `sqlx`.
///
/// Columns are compared as text, so the rule value matches regardless of
/// the column's type.
#[derive(Debug, Clone)]
pub struct PgPresenceVerifier {
    pool: PgPool,
}

impl PgPresenceVerifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `SELECT COUNT(*)` for `column = $1`, optionally excluding `$2`.
pub fn count_sql(table: &str, column: &str, exclude: Option<&Exclusion>) -> String {
    let mut sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {}::text = $1",
        quote_ident(table),
        quote_ident(column)
    );
    if let Some(exclusion) = exclude {
        sql.push_str(&format!(" AND {}::text <> $2", quote_ident(&exclusion.column)));
    }
    sql
}

#[async_trait]
impl PresenceVerifier for PgPresenceVerifier {
    async fn count(
        &self,
        table: &str,
        column: &str,
        value: &Value,
        exclude: Option<&Exclusion>,
    ) -> Result<u64, CoreError> {
        // Nothing equals NULL.
        let Some(value) = scalar_text(value) else {
            return Ok(0);
        };

        let sql = count_sql(table, column, exclude);
        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(value);
        if let Some(exclusion) = exclude {
            query = query.bind(exclusion.id.clone());
        }

        let count = query.fetch_one(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, table, column, "Presence query failed");
            CoreError::Internal(e.to_string())
        })?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_text_comparison() {
        assert_eq!(
            count_sql("users", "email", None),
            r#"SELECT COUNT(*) FROM "users" WHERE "email"::text = $1"#
        );
    }

    #[test]
    fn exclusion_adds_second_parameter() {
        let exclusion = Exclusion::from_parameters(Some("42"), Some("user_id")).unwrap();
        assert_eq!(
            count_sql("users", "email", Some(&exclusion)),
            r#"SELECT COUNT(*) FROM "users" WHERE "email"::text = $1 AND "user_id"::text <> $2"#
        );
    }
}

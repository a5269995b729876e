//! Insert/update of `Elegant` records.
//!
//! Attribute maps are sent as a single JSONB parameter and expanded with
//! `jsonb_populate_record`, so PostgreSQL casts every value to its column
//! type.

use async_trait::async_trait;
use chrono::Utc;
use reinforce_core::model::{Elegant, Model, Persister, SaveOptions};
use reinforce_core::types::Attributes;
use serde_json::Value;
use sqlx::PgPool;

use crate::select::quote_ident;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("{model} has no primary key value to update")]
    MissingKey { model: &'static str },
}

/// Writes records to the table named by their model.
#[derive(Debug, Clone)]
pub struct PgPersister {
    pool: PgPool,
}

impl PgPersister {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert<M: Model>(
        &self,
        entity: &mut Elegant<M>,
        options: SaveOptions,
    ) -> Result<bool, PersistError> {
        if M::TIMESTAMPS && options.touch {
            let now = timestamp();
            if entity.get("created_at").map_or(true, Value::is_null) {
                entity.set("created_at", now.clone());
            }
            entity.set("updated_at", now);
        }

        let payload: Attributes = entity
            .attributes()
            .iter()
            .filter(|(column, value)| !(column.as_str() == M::PRIMARY_KEY && value.is_null()))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect();
        let columns: Vec<&str> = payload.keys().map(String::as_str).collect();
        let sql = insert_sql(M::TABLE, &columns, M::PRIMARY_KEY);

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        if !columns.is_empty() {
            query = query.bind(Value::Object(payload.clone()));
        }
        let id = query.fetch_one(&self.pool).await?;

        entity.set(M::PRIMARY_KEY, id);
        tracing::debug!(table = M::TABLE, id, "Inserted record");
        Ok(true)
    }

    async fn update<M: Model>(
        &self,
        entity: &mut Elegant<M>,
        options: SaveOptions,
    ) -> Result<bool, PersistError> {
        let mut changes = entity.get_dirty(false);
        changes.remove(M::PRIMARY_KEY);
        if changes.is_empty() {
            return Ok(true);
        }

        let key = entity
            .original()
            .get(M::PRIMARY_KEY)
            .and_then(Value::as_i64)
            .or_else(|| entity.key())
            .ok_or(PersistError::MissingKey { model: M::NAME })?;

        if M::TIMESTAMPS && options.touch {
            let now = timestamp();
            entity.set("updated_at", now.clone());
            changes.insert("updated_at".into(), now);
        }

        let columns: Vec<&str> = changes.keys().map(String::as_str).collect();
        let sql = update_sql(M::TABLE, &columns, M::PRIMARY_KEY);

        let result = sqlx::query(&sql)
            .bind(Value::Object(changes.clone()))
            .bind(key)
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            table = M::TABLE,
            id = key,
            columns = columns.len(),
            "Updated record"
        );
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Persister for PgPersister {
    type Error = PersistError;

    async fn save<M: Model>(
        &self,
        entity: &mut Elegant<M>,
        options: SaveOptions,
    ) -> Result<bool, PersistError> {
        if entity.exists() {
            self.update(entity, options).await
        } else {
            self.insert(entity, options).await
        }
    }
}

fn timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `INSERT` taking its values from JSONB parameter `$1`.
pub fn insert_sql(table: &str, columns: &[&str], primary_key: &str) -> String {
    let table = quote_ident(table);
    let returning = quote_ident(primary_key);
    if columns.is_empty() {
        return format!("INSERT INTO {table} DEFAULT VALUES RETURNING {returning}");
    }
    let columns = column_list(columns);
    format!(
        "INSERT INTO {table} ({columns}) \
         SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) \
         RETURNING {returning}"
    )
}

/// `UPDATE` of `columns` from JSONB `$1` for the row whose key is `$2`.
pub fn update_sql(table: &str, columns: &[&str], primary_key: &str) -> String {
    let table = quote_ident(table);
    let key = quote_ident(primary_key);
    let columns = column_list(columns);
    format!(
        "UPDATE {table} SET ({columns}) = \
         (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)) \
         WHERE {key} = $2"
    )
}

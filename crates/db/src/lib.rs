//! PostgreSQL collaborators for `reinforce-core`.
//!
//! - [`Select`] implements the scope query-builder contract.
//! - [`PgRelations`] builds relation queries for a record.
//! - [`PgPersister`] inserts and updates records.
//! - [`PgPresenceVerifier`] backs the `unique` and `exists` rules.

pub mod persist;
pub mod presence;
pub mod relations;
pub mod select;

pub use persist::{PersistError, PgPersister};
pub use presence::PgPresenceVerifier;
pub use relations::PgRelations;
pub use select::{Bind, Select};

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

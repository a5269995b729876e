/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Attribute snapshot of an entity, keyed by column name.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

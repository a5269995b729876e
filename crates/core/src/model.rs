//! The `Elegant` entity: attributes with dirty tracking, declared relations
//! and a validation gate in front of persistence.

use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

use crate::compare::Comparison;
use crate::dirty;
use crate::error::{CoreError, SaveError, ValidationFailed};
use crate::relation::{Relation, RelationBuilder, RelationTable};
use crate::types::{Attributes, DbId};
use crate::validation::{prune_unique_rules, RuleTable, ValidatorFactory};

/// Static definition of a model: naming, validation rules and relations.
///
/// ```
/// use reinforce_core::model::Model;
/// use reinforce_core::relation::RelationTable;
/// use reinforce_core::validation::RuleTable;
///
/// struct User;
///
/// impl Model for User {
///     const NAME: &'static str = "User";
///     const TABLE: &'static str = "users";
///
///     fn rules() -> RuleTable {
///         RuleTable::new()
///             .with("email", "required|email|unique:users")
///             .with("role", "ini:admin,user")
///     }
///
///     fn relationships() -> RelationTable {
///         RelationTable::new().with("posts", "hasMany", ["posts"])
///     }
/// }
/// ```
pub trait Model: Send + Sync + 'static {
    const NAME: &'static str;
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str = "id";
    /// Whether `created_at` / `updated_at` are maintained on save.
    const TIMESTAMPS: bool = false;

    fn rules() -> RuleTable {
        RuleTable::new()
    }

    fn relationships() -> RelationTable {
        RelationTable::new()
    }
}

/// Options forwarded to the persister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Refresh timestamp columns on models that keep them.
    pub touch: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { touch: true }
    }
}

/// Writes an entity to storage.
#[async_trait]
pub trait Persister: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert or update `entity`. Implementations that insert should store
    /// the generated primary key back on the entity.
    ///
    /// Returns `false` when the storage layer declined the write.
    async fn save<M: Model>(
        &self,
        entity: &mut Elegant<M>,
        options: SaveOptions,
    ) -> Result<bool, Self::Error>;
}

/// One record of model `M`.
pub struct Elegant<M: Model> {
    attributes: Attributes,
    original: Attributes,
    rules: RuleTable,
    relationships: RelationTable,
    exists: bool,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Elegant<M> {
    /// A new, unsaved record with the model's declared rules and relations.
    pub fn new() -> Self {
        Self {
            attributes: Attributes::new(),
            original: Attributes::new(),
            rules: M::rules(),
            relationships: M::relationships(),
            exists: false,
            _model: PhantomData,
        }
    }

    /// A new, unsaved record holding `attributes`.
    pub fn from_attributes(attributes: Attributes) -> Self {
        let mut entity = Self::new();
        entity.attributes = attributes;
        entity
    }

    /// A record loaded from storage: current and original snapshots agree.
    pub fn retrieved(attributes: Attributes) -> Self {
        let mut entity = Self::new();
        entity.original = attributes.clone();
        entity.attributes = attributes;
        entity.exists = true;
        entity
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(attribute.into(), value.into());
    }

    /// Set many attributes at once.
    pub fn fill(&mut self, attributes: Attributes) {
        self.attributes.extend(attributes);
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn original(&self) -> &Attributes {
        &self.original
    }

    /// Make the current attributes the new baseline for dirty tracking.
    pub fn sync_original(&mut self) {
        self.original = self.attributes.clone();
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Primary key as a database id, if set and integral.
    pub fn key(&self) -> Option<DbId> {
        match self.attributes.get(M::PRIMARY_KEY)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Replace this record's rules.
    pub fn set_rules(&mut self, rules: RuleTable) {
        self.rules = rules;
    }

    pub fn relationships(&self) -> &RelationTable {
        &self.relationships
    }

    /// Attributes changed since the original snapshot.
    ///
    /// With `insensitive`, values are compared loosely so `"1"` and `1` (or
    /// `"1.0"` and `"1"`) count as unchanged.
    pub fn get_dirty(&self, insensitive: bool) -> Attributes {
        dirty::get_dirty(
            &self.attributes,
            &self.original,
            Comparison::from_insensitive(insensitive),
        )
    }

    pub fn is_dirty(&self, attribute: &str, insensitive: bool) -> bool {
        dirty::is_dirty(
            attribute,
            &self.attributes,
            &self.original,
            Comparison::from_insensitive(insensitive),
        )
    }

    pub fn is_clean(&self, attribute: &str, insensitive: bool) -> bool {
        !self.is_dirty(attribute, insensitive)
    }

    /// Names of the declared relations.
    pub fn relations_key(&self) -> Vec<String> {
        self.relationships.names()
    }

    pub fn relation(&self, name: &str) -> Result<Option<Relation>, CoreError> {
        self.relationships.resolve(name)
    }

    /// Build the relation declared under `name`.
    ///
    /// Names missing from the relationship table go to
    /// [`RelationBuilder::call_undeclared`].
    pub fn call<B>(&self, name: &str, builder: &B) -> Result<B::Relation, CoreError>
    where
        B: RelationBuilder + ?Sized,
    {
        match self.relation(name)? {
            Some(relation) => {
                tracing::debug!(
                    model = M::NAME,
                    relation = name,
                    kind = %relation.kind(),
                    "Dispatching relation"
                );
                relation.build(builder)
            }
            None => builder.call_undeclared(M::NAME, name),
        }
    }

    /// Check the record against its rules.
    ///
    /// `unique` rules only run for attributes that changed (compared
    /// loosely); the record's own table is never modified.
    pub async fn validate(&self, factory: &ValidatorFactory) -> Result<(), ValidationFailed> {
        let dirty = self.get_dirty(true);
        let rules = prune_unique_rules(&self.rules, &dirty);

        let mut validator = factory.make(&self.attributes, &rules);
        if validator.fails().await {
            tracing::debug!(
                model = M::NAME,
                violations = validator.errors().len(),
                "Validation failed"
            );
            return Err(ValidationFailed::new(M::NAME, validator));
        }
        Ok(())
    }

    /// Validate, then hand the record to `persister`.
    ///
    /// Nothing is written when validation fails. After a successful write the
    /// record is marked as existing and its original snapshot is synced.
    pub async fn save<P>(
        &mut self,
        factory: &ValidatorFactory,
        persister: &P,
        options: SaveOptions,
    ) -> Result<bool, SaveError<P::Error>>
    where
        P: Persister + ?Sized,
    {
        self.validate(factory).await?;

        let saved = persister
            .save(self, options)
            .await
            .map_err(SaveError::Persist)?;

        if saved {
            self.exists = true;
            self.sync_original();
        }
        Ok(saved)
    }
}

impl<M: Model> Default for Elegant<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Clone for Elegant<M> {
    fn clone(&self) -> Self {
        Self {
            attributes: self.attributes.clone(),
            original: self.original.clone(),
            rules: self.rules.clone(),
            relationships: self.relationships.clone(),
            exists: self.exists,
            _model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for Elegant<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(M::NAME)
            .field("attributes", &self.attributes)
            .field("exists", &self.exists)
            .finish_non_exhaustive()
    }
}

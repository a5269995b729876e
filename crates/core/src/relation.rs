//! Declarative relationships.
//!
//! A model declares its relations as data: a table mapping a method name to
//! a relation kind and a positional argument list. Resolving a name turns the
//! entry into a typed [`Relation`] which is then built by a
//! [`RelationBuilder`] supplied by the storage layer.
//!
//! ```
//! use reinforce_core::relation::{Relation, RelationTable};
//!
//! let table = RelationTable::new()
//!     .with("author", "belongsTo", ["users", "author_id"])
//!     .with("comments", "hasMany", ["comments"]);
//!
//! let author = table.resolve("author").unwrap().unwrap();
//! assert!(matches!(author, Relation::BelongsTo { .. }));
//! assert_eq!(table.names(), vec!["author", "comments"]);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The ways two models can be associated.
///
/// Only these kinds are dispatchable; `morphMany` is deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    HasOne,
    HasMany,
    BelongsTo,
    BelongsToMany,
    MorphTo,
    MorphOne,
}

impl RelationKind {
    pub const ALL: [RelationKind; 6] = [
        RelationKind::HasOne,
        RelationKind::HasMany,
        RelationKind::BelongsTo,
        RelationKind::BelongsToMany,
        RelationKind::MorphTo,
        RelationKind::MorphOne,
    ];

    /// The constant used in relation tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::HasOne => "hasOne",
            RelationKind::HasMany => "hasMany",
            RelationKind::BelongsTo => "belongsTo",
            RelationKind::BelongsToMany => "belongsToMany",
            RelationKind::MorphTo => "morphTo",
            RelationKind::MorphOne => "morphOne",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when text names no dispatchable relation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRelationKind(pub String);

impl FromStr for RelationKind {
    type Err = UnknownRelationKind;

    /// Accepts the camel-case constant (`hasOne`) or snake case (`has_one`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "hasOne" | "has_one" => Ok(RelationKind::HasOne),
            "hasMany" | "has_many" => Ok(RelationKind::HasMany),
            "belongsTo" | "belongs_to" => Ok(RelationKind::BelongsTo),
            "belongsToMany" | "belongs_to_many" => Ok(RelationKind::BelongsToMany),
            "morphTo" | "morph_to" => Ok(RelationKind::MorphTo),
            "morphOne" | "morph_one" => Ok(RelationKind::MorphOne),
            other => Err(UnknownRelationKind(other.to_string())),
        }
    }
}

/// One row of a relationship table: the raw kind and its arguments.
///
/// The kind stays as text so tables loaded from configuration can be stored
/// as-is; it is checked when the relation is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEntry {
    pub kind: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl RelationEntry {
    pub fn new<I, S>(kind: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: kind.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn arg(&self, index: usize) -> Option<String> {
        self.args
            .get(index)
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string)
    }
}

/// Relationship table keyed by virtual method name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationTable {
    entries: BTreeMap<String, RelationEntry>,
}

impl RelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: impl Into<String>, entry: RelationEntry) {
        self.entries.insert(method.into(), entry);
    }

    /// Builder form: `.with("author", "belongsTo", ["users", "author_id"])`.
    pub fn with<I, S>(mut self, method: impl Into<String>, kind: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(method, RelationEntry::new(kind, args));
        self
    }

    pub fn get(&self, method: &str) -> Option<&RelationEntry> {
        self.entries.get(method)
    }

    pub fn contains(&self, method: &str) -> bool {
        self.entries.contains_key(method)
    }

    /// Declared relation names.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a declared relation.
    ///
    /// `Ok(None)` when `method` is not declared; an error when the entry's
    /// kind is not dispatchable or a required argument is missing.
    pub fn resolve(&self, method: &str) -> Result<Option<Relation>, CoreError> {
        self.entries
            .get(method)
            .map(|entry| Relation::from_entry(method, entry))
            .transpose()
    }
}

/// A resolved relation with its arguments in named form.
///
/// Optional keys are left to the relation builder's naming conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    HasOne {
        related: String,
        foreign_key: Option<String>,
        local_key: Option<String>,
    },
    HasMany {
        related: String,
        foreign_key: Option<String>,
        local_key: Option<String>,
    },
    BelongsTo {
        relation: String,
        related: String,
        foreign_key: Option<String>,
        other_key: Option<String>,
    },
    BelongsToMany {
        related: String,
        table: Option<String>,
        foreign_key: Option<String>,
        other_key: Option<String>,
    },
    MorphTo {
        name: String,
        type_column: Option<String>,
        id_column: Option<String>,
    },
    MorphOne {
        related: String,
        name: String,
        type_column: Option<String>,
        id_column: Option<String>,
    },
}

impl Relation {
    /// Interpret a table entry declared under `method`.
    pub fn from_entry(method: &str, entry: &RelationEntry) -> Result<Self, CoreError> {
        let kind: RelationKind = entry.kind.parse().map_err(|UnknownRelationKind(kind)| {
            CoreError::InvalidRelation {
                method: method.to_string(),
                kind,
            }
        })?;

        let required = |index: usize, argument: &'static str| {
            entry
                .arg(index)
                .ok_or_else(|| CoreError::MissingRelationArgument {
                    method: method.to_string(),
                    argument,
                })
        };

        let relation = match kind {
            RelationKind::HasOne => Relation::HasOne {
                related: required(0, "related")?,
                foreign_key: entry.arg(1),
                local_key: entry.arg(2),
            },
            RelationKind::HasMany => Relation::HasMany {
                related: required(0, "related")?,
                foreign_key: entry.arg(1),
                local_key: entry.arg(2),
            },
            RelationKind::BelongsTo => Relation::BelongsTo {
                relation: method.to_string(),
                related: required(0, "related")?,
                foreign_key: entry.arg(1),
                other_key: entry.arg(2),
            },
            RelationKind::BelongsToMany => Relation::BelongsToMany {
                related: required(0, "related")?,
                table: entry.arg(1),
                foreign_key: entry.arg(2),
                other_key: entry.arg(3),
            },
            RelationKind::MorphTo => Relation::MorphTo {
                name: entry.arg(0).unwrap_or_else(|| method.to_string()),
                type_column: entry.arg(1),
                id_column: entry.arg(2),
            },
            RelationKind::MorphOne => Relation::MorphOne {
                related: required(0, "related")?,
                name: required(1, "name")?,
                type_column: entry.arg(2),
                id_column: entry.arg(3),
            },
        };
        Ok(relation)
    }

    pub fn kind(&self) -> RelationKind {
        match self {
            Relation::HasOne { .. } => RelationKind::HasOne,
            Relation::HasMany { .. } => RelationKind::HasMany,
            Relation::BelongsTo { .. } => RelationKind::BelongsTo,
            Relation::BelongsToMany { .. } => RelationKind::BelongsToMany,
            Relation::MorphTo { .. } => RelationKind::MorphTo,
            Relation::MorphOne { .. } => RelationKind::MorphOne,
        }
    }

    /// Invoke the builder method matching this relation's kind.
    pub fn build<B: RelationBuilder + ?Sized>(&self, builder: &B) -> Result<B::Relation, CoreError> {
        match self {
            Relation::HasOne {
                related,
                foreign_key,
                local_key,
            } => builder.has_one(related, foreign_key.as_deref(), local_key.as_deref()),
            Relation::HasMany {
                related,
                foreign_key,
                local_key,
            } => builder.has_many(related, foreign_key.as_deref(), local_key.as_deref()),
            Relation::BelongsTo {
                relation,
                related,
                foreign_key,
                other_key,
            } => builder.belongs_to(
                relation,
                related,
                foreign_key.as_deref(),
                other_key.as_deref(),
            ),
            Relation::BelongsToMany {
                related,
                table,
                foreign_key,
                other_key,
            } => builder.belongs_to_many(
                related,
                table.as_deref(),
                foreign_key.as_deref(),
                other_key.as_deref(),
            ),
            Relation::MorphTo {
                name,
                type_column,
                id_column,
            } => builder.morph_to(name, type_column.as_deref(), id_column.as_deref()),
            Relation::MorphOne {
                related,
                name,
                type_column,
                id_column,
            } => builder.morph_one(
                related,
                name,
                type_column.as_deref(),
                id_column.as_deref(),
            ),
        }
    }
}

/// Relationship constructors provided by the storage layer, one per kind.
pub trait RelationBuilder {
    type Relation;

    fn has_one(
        &self,
        related: &str,
        foreign_key: Option<&str>,
        local_key: Option<&str>,
    ) -> Result<Self::Relation, CoreError>;

    fn has_many(
        &self,
        related: &str,
        foreign_key: Option<&str>,
        local_key: Option<&str>,
    ) -> Result<Self::Relation, CoreError>;

    fn belongs_to(
        &self,
        relation: &str,
        related: &str,
        foreign_key: Option<&str>,
        other_key: Option<&str>,
    ) -> Result<Self::Relation, CoreError>;

    fn belongs_to_many(
        &self,
        related: &str,
        table: Option<&str>,
        foreign_key: Option<&str>,
        other_key: Option<&str>,
    ) -> Result<Self::Relation, CoreError>;

    fn morph_to(
        &self,
        name: &str,
        type_column: Option<&str>,
        id_column: Option<&str>,
    ) -> Result<Self::Relation, CoreError>;

    fn morph_one(
        &self,
        related: &str,
        name: &str,
        type_column: Option<&str>,
        id_column: Option<&str>,
    ) -> Result<Self::Relation, CoreError>;

    /// Fallback for method names missing from the relationship table.
    fn call_undeclared(
        &self,
        model: &'static str,
        method: &str,
    ) -> Result<Self::Relation, CoreError> {
        Err(CoreError::UndefinedMethod {
            model,
            method: method.to_string(),
        })
    }
}

/// Naming helper: `BlogPost` becomes `blog_post`.
pub fn snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

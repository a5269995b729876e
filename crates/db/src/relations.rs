//! Relation queries for PostgreSQL.
//!
//! [`PgRelations`] turns a record's declared relations into [`Select`]s
//! using the usual key conventions:
//!
//! | Relation        | Default keys                                            |
//! |-----------------|---------------------------------------------------------|
//! | `hasOne/Many`   | `<model>_id` on the related table, parent primary key   |
//! | `belongsTo`     | `<relation>_id` on the parent, `id` on the related table|
//! | `belongsToMany` | pivot `<a>_<b>` (alphabetical), `<model>_id`, `<related>_id` |
//! | `morphTo`       | `<name>_type` holds the table, `<name>_id` the key      |
//! | `morphOne`      | `<name>_type` = model name, `<name>_id` = primary key   |

use reinforce_core::error::CoreError;
use reinforce_core::model::{Elegant, Model};
use reinforce_core::relation::{snake_case, RelationBuilder};
use reinforce_core::types::Attributes;
use serde_json::Value;

use crate::select::{Bind, Select};

/// Relation builder bound to one parent record.
#[derive(Debug, Clone, Copy)]
pub struct PgRelations<'a> {
    model: &'static str,
    table: &'static str,
    primary_key: &'static str,
    attributes: &'a Attributes,
}

impl<'a> PgRelations<'a> {
    pub fn new<M: Model>(entity: &'a Elegant<M>) -> Self {
        Self {
            model: M::NAME,
            table: M::TABLE,
            primary_key: M::PRIMARY_KEY,
            attributes: entity.attributes(),
        }
    }

    fn value(&self, column: &str) -> Bind {
        self.attributes
            .get(column)
            .map(Bind::from_json)
            .unwrap_or(Bind::Null)
    }

    /// `<model>_id`, the key children use to point at this record.
    fn owner_key(&self) -> String {
        format!("{}_id", snake_case(self.model))
    }

    fn children(
        &self,
        related: &str,
        foreign_key: Option<&str>,
        local_key: Option<&str>,
    ) -> Select {
        let foreign_key = foreign_key.map_or_else(|| self.owner_key(), str::to_string);
        let local_key = local_key.unwrap_or(self.primary_key);
        Select::new(related).where_eq(
            &format!("{related}.{foreign_key}"),
            self.value(local_key),
        )
    }
}

/// Crude singular form of a table name: `tags` becomes `tag`.
fn singular(table: &str) -> &str {
    table.strip_suffix('s').filter(|s| !s.is_empty()).unwrap_or(table)
}

impl RelationBuilder for PgRelations<'_> {
    type Relation = Select;

    fn has_one(
        &self,
        related: &str,
        foreign_key: Option<&str>,
        local_key: Option<&str>,
    ) -> Result<Select, CoreError> {
        Ok(self.children(related, foreign_key, local_key).limit(1))
    }

    fn has_many(
        &self,
        related: &str,
        foreign_key: Option<&str>,
        local_key: Option<&str>,
    ) -> Result<Select, CoreError> {
        Ok(self.children(related, foreign_key, local_key))
    }

    fn belongs_to(
        &self,
        relation: &str,
        related: &str,
        foreign_key: Option<&str>,
        other_key: Option<&str>,
    ) -> Result<Select, CoreError> {
        let foreign_key =
            foreign_key.map_or_else(|| format!("{}_id", snake_case(relation)), str::to_string);
        let other_key = other_key.unwrap_or("id");
        Ok(Select::new(related)
            .where_eq(&format!("{related}.{other_key}"), self.value(&foreign_key))
            .limit(1))
    }

    fn belongs_to_many(
        &self,
        related: &str,
        table: Option<&str>,
        foreign_key: Option<&str>,
        other_key: Option<&str>,
    ) -> Result<Select, CoreError> {
        let pivot = table.map_or_else(
            || {
                let mut segments = [snake_case(self.model), singular(related).to_string()];
                segments.sort();
                segments.join("_")
            },
            str::to_string,
        );
        let foreign_key = foreign_key.map_or_else(|| self.owner_key(), str::to_string);
        let other_key =
            other_key.map_or_else(|| format!("{}_id", singular(related)), str::to_string);

        Ok(Select::new(related)
            .join(
                &pivot,
                &format!("{pivot}.{other_key}"),
                &format!("{related}.id"),
            )
            .where_eq(
                &format!("{pivot}.{foreign_key}"),
                self.value(self.primary_key),
            ))
    }

    fn morph_to(
        &self,
        name: &str,
        type_column: Option<&str>,
        id_column: Option<&str>,
    ) -> Result<Select, CoreError> {
        let type_column = type_column.map_or_else(|| format!("{name}_type"), str::to_string);
        let id_column = id_column.map_or_else(|| format!("{name}_id"), str::to_string);

        let Some(Value::String(target)) = self.attributes.get(&type_column) else {
            return Err(CoreError::Internal(format!(
                "{} has no `{type_column}` to resolve `{name}`",
                self.model
            )));
        };
        Ok(Select::new(target.as_str())
            .where_eq(&format!("{target}.id"), self.value(&id_column))
            .limit(1))
    }

    fn morph_one(
        &self,
        related: &str,
        name: &str,
        type_column: Option<&str>,
        id_column: Option<&str>,
    ) -> Result<Select, CoreError> {
        let type_column = type_column.map_or_else(|| format!("{name}_type"), str::to_string);
        let id_column = id_column.map_or_else(|| format!("{name}_id"), str::to_string);

        tracing::debug!(related, parent = self.table, "Building morphOne query");
        Ok(Select::new(related)
            .where_eq(
                &format!("{related}.{type_column}"),
                Bind::Text(self.model.to_string()),
            )
            .where_eq(
                &format!("{related}.{id_column}"),
                self.value(self.primary_key),
            )
            .limit(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use reinforce_core::relation::RelationTable;
    use reinforce_core::scope::Scopes;
    use serde_json::json;

    struct BlogPost;

    impl Model for BlogPost {
        const NAME: &'static str = "BlogPost";
        const TABLE: &'static str = "blog_posts";

        fn relationships() -> RelationTable {
            RelationTable::new()
                .with("comments", "hasMany", ["comments"])
                .with("cover", "hasOne", ["images", "post_id"])
                .with("author", "belongsTo", ["users"])
                .with("tags", "belongsToMany", ["tags"])
                .with("subject", "morphTo", Vec::<String>::new())
                .with("thumbnail", "morphOne", ["images", "imageable"])
        }
    }

    fn post() -> Elegant<BlogPost> {
        Elegant::retrieved(
            json!({
                "id": 3,
                "author_id": 9,
                "subject_type": "videos",
                "subject_id": 4
            })
            .as_object()
            .cloned()
            .unwrap(),
        )
    }

    fn sql(name: &str) -> String {
        let post = post();
        post.call(name, &PgRelations::new(&post)).unwrap().sql()
    }

    #[test]
    fn has_many_uses_model_foreign_key() {
        assert_eq!(
            sql("comments"),
            r#"SELECT "comments".* FROM "comments" WHERE "comments"."blog_post_id" = $1"#
        );
    }

    #[test]
    fn has_one_limits_to_one_row() {
        assert_eq!(
            sql("cover"),
            r#"SELECT "images".* FROM "images" WHERE "images"."post_id" = $1 LIMIT $2"#
        );
    }

    #[test]
    fn belongs_to_reads_relation_key() {
        assert_eq!(
            sql("author"),
            r#"SELECT "users".* FROM "users" WHERE "users"."id" = $1 LIMIT $2"#
        );
    }

    #[test]
    fn belongs_to_many_joins_pivot() {
        assert_eq!(
            sql("tags"),
            r#"SELECT "tags".* FROM "tags" INNER JOIN "blog_post_tag" ON "blog_post_tag"."tag_id" = "tags"."id" WHERE "blog_post_tag"."blog_post_id" = $1"#
        );
    }

    #[test]
    fn morph_to_targets_stored_table() {
        assert_eq!(
            sql("subject"),
            r#"SELECT "videos".* FROM "videos" WHERE "videos"."id" = $1 LIMIT $2"#
        );
    }

    #[test]
    fn morph_to_without_type_is_an_error() {
        let post = Elegant::<BlogPost>::new();
        assert_matches!(
            post.call("subject", &PgRelations::new(&post)),
            Err(CoreError::Internal(_))
        );
    }

    #[test]
    fn morph_one_filters_type_and_id() {
        assert_eq!(
            sql("thumbnail"),
            r#"SELECT "images".* FROM "images" WHERE "images"."imageable_type"::text = $1 AND "images"."imageable_id" = $2 LIMIT $3"#
        );
    }

    #[test]
    fn unsaved_record_relation_matches_nothing() {
        let post = Elegant::<BlogPost>::new();
        let sql = post.call("comments", &PgRelations::new(&post)).unwrap().sql();
        assert_eq!(
            sql,
            r#"SELECT "comments".* FROM "comments" WHERE "comments"."blog_post_id" = NULL"#
        );
    }

    #[test]
    fn undeclared_relation_falls_through() {
        let post = post();
        assert_matches!(
            post.call("likes", &PgRelations::new(&post)),
            Err(CoreError::UndefinedMethod { model: "BlogPost", method }) if method == "likes"
        );
    }

    #[test]
    fn relation_queries_accept_scopes() {
        let post = post();
        let sql = post
            .call("comments", &PgRelations::new(&post))
            .unwrap()
            .range("created_at", "2024-01-01 ~ *")
            .sort_by(Some("created_at:desc"))
            .sql();
        assert_eq!(
            sql,
            r#"SELECT "comments".* FROM "comments" WHERE "comments"."blog_post_id" = $1 AND "created_at" >= $2 ORDER BY "created_at" DESC"#
        );
    }
}

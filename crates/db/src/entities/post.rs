//! Forum post entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of forum post. Fixed at creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    #[sea_orm(string_value = "discussion")]
    Discussion,
    #[sea_orm(string_value = "poll")]
    Poll,
    #[sea_orm(string_value = "petition")]
    Petition,
    #[sea_orm(string_value = "announcement")]
    Announcement,
}

impl PostType {
    /// Parse a post type filter value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "discussion" => Some(Self::Discussion),
            "poll" => Some(Self::Poll),
            "petition" => Some(Self::Petition),
            "announcement" => Some(Self::Announcement),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub post_type: PostType,

    #[sea_orm(indexed)]
    pub author_id: String,

    #[sea_orm(nullable, indexed)]
    pub category_id: Option<String>,

    /// Tags (JSON array of strings)
    #[sea_orm(column_type = "Json")]
    pub tags: Json,

    #[sea_orm(default_value = 0)]
    pub views: i32,

    #[sea_orm(default_value = 0)]
    pub upvotes: i32,

    #[sea_orm(default_value = 0)]
    pub downvotes: i32,

    /// Always `upvotes - downvotes`; stored for ordering
    #[sea_orm(default_value = 0)]
    pub score: i32,

    /// Comment count (denormalized)
    #[sea_orm(default_value = 0)]
    pub comments_count: i32,

    #[sea_orm(default_value = false)]
    pub is_pinned: bool,

    #[sea_orm(default_value = false)]
    pub is_locked: bool,

    #[sea_orm(default_value = false)]
    pub is_featured: bool,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Author,

    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "SetNull"
    )]
    Category,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

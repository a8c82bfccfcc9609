//! Poll entity. Owned by exactly one post of type `poll`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub post_id: String,

    pub question: String,

    /// Whether more than one option may be selected
    pub allow_multiple: bool,

    /// Display-only: hide who voted for what
    pub is_anonymous: bool,

    /// When the poll stops accepting votes (null for never)
    #[sea_orm(nullable)]
    pub ends_at: Option<DateTimeUtc>,

    /// Sum of all option votes
    #[sea_orm(default_value = 0)]
    pub total_votes: i32,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::post::Entity",
        from = "Column::PostId",
        to = "super::post::Column::Id",
        on_delete = "Cascade"
    )]
    Post,
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Petition entity. Owned by exactly one post of type `petition`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "petition")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub post_id: String,

    /// Who the petition addresses
    pub target: String,

    /// Signatures needed (at least 1)
    pub goal: i32,

    #[sea_orm(default_value = 0)]
    pub signatures: i32,

    #[sea_orm(nullable)]
    pub deadline: Option<DateTimeUtc>,

    /// Set once the goal is reached; never cleared
    #[sea_orm(default_value = false)]
    pub is_successful: bool,

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

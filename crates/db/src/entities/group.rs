//! Group entity: a named routing list of departments.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "group")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Group name.
    pub name: String,

    /// When the group was created.
    pub created_at: DateTimeWithTimeZone,

    /// When the group was last updated.
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::group_department::Entity")]
    Members,
}

impl Related<super::group_department::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::department::Entity> for Entity {
    fn to() -> RelationDef {
        super::group_department::Relation::Department.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::group_department::Relation::Group.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Department entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Organizational unit that receives trackers.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "department")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Numeric department code, unique across the registry.
    #[sea_orm(unique)]
    pub code: i32,

    pub name: String,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user::Entity")]
    Users,
    #[sea_orm(has_many = "super::group_department::Entity")]
    GroupMemberships,
    #[sea_orm(has_many = "super::tracker_recipient::Entity")]
    Recipients,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::tracker_recipient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipients.def()
    }
}

impl Related<super::group::Entity> for Entity {
    fn to() -> RelationDef {
        super::group_department::Relation::Group.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::group_department::Relation::Department.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Tracker audit entry: append-only log of actions on a tracker.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    #[sea_orm(string_value = "create")]
    Create,
    #[sea_orm(string_value = "update")]
    Update,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tracker_audit")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub tracker_id: String,

    pub action: AuditAction,

    /// Authenticated caller that performed the action.
    pub actor_id: String,

    pub actor_username: String,

    /// Changed field names mapped to their new values. Empty for creation.
    #[sea_orm(column_type = "JsonBinary")]
    pub changes: Json,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tracker::Entity",
        from = "Column::TrackerId",
        to = "super::tracker::Column::Id",
        on_delete = "Cascade"
    )]
    Tracker,
}

impl Related<super::tracker::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tracker.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

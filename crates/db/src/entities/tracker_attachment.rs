//! Tracker attachment payload.
//!
//! Metadata lives on the tracker row so list queries never load the binary.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tracker_attachment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub tracker_id: String,

    pub data: Vec<u8>,
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

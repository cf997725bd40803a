//! Tracker entity: one inbound document and the root of its aggregate.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tracker")]
pub struct Model {
    /// Also used as the public tracking number.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Sender of the document.
    pub from_name: String,

    pub document_title: String,

    #[sea_orm(indexed)]
    pub date_received: DateTimeWithTimeZone,

    /// User who registered the document.
    pub created_by: String,

    /// Original file name of the attachment, if any.
    #[sea_orm(nullable)]
    pub attachment_name: Option<String>,

    #[sea_orm(nullable)]
    pub attachment_mime: Option<String>,

    #[sea_orm(nullable)]
    pub attachment_size: Option<i64>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tracker_recipient::Entity")]
    Recipients,
    #[sea_orm(has_many = "super::tracker_audit::Entity")]
    AuditTrail,
    #[sea_orm(has_one = "super::tracker_attachment::Entity")]
    Attachment,
}

impl Related<super::tracker_recipient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipients.def()
    }
}

impl Related<super::tracker_audit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuditTrail.def()
    }
}

impl Related<super::tracker_attachment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attachment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Create tracker, `tracker_recipient`, `tracker_audit`, and `tracker_attachment` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create tracker table
        manager
            .create_table(
                Table::create()
                    .table(Tracker::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tracker::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tracker::FromName).string_len(512).not_null())
                    .col(
                        ColumnDef::new(Tracker::DocumentTitle)
                            .string_len(1024)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tracker::DateReceived)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Tracker::CreatedBy).string_len(32).not_null())
                    .col(ColumnDef::new(Tracker::AttachmentName).string_len(512))
                    .col(ColumnDef::new(Tracker::AttachmentMime).string_len(128))
                    .col(ColumnDef::new(Tracker::AttachmentSize).big_integer())
                    .col(
                        ColumnDef::new(Tracker::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Tracker::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracker_date_received")
                    .table(Tracker::Table)
                    .col(Tracker::DateReceived)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracker_created_at")
                    .table(Tracker::Table)
                    .col(Tracker::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Create tracker_recipient table
        manager
            .create_table(
                Table::create()
                    .table(TrackerRecipient::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TrackerRecipient::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TrackerRecipient::TrackerId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackerRecipient::DepartmentId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackerRecipient::Position)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TrackerRecipient::ReceiveDate)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(TrackerRecipient::IsSeen)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(TrackerRecipient::DateSeen).timestamp_with_time_zone())
                    .col(ColumnDef::new(TrackerRecipient::Remarks).text())
                    .col(
                        ColumnDef::new(TrackerRecipient::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tracker_recipient_tracker")
                            .from(TrackerRecipient::Table, TrackerRecipient::TrackerId)
                            .to(Tracker::Table, Tracker::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tracker_recipient_department")
                            .from(TrackerRecipient::Table, TrackerRecipient::DepartmentId)
                            .to(Department::Table, Department::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracker_recipient_tracker_id")
                    .table(TrackerRecipient::Table)
                    .col(TrackerRecipient::TrackerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracker_recipient_department_id")
                    .table(TrackerRecipient::Table)
                    .col(TrackerRecipient::DepartmentId)
                    .to_owned(),
            )
            .await?;

        // One entry per department per tracker
        manager
            .create_index(
                Index::create()
                    .name("idx_tracker_recipient_unique")
                    .table(TrackerRecipient::Table)
                    .col(TrackerRecipient::TrackerId)
                    .col(TrackerRecipient::DepartmentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create tracker_audit table
        manager
            .create_table(
                Table::create()
                    .table(TrackerAudit::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TrackerAudit::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TrackerAudit::TrackerId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(TrackerAudit::Action).string_len(16).not_null())
                    .col(ColumnDef::new(TrackerAudit::ActorId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(TrackerAudit::ActorUsername)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackerAudit::Changes)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(TrackerAudit::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tracker_audit_tracker")
                            .from(TrackerAudit::Table, TrackerAudit::TrackerId)
                            .to(Tracker::Table, Tracker::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracker_audit_tracker_id")
                    .table(TrackerAudit::Table)
                    .col(TrackerAudit::TrackerId)
                    .col(TrackerAudit::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Create tracker_attachment table
        manager
            .create_table(
                Table::create()
                    .table(TrackerAttachment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TrackerAttachment::TrackerId)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TrackerAttachment::Data).binary().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tracker_attachment_tracker")
                            .from(TrackerAttachment::Table, TrackerAttachment::TrackerId)
                            .to(Tracker::Table, Tracker::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TrackerAttachment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TrackerAudit::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TrackerRecipient::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tracker::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Tracker {
    Table,
    Id,
    FromName,
    DocumentTitle,
    DateReceived,
    CreatedBy,
    AttachmentName,
    AttachmentMime,
    AttachmentSize,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TrackerRecipient {
    Table,
    Id,
    TrackerId,
    DepartmentId,
    Position,
    ReceiveDate,
    IsSeen,
    DateSeen,
    Remarks,
    Status,
}

#[derive(Iden)]
enum TrackerAudit {
    Table,
    Id,
    TrackerId,
    Action,
    ActorId,
    ActorUsername,
    Changes,
    CreatedAt,
}

#[derive(Iden)]
enum TrackerAttachment {
    Table,
    TrackerId,
    Data,
}

#[derive(Iden)]
enum Department {
    Table,
    Id,
}

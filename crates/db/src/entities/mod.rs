//! Database entities.

pub mod department;
pub mod group;
pub mod group_department;
pub mod tracker;
pub mod tracker_attachment;
pub mod tracker_audit;
pub mod tracker_recipient;
pub mod user;

pub use department::Entity as Department;
pub use group::Entity as Group;
pub use group_department::Entity as GroupDepartment;
pub use tracker::Entity as Tracker;
pub use tracker_attachment::Entity as TrackerAttachment;
pub use tracker_audit::Entity as TrackerAudit;
pub use tracker_recipient::Entity as TrackerRecipient;
pub use user::Entity as User;

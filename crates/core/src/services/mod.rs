//! Business logic services.

#![allow(missing_docs)]

pub mod auth;
pub mod bootstrap;
pub mod department;
pub mod group;
pub mod pagination;
pub mod policy;
pub mod report;
pub mod tracker;
pub mod user;
pub mod validation;

pub use auth::{AuthPayload, AuthService, Claims, CurrentUser, LoginInput, TokenIssuer};
pub use bootstrap::ensure_superadmin;
pub use department::{CreateDepartmentInput, DepartmentRef, DepartmentService, UpdateDepartmentInput};
pub use group::{GroupInput, GroupService, GroupView};
pub use pagination::{Page, PageMeta, PageRequest};
pub use policy::{Operation, authorize, authorize_for_department, authorize_role};
pub use report::{DepartmentSummary, ReportService};
pub use tracker::{
    AttachmentFile, AttachmentUpload, CreateTrackerInput, ListTrackersQuery, RecipientInput,
    RecipientView, TrackerDetail, TrackerService, TrackerStatus, TrackerView,
    UpdateRecipientInput, UpdateTrackerInput,
};
pub use user::{RegisterInput, UpdateUserInput, UserService, UserView};

//! Access policy.
//!
//! One table maps every protected operation to the roles allowed to perform
//! it. Some operations additionally restrict the caller to its own department.

use doctrack_common::{AppError, AppResult};
use doctrack_db::entities::user::UserRole;

use super::auth::CurrentUser;

/// Protected operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RegisterUser,
    ListUsers,
    ViewUser,
    UpdateUser,
    DeleteUser,
    ViewDepartments,
    ManageDepartments,
    ViewGroups,
    ManageGroups,
    CreateTracker,
    UpdateTracker,
    DeleteTracker,
    ListTrackers,
    ViewTracker,
    DownloadAttachment,
    FilterTrackersByDepartment,
    UpdateRecipient,
    ViewReports,
}

/// Department restriction applied after the role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Role check only.
    Any,
    /// Callers with these roles may only act on their own department.
    OwnDepartmentFor(&'static [UserRole]),
    /// Every caller may only act on its own department.
    OwnDepartment,
}

struct Rule {
    operation: Operation,
    roles: &'static [UserRole],
    ownership: Ownership,
}

use UserRole::{Admin, Recipient, SuperAdmin, TrackerMonitor, TrackerReceiving, Viewer};

const ADMINS: &[UserRole] = &[SuperAdmin, Admin];
const EVERYONE: &[UserRole] = &UserRole::ALL;
const TRACKER_WRITERS: &[UserRole] = &[SuperAdmin, TrackerReceiving];
const TRACKER_READERS: &[UserRole] = &[
    SuperAdmin,
    Admin,
    TrackerReceiving,
    TrackerMonitor,
    Viewer,
    Recipient,
];
const RECIPIENT_UPDATERS: &[UserRole] = &[SuperAdmin, Admin, TrackerReceiving, Recipient];
const REPORT_READERS: &[UserRole] = &[SuperAdmin, Admin, TrackerMonitor, Viewer, TrackerReceiving];

const fn rule(operation: Operation, roles: &'static [UserRole], ownership: Ownership) -> Rule {
    Rule {
        operation,
        roles,
        ownership,
    }
}

const POLICY: &[Rule] = &[
    rule(Operation::RegisterUser, ADMINS, Ownership::Any),
    rule(Operation::ListUsers, ADMINS, Ownership::Any),
    rule(Operation::ViewUser, ADMINS, Ownership::Any),
    rule(Operation::UpdateUser, ADMINS, Ownership::Any),
    rule(Operation::DeleteUser, ADMINS, Ownership::Any),
    rule(Operation::ViewDepartments, EVERYONE, Ownership::Any),
    rule(Operation::ManageDepartments, ADMINS, Ownership::Any),
    rule(Operation::ViewGroups, EVERYONE, Ownership::Any),
    rule(Operation::ManageGroups, ADMINS, Ownership::Any),
    rule(Operation::CreateTracker, TRACKER_WRITERS, Ownership::Any),
    rule(Operation::UpdateTracker, TRACKER_WRITERS, Ownership::Any),
    rule(Operation::DeleteTracker, TRACKER_WRITERS, Ownership::Any),
    rule(Operation::ListTrackers, TRACKER_READERS, Ownership::Any),
    rule(Operation::ViewTracker, TRACKER_READERS, Ownership::Any),
    rule(Operation::DownloadAttachment, TRACKER_READERS, Ownership::Any),
    rule(
        Operation::FilterTrackersByDepartment,
        EVERYONE,
        Ownership::OwnDepartmentFor(&[Recipient]),
    ),
    rule(
        Operation::UpdateRecipient,
        RECIPIENT_UPDATERS,
        Ownership::OwnDepartment,
    ),
    rule(Operation::ViewReports, REPORT_READERS, Ownership::Any),
];

fn rule_for(operation: Operation) -> Option<&'static Rule> {
    POLICY.iter().find(|r| r.operation == operation)
}

/// Roles permitted to perform `operation`. Unlisted operations allow nobody.
#[must_use]
pub fn allowed_roles(operation: Operation) -> &'static [UserRole] {
    rule_for(operation).map(|r| r.roles).unwrap_or(&[])
}

/// Check the caller's role against the policy table.
pub fn authorize(user: &CurrentUser, operation: Operation) -> AppResult<()> {
    if allowed_roles(operation).contains(&user.role) {
        Ok(())
    } else {
        tracing::debug!(
            user_id = %user.id,
            role = %user.role,
            ?operation,
            "Operation denied by policy"
        );
        Err(AppError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ))
    }
}

/// Check the caller's role, then the department restriction for an operation
/// that targets `department_id`.
pub fn authorize_for_department(
    user: &CurrentUser,
    operation: Operation,
    department_id: &str,
) -> AppResult<()> {
    authorize(user, operation)?;

    let ownership = rule_for(operation).map_or(Ownership::Any, |r| r.ownership);
    let restricted = match ownership {
        Ownership::Any => false,
        Ownership::OwnDepartmentFor(roles) => roles.contains(&user.role),
        Ownership::OwnDepartment => true,
    };

    if restricted && user.department_id != department_id {
        tracing::debug!(
            user_id = %user.id,
            department_id = %department_id,
            ?operation,
            "Operation denied outside caller's department"
        );
        return Err(AppError::Forbidden(
            "This action is limited to your own department".to_string(),
        ));
    }
    Ok(())
}

/// Only a superadmin may hand out the superadmin role or edit an account
/// that holds it. `None` is an unauthenticated registration.
pub fn authorize_role(caller: Option<&CurrentUser>, role: UserRole) -> AppResult<()> {
    if role != SuperAdmin || caller.is_some_and(|c| c.role == SuperAdmin) {
        return Ok(());
    }
    tracing::debug!(
        user_id = caller.map(|c| c.id.as_str()),
        "Superadmin role change denied"
    );
    Err(AppError::Forbidden(
        "Only a superadmin can manage superadmin accounts".to_string(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(role: UserRole, department_id: &str) -> CurrentUser {
        CurrentUser {
            id: "u1".to_string(),
            username: "someone".to_string(),
            role,
            department_id: department_id.to_string(),
        }
    }

    #[test]
    fn test_every_operation_has_a_rule() {
        use Operation::*;
        for op in [
            RegisterUser,
            ListUsers,
            ViewUser,
            UpdateUser,
            DeleteUser,
            ViewDepartments,
            ManageDepartments,
            ViewGroups,
            ManageGroups,
            CreateTracker,
            UpdateTracker,
            DeleteTracker,
            ListTrackers,
            ViewTracker,
            DownloadAttachment,
            FilterTrackersByDepartment,
            UpdateRecipient,
            ViewReports,
        ] {
            assert!(POLICY.iter().any(|r| r.operation == op), "{op:?} missing");
        }
    }

    #[test]
    fn test_tracker_creation_roles() {
        assert!(authorize(&user(TrackerReceiving, "d1"), Operation::CreateTracker).is_ok());
        assert!(authorize(&user(SuperAdmin, "d1"), Operation::CreateTracker).is_ok());
        assert!(authorize(&user(Admin, "d1"), Operation::CreateTracker).is_err());
        assert!(authorize(&user(Viewer, "d1"), Operation::DeleteTracker).is_err());
    }

    #[test]
    fn test_reports_exclude_recipients() {
        assert!(authorize(&user(Recipient, "d1"), Operation::ViewReports).is_err());
        assert!(authorize(&user(TrackerMonitor, "d1"), Operation::ViewReports).is_ok());
    }

    #[test]
    fn test_recipient_update_is_owner_only_for_everyone() {
        let op = Operation::UpdateRecipient;
        assert!(authorize_for_department(&user(Recipient, "d1"), op, "d1").is_ok());
        assert!(authorize_for_department(&user(Recipient, "d1"), op, "d2").is_err());
        assert!(authorize_for_department(&user(SuperAdmin, "d1"), op, "d2").is_err());
        assert!(authorize_for_department(&user(Viewer, "d1"), op, "d1").is_err());
    }

    #[test]
    fn test_department_filter_restricts_recipients_only() {
        let op = Operation::FilterTrackersByDepartment;
        assert!(authorize_for_department(&user(Recipient, "d1"), op, "d2").is_err());
        assert!(authorize_for_department(&user(Viewer, "d1"), op, "d2").is_ok());
        assert!(authorize_for_department(&user(TrackerMonitor, "d1"), op, "d2").is_ok());
    }

    #[test]
    fn test_forbidden_error_kind() {
        let err = authorize(&user(Viewer, "d1"), Operation::ManageGroups).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_superadmin_role_is_reserved_for_superadmins() {
        assert!(authorize_role(Some(&user(SuperAdmin, "d1")), SuperAdmin).is_ok());
        assert!(matches!(
            authorize_role(Some(&user(Admin, "d1")), SuperAdmin),
            Err(AppError::Forbidden(_))
        ));
        assert!(authorize_role(None, SuperAdmin).is_err());

        assert!(authorize_role(Some(&user(Admin, "d1")), Admin).is_ok());
        assert!(authorize_role(None, Viewer).is_ok());
    }
}

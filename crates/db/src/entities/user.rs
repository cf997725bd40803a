//! User entity.

use std::fmt;
use std::str::FromStr;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Permission class attached to a user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[sea_orm(string_value = "superadmin")]
    SuperAdmin,
    #[sea_orm(string_value = "admin")]
    Admin,
    /// Registers incoming documents.
    #[sea_orm(string_value = "trackerreceiving")]
    TrackerReceiving,
    /// Acts on trackers routed to its department.
    #[sea_orm(string_value = "recipient")]
    Recipient,
    #[sea_orm(string_value = "viewer")]
    Viewer,
    /// Read-only oversight of all trackers and reports.
    #[sea_orm(string_value = "trackermonitor")]
    TrackerMonitor,
}

impl UserRole {
    /// Every role, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::SuperAdmin,
        Self::Admin,
        Self::TrackerReceiving,
        Self::Recipient,
        Self::Viewer,
        Self::TrackerMonitor,
    ];

    /// Wire representation of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "superadmin",
            Self::Admin => "admin",
            Self::TrackerReceiving => "trackerreceiving",
            Self::Recipient => "recipient",
            Self::Viewer => "viewer",
            Self::TrackerMonitor => "trackermonitor",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role: {s}"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Always stored lowercase.
    #[sea_orm(unique)]
    pub username: String,

    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub role: UserRole,

    #[sea_orm(indexed)]
    pub department_id: String,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::department::Entity",
        from = "Column::DepartmentId",
        to = "super::department::Column::Id",
        on_delete = "Restrict"
    )]
    Department,
}

impl Related<super::department::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Department.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in UserRole::ALL {
            assert_eq!(role.as_str().parse::<UserRole>(), Ok(role));
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!("management".parse::<UserRole>().is_err());
        assert!("Admin".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_role_serde_matches_db_value() {
        let json = serde_json::to_string(&UserRole::TrackerReceiving).unwrap_or_default();
        assert_eq!(json, "\"trackerreceiving\"");
    }
}

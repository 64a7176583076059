use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::permissions::{Permission, PermissionSet, Role};
use crate::error::DatabaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

/// Where an account sits in the business → venue → work-area tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Linkage {
    pub business_id: String,
    pub venue_id: String,
    pub work_area_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub payroll_id: String,
    pub email_work: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name_first: String,
    pub name_preferred: Option<String>,
    pub role: Role,
    /// Replaces the role's default permissions when set.
    pub permissions: Option<Vec<Permission>>,
    pub linked: Linkage,
    pub status: AccountStatus,
    pub last_login: Option<DateTime<Utc>>,
}

impl Account {
    pub fn effective_permissions(&self) -> PermissionSet {
        PermissionSet::resolve(&self.role, self.permissions.as_deref())
    }

    pub fn is_active(&self) -> bool {
        self.status != AccountStatus::Inactive
    }
}

/// Flat row shape of the `business_users` table.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub payroll_id: String,
    pub email_work: String,
    pub password_hash: String,
    pub name_first: String,
    pub name_preferred: Option<String>,
    pub role: String,
    pub permissions: Option<Vec<String>>,
    pub business_id: String,
    pub venue_id: String,
    pub work_area_id: String,
    pub status: String,
    pub last_login: Option<DateTime<Utc>>,
}

impl TryFrom<AccountRow> for Account {
    type Error = DatabaseError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "active" => AccountStatus::Active,
            "inactive" => AccountStatus::Inactive,
            other => {
                return Err(DatabaseError::CorruptRecord(format!(
                    "unknown status '{}' for {}",
                    other, row.payroll_id
                )))
            }
        };

        Ok(Self {
            role: Role::from(row.role.as_str()),
            permissions: row
                .permissions
                .map(|list| list.iter().map(|p| Permission::from(p.as_str())).collect()),
            linked: Linkage {
                business_id: row.business_id,
                venue_id: row.venue_id,
                work_area_id: row.work_area_id,
            },
            payroll_id: row.payroll_id,
            email_work: row.email_work,
            password_hash: row.password_hash,
            name_first: row.name_first,
            name_preferred: row.name_preferred,
            status,
            last_login: row.last_login,
        })
    }
}

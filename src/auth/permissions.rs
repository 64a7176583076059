//! Roles, permissions and organisational scope.
//!
//! A role maps to a default permission set. An account may carry its own
//! permission list, which replaces the role default when present.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

use crate::db::models::Account;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Owner,
    Manager,
    Staff,
    Employee,
    Custom(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Owner => "owner",
            Role::Manager => "manager",
            Role::Staff => "staff",
            Role::Employee => "employee",
            Role::Custom(name) => name,
        }
    }

    /// Built-in permissions for the role before any per-account override.
    pub fn default_permissions(&self) -> PermissionSet {
        match self {
            Role::Owner => PermissionSet::from_iter([Permission::All]),
            Role::Manager => {
                PermissionSet::from_iter([Permission::Read, Permission::Write, Permission::Update])
            }
            Role::Staff => PermissionSet::from_iter([Permission::Read, Permission::Write]),
            Role::Employee => PermissionSet::from_iter([Permission::Read]),
            Role::Custom(_) => PermissionSet::default(),
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "owner" => Role::Owner,
            "manager" => Role::Manager,
            "staff" => Role::Staff,
            "employee" => Role::Employee,
            _ => Role::Custom(value.to_string()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::from(raw.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    /// Implies every other permission.
    All,
    Read,
    Write,
    Update,
    Delete,
    Other(String),
}

impl Permission {
    pub fn as_str(&self) -> &str {
        match self {
            Permission::All => "all",
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Update => "update",
            Permission::Delete => "delete",
            Permission::Other(name) => name,
        }
    }
}

impl From<&str> for Permission {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "all" => Permission::All,
            "read" => Permission::Read,
            "write" => Permission::Write,
            "update" => Permission::Update,
            "delete" => Permission::Delete,
            _ => Permission::Other(value.to_string()),
        }
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Permission::from(raw.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// Resolve the effective permissions for an account.
    pub fn resolve(role: &Role, overrides: Option<&[Permission]>) -> Self {
        match overrides {
            Some(list) => list.iter().cloned().collect(),
            None => role.default_permissions(),
        }
    }

    pub fn allows(&self, permission: &Permission) -> bool {
        self.0.contains(&Permission::All) || self.0.contains(permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A node of the business → venue → work-area tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgScope {
    Business(String),
    Venue { business_id: String, venue_id: String },
    WorkArea { business_id: String, venue_id: String, work_area_id: String },
}

impl OrgScope {
    /// Whether `account` can act on this node.
    ///
    /// Owners reach their whole business, managers their venue, everyone
    /// else only their own work area.
    pub fn reachable_by(&self, account: &Account) -> bool {
        let linked = &account.linked;
        let (business_id, venue_id, work_area_id) = match self {
            OrgScope::Business(b) => (b.as_str(), None, None),
            OrgScope::Venue { business_id, venue_id } => {
                (business_id.as_str(), Some(venue_id.as_str()), None)
            }
            OrgScope::WorkArea { business_id, venue_id, work_area_id } => (
                business_id.as_str(),
                Some(venue_id.as_str()),
                Some(work_area_id.as_str()),
            ),
        };

        if linked.business_id != business_id {
            return false;
        }

        match account.role {
            Role::Owner => true,
            Role::Manager => venue_id.map_or(false, |v| v == linked.venue_id),
            _ => {
                venue_id.map_or(false, |v| v == linked.venue_id)
                    && work_area_id.map_or(false, |w| w == linked.work_area_id)
            }
        }
    }
}

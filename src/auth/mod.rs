//! Authentication and access control.
//!
//! Login admission, password checks, session tokens, and the request guard
//! that protected handlers rely on.

pub mod guard;
pub mod handlers;
pub mod identity;
pub mod password;
pub mod permissions;
pub mod rate_limit;
mod service;
pub mod token;

pub use guard::AuthenticatedUser;
pub use identity::PayrollId;
pub use password::PasswordHasher;
pub use permissions::{OrgScope, Permission, PermissionSet, Role};
pub use rate_limit::{AdmissionConfig, AdmissionController};
pub use service::{AuthService, LoginOutcome};
pub use token::{Claims, TokenService};

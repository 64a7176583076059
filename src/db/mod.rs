//! Account storage.
//!
//! The authentication core only reads accounts and stamps the last-login
//! time; everything else about accounts is managed elsewhere.

pub mod models;
pub mod store;

pub use models::{Account, AccountStatus, Linkage};
pub use store::{CredentialStore, InMemoryCredentialStore, PgCredentialStore};

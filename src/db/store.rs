use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::db::models::{Account, AccountRow, AccountStatus};
use crate::error::DatabaseError;

/// Lookup side of the account database, as seen by authentication.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the account unless it is missing or inactive.
    async fn find_active_account_by_identity(
        &self,
        payroll_id: &str,
    ) -> Result<Option<Account>, DatabaseError>;

    async fn update_last_login(
        &self,
        payroll_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;
}

const ACCOUNT_COLUMNS: &str = "payroll_id, email_work, password_hash, name_first, name_preferred, \
     role, permissions, business_id, venue_id, work_area_id, status, last_login";

pub struct PgCredentialStore {
    pool: Arc<PgPool>,
}

impl PgCredentialStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_active_account_by_identity(
        &self,
        payroll_id: &str,
    ) -> Result<Option<Account>, DatabaseError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM business_users WHERE payroll_id = $1 AND status <> 'inactive'",
            ACCOUNT_COLUMNS
        ))
        .bind(payroll_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn update_last_login(
        &self,
        payroll_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE business_users SET last_login = $1 WHERE payroll_id = $2")
            .bind(at)
            .bind(payroll_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }
}

/// Process-local store, used for development and tests.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, account: Account) {
        self.accounts
            .write()
            .await
            .insert(account.payroll_id.clone(), account);
    }

    /// Stands in for the external account-management flow.
    pub async fn set_status(&self, payroll_id: &str, status: AccountStatus) -> bool {
        match self.accounts.write().await.get_mut(payroll_id) {
            Some(account) => {
                account.status = status;
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, payroll_id: &str) -> Option<Account> {
        self.accounts.read().await.get(payroll_id).cloned()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_active_account_by_identity(
        &self,
        payroll_id: &str,
    ) -> Result<Option<Account>, DatabaseError> {
        Ok(self
            .accounts
            .read()
            .await
            .get(payroll_id)
            .filter(|account| account.is_active())
            .cloned())
    }

    async fn update_last_login(
        &self,
        payroll_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(payroll_id).ok_or(DatabaseError::NotFound)?;
        account.last_login = Some(at);
        Ok(())
    }
}

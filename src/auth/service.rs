use std::sync::Arc;
use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use crate::audit::{AuditEvent, AuditKind, AuditSink};
use crate::auth::guard::AuthenticatedUser;
use crate::auth::identity::PayrollId;
use crate::auth::password::PasswordHasher;
use crate::auth::rate_limit::{AdmissionConfig, AdmissionController};
use crate::auth::token::TokenService;
use crate::config::Settings;
use crate::db::models::Account;
use crate::db::store::CredentialStore;
use crate::error::{AppError, AuthError};

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub account: Account,
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    audit: Arc<dyn AuditSink>,
    limiter: AdmissionController,
    tokens: TokenService,
    passwords: PasswordHasher,
    // Checked against when the identity is unknown, so both failure paths
    // do the same hashing work.
    decoy_digest: String,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        audit: Arc<dyn AuditSink>,
        limiter: AdmissionController,
        tokens: TokenService,
        passwords: PasswordHasher,
    ) -> Result<Self, AppError> {
        let decoy_digest = passwords
            .hash("decoy-secret-never-matches")
            .map_err(|e| AppError::InternalError(e.to_string()))?;

        Ok(Self {
            store,
            audit,
            limiter,
            tokens,
            passwords,
            decoy_digest,
        })
    }

    pub fn from_settings(
        settings: &Settings,
        store: Arc<dyn CredentialStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, AppError> {
        let passwords = PasswordHasher::new(settings.auth.password_hash_cost)
            .map_err(|e| AppError::ConfigError(e.to_string()))?;

        Self::new(
            store,
            audit,
            AdmissionController::new(AdmissionConfig::from(&settings.rate_limit)),
            TokenService::new(
                &settings.auth.jwt_secret,
                Duration::hours(settings.auth.token_expiry_hours),
            ),
            passwords,
        )
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.limiter
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn passwords(&self) -> &PasswordHasher {
        &self.passwords
    }

    /// Runs the full login sequence: admission check, identifier format,
    /// account lookup, password check, then token issue.
    pub async fn login(
        &self,
        payroll_id: Option<&str>,
        secret: Option<&str>,
        origin: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let (raw_id, secret) = match (payroll_id, secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => (id, secret),
            _ => return Err(AuthError::MissingCredentials),
        };

        // Over-long junk is tracked under a bounded key.
        let admission_key = admission_key(raw_id);

        if !self.limiter.try_admit(admission_key).await {
            warn!("Rate limit exceeded for payroll ID: {}", admission_key);
            self.audit_failure(admission_key, None, "Login refused while blocked", origin);
            return Err(AuthError::RateLimited);
        }

        // Admission already charged a failure; only success clears it.
        let payroll_id = match PayrollId::parse(raw_id) {
            Ok(id) => id,
            Err(e) => {
                warn!("Login attempt with malformed payroll ID: {}", admission_key);
                self.audit_failure(admission_key, None, "Invalid payroll ID format", origin);
                return Err(e);
            }
        };

        let account = match self.store.find_active_account_by_identity(payroll_id.as_str()).await {
            Ok(account) => account,
            Err(e) => {
                self.limiter.refund(payroll_id.as_str()).await;
                error!("Account lookup failed for {}: {}", payroll_id, e);
                return Err(AuthError::AuthenticationFailed);
            }
        };

        let Some(account) = account else {
            self.check_password(&self.decoy_digest, secret).await?;
            warn!("Login attempt with non-existent payroll ID: {}", payroll_id);
            self.audit_failure(payroll_id.as_str(), None, "Unknown payroll ID", origin);
            return Err(AuthError::InvalidCredentials);
        };

        if !self.check_password(&account.password_hash, secret).await? {
            warn!("Failed login attempt for payroll ID: {}", payroll_id);
            self.audit_failure(
                payroll_id.as_str(),
                Some(account.linked.business_id.clone()),
                "Wrong password",
                origin,
            );
            return Err(AuthError::InvalidCredentials);
        }

        self.limiter.record_attempt(payroll_id.as_str(), true).await;

        let token = self.tokens.issue(&account)?;

        let now = Utc::now();
        if let Err(e) = self.store.update_last_login(payroll_id.as_str(), now).await {
            warn!("Could not record last login for {}: {}", payroll_id, e);
        }

        self.audit.log_event(AuditEvent::new(
            AuditKind::UserLogin,
            payroll_id.as_str(),
            Some(account.linked.business_id.clone()),
            "Successful login",
            origin,
        ));
        info!("Login successful for payroll ID: {}", payroll_id);

        let mut account = account;
        account.last_login = Some(now);
        Ok(LoginOutcome { token, account })
    }

    /// Resolves a bearer token into the live account behind it.
    pub async fn authorize(&self, bearer: Option<&str>) -> Result<AuthenticatedUser, AuthError> {
        let token = bearer
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self.tokens.verify(token)?;

        let account = self
            .store
            .find_active_account_by_identity(&claims.payroll_id)
            .await
            .map_err(|e| {
                error!("Account re-check failed for {}: {}", claims.payroll_id, e);
                AuthError::AuthenticationFailed
            })?
            .ok_or(AuthError::AccountInactive)?;

        Ok(AuthenticatedUser::new(claims, account))
    }

    /// Tokens are stateless, so logging out only leaves an audit trail.
    pub fn logout(&self, user: &AuthenticatedUser, origin: &str) {
        self.audit.log_event(AuditEvent::new(
            AuditKind::UserLogout,
            user.claims.payroll_id.as_str(),
            Some(user.claims.business_id.clone()),
            "User logged out",
            origin,
        ));
        info!("Logout for payroll ID: {}", user.claims.payroll_id);
    }

    async fn check_password(&self, digest: &str, secret: &str) -> Result<bool, AuthError> {
        let hasher = self.passwords.clone();
        let digest = digest.to_string();
        let secret = secret.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&digest, &secret))
            .await
            .map_err(|e| {
                error!("Password verification task failed: {}", e);
                AuthError::AuthenticationFailed
            })
    }

    fn audit_failure(&self, payroll_id: &str, business_id: Option<String>, detail: &str, origin: &str) {
        self.audit.log_event(AuditEvent::new(
            AuditKind::LoginFailed,
            payroll_id,
            business_id,
            detail,
            origin,
        ));
    }
}

const MAX_ADMISSION_KEY_CHARS: usize = 32;

fn admission_key(raw: &str) -> &str {
    match raw.char_indices().nth(MAX_ADMISSION_KEY_CHARS) {
        Some((end, _)) => &raw[..end],
        None => raw,
    }
}

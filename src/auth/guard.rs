//! Request guard for protected routes.
//!
//! Taking [`AuthenticatedUser`] as a handler argument runs the full check:
//! bearer token present, token valid and unexpired, account still active.

use actix_web::{dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use tracing::error;

use crate::auth::permissions::{OrgScope, Permission, PermissionSet};
use crate::auth::token::Claims;
use crate::db::models::Account;
use crate::error::{AppError, AuthError};
use crate::AppState;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: Claims,
    pub account: Account,
    /// Resolved once from the live account when the request is admitted.
    pub permissions: PermissionSet,
}

impl AuthenticatedUser {
    pub fn new(claims: Claims, account: Account) -> Self {
        let permissions = account.effective_permissions();
        Self {
            claims,
            account,
            permissions,
        }
    }

    pub fn payroll_id(&self) -> &str {
        &self.claims.payroll_id
    }

    pub fn require_permission(&self, permission: &Permission) -> Result<(), AuthError> {
        if self.permissions.allows(permission) {
            Ok(())
        } else {
            Err(AuthError::PermissionDenied)
        }
    }

    pub fn require_scope(&self, scope: &OrgScope) -> Result<(), AuthError> {
        if scope.reachable_by(&self.account) {
            Ok(())
        } else {
            Err(AuthError::PermissionDenied)
        }
    }
}

/// The raw credential from `Authorization`, with any `Bearer ` prefix removed.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.strip_prefix("Bearer ").unwrap_or(h).trim().to_string())
        .filter(|t| !t.is_empty())
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = bearer_token(req);

        Box::pin(async move {
            let state = state.ok_or_else(|| {
                error!("AppState is not registered; cannot authenticate request");
                AppError::AuthError(AuthError::AuthenticationFailed)
            })?;

            Ok(state.auth_service.authorize(token.as_deref()).await?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permissions::Role;
    use crate::db::models::{AccountStatus, Linkage};
    use actix_web::test::TestRequest;

    fn user(role: Role, permissions: Option<Vec<Permission>>) -> AuthenticatedUser {
        let account = Account {
            payroll_id: "DB-000010".to_string(),
            email_work: "bar@example.com".to_string(),
            password_hash: String::new(),
            name_first: "Kim".to_string(),
            name_preferred: None,
            role: role.clone(),
            permissions,
            linked: Linkage {
                business_id: "B1".to_string(),
                venue_id: "V1".to_string(),
                work_area_id: "W3".to_string(),
            },
            status: AccountStatus::Active,
            last_login: None,
        };
        let claims = Claims {
            payroll_id: account.payroll_id.clone(),
            email_work: account.email_work.clone(),
            role,
            business_id: "B1".to_string(),
            venue_id: "V1".to_string(),
            work_area_id: "W3".to_string(),
            iat: 0,
            exp: 0,
        };
        AuthenticatedUser::new(claims, account)
    }

    #[test]
    fn test_bearer_extraction() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def.ghi"));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def.ghi"));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer "))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);

        assert_eq!(bearer_token(&TestRequest::default().to_http_request()), None);
    }

    #[test]
    fn test_require_permission() {
        let staff = user(Role::Staff, None);
        assert!(staff.require_permission(&Permission::Write).is_ok());
        assert_eq!(
            staff.require_permission(&Permission::Delete),
            Err(AuthError::PermissionDenied)
        );

        let owner = user(Role::Owner, None);
        assert!(owner.require_permission(&Permission::Delete).is_ok());

        let custom = user(Role::Custom("sommelier".into()), Some(vec![Permission::Read]));
        assert!(custom.require_permission(&Permission::Read).is_ok());
        assert!(custom.require_permission(&Permission::Write).is_err());
    }

    #[test]
    fn test_require_scope() {
        let staff = user(Role::Staff, None);
        let own = OrgScope::WorkArea {
            business_id: "B1".into(),
            venue_id: "V1".into(),
            work_area_id: "W3".into(),
        };
        let venue = OrgScope::Venue { business_id: "B1".into(), venue_id: "V1".into() };

        assert!(staff.require_scope(&own).is_ok());
        assert_eq!(staff.require_scope(&venue), Err(AuthError::PermissionDenied));
    }

    #[actix_web::test]
    async fn test_missing_state_fails_generically() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer abc"))
            .to_http_request();
        let err = AuthenticatedUser::extract(&req).await.unwrap_err();

        assert!(matches!(err, AppError::AuthError(AuthError::AuthenticationFailed)));
    }
}

use actix_web::{web, HttpResponse, HttpRequest};
use serde::{Deserialize, Serialize};
use crate::AppState;
use crate::auth::guard::{bearer_token, AuthenticatedUser};
use crate::auth::permissions::{PermissionSet, Role};
use crate::db::models::Account;
use crate::error::AppError;
use tracing::{info, warn};

/// Older clients send `payroll_id` / `password`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "payroll_id")]
    pub identity: Option<String>,
    #[serde(alias = "password")]
    pub secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LinkedView {
    pub business_id: String,
    pub venue_id: String,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub payroll_id: String,
    pub email_work: String,
    pub name_first: String,
    pub name_preferred: Option<String>,
    pub role: Role,
    pub permissions: PermissionSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked: Option<LinkedView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_area_id: Option<String>,
}

impl UserView {
    fn summary(account: &Account) -> Self {
        Self {
            payroll_id: account.payroll_id.clone(),
            email_work: account.email_work.clone(),
            name_first: account.name_first.clone(),
            name_preferred: account.name_preferred.clone(),
            role: account.role.clone(),
            permissions: account.effective_permissions(),
            linked: None,
            work_area_id: None,
        }
    }

    fn with_linkage(account: &Account) -> Self {
        Self {
            linked: Some(LinkedView {
                business_id: account.linked.business_id.clone(),
                venue_id: account.linked.venue_id.clone(),
            }),
            work_area_id: Some(account.linked.work_area_id.clone()),
            ..Self::summary(account)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub valid: bool,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

pub fn origin_address(req: &HttpRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn login(
    req: HttpRequest,
    body: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let origin = origin_address(&req);
    let body = body.into_inner();

    match state
        .auth_service
        .login(body.identity.as_deref(), body.secret.as_deref(), &origin)
        .await
    {
        Ok(outcome) => Ok(HttpResponse::Ok().json(LoginResponse {
            success: true,
            token: outcome.token,
            user: UserView::with_linkage(&outcome.account),
        })),
        Err(e) => {
            warn!(
                "Login failed for {} from {}: {}",
                body.identity.as_deref().unwrap_or("<missing>"),
                origin,
                e
            );
            Err(e.into())
        }
    }
}

/// Runs the guard by hand so the body shape matches the login response.
pub async fn verify_token(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req);
    let user = state.auth_service.authorize(token.as_deref()).await?;

    Ok(HttpResponse::Ok().json(VerifyResponse {
        success: true,
        valid: true,
        user: UserView::summary(&user.account),
    }))
}

pub async fn logout(
    req: HttpRequest,
    user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth_service.logout(&user, &origin_address(&req));
    info!("Session closed for payroll ID: {}", user.payroll_id());

    Ok(HttpResponse::Ok().json(MessageResponse {
        success: true,
        message: "Successfully logged out".to_string(),
    }))
}

pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;

use std::sync::Arc;
use std::time::Duration;
use actix_web::{web, HttpResponse};
use tracing::{info, warn};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use audit::{AuditSink, MemoryAuditSink, PgAuditSink, TracingAuditSink};
pub use auth::{AuthService, AuthenticatedUser, AdmissionController, AdmissionConfig};
pub use db::{Account, CredentialStore, InMemoryCredentialStore, PgCredentialStore};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth_service: Arc<AuthService>,
}

impl AppState {
    /// Connects to Postgres and wires the database-backed store and audit sink.
    pub async fn new(config: Settings) -> Result<Self> {
        let store = PgCredentialStore::new_with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(5),
        )
        .await?;

        if config.database.run_migrations {
            store.migrate().await?;
            info!("Database migrations applied");
        }

        let audit = Arc::new(PgAuditSink::new(store.pool()));
        Self::with_components(config, Arc::new(store), audit)
    }

    pub fn with_components(
        config: Settings,
        store: Arc<dyn CredentialStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let auth_service = AuthService::from_settings(&config, store, audit)?;

        Ok(Self {
            config: Arc::new(config),
            auth_service: Arc::new(auth_service),
        })
    }
}

/// Login bodies carry two short strings.
const MAX_BODY_BYTES: usize = 4 * 1024;

/// Registers the `/auth` endpoints and the health check.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().limit(MAX_BODY_BYTES).error_handler(|err, _req| {
        warn!("Rejected malformed request body: {}", err);
        actix_web::error::InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "message": "Invalid request body"
            })),
        )
        .into()
    });

    cfg.app_data(json_config)
        .route("/health", web::get().to(health_check))
        .service(
            web::scope("/auth")
                .route("/login", web::post().to(auth::handlers::login))
                .route("/verify-token", web::post().to(auth::handlers::verify_token))
                .route("/logout", web::post().to(auth::handlers::logout)),
        );
}

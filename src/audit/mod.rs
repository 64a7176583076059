//! Append-only record of security-relevant events.
//!
//! Sinks are fire-and-forget: `log_event` never fails and never blocks the
//! request that raised the event.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    UserLogin,
    UserLogout,
    LoginFailed,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::UserLogin => "user_login",
            AuditKind::UserLogout => "user_logout",
            AuditKind::LoginFailed => "login_failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub kind: AuditKind,
    pub payroll_id: String,
    pub business_id: Option<String>,
    pub detail: String,
    pub origin_address: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        kind: AuditKind,
        payroll_id: impl Into<String>,
        business_id: Option<String>,
        detail: impl Into<String>,
        origin_address: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payroll_id: payroll_id.into(),
            business_id,
            detail: detail.into(),
            origin_address: origin_address.into(),
            created_at: Utc::now(),
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn log_event(&self, event: AuditEvent);
}

/// Writes events as structured log lines under the `audit` target.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn log_event(&self, event: AuditEvent) {
        info!(
            target: "audit",
            kind = event.kind.as_str(),
            payroll_id = %event.payroll_id,
            business_id = event.business_id.as_deref().unwrap_or("-"),
            origin = %event.origin_address,
            "{}",
            event.detail
        );
    }
}

/// Inserts events into `audit_events` on a detached task.
pub struct PgAuditSink {
    pool: Arc<PgPool>,
}

impl PgAuditSink {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

impl AuditSink for PgAuditSink {
    fn log_event(&self, event: AuditEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("No runtime available to persist audit event {}", event.id);
            return;
        };

        let pool = self.pool.clone();
        runtime.spawn(async move {
            let result = sqlx::query(
                "INSERT INTO audit_events (id, kind, payroll_id, business_id, detail, origin_address, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(event.id)
            .bind(event.kind.as_str())
            .bind(&event.payroll_id)
            .bind(&event.business_id)
            .bind(&event.detail)
            .bind(&event.origin_address)
            .bind(event.created_at)
            .execute(pool.as_ref())
            .await;

            if let Err(e) = result {
                error!(
                    "Failed to persist audit event {} ({}) for {}: {}",
                    event.id,
                    event.kind.as_str(),
                    event.payroll_id,
                    e
                );
            }
        });
    }
}

/// Keeps events in memory so tests can inspect them.
#[derive(Default, Clone)]
pub struct MemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn log_event(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use chrono::{DateTime, Utc, Duration};
use tracing::{info, warn};

use crate::config::RateLimitSettings;

#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub max_attempts: u32,
    pub window: Duration,
    pub block: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::seconds(300),  // 5 minutes
            block: Duration::seconds(900),   // 15 minutes
        }
    }
}

impl From<&RateLimitSettings> for AdmissionConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            window: Duration::seconds(settings.window_seconds),
            block: Duration::seconds(settings.block_seconds),
        }
    }
}

#[derive(Debug, Clone)]
struct AdmissionRecord {
    attempts: u32,
    window_start: DateTime<Utc>,
    blocked_until: Option<DateTime<Utc>>,
}

impl AdmissionRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            attempts: 0,
            window_start: now,
            blocked_until: None,
        }
    }

    fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.map_or(false, |until| now < until)
    }

    fn window_elapsed(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now >= self.window_start + window
    }
}

/// Failed-login bookkeeping per identity.
///
/// Every mutation happens under a single write lock, so concurrent failures
/// for the same identity are never lost and never block twice.
pub struct AdmissionController {
    records: Arc<RwLock<HashMap<String, AdmissionRecord>>>,
    config: AdmissionConfig,
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    pub async fn is_blocked(&self, identity: &str) -> bool {
        self.is_blocked_at(identity, Utc::now()).await
    }

    pub async fn is_blocked_at(&self, identity: &str, now: DateTime<Utc>) -> bool {
        let mut records = self.records.write().await;

        let Some(record) = records.get(identity) else {
            return false;
        };

        if record.is_blocked(now) {
            return true;
        }

        // A block that has run out leaves no history behind.
        if record.blocked_until.is_some() {
            records.remove(identity);
            info!("Login block expired for {}", identity);
        }
        false
    }

    pub async fn record_attempt(&self, identity: &str, success: bool) {
        self.record_attempt_at(identity, success, Utc::now()).await
    }

    pub async fn record_attempt_at(&self, identity: &str, success: bool, now: DateTime<Utc>) {
        if success {
            self.records.write().await.remove(identity);
            return;
        }
        self.charge(identity, now).await;
    }

    /// Admits an attempt and charges it as a failure in one step.
    ///
    /// Returns false while the identity is blocked. The attempt that reaches
    /// `max_attempts` is still admitted but blocks everything after it, so
    /// concurrent attempts for one identity never exceed the budget. A
    /// successful login clears the charge; `refund` returns it when the
    /// attempt could not be judged.
    pub async fn try_admit(&self, identity: &str) -> bool {
        self.try_admit_at(identity, Utc::now()).await
    }

    pub async fn try_admit_at(&self, identity: &str, now: DateTime<Utc>) -> bool {
        self.charge(identity, now).await
    }

    /// Gives back one charged attempt, lifting a block it caused.
    pub async fn refund(&self, identity: &str) {
        let mut records = self.records.write().await;

        let Some(record) = records.get_mut(identity) else {
            return;
        };

        record.attempts = record.attempts.saturating_sub(1);
        if record.attempts < self.config.max_attempts {
            record.blocked_until = None;
        }
        if record.attempts == 0 {
            records.remove(identity);
        }
    }

    async fn charge(&self, identity: &str, now: DateTime<Utc>) -> bool {
        let mut records = self.records.write().await;

        let record = records
            .entry(identity.to_string())
            .or_insert_with(|| AdmissionRecord::new(now));

        if record.is_blocked(now) {
            return false;
        }

        if record.blocked_until.is_some() || record.window_elapsed(now, self.config.window) {
            *record = AdmissionRecord::new(now);
        }

        record.attempts += 1;

        if record.attempts >= self.config.max_attempts {
            record.blocked_until = Some(now + self.config.block);
            warn!(
                "Blocking {} after {} failed attempts until {}",
                identity,
                record.attempts,
                now + self.config.block
            );
        }
        true
    }

    pub async fn clear_attempts(&self, identity: &str) {
        self.records.write().await.remove(identity);
    }

    /// Failures counted in the current window; zero when there is no record.
    pub async fn attempt_count(&self, identity: &str) -> u32 {
        self.records
            .read()
            .await
            .get(identity)
            .map_or(0, |record| record.attempts)
    }

    pub async fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now()).await
    }

    /// Drops records that no longer affect admission.
    pub async fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();

        records.retain(|_, record| {
            record.is_blocked(now)
                || (record.blocked_until.is_none() && !record.window_elapsed(now, self.config.window))
        });

        before - records.len()
    }

    pub async fn tracked_identities(&self) -> usize {
        self.records.read().await.len()
    }
}

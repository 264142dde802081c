use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use syncreads_core::UserId;
use tokio::sync::Mutex;

use crate::config::ApiConfig;
use crate::error::AppError;

/// Fixed-window limit on sync requests per user
#[derive(Clone)]
pub struct SyncRateLimiter {
    state: Arc<Mutex<HashMap<UserId, RateWindow>>>,
    window: Duration,
    limit: u32,
    metrics: Arc<RateLimitMetrics>,
}

#[derive(Default)]
struct RateLimitMetrics {
    allowed: AtomicU64,
    limited: AtomicU64,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RateLimitMetricsSnapshot {
    pub sync_allowed: u64,
    pub sync_limited: u64,
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    started_at: Instant,
    count: u32,
}

impl SyncRateLimiter {
    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.rate_limit_window, config.sync_rate_limit_per_window)
    }

    pub fn new(window: Duration, limit: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            window,
            limit,
            metrics: Arc::new(RateLimitMetrics::default()),
        }
    }

    pub async fn check(&self, user_id: &UserId) -> Result<(), AppError> {
        let now = Instant::now();
        let mut guard = self.state.lock().await;
        // Expired windows restart on the next request.
        guard.retain(|_, window| now.duration_since(window.started_at) < self.window);
        let entry = guard.entry(*user_id).or_insert(RateWindow {
            started_at: now,
            count: 0,
        });

        if entry.count >= self.limit {
            let retry_after_secs = self
                .window
                .saturating_sub(now.duration_since(entry.started_at))
                .as_secs();
            self.metrics.limited.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(user = %user_id, retry_after_secs, "Sync rate limit exceeded");
            return Err(AppError::too_many_requests(
                "Sync rate limit exceeded",
                retry_after_secs,
            ));
        }

        entry.count += 1;
        self.metrics.allowed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn metrics_snapshot(&self) -> RateLimitMetricsSnapshot {
        RateLimitMetricsSnapshot {
            sync_allowed: self.metrics.allowed.load(Ordering::Relaxed),
            sync_limited: self.metrics.limited.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    async fn tracked_users(&self) -> usize {
        self.state.lock().await.len()
    }
}

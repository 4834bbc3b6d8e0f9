//! Sliding-window throttle for public order submissions

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::models::SlidingWindow;
use crate::store::RateLimitStore;

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    window: SlidingWindow,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, window: SlidingWindow) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> SlidingWindow {
        self.window
    }

    /// Count a submission from `client_key` now
    pub async fn check(&self, client_key: &str) -> AppResult<()> {
        self.check_at(client_key, Utc::now()).await
    }

    /// Count a submission from `client_key` at `now`
    pub async fn check_at(&self, client_key: &str, now: DateTime<Utc>) -> AppResult<()> {
        if self.store.hit(client_key, self.window, now).await? {
            return Ok(());
        }

        tracing::warn!(
            client = %client_key,
            window_secs = self.window.window.num_seconds(),
            max = self.window.max_hits,
            "Order submission rate limited"
        );
        Err(AppError::RateLimited)
    }
}

//! Public order intake
//!
//! Submissions are validated first, so rejected ones do not use up the
//! client's rate limit, then throttled, then stored with status `new`.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::rate_limit::RateLimiter;
use crate::error::{AppError, AppResult};
use crate::models::{Order, OrderIntake};
use crate::store::{OrderRepository, Store};

#[derive(Clone)]
pub struct OrderIntakeService {
    store: Arc<dyn Store>,
    rate_limiter: RateLimiter,
}

impl OrderIntakeService {
    pub fn new(store: Arc<dyn Store>, rate_limiter: RateLimiter) -> Self {
        Self {
            store,
            rate_limiter,
        }
    }

    /// Accept a storefront order from `client_key`
    pub async fn submit(&self, client_key: &str, intake: &OrderIntake) -> AppResult<Order> {
        self.submit_at(client_key, intake, Utc::now()).await
    }

    pub async fn submit_at(
        &self,
        client_key: &str,
        intake: &OrderIntake,
        now: DateTime<Utc>,
    ) -> AppResult<Order> {
        let new_order = shared::validate_order_intake(intake).map_err(AppError::Validation)?;

        self.rate_limiter.check_at(client_key, now).await?;

        let mut uow = self.store.begin().await?;
        let order = uow.insert_order(&new_order).await?;
        uow.commit().await?;

        tracing::info!(
            order_id = %order.id,
            items = new_order.items.len(),
            total = %order.total_price,
            payment_type = order.payment_type.as_str(),
            "Order received"
        );

        Ok(order)
    }
}

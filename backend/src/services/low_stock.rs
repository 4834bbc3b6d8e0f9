//! On-demand low stock scan and notification decision

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppResult;
use crate::models::Ingredient;
use crate::store::{LedgerRepository, Store};

/// Receives the ingredients a scan found at or below threshold.
/// Delivery (chat, email, push) lives behind this trait.
#[async_trait]
pub trait LowStockNotifier: Send + Sync {
    async fn notify(&self, ingredients: &[Ingredient]) -> AppResult<()>;
}

/// Notifier that records low stock in the service log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl LowStockNotifier for TracingNotifier {
    async fn notify(&self, ingredients: &[Ingredient]) -> AppResult<()> {
        for ingredient in ingredients {
            tracing::warn!(
                ingredient_id = %ingredient.id,
                name = %ingredient.name,
                quantity = %ingredient.current_quantity,
                threshold = %ingredient.min_threshold,
                unit = %ingredient.unit,
                "Low stock"
            );
        }
        Ok(())
    }
}

/// Outcome of a scan that may notify
#[derive(Debug, Clone, Serialize)]
pub struct LowStockReport {
    pub ingredients: Vec<Ingredient>,
    pub notified: bool,
}

#[derive(Clone)]
pub struct LowStockMonitor {
    store: Arc<dyn Store>,
    notifier: Arc<dyn LowStockNotifier>,
}

impl LowStockMonitor {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn LowStockNotifier>) -> Self {
        Self { store, notifier }
    }

    /// Ingredients whose quantity is at or below their minimum threshold
    pub async fn scan(&self) -> AppResult<Vec<Ingredient>> {
        let mut uow = self.store.begin().await?;
        let ingredients = uow.low_stock_ingredients().await?;
        Ok(ingredients)
    }

    /// Scan, and hand a non-empty result to the notifier
    pub async fn scan_and_notify(&self) -> AppResult<LowStockReport> {
        let ingredients = self.scan().await?;
        if ingredients.is_empty() {
            return Ok(LowStockReport {
                ingredients,
                notified: false,
            });
        }

        self.notifier.notify(&ingredients).await?;
        tracing::info!(count = ingredients.len(), "Low stock notification sent");

        Ok(LowStockReport {
            ingredients,
            notified: true,
        })
    }
}

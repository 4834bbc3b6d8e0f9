//! Staff reads of orders

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Order, OrderDetails, OrderStatus};
use crate::store::{OrderRepository, Store};

#[derive(Clone)]
pub struct OrderQueries {
    store: Arc<dyn Store>,
}

impl OrderQueries {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Order with its line items and status history
    pub async fn get_order(&self, order_id: Uuid) -> AppResult<OrderDetails> {
        let mut uow = self.store.begin().await?;
        let order = uow
            .find_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
        let items = uow.order_items(order.id).await?;
        let history = uow.order_history(order.id).await?;

        Ok(OrderDetails {
            order,
            items,
            history,
        })
    }

    /// Orders newest first, optionally in one status
    pub async fn list_orders(&self, status: Option<OrderStatus>) -> AppResult<Vec<Order>> {
        let mut uow = self.store.begin().await?;
        let orders = uow.list_orders(status).await?;
        Ok(orders)
    }
}

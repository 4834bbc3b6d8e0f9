//! Persistence seam for orders, catalog, stock ledger and couriers
//!
//! Every change happens inside a [`UnitOfWork`]: either all of its writes
//! become visible on [`UnitOfWork::commit`], or none do when it is dropped.
//! `lock_*` reads hold the row until the unit ends.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Courier, Ingredient, InventoryCount, NewOrder, NewStockMovement, Order, OrderItem,
    OrderStatus, OrderStatusHistory, Product, RecipeLine, Requirement, StockMovement,
};
use shared::SlidingWindow;

pub use memory::{MemoryRateLimitStore, MemoryStore};
pub use postgres::{PgRateLimitStore, PgStore};

/// Entry point to a storage backend
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a unit of work
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    /// Check connectivity
    async fn ping(&self) -> AppResult<()>;
}

/// Atomic set of reads and writes
#[async_trait]
pub trait UnitOfWork:
    OrderRepository + CatalogRepository + LedgerRepository + CourierRepository + Send
{
    /// Make every write of this unit visible
    async fn commit(self: Box<Self>) -> AppResult<()>;
}

#[async_trait]
pub trait OrderRepository: Send {
    /// Insert the order with status `new` and its line item snapshots
    async fn insert_order(&mut self, order: &NewOrder) -> AppResult<Order>;

    async fn find_order(&mut self, id: Uuid) -> AppResult<Option<Order>>;

    /// Read and lock the order row
    async fn lock_order(&mut self, id: Uuid) -> AppResult<Option<Order>>;

    /// Newest first
    async fn list_orders(&mut self, status: Option<OrderStatus>) -> AppResult<Vec<Order>>;

    async fn order_items(&mut self, order_id: Uuid) -> AppResult<Vec<OrderItem>>;

    /// Oldest first
    async fn order_history(&mut self, order_id: Uuid) -> AppResult<Vec<OrderStatusHistory>>;

    async fn insert_status_history(
        &mut self,
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
        changed_by: Uuid,
    ) -> AppResult<OrderStatusHistory>;

    async fn update_order_status(&mut self, id: Uuid, status: OrderStatus) -> AppResult<Order>;

    async fn set_order_courier(&mut self, id: Uuid, courier_id: Option<Uuid>) -> AppResult<Order>;

    /// Record that an order's stock was deducted. Returns `false` when it
    /// already was; backed by a unique key on the order id.
    async fn claim_deduction(&mut self, order_id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait CatalogRepository: Send {
    async fn insert_product(&mut self, name: &str, price: Decimal) -> AppResult<Product>;

    async fn find_product(&mut self, id: Uuid) -> AppResult<Option<Product>>;

    /// Replace every recipe edge of a product
    async fn replace_recipe(
        &mut self,
        product_id: Uuid,
        lines: &[Requirement],
    ) -> AppResult<Vec<RecipeLine>>;

    async fn recipe_lines(&mut self, product_id: Uuid) -> AppResult<Vec<RecipeLine>>;
}

#[async_trait]
pub trait LedgerRepository: Send {
    /// Insert an ingredient with zero stock
    async fn insert_ingredient(
        &mut self,
        name: &str,
        unit: &str,
        min_threshold: Decimal,
        cost_per_unit: Option<Decimal>,
    ) -> AppResult<Ingredient>;

    async fn find_ingredient(&mut self, id: Uuid) -> AppResult<Option<Ingredient>>;

    /// Read and lock the ingredient row
    async fn lock_ingredient(&mut self, id: Uuid) -> AppResult<Option<Ingredient>>;

    async fn list_ingredients(&mut self) -> AppResult<Vec<Ingredient>>;

    /// Ingredients whose quantity is at or below their threshold
    async fn low_stock_ingredients(&mut self) -> AppResult<Vec<Ingredient>>;

    /// Insert the movement and shift the ingredient's quantity by its signed
    /// delta in one step. Fails with `NotFound` for an unknown ingredient.
    async fn insert_movement(
        &mut self,
        movement: &NewStockMovement,
    ) -> AppResult<(StockMovement, Ingredient)>;

    /// Oldest first
    async fn movements_for_ingredient(&mut self, ingredient_id: Uuid)
        -> AppResult<Vec<StockMovement>>;

    async fn movements_by_reference(
        &mut self,
        reference_type: &str,
        reference_id: Uuid,
    ) -> AppResult<Vec<StockMovement>>;

    async fn insert_count(
        &mut self,
        ingredient_id: Uuid,
        expected_quantity: Decimal,
        actual_quantity: Decimal,
        notes: Option<&str>,
        counted_by: Option<Uuid>,
    ) -> AppResult<InventoryCount>;

    /// Read and lock the count row
    async fn lock_count(&mut self, id: Uuid) -> AppResult<Option<InventoryCount>>;

    /// Flip `applied` to true. Fails with `AlreadyApplied` if it already was.
    async fn mark_count_applied(&mut self, id: Uuid) -> AppResult<InventoryCount>;

    /// Newest first
    async fn list_counts(&mut self, pending_only: bool) -> AppResult<Vec<InventoryCount>>;
}

#[async_trait]
pub trait CourierRepository: Send {
    async fn insert_courier(
        &mut self,
        name: &str,
        phone: &str,
        vehicle_type: Option<&str>,
        max_orders: i32,
    ) -> AppResult<Courier>;

    /// Read and lock the courier row
    async fn lock_courier(&mut self, id: Uuid) -> AppResult<Option<Courier>>;

    async fn list_couriers(&mut self) -> AppResult<Vec<Courier>>;

    async fn set_courier_load(&mut self, id: Uuid, current_order_count: i32) -> AppResult<Courier>;

    async fn set_courier_availability(&mut self, id: Uuid, available: bool) -> AppResult<Courier>;
}

/// Shared storage for the public intake rate limiter
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Apply `window` to the hits recorded for `key`: prune, then record
    /// `now` iff there is room. Check and record are one atomic step.
    async fn hit(&self, key: &str, window: SlidingWindow, now: DateTime<Utc>) -> AppResult<bool>;
}

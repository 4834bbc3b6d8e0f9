//! In-process storage
//!
//! Units of work are serialised behind one async mutex and operate on a copy
//! of the state that replaces the original only on commit, so a dropped unit
//! leaves nothing behind.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::max_stock_quantity;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    CatalogRepository, CourierRepository, LedgerRepository, OrderRepository, RateLimitStore, Store,
    UnitOfWork,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    Courier, Ingredient, InventoryCount, NewOrder, NewStockMovement, Order, OrderItem,
    OrderStatus, OrderStatusHistory, Product, RecipeLine, Requirement, SlidingWindow,
    StockMovement,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    orders: HashMap<Uuid, Order>,
    order_items: Vec<OrderItem>,
    history: Vec<OrderStatusHistory>,
    deducted_orders: HashSet<Uuid>,
    products: HashMap<Uuid, Product>,
    recipes: Vec<RecipeLine>,
    ingredients: HashMap<Uuid, Ingredient>,
    movements: Vec<StockMovement>,
    counts: HashMap<Uuid, InventoryCount>,
    couriers: HashMap<Uuid, Courier>,
    /// Ingredients whose postings fail, for exercising rollback paths
    failing_ingredients: HashSet<Uuid>,
}

/// Store kept in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every posting against `ingredient_id` fail with a storage error
    pub async fn fail_postings_for(&self, ingredient_id: Uuid) {
        self.state.lock().await.failing_ingredients.insert(ingredient_id);
    }

    pub async fn clear_posting_failures(&self) {
        self.state.lock().await.failing_ingredients.clear();
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, work }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

fn sorted_newest_first<T, F>(mut rows: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    rows
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for MemoryUnitOfWork {
    async fn insert_order(&mut self, new: &NewOrder) -> AppResult<Order> {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            customer_name: new.customer_name.clone(),
            phone: new.phone.clone(),
            address: new.address.clone(),
            delivery_zone: new.delivery_zone.clone(),
            payment_type: new.payment_type,
            notes: new.notes.clone(),
            total_price: new.total_price,
            status: OrderStatus::New,
            courier_id: None,
            created_at: now,
            updated_at: now,
        };
        for item in &new.items {
            self.work.order_items.push(OrderItem {
                id: Uuid::new_v4(),
                order_id: order.id,
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                price: item.price,
                quantity: item.quantity,
            });
        }
        self.work.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find_order(&mut self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.work.orders.get(&id).cloned())
    }

    async fn lock_order(&mut self, id: Uuid) -> AppResult<Option<Order>> {
        self.find_order(id).await
    }

    async fn list_orders(&mut self, status: Option<OrderStatus>) -> AppResult<Vec<Order>> {
        let orders = self
            .work
            .orders
            .values()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        Ok(sorted_newest_first(orders, |o: &Order| o.created_at))
    }

    async fn order_items(&mut self, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
        Ok(self
            .work
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn order_history(&mut self, order_id: Uuid) -> AppResult<Vec<OrderStatusHistory>> {
        Ok(self
            .work
            .history
            .iter()
            .filter(|h| h.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn insert_status_history(
        &mut self,
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
        changed_by: Uuid,
    ) -> AppResult<OrderStatusHistory> {
        let row = OrderStatusHistory {
            id: Uuid::new_v4(),
            order_id,
            old_status,
            new_status,
            changed_by,
            created_at: Utc::now(),
        };
        self.work.history.push(row.clone());
        Ok(row)
    }

    async fn update_order_status(&mut self, id: Uuid, status: OrderStatus) -> AppResult<Order> {
        let order = self
            .work
            .orders
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn set_order_courier(&mut self, id: Uuid, courier_id: Option<Uuid>) -> AppResult<Order> {
        let order = self
            .work
            .orders
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
        order.courier_id = courier_id;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn claim_deduction(&mut self, order_id: Uuid) -> AppResult<bool> {
        Ok(self.work.deducted_orders.insert(order_id))
    }
}

#[async_trait]
impl CatalogRepository for MemoryUnitOfWork {
    async fn insert_product(&mut self, name: &str, price: Decimal) -> AppResult<Product> {
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price,
            is_active: true,
            created_at: Utc::now(),
        };
        self.work.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn find_product(&mut self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.work.products.get(&id).cloned())
    }

    async fn replace_recipe(
        &mut self,
        product_id: Uuid,
        lines: &[Requirement],
    ) -> AppResult<Vec<RecipeLine>> {
        if !self.work.products.contains_key(&product_id) {
            return Err(AppError::NotFound("Product".to_string()));
        }
        if let Some(missing) = lines
            .iter()
            .find(|l| !self.work.ingredients.contains_key(&l.ingredient_id))
        {
            return Err(AppError::NotFound(format!("Ingredient {}", missing.ingredient_id)));
        }
        self.work.recipes.retain(|r| r.product_id != product_id);
        let edges: Vec<RecipeLine> = lines
            .iter()
            .map(|l| RecipeLine {
                product_id,
                ingredient_id: l.ingredient_id,
                quantity_per_unit: l.quantity,
            })
            .collect();
        self.work.recipes.extend(edges.iter().cloned());
        Ok(edges)
    }

    async fn recipe_lines(&mut self, product_id: Uuid) -> AppResult<Vec<RecipeLine>> {
        Ok(self
            .work
            .recipes
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerRepository for MemoryUnitOfWork {
    async fn insert_ingredient(
        &mut self,
        name: &str,
        unit: &str,
        min_threshold: Decimal,
        cost_per_unit: Option<Decimal>,
    ) -> AppResult<Ingredient> {
        let now = Utc::now();
        let ingredient = Ingredient {
            id: Uuid::new_v4(),
            name: name.to_string(),
            unit: unit.to_string(),
            current_quantity: Decimal::ZERO,
            min_threshold,
            cost_per_unit,
            created_at: now,
            updated_at: now,
        };
        self.work.ingredients.insert(ingredient.id, ingredient.clone());
        Ok(ingredient)
    }

    async fn find_ingredient(&mut self, id: Uuid) -> AppResult<Option<Ingredient>> {
        Ok(self.work.ingredients.get(&id).cloned())
    }

    async fn lock_ingredient(&mut self, id: Uuid) -> AppResult<Option<Ingredient>> {
        self.find_ingredient(id).await
    }

    async fn list_ingredients(&mut self) -> AppResult<Vec<Ingredient>> {
        let mut ingredients: Vec<Ingredient> = self.work.ingredients.values().cloned().collect();
        ingredients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ingredients)
    }

    async fn low_stock_ingredients(&mut self) -> AppResult<Vec<Ingredient>> {
        let mut low: Vec<Ingredient> = self
            .work
            .ingredients
            .values()
            .filter(|i| i.is_low_stock())
            .cloned()
            .collect();
        low.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(low)
    }

    async fn insert_movement(
        &mut self,
        movement: &NewStockMovement,
    ) -> AppResult<(StockMovement, Ingredient)> {
        if self.work.failing_ingredients.contains(&movement.ingredient_id) {
            return Err(AppError::Storage(format!(
                "posting rejected for ingredient {}",
                movement.ingredient_id
            )));
        }
        let now = Utc::now();
        let ingredient = self
            .work
            .ingredients
            .get_mut(&movement.ingredient_id)
            .ok_or_else(|| AppError::NotFound("Ingredient".to_string()))?;
        ingredient.current_quantity = ingredient
            .current_quantity
            .checked_add(movement.signed_delta())
            .filter(|quantity| quantity.abs() <= max_stock_quantity())
            .ok_or_else(|| AppError::validation("ingredient quantity is out of range"))?;
        ingredient.updated_at = now;
        let ingredient = ingredient.clone();

        let row = StockMovement {
            id: Uuid::new_v4(),
            ingredient_id: movement.ingredient_id,
            kind: movement.kind,
            quantity: movement.quantity,
            unit_cost: movement.unit_cost,
            total_cost: movement.total_cost(),
            supplier_id: movement.supplier_id,
            expiry_date: movement.expiry_date,
            reference_type: movement.reference_type.clone(),
            reference_id: movement.reference_id,
            notes: movement.notes.clone(),
            created_by: movement.created_by,
            created_at: now,
        };
        self.work.movements.push(row.clone());
        Ok((row, ingredient))
    }

    async fn movements_for_ingredient(
        &mut self,
        ingredient_id: Uuid,
    ) -> AppResult<Vec<StockMovement>> {
        Ok(self
            .work
            .movements
            .iter()
            .filter(|m| m.ingredient_id == ingredient_id)
            .cloned()
            .collect())
    }

    async fn movements_by_reference(
        &mut self,
        reference_type: &str,
        reference_id: Uuid,
    ) -> AppResult<Vec<StockMovement>> {
        Ok(self
            .work
            .movements
            .iter()
            .filter(|m| {
                m.reference_type.as_deref() == Some(reference_type)
                    && m.reference_id == Some(reference_id)
            })
            .cloned()
            .collect())
    }

    async fn insert_count(
        &mut self,
        ingredient_id: Uuid,
        expected_quantity: Decimal,
        actual_quantity: Decimal,
        notes: Option<&str>,
        counted_by: Option<Uuid>,
    ) -> AppResult<InventoryCount> {
        let count = InventoryCount {
            id: Uuid::new_v4(),
            ingredient_id,
            expected_quantity,
            actual_quantity,
            difference: actual_quantity - expected_quantity,
            applied: false,
            applied_at: None,
            notes: notes.map(str::to_string),
            counted_by,
            created_at: Utc::now(),
        };
        self.work.counts.insert(count.id, count.clone());
        Ok(count)
    }

    async fn lock_count(&mut self, id: Uuid) -> AppResult<Option<InventoryCount>> {
        Ok(self.work.counts.get(&id).cloned())
    }

    async fn mark_count_applied(&mut self, id: Uuid) -> AppResult<InventoryCount> {
        let count = self
            .work
            .counts
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Inventory count".to_string()))?;
        if count.applied {
            return Err(AppError::AlreadyApplied);
        }
        count.applied = true;
        count.applied_at = Some(Utc::now());
        Ok(count.clone())
    }

    async fn list_counts(&mut self, pending_only: bool) -> AppResult<Vec<InventoryCount>> {
        let counts = self
            .work
            .counts
            .values()
            .filter(|c| !pending_only || !c.applied)
            .cloned()
            .collect();
        Ok(sorted_newest_first(counts, |c: &InventoryCount| c.created_at))
    }
}

#[async_trait]
impl CourierRepository for MemoryUnitOfWork {
    async fn insert_courier(
        &mut self,
        name: &str,
        phone: &str,
        vehicle_type: Option<&str>,
        max_orders: i32,
    ) -> AppResult<Courier> {
        let courier = Courier {
            id: Uuid::new_v4(),
            name: name.to_string(),
            phone: phone.to_string(),
            vehicle_type: vehicle_type.map(str::to_string),
            is_active: true,
            is_available: true,
            current_order_count: 0,
            max_orders,
            created_at: Utc::now(),
        };
        self.work.couriers.insert(courier.id, courier.clone());
        Ok(courier)
    }

    async fn lock_courier(&mut self, id: Uuid) -> AppResult<Option<Courier>> {
        Ok(self.work.couriers.get(&id).cloned())
    }

    async fn list_couriers(&mut self) -> AppResult<Vec<Courier>> {
        let mut couriers: Vec<Courier> = self.work.couriers.values().cloned().collect();
        couriers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(couriers)
    }

    async fn set_courier_load(&mut self, id: Uuid, current_order_count: i32) -> AppResult<Courier> {
        let courier = self
            .work
            .couriers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Courier".to_string()))?;
        if current_order_count < 0 || current_order_count > courier.max_orders {
            return Err(AppError::Storage(format!(
                "courier load {} outside 0..={}",
                current_order_count, courier.max_orders
            )));
        }
        courier.current_order_count = current_order_count;
        Ok(courier.clone())
    }

    async fn set_courier_availability(&mut self, id: Uuid, available: bool) -> AppResult<Courier> {
        let courier = self
            .work
            .couriers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Courier".to_string()))?;
        courier.is_available = available;
        Ok(courier.clone())
    }
}

/// Per-process rate limit hits
#[derive(Clone, Default)]
pub struct MemoryRateLimitStore {
    hits: Arc<Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop keys with no hits left inside `window`
    pub async fn cleanup(&self, window: SlidingWindow, now: DateTime<Utc>) {
        let cutoff = window.cutoff(now);
        let mut hits = self.hits.lock().await;
        hits.retain(|_, key_hits| key_hits.back().is_some_and(|last| *last > cutoff));
    }

    pub async fn tracked_keys(&self) -> usize {
        self.hits.lock().await.len()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(&self, key: &str, window: SlidingWindow, now: DateTime<Utc>) -> AppResult<bool> {
        let mut hits = self.hits.lock().await;
        let key_hits = hits.entry(key.to_owned()).or_default();
        Ok(window.admit(key_hits, now))
    }
}

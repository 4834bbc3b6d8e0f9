//! PostgreSQL storage
//!
//! A unit of work is one database transaction. Row locks come from
//! `SELECT ... FOR UPDATE`, and the deduction marker relies on the primary
//! key of `order_deductions`.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
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

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

fn parse_column<T>(column: &str, value: &str) -> AppResult<T>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e| AppError::Storage(format!("bad {} column: {}", column, e)))
}

// ============================================================================
// Rows
// ============================================================================

const ORDER_COLUMNS: &str = "id, customer_name, phone, address, delivery_zone, payment_type, \
     notes, total_price, status, courier_id, created_at, updated_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    customer_name: String,
    phone: String,
    address: String,
    delivery_zone: Option<String>,
    payment_type: String,
    notes: Option<String>,
    total_price: Decimal,
    status: String,
    courier_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> AppResult<Self> {
        Ok(Order {
            id: row.id,
            customer_name: row.customer_name,
            phone: row.phone,
            address: row.address,
            delivery_zone: row.delivery_zone,
            payment_type: parse_column("payment_type", &row.payment_type)?,
            notes: row.notes,
            total_price: row.total_price,
            status: parse_column("status", &row.status)?,
            courier_id: row.courier_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Option<Uuid>,
    product_name: String,
    price: Decimal,
    quantity: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            price: row.price,
            quantity: row.quantity,
        }
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    id: Uuid,
    order_id: Uuid,
    old_status: String,
    new_status: String,
    changed_by: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for OrderStatusHistory {
    type Error = AppError;

    fn try_from(row: HistoryRow) -> AppResult<Self> {
        Ok(OrderStatusHistory {
            id: row.id,
            order_id: row.order_id,
            old_status: parse_column("old_status", &row.old_status)?,
            new_status: parse_column("new_status", &row.new_status)?,
            changed_by: row.changed_by,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price: Decimal,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            price: row.price,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RecipeLineRow {
    product_id: Uuid,
    ingredient_id: Uuid,
    quantity_per_unit: Decimal,
}

impl From<RecipeLineRow> for RecipeLine {
    fn from(row: RecipeLineRow) -> Self {
        RecipeLine {
            product_id: row.product_id,
            ingredient_id: row.ingredient_id,
            quantity_per_unit: row.quantity_per_unit,
        }
    }
}

const INGREDIENT_COLUMNS: &str =
    "id, name, unit, current_quantity, min_threshold, cost_per_unit, created_at, updated_at";

#[derive(Debug, FromRow)]
struct IngredientRow {
    id: Uuid,
    name: String,
    unit: String,
    current_quantity: Decimal,
    min_threshold: Decimal,
    cost_per_unit: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<IngredientRow> for Ingredient {
    fn from(row: IngredientRow) -> Self {
        Ingredient {
            id: row.id,
            name: row.name,
            unit: row.unit,
            current_quantity: row.current_quantity,
            min_threshold: row.min_threshold,
            cost_per_unit: row.cost_per_unit,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const MOVEMENT_COLUMNS: &str = "id, ingredient_id, kind, quantity, unit_cost, total_cost, \
     supplier_id, expiry_date, reference_type, reference_id, notes, created_by, created_at";

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    ingredient_id: Uuid,
    kind: String,
    quantity: Decimal,
    unit_cost: Option<Decimal>,
    total_cost: Option<Decimal>,
    supplier_id: Option<Uuid>,
    expiry_date: Option<NaiveDate>,
    reference_type: Option<String>,
    reference_id: Option<Uuid>,
    notes: Option<String>,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> AppResult<Self> {
        Ok(StockMovement {
            id: row.id,
            ingredient_id: row.ingredient_id,
            kind: parse_column("kind", &row.kind)?,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            total_cost: row.total_cost,
            supplier_id: row.supplier_id,
            expiry_date: row.expiry_date,
            reference_type: row.reference_type,
            reference_id: row.reference_id,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

const COUNT_COLUMNS: &str = "id, ingredient_id, expected_quantity, actual_quantity, difference, \
     applied, applied_at, notes, counted_by, created_at";

#[derive(Debug, FromRow)]
struct CountRow {
    id: Uuid,
    ingredient_id: Uuid,
    expected_quantity: Decimal,
    actual_quantity: Decimal,
    difference: Decimal,
    applied: bool,
    applied_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    counted_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<CountRow> for InventoryCount {
    fn from(row: CountRow) -> Self {
        InventoryCount {
            id: row.id,
            ingredient_id: row.ingredient_id,
            expected_quantity: row.expected_quantity,
            actual_quantity: row.actual_quantity,
            difference: row.difference,
            applied: row.applied,
            applied_at: row.applied_at,
            notes: row.notes,
            counted_by: row.counted_by,
            created_at: row.created_at,
        }
    }
}

const COURIER_COLUMNS: &str = "id, name, phone, vehicle_type, is_active, is_available, \
     current_order_count, max_orders, created_at";

#[derive(Debug, FromRow)]
struct CourierRow {
    id: Uuid,
    name: String,
    phone: String,
    vehicle_type: Option<String>,
    is_active: bool,
    is_available: bool,
    current_order_count: i32,
    max_orders: i32,
    created_at: DateTime<Utc>,
}

impl From<CourierRow> for Courier {
    fn from(row: CourierRow) -> Self {
        Courier {
            id: row.id,
            name: row.name,
            phone: row.phone,
            vehicle_type: row.vehicle_type,
            is_active: row.is_active,
            is_available: row.is_available,
            current_order_count: row.current_order_count,
            max_orders: row.max_orders,
            created_at: row.created_at,
        }
    }
}

// ============================================================================
// Unit of work
// ============================================================================

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgUnitOfWork {
    async fn insert_order(&mut self, new: &NewOrder) -> AppResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO orders (customer_name, phone, address, delivery_zone, payment_type,
                                notes, total_price, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(&new.customer_name)
        .bind(&new.phone)
        .bind(&new.address)
        .bind(&new.delivery_zone)
        .bind(new.payment_type.as_str())
        .bind(&new.notes)
        .bind(new.total_price)
        .bind(OrderStatus::New.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        for item in &new.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, price, quantity)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(row.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.price)
            .bind(item.quantity)
            .execute(&mut *self.tx)
            .await?;
        }

        row.try_into()
    }

    async fn find_order(&mut self, id: Uuid) -> AppResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Order::try_from)
        .transpose()
    }

    async fn lock_order(&mut self, id: Uuid) -> AppResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Order::try_from)
        .transpose()
    }

    async fn list_orders(&mut self, status: Option<OrderStatus>) -> AppResult<Vec<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {} FROM orders
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
            ORDER_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(Order::try_from)
        .collect()
    }

    async fn order_items(&mut self, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, order_id, product_id, product_name, price, quantity
            FROM order_items
            WHERE order_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn order_history(&mut self, order_id: Uuid) -> AppResult<Vec<OrderStatusHistory>> {
        sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, order_id, old_status, new_status, changed_by, created_at
            FROM order_status_history
            WHERE order_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(OrderStatusHistory::try_from)
        .collect()
    }

    async fn insert_status_history(
        &mut self,
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
        changed_by: Uuid,
    ) -> AppResult<OrderStatusHistory> {
        sqlx::query_as::<_, HistoryRow>(
            r#"
            INSERT INTO order_status_history (order_id, old_status, new_status, changed_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, order_id, old_status, new_status, changed_by, created_at
            "#,
        )
        .bind(order_id)
        .bind(old_status.as_str())
        .bind(new_status.as_str())
        .bind(changed_by)
        .fetch_one(&mut *self.tx)
        .await?
        .try_into()
    }

    async fn update_order_status(&mut self, id: Uuid, status: OrderStatus) -> AppResult<Order> {
        sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?
        .try_into()
    }

    async fn set_order_courier(&mut self, id: Uuid, courier_id: Option<Uuid>) -> AppResult<Order> {
        sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders SET courier_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(courier_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?
        .try_into()
    }

    async fn claim_deduction(&mut self, order_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO order_deductions (order_id) VALUES ($1) ON CONFLICT (order_id) DO NOTHING",
        )
        .bind(order_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl CatalogRepository for PgUnitOfWork {
    async fn insert_product(&mut self, name: &str, price: Decimal) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            INSERT INTO products (name, price)
            VALUES ($1, $2)
            RETURNING id, name, price, is_active, created_at
            "#,
        )
        .bind(name)
        .bind(price)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn find_product(&mut self, id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, price, is_active, created_at FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn replace_recipe(
        &mut self,
        product_id: Uuid,
        lines: &[Requirement],
    ) -> AppResult<Vec<RecipeLine>> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)",
        )
        .bind(product_id)
        .fetch_one(&mut *self.tx)
        .await?;

        if !exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        sqlx::query("DELETE FROM recipe_lines WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *self.tx)
            .await?;

        let mut edges = Vec::with_capacity(lines.len());
        for line in lines {
            let known = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM ingredients WHERE id = $1)",
            )
            .bind(line.ingredient_id)
            .fetch_one(&mut *self.tx)
            .await?;

            if !known {
                return Err(AppError::NotFound(format!("Ingredient {}", line.ingredient_id)));
            }

            let row = sqlx::query_as::<_, RecipeLineRow>(
                r#"
                INSERT INTO recipe_lines (product_id, ingredient_id, quantity_per_unit)
                VALUES ($1, $2, $3)
                RETURNING product_id, ingredient_id, quantity_per_unit
                "#,
            )
            .bind(product_id)
            .bind(line.ingredient_id)
            .bind(line.quantity)
            .fetch_one(&mut *self.tx)
            .await?;
            edges.push(row.into());
        }

        Ok(edges)
    }

    async fn recipe_lines(&mut self, product_id: Uuid) -> AppResult<Vec<RecipeLine>> {
        let rows = sqlx::query_as::<_, RecipeLineRow>(
            r#"
            SELECT product_id, ingredient_id, quantity_per_unit
            FROM recipe_lines
            WHERE product_id = $1
            ORDER BY ingredient_id
            "#,
        )
        .bind(product_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(RecipeLine::from).collect())
    }
}

#[async_trait]
impl LedgerRepository for PgUnitOfWork {
    async fn insert_ingredient(
        &mut self,
        name: &str,
        unit: &str,
        min_threshold: Decimal,
        cost_per_unit: Option<Decimal>,
    ) -> AppResult<Ingredient> {
        let row = sqlx::query_as::<_, IngredientRow>(&format!(
            r#"
            INSERT INTO ingredients (name, unit, current_quantity, min_threshold, cost_per_unit)
            VALUES ($1, $2, 0, $3, $4)
            RETURNING {}
            "#,
            INGREDIENT_COLUMNS
        ))
        .bind(name)
        .bind(unit)
        .bind(min_threshold)
        .bind(cost_per_unit)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn find_ingredient(&mut self, id: Uuid) -> AppResult<Option<Ingredient>> {
        let row = sqlx::query_as::<_, IngredientRow>(&format!(
            "SELECT {} FROM ingredients WHERE id = $1",
            INGREDIENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Ingredient::from))
    }

    async fn lock_ingredient(&mut self, id: Uuid) -> AppResult<Option<Ingredient>> {
        let row = sqlx::query_as::<_, IngredientRow>(&format!(
            "SELECT {} FROM ingredients WHERE id = $1 FOR UPDATE",
            INGREDIENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Ingredient::from))
    }

    async fn list_ingredients(&mut self) -> AppResult<Vec<Ingredient>> {
        let rows = sqlx::query_as::<_, IngredientRow>(&format!(
            "SELECT {} FROM ingredients ORDER BY name",
            INGREDIENT_COLUMNS
        ))
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Ingredient::from).collect())
    }

    async fn low_stock_ingredients(&mut self) -> AppResult<Vec<Ingredient>> {
        let rows = sqlx::query_as::<_, IngredientRow>(&format!(
            "SELECT {} FROM ingredients WHERE current_quantity <= min_threshold ORDER BY name",
            INGREDIENT_COLUMNS
        ))
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Ingredient::from).collect())
    }

    async fn insert_movement(
        &mut self,
        movement: &NewStockMovement,
    ) -> AppResult<(StockMovement, Ingredient)> {
        let ingredient = sqlx::query_as::<_, IngredientRow>(&format!(
            r#"
            UPDATE ingredients
            SET current_quantity = current_quantity + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            INGREDIENT_COLUMNS
        ))
        .bind(movement.ingredient_id)
        .bind(movement.signed_delta())
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Ingredient".to_string()))?;

        let row = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            INSERT INTO stock_movements (
                ingredient_id, kind, quantity, unit_cost, total_cost, supplier_id,
                expiry_date, reference_type, reference_id, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(movement.ingredient_id)
        .bind(movement.kind.as_str())
        .bind(movement.quantity)
        .bind(movement.unit_cost)
        .bind(movement.total_cost())
        .bind(movement.supplier_id)
        .bind(movement.expiry_date)
        .bind(&movement.reference_type)
        .bind(movement.reference_id)
        .bind(&movement.notes)
        .bind(movement.created_by)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok((row.try_into()?, ingredient.into()))
    }

    async fn movements_for_ingredient(
        &mut self,
        ingredient_id: Uuid,
    ) -> AppResult<Vec<StockMovement>> {
        sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {} FROM stock_movements WHERE ingredient_id = $1 ORDER BY created_at, id",
            MOVEMENT_COLUMNS
        ))
        .bind(ingredient_id)
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(StockMovement::try_from)
        .collect()
    }

    async fn movements_by_reference(
        &mut self,
        reference_type: &str,
        reference_id: Uuid,
    ) -> AppResult<Vec<StockMovement>> {
        sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            SELECT {} FROM stock_movements
            WHERE reference_type = $1 AND reference_id = $2
            ORDER BY created_at, id
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(reference_type)
        .bind(reference_id)
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(StockMovement::try_from)
        .collect()
    }

    async fn insert_count(
        &mut self,
        ingredient_id: Uuid,
        expected_quantity: Decimal,
        actual_quantity: Decimal,
        notes: Option<&str>,
        counted_by: Option<Uuid>,
    ) -> AppResult<InventoryCount> {
        let row = sqlx::query_as::<_, CountRow>(&format!(
            r#"
            INSERT INTO inventory_counts (
                ingredient_id, expected_quantity, actual_quantity, difference, notes, counted_by
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            COUNT_COLUMNS
        ))
        .bind(ingredient_id)
        .bind(expected_quantity)
        .bind(actual_quantity)
        .bind(actual_quantity - expected_quantity)
        .bind(notes)
        .bind(counted_by)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn lock_count(&mut self, id: Uuid) -> AppResult<Option<InventoryCount>> {
        let row = sqlx::query_as::<_, CountRow>(&format!(
            "SELECT {} FROM inventory_counts WHERE id = $1 FOR UPDATE",
            COUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(InventoryCount::from))
    }

    async fn mark_count_applied(&mut self, id: Uuid) -> AppResult<InventoryCount> {
        let row = sqlx::query_as::<_, CountRow>(&format!(
            r#"
            UPDATE inventory_counts SET applied = TRUE, applied_at = NOW()
            WHERE id = $1 AND applied = FALSE
            RETURNING {}
            "#,
            COUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(AppError::AlreadyApplied)?;

        Ok(row.into())
    }

    async fn list_counts(&mut self, pending_only: bool) -> AppResult<Vec<InventoryCount>> {
        let rows = sqlx::query_as::<_, CountRow>(&format!(
            r#"
            SELECT {} FROM inventory_counts
            WHERE ($1 = FALSE OR applied = FALSE)
            ORDER BY created_at DESC
            "#,
            COUNT_COLUMNS
        ))
        .bind(pending_only)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(InventoryCount::from).collect())
    }
}

#[async_trait]
impl CourierRepository for PgUnitOfWork {
    async fn insert_courier(
        &mut self,
        name: &str,
        phone: &str,
        vehicle_type: Option<&str>,
        max_orders: i32,
    ) -> AppResult<Courier> {
        let row = sqlx::query_as::<_, CourierRow>(&format!(
            r#"
            INSERT INTO couriers (name, phone, vehicle_type, max_orders)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            COURIER_COLUMNS
        ))
        .bind(name)
        .bind(phone)
        .bind(vehicle_type)
        .bind(max_orders)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn lock_courier(&mut self, id: Uuid) -> AppResult<Option<Courier>> {
        let row = sqlx::query_as::<_, CourierRow>(&format!(
            "SELECT {} FROM couriers WHERE id = $1 FOR UPDATE",
            COURIER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Courier::from))
    }

    async fn list_couriers(&mut self) -> AppResult<Vec<Courier>> {
        let rows = sqlx::query_as::<_, CourierRow>(&format!(
            "SELECT {} FROM couriers ORDER BY name",
            COURIER_COLUMNS
        ))
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Courier::from).collect())
    }

    async fn set_courier_load(&mut self, id: Uuid, current_order_count: i32) -> AppResult<Courier> {
        // The table's CHECK keeps the count within 0..=max_orders
        let row = sqlx::query_as::<_, CourierRow>(&format!(
            r#"
            UPDATE couriers SET current_order_count = $2
            WHERE id = $1
            RETURNING {}
            "#,
            COURIER_COLUMNS
        ))
        .bind(id)
        .bind(current_order_count)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Courier".to_string()))?;

        Ok(row.into())
    }

    async fn set_courier_availability(&mut self, id: Uuid, available: bool) -> AppResult<Courier> {
        let row = sqlx::query_as::<_, CourierRow>(&format!(
            r#"
            UPDATE couriers SET is_available = $2
            WHERE id = $1
            RETURNING {}
            "#,
            COURIER_COLUMNS
        ))
        .bind(id)
        .bind(available)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Courier".to_string()))?;

        Ok(row.into())
    }
}

/// Rate limit hits shared by every server process on the database
#[derive(Clone)]
pub struct PgRateLimitStore {
    db: PgPool,
}

impl PgRateLimitStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Delete hits of every key that have left `window`
    pub async fn cleanup(&self, window: SlidingWindow, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM rate_limit_hits WHERE hit_at <= $1")
            .bind(window.cutoff(now))
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RateLimitStore for PgRateLimitStore {
    async fn hit(&self, key: &str, window: SlidingWindow, now: DateTime<Utc>) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;

        // Serialise concurrent hits for the same key until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM rate_limit_hits WHERE client_key = $1 AND hit_at <= $2")
            .bind(key)
            .bind(window.cutoff(now))
            .execute(&mut *tx)
            .await?;

        let recent = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM rate_limit_hits WHERE client_key = $1",
        )
        .bind(key)
        .fetch_one(&mut *tx)
        .await?;

        let admitted = usize::try_from(recent).map_or(false, |n| n < window.max_hits);
        if admitted {
            sqlx::query("INSERT INTO rate_limit_hits (client_key, hit_at) VALUES ($1, $2)")
                .bind(key)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(admitted)
    }
}

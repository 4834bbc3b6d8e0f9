//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use restaurant_ops::models::{
    Actor, Courier, Ingredient, IntakeItem, Order, OrderIntake, Product, SlidingWindow,
};
use restaurant_ops::services::catalog::{
    CatalogService, CreateProductInput, RecipeLineInput, SetRecipeInput,
};
use restaurant_ops::services::courier::{CourierAssignmentTracker, CreateCourierInput};
use restaurant_ops::services::inventory::{CreateIngredientInput, IngredientLedger};
use restaurant_ops::services::{OrderIntakeService, RateLimiter};
use restaurant_ops::store::{MemoryRateLimitStore, MemoryStore, Store};

pub fn dec(value: i64) -> Decimal {
    Decimal::from(value)
}

/// In-memory store, plus the same store behind the trait object services take
pub fn memory_store() -> (MemoryStore, Arc<dyn Store>) {
    let store = MemoryStore::new();
    let shared: Arc<dyn Store> = Arc::new(store.clone());
    (store, shared)
}

pub fn staff() -> Actor {
    Actor::new(Uuid::new_v4(), true)
}

pub async fn ingredient(store: &Arc<dyn Store>, name: &str, opening: i64, threshold: i64) -> Ingredient {
    IngredientLedger::new(store.clone())
        .create_ingredient(
            CreateIngredientInput {
                name: name.to_string(),
                unit: "kg".to_string(),
                min_threshold: dec(threshold),
                cost_per_unit: None,
                opening_quantity: Some(dec(opening)),
            },
            None,
        )
        .await
        .unwrap()
}

pub async fn product(store: &Arc<dyn Store>, name: &str, recipe: &[(Uuid, i64)]) -> Product {
    let catalog = CatalogService::new(store.clone());
    let product = catalog
        .create_product(CreateProductInput {
            name: name.to_string(),
            price: dec(25_000),
        })
        .await
        .unwrap();

    catalog
        .set_recipe(
            product.id,
            SetRecipeInput {
                lines: recipe
                    .iter()
                    .map(|(ingredient_id, qty)| RecipeLineInput {
                        ingredient_id: *ingredient_id,
                        quantity_per_unit: dec(*qty),
                    })
                    .collect(),
            },
        )
        .await
        .unwrap();

    product
}

pub async fn courier(store: &Arc<dyn Store>, name: &str, max_orders: i32) -> Courier {
    CourierAssignmentTracker::new(store.clone())
        .create_courier(CreateCourierInput {
            name: name.to_string(),
            phone: "+998901112233".to_string(),
            vehicle_type: Some("scooter".to_string()),
            max_orders: Some(max_orders),
        })
        .await
        .unwrap()
}

pub fn item(product: Option<&Product>, price: i64, quantity: i32) -> IntakeItem {
    IntakeItem {
        product_id: product.map(|p| p.id),
        product_name: product.map_or_else(|| "Custom dish".to_string(), |p| p.name.clone()),
        price: dec(price),
        quantity,
    }
}

pub fn intake(items: Vec<IntakeItem>) -> OrderIntake {
    OrderIntake {
        user_fullname: "Dilnoza Karimova".to_string(),
        phone: "+998901234567".to_string(),
        address: "Tashkent, Yunusabad 4, apt 12".to_string(),
        delivery_zone: Some("north".to_string()),
        payment_type: Some("card".to_string()),
        notes: None,
        items,
    }
}

pub fn intake_service(store: &Arc<dyn Store>) -> OrderIntakeService {
    let limiter = RateLimiter::new(Arc::new(MemoryRateLimitStore::new()), SlidingWindow::default());
    OrderIntakeService::new(store.clone(), limiter)
}

/// Place an order through public intake under a fresh client key
pub async fn place_order(store: &Arc<dyn Store>, items: Vec<IntakeItem>) -> Order {
    intake_service(store)
        .submit(&Uuid::new_v4().to_string(), &intake(items))
        .await
        .unwrap()
}

//! Ingredient ledger tests
//!
//! Tests for stock movements including:
//! - Property 13: Stored quantity equals the signed sum of the ledger
//! - Property 14: Movement quantities are validated by kind
//! - Property 15: Low stock includes ingredients exactly at threshold

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use common::{dec, ingredient, memory_store};
use restaurant_ops::models::{Ingredient, MovementKind};
use restaurant_ops::services::inventory::{CreateIngredientInput, PostMovementInput};
use restaurant_ops::services::{IngredientLedger, LowStockMonitor, LowStockNotifier, TracingNotifier};
use restaurant_ops::{AppError, AppResult};

fn movement(ingredient_id: Uuid, kind: MovementKind, quantity: Decimal) -> PostMovementInput {
    PostMovementInput {
        ingredient_id,
        kind,
        quantity,
        unit_cost: None,
        supplier_id: None,
        expiry_date: None,
        notes: None,
    }
}

/// Notifier that remembers what it was told
#[derive(Default)]
struct RecordingNotifier {
    batches: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl LowStockNotifier for RecordingNotifier {
    async fn notify(&self, ingredients: &[Ingredient]) -> AppResult<()> {
        let names = ingredients.iter().map(|i| i.name.clone()).collect();
        self.batches.lock().unwrap().push(names);
        Ok(())
    }
}

// ============================================================================
// Postings
// ============================================================================

#[tokio::test]
async fn test_opening_stock_is_a_movement() {
    let (_, store) = memory_store();
    let flour = ingredient(&store, "Flour", 12, 2).await;
    assert_eq!(flour.current_quantity, dec(12));

    let movements = IngredientLedger::new(store).movements(flour.id).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].kind, MovementKind::In);
    assert_eq!(movements[0].quantity, dec(12));
    assert_eq!(movements[0].notes.as_deref(), Some("Opening stock"));
}

#[tokio::test]
async fn test_ingredient_without_opening_stock_has_no_movements() {
    let (_, store) = memory_store();
    let ledger = IngredientLedger::new(store);
    let spice = ledger
        .create_ingredient(
            CreateIngredientInput {
                name: "Cumin".to_string(),
                unit: "g".to_string(),
                min_threshold: dec(50),
                cost_per_unit: None,
                opening_quantity: None,
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(spice.current_quantity, Decimal::ZERO);
    assert!(ledger.movements(spice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_movement_kinds_move_stock() {
    let (_, store) = memory_store();
    let oil = ingredient(&store, "Oil", 10, 1).await;
    let ledger = IngredientLedger::new(store);

    ledger.post(movement(oil.id, MovementKind::In, dec(5)), None).await.unwrap();
    ledger.post(movement(oil.id, MovementKind::Out, dec(3)), None).await.unwrap();
    ledger.post(movement(oil.id, MovementKind::Waste, dec(1)), None).await.unwrap();
    ledger.post(movement(oil.id, MovementKind::Return, dec(2)), None).await.unwrap();
    ledger
        .post(movement(oil.id, MovementKind::Adjustment, dec(-4)), None)
        .await
        .unwrap();

    let balance = ledger.verify_balance(oil.id).await.unwrap();
    assert_eq!(balance.current_quantity, dec(9));
    assert_eq!(balance.ledger_quantity, dec(9));
    assert_eq!(balance.movement_count, 6);
    assert!(balance.consistent);
}

#[tokio::test]
async fn test_total_cost_uses_magnitude() {
    let (_, store) = memory_store();
    let oil = ingredient(&store, "Oil", 10, 1).await;
    let ledger = IngredientLedger::new(store);

    let mut purchase = movement(oil.id, MovementKind::In, dec(4));
    purchase.unit_cost = Some(dec(15_000));
    let row = ledger.post(purchase, None).await.unwrap();
    assert_eq!(row.total_cost, Some(dec(60_000)));

    let mut correction = movement(oil.id, MovementKind::Adjustment, dec(-2));
    correction.unit_cost = Some(dec(15_000));
    let row = ledger.post(correction, None).await.unwrap();
    assert_eq!(row.total_cost, Some(dec(30_000)));

    let row = ledger
        .post(movement(oil.id, MovementKind::Out, dec(1)), None)
        .await
        .unwrap();
    assert_eq!(row.total_cost, None);
}

#[tokio::test]
async fn test_invalid_quantities_are_rejected() {
    let (_, store) = memory_store();
    let oil = ingredient(&store, "Oil", 10, 1).await;
    let ledger = IngredientLedger::new(store);

    for (kind, quantity) in [
        (MovementKind::In, dec(0)),
        (MovementKind::Out, dec(-1)),
        (MovementKind::Waste, dec(0)),
        (MovementKind::Return, dec(-3)),
        (MovementKind::Adjustment, dec(0)),
    ] {
        let result = ledger.post(movement(oil.id, kind, quantity), None).await;
        assert!(
            matches!(result, Err(AppError::Validation(_))),
            "{} {} should be rejected",
            kind,
            quantity
        );
    }

    let balance = ledger.verify_balance(oil.id).await.unwrap();
    assert_eq!(balance.movement_count, 1);
    assert_eq!(balance.current_quantity, dec(10));
}

#[tokio::test]
async fn test_amounts_beyond_column_precision_are_rejected() {
    let (_, store) = memory_store();
    let oil = ingredient(&store, "Oil", 10, 1).await;
    let ledger = IngredientLedger::new(store);

    let result = ledger
        .post(movement(oil.id, MovementKind::In, Decimal::new(12555, 4)), None)
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let mut purchase = movement(oil.id, MovementKind::In, dec(2));
    purchase.unit_cost = Some(Decimal::new(1, 3));
    let result = ledger.post(purchase, None).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let row = ledger
        .post(movement(oil.id, MovementKind::In, Decimal::new(1255, 3)), None)
        .await
        .unwrap();
    assert_eq!(row.quantity, Decimal::new(1255, 3));

    let balance = ledger.verify_balance(oil.id).await.unwrap();
    assert_eq!(balance.movement_count, 2);
    assert_eq!(balance.current_quantity, Decimal::new(11255, 3));
}

#[tokio::test]
async fn test_posting_to_unknown_ingredient_fails() {
    let (_, store) = memory_store();
    let ledger = IngredientLedger::new(store);

    let result = ledger
        .post(movement(Uuid::new_v4(), MovementKind::In, dec(1)), None)
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let result = ledger.verify_balance(Uuid::new_v4()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// ============================================================================
// Low stock
// ============================================================================

#[tokio::test]
async fn test_low_stock_includes_threshold() {
    let (_, store) = memory_store();
    ingredient(&store, "Flour", 5, 5).await;
    ingredient(&store, "Meat", 2, 3).await;
    ingredient(&store, "Rice", 20, 5).await;

    let monitor = LowStockMonitor::new(store, Arc::new(TracingNotifier));
    let low: Vec<String> = monitor
        .scan()
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();

    assert_eq!(low.len(), 2);
    assert!(low.contains(&"Flour".to_string()));
    assert!(low.contains(&"Meat".to_string()));
}

#[tokio::test]
async fn test_scan_and_notify() {
    let (_, store) = memory_store();
    let rice = ingredient(&store, "Rice", 20, 5).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = LowStockMonitor::new(store.clone(), notifier.clone());

    let report = monitor.scan_and_notify().await.unwrap();
    assert!(!report.notified);
    assert!(report.ingredients.is_empty());
    assert!(notifier.batches.lock().unwrap().is_empty());

    IngredientLedger::new(store)
        .post(movement(rice.id, MovementKind::Out, dec(16)), None)
        .await
        .unwrap();

    let report = monitor.scan_and_notify().await.unwrap();
    assert!(report.notified);
    assert_eq!(report.ingredients.len(), 1);
    assert_eq!(
        *notifier.batches.lock().unwrap(),
        vec![vec!["Rice".to_string()]]
    );
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn movement_strategy() -> impl Strategy<Value = (MovementKind, i64)> {
    prop_oneof![
        (1i64..500).prop_map(|q| (MovementKind::In, q)),
        (1i64..500).prop_map(|q| (MovementKind::Out, q)),
        (1i64..500).prop_map(|q| (MovementKind::Return, q)),
        (1i64..500).prop_map(|q| (MovementKind::Waste, q)),
        (-500i64..500)
            .prop_filter("non-zero delta", |q| *q != 0)
            .prop_map(|q| (MovementKind::Adjustment, q)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 13: Stored quantity equals the signed sum of the ledger
    #[test]
    fn prop_quantity_matches_ledger(
        opening in 0i64..1000,
        postings in prop::collection::vec(movement_strategy(), 0..30)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (expected, balance) = runtime.block_on(async {
            let (_, store) = memory_store();
            let item = ingredient(&store, "Flour", opening, 0).await;
            let ledger = IngredientLedger::new(store);

            let mut expected = dec(opening);
            for (kind, quantity) in &postings {
                let quantity = dec(*quantity);
                ledger.post(movement(item.id, *kind, quantity), None).await.unwrap();
                expected += kind.signed_delta(quantity);
            }

            (expected, ledger.verify_balance(item.id).await.unwrap())
        });

        prop_assert!(balance.consistent);
        prop_assert_eq!(balance.current_quantity, expected);
        prop_assert_eq!(
            balance.movement_count,
            postings.len() + usize::from(opening > 0)
        );
    }
}

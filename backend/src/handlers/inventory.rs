//! HTTP handlers for the ingredient ledger, counts and low stock

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{Action, Ingredient, InventoryCount, LedgerBalance, Resource, StockMovement};
use crate::services::inventory::{CreateIngredientInput, IngredientLedger, PostMovementInput};
use crate::services::low_stock::{LowStockMonitor, LowStockReport};
use crate::services::reconciliation::{ReconciliationService, SubmitCountInput};
use crate::AppState;

/// List ingredients with their current quantity
pub async fn list_ingredients(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Ingredient>>> {
    current_user.0.require(Resource::Inventory, Action::View)?;
    let ingredients = IngredientLedger::new(state.store).list_ingredients().await?;
    Ok(Json(ingredients))
}

/// Create an ingredient, with optional opening stock
pub async fn create_ingredient(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateIngredientInput>,
) -> AppResult<Json<Ingredient>> {
    let user = current_user.0;
    user.require(Resource::Inventory, Action::Create)?;
    let ingredient = IngredientLedger::new(state.store)
        .create_ingredient(input, Some(user.user_id))
        .await?;
    Ok(Json(ingredient))
}

/// Ledger rows of one ingredient
pub async fn list_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(ingredient_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockMovement>>> {
    current_user.0.require(Resource::Inventory, Action::View)?;
    let movements = IngredientLedger::new(state.store)
        .movements(ingredient_id)
        .await?;
    Ok(Json(movements))
}

/// Compare an ingredient's quantity with its ledger
pub async fn verify_balance(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(ingredient_id): Path<Uuid>,
) -> AppResult<Json<LedgerBalance>> {
    current_user.0.require(Resource::Inventory, Action::View)?;
    let balance = IngredientLedger::new(state.store)
        .verify_balance(ingredient_id)
        .await?;
    Ok(Json(balance))
}

/// Post a manual stock movement
pub async fn post_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<PostMovementInput>,
) -> AppResult<Json<StockMovement>> {
    let user = current_user.0;
    user.require(Resource::Inventory, Action::Create)?;
    let movement = IngredientLedger::new(state.store)
        .post(input, Some(user.user_id))
        .await?;
    Ok(Json(movement))
}

/// Ingredients at or below their threshold
pub async fn low_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Ingredient>>> {
    current_user.0.require(Resource::Inventory, Action::View)?;
    let monitor = LowStockMonitor::new(state.store, state.notifier);
    Ok(Json(monitor.scan().await?))
}

/// Scan for low stock and notify when anything is found
pub async fn notify_low_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<LowStockReport>> {
    current_user.0.require(Resource::Inventory, Action::View)?;
    let monitor = LowStockMonitor::new(state.store, state.notifier);
    Ok(Json(monitor.scan_and_notify().await?))
}

/// Submit a physical count
pub async fn submit_count(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<SubmitCountInput>,
) -> AppResult<Json<InventoryCount>> {
    let user = current_user.0;
    user.require(Resource::Inventory, Action::Count)?;
    let count = ReconciliationService::new(state.store)
        .submit_count(input, Some(user.user_id))
        .await?;
    Ok(Json(count))
}

#[derive(Debug, Deserialize)]
pub struct ListCountsQuery {
    #[serde(default)]
    pub pending: bool,
}

/// List counts, optionally only those awaiting approval
pub async fn list_counts(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListCountsQuery>,
) -> AppResult<Json<Vec<InventoryCount>>> {
    current_user.0.require(Resource::Inventory, Action::View)?;
    let counts = ReconciliationService::new(state.store)
        .list_counts(query.pending)
        .await?;
    Ok(Json(counts))
}

/// Approve a count and post its correction
pub async fn apply_count(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(count_id): Path<Uuid>,
) -> AppResult<Json<InventoryCount>> {
    let user = current_user.0;
    user.require(Resource::Inventory, Action::Approve)?;
    let count = ReconciliationService::new(state.store)
        .apply_count(count_id, Some(user.user_id))
        .await?;
    Ok(Json(count))
}

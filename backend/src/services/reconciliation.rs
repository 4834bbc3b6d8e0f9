//! Physical stock counts and their approval
//!
//! A count snapshots the ledger quantity when submitted and changes nothing.
//! Applying it posts one adjustment for the difference, provided the ledger
//! has not moved in between.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::inventory::post_movement;
use crate::error::{AppError, AppResult};
use crate::models::{InventoryCount, MovementKind, NewStockMovement, REFERENCE_INVENTORY_COUNT};
use crate::store::{LedgerRepository, Store};

/// Input for submitting a physical count
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitCountInput {
    pub ingredient_id: Uuid,
    #[validate(custom(function = "crate::services::inventory::validate_stock_level"))]
    pub actual_quantity: Decimal,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct ReconciliationService {
    store: Arc<dyn Store>,
}

impl ReconciliationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record a count against the current ledger quantity
    pub async fn submit_count(
        &self,
        input: SubmitCountInput,
        counted_by: Option<Uuid>,
    ) -> AppResult<InventoryCount> {
        input.validate()?;

        let mut uow = self.store.begin().await?;
        let ingredient = uow
            .lock_ingredient(input.ingredient_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Ingredient".to_string()))?;

        let notes = input.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
        let count = uow
            .insert_count(
                ingredient.id,
                ingredient.current_quantity,
                input.actual_quantity,
                notes,
                counted_by,
            )
            .await?;
        uow.commit().await?;

        tracing::info!(
            count_id = %count.id,
            ingredient_id = %count.ingredient_id,
            expected = %count.expected_quantity,
            actual = %count.actual_quantity,
            difference = %count.difference,
            "Inventory count submitted"
        );

        Ok(count)
    }

    /// Approve a count: post its difference as an adjustment and mark it
    /// applied, both or neither
    pub async fn apply_count(
        &self,
        count_id: Uuid,
        approved_by: Option<Uuid>,
    ) -> AppResult<InventoryCount> {
        let mut uow = self.store.begin().await?;
        let count = uow
            .lock_count(count_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Inventory count".to_string()))?;

        if count.applied {
            return Err(AppError::AlreadyApplied);
        }

        let ingredient = uow
            .lock_ingredient(count.ingredient_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Ingredient".to_string()))?;

        if ingredient.current_quantity != count.expected_quantity {
            tracing::warn!(
                count_id = %count.id,
                ingredient_id = %ingredient.id,
                expected = %count.expected_quantity,
                live = %ingredient.current_quantity,
                "Inventory count is stale"
            );
            return Err(AppError::StaleCount);
        }

        // A count that matches the ledger needs no correction
        if count.difference != Decimal::ZERO {
            let movement =
                NewStockMovement::new(ingredient.id, MovementKind::Adjustment, count.difference)
                    .with_reference(REFERENCE_INVENTORY_COUNT, count.id)
                    .with_notes(format!("Inventory count {}", count.id))
                    .created_by(approved_by);
            post_movement(uow.as_mut(), &movement).await?;
        }

        let applied = uow.mark_count_applied(count.id).await?;
        uow.commit().await?;

        tracing::info!(
            count_id = %applied.id,
            ingredient_id = %applied.ingredient_id,
            difference = %applied.difference,
            "Inventory count applied"
        );

        Ok(applied)
    }

    /// Counts newest first, optionally only those awaiting approval
    pub async fn list_counts(&self, pending_only: bool) -> AppResult<Vec<InventoryCount>> {
        let mut uow = self.store.begin().await?;
        let counts = uow.list_counts(pending_only).await?;
        Ok(counts)
    }
}

//! Ingredient stock ledger service
//!
//! Every change to an ingredient's quantity is a posted movement. The row
//! insert and the quantity update happen in the same unit of work, so the
//! stored quantity always equals the signed sum of the ledger.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{max_money, validate_money_amount, validate_stock_amount};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};
use crate::models::{Ingredient, LedgerBalance, MovementKind, NewStockMovement, StockMovement};
use crate::store::{LedgerRepository, Store, UnitOfWork};

/// Ingredient ledger: postings, ingredient records and balance checks
#[derive(Clone)]
pub struct IngredientLedger {
    store: Arc<dyn Store>,
}

/// Input for posting a manual movement
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_movement_quantity"))]
pub struct PostMovementInput {
    pub ingredient_id: Uuid,
    pub kind: MovementKind,
    /// Magnitude, or a signed delta for `adjustment`
    pub quantity: Decimal,
    #[validate(custom(function = "validate_cost"))]
    pub unit_cost: Option<Decimal>,
    pub supplier_id: Option<Uuid>,
    pub expiry_date: Option<NaiveDate>,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub notes: Option<String>,
}

/// Input for creating an ingredient
#[derive(Debug, Deserialize, Validate)]
pub struct CreateIngredientInput {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 20, message = "must be 1-20 characters"))]
    pub unit: String,
    #[serde(default)]
    #[validate(custom(function = "validate_stock_level"))]
    pub min_threshold: Decimal,
    #[validate(custom(function = "validate_cost"))]
    pub cost_per_unit: Option<Decimal>,
    /// Posted as an `in` movement when positive
    #[validate(custom(function = "validate_stock_level"))]
    pub opening_quantity: Option<Decimal>,
}

fn range_error(message: &'static str) -> ValidationError {
    let mut err = ValidationError::new("range");
    err.message = Some(message.into());
    err
}

/// Non-negative money amount with at most 2 decimal places
pub fn validate_cost(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(range_error("must not be negative"));
    }
    validate_money_amount(*value).map_err(range_error)
}

/// Positive money amount with at most 2 decimal places
pub fn validate_price(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(range_error("must be greater than zero"));
    }
    validate_money_amount(*value).map_err(range_error)
}

/// Non-negative ingredient quantity with at most 3 decimal places
pub fn validate_stock_level(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(range_error("must not be negative"));
    }
    validate_stock_amount(*value).map_err(range_error)
}

fn validate_movement_quantity(input: &PostMovementInput) -> Result<(), ValidationError> {
    let message = match input.kind.validate_quantity(input.quantity) {
        Err(message) => message.to_string(),
        Ok(()) => match validate_stock_amount(input.quantity) {
            Err(message) => format!("Quantity {}", message),
            Ok(()) => return Ok(()),
        },
    };
    let mut err = ValidationError::new("quantity");
    err.message = Some(message.into());
    Err(err)
}

/// Post a movement inside an open unit of work.
///
/// Stock may go negative; that is recorded, not refused.
pub async fn post_movement(
    uow: &mut dyn UnitOfWork,
    movement: &NewStockMovement,
) -> AppResult<(StockMovement, Ingredient)> {
    movement
        .kind
        .validate_quantity(movement.quantity)
        .map_err(AppError::validation)?;
    validate_stock_amount(movement.quantity)
        .map_err(|message| AppError::validation(format!("Quantity {}", message)))?;
    if let Some(unit_cost) = movement.unit_cost {
        let fits = unit_cost
            .checked_mul(movement.quantity.abs())
            .map_or(false, |total| total <= max_money());
        if !fits {
            return Err(AppError::validation("Total cost must be at most 999999999999.99"));
        }
    }

    let (row, ingredient) = uow.insert_movement(movement).await?;

    if ingredient.current_quantity < Decimal::ZERO {
        tracing::warn!(
            ingredient_id = %ingredient.id,
            quantity = %ingredient.current_quantity,
            movement_id = %row.id,
            "Ingredient stock is negative"
        );
    }

    Ok((row, ingredient))
}

impl IngredientLedger {
    /// Create a new IngredientLedger instance
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Post a single manual movement
    pub async fn post(
        &self,
        input: PostMovementInput,
        user_id: Option<Uuid>,
    ) -> AppResult<StockMovement> {
        input.validate()?;

        let movement = NewStockMovement {
            ingredient_id: input.ingredient_id,
            kind: input.kind,
            quantity: input.quantity,
            unit_cost: input.unit_cost,
            supplier_id: input.supplier_id,
            expiry_date: input.expiry_date,
            reference_type: None,
            reference_id: None,
            notes: input.notes.filter(|n| !n.trim().is_empty()),
            created_by: user_id,
        };

        let mut uow = self.store.begin().await?;
        let (row, ingredient) = post_movement(uow.as_mut(), &movement).await?;
        uow.commit().await?;

        tracing::info!(
            ingredient_id = %ingredient.id,
            movement_id = %row.id,
            kind = %row.kind,
            quantity = %row.quantity,
            balance = %ingredient.current_quantity,
            "Stock movement posted"
        );

        Ok(row)
    }

    /// Create an ingredient, posting its opening stock through the ledger
    pub async fn create_ingredient(
        &self,
        input: CreateIngredientInput,
        user_id: Option<Uuid>,
    ) -> AppResult<Ingredient> {
        input.validate()?;

        let mut uow = self.store.begin().await?;
        let mut ingredient = uow
            .insert_ingredient(
                input.name.trim(),
                input.unit.trim(),
                input.min_threshold,
                input.cost_per_unit,
            )
            .await?;

        if let Some(opening) = input.opening_quantity.filter(|q| *q > Decimal::ZERO) {
            let mut movement = NewStockMovement::new(ingredient.id, MovementKind::In, opening)
                .with_notes("Opening stock")
                .created_by(user_id);
            movement.unit_cost = input.cost_per_unit;
            let (_, updated) = post_movement(uow.as_mut(), &movement).await?;
            ingredient = updated;
        }

        uow.commit().await?;

        tracing::info!(
            ingredient_id = %ingredient.id,
            name = %ingredient.name,
            quantity = %ingredient.current_quantity,
            "Ingredient created"
        );

        Ok(ingredient)
    }

    /// List all ingredients by name
    pub async fn list_ingredients(&self) -> AppResult<Vec<Ingredient>> {
        let mut uow = self.store.begin().await?;
        let ingredients = uow.list_ingredients().await?;
        Ok(ingredients)
    }

    /// Ledger rows for one ingredient, oldest first
    pub async fn movements(&self, ingredient_id: Uuid) -> AppResult<Vec<StockMovement>> {
        let mut uow = self.store.begin().await?;
        uow.find_ingredient(ingredient_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Ingredient".to_string()))?;
        let movements = uow.movements_for_ingredient(ingredient_id).await?;
        Ok(movements)
    }

    /// Recompute the ledger sum and compare it with the stored quantity
    pub async fn verify_balance(&self, ingredient_id: Uuid) -> AppResult<LedgerBalance> {
        let mut uow = self.store.begin().await?;
        let ingredient = uow
            .find_ingredient(ingredient_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Ingredient".to_string()))?;
        let movements = uow.movements_for_ingredient(ingredient_id).await?;

        let balance = LedgerBalance::from_movements(&ingredient, &movements);
        if !balance.consistent {
            tracing::error!(
                ingredient_id = %ingredient_id,
                stored = %balance.current_quantity,
                ledger = %balance.ledger_quantity,
                "Ingredient quantity disagrees with its ledger"
            );
        }

        Ok(balance)
    }
}

//! Ingredient stock ledger models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference type recorded on movements posted for a delivered order
pub const REFERENCE_ORDER: &str = "order";

/// Reference type recorded on movements posted when a count is applied
pub const REFERENCE_INVENTORY_COUNT: &str = "inventory_count";

/// An ingredient tracked by the stock ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    /// Unit of measure (kg, l, pcs)
    pub unit: String,
    /// Always the signed sum of this ingredient's movements
    pub current_quantity: Decimal,
    pub min_threshold: Decimal,
    pub cost_per_unit: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ingredient {
    pub fn is_low_stock(&self) -> bool {
        self.current_quantity <= self.min_threshold
    }
}

/// Kind of stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    In,
    Out,
    Return,
    /// Quantity is a signed delta
    Adjustment,
    Waste,
}

impl MovementKind {
    pub const ALL: [MovementKind; 5] = [
        MovementKind::In,
        MovementKind::Out,
        MovementKind::Return,
        MovementKind::Adjustment,
        MovementKind::Waste,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::In => "in",
            MovementKind::Out => "out",
            MovementKind::Return => "return",
            MovementKind::Adjustment => "adjustment",
            MovementKind::Waste => "waste",
        }
    }

    /// Effect of a movement of this kind on the ingredient's quantity
    pub fn signed_delta(&self, quantity: Decimal) -> Decimal {
        match self {
            MovementKind::In | MovementKind::Return => quantity,
            MovementKind::Out | MovementKind::Waste => -quantity,
            MovementKind::Adjustment => quantity,
        }
    }

    /// Check the stored quantity for this kind: a positive magnitude, or a
    /// non-zero delta for adjustments.
    pub fn validate_quantity(&self, quantity: Decimal) -> Result<(), &'static str> {
        match self {
            MovementKind::Adjustment if quantity.is_zero() => {
                Err("Adjustment delta must not be zero")
            }
            MovementKind::Adjustment => Ok(()),
            _ if quantity <= Decimal::ZERO => Err("Quantity must be positive"),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown movement kind '{}'", s))
    }
}

/// Immutable ledger row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub ingredient_id: Uuid,
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    /// `quantity * unit_cost`, reporting only
    pub total_cost: Option<Decimal>,
    pub supplier_id: Option<Uuid>,
    pub expiry_date: Option<NaiveDate>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn signed_delta(&self) -> Decimal {
        self.kind.signed_delta(self.quantity)
    }
}

/// A movement to be posted to the ledger
#[derive(Debug, Clone)]
pub struct NewStockMovement {
    pub ingredient_id: Uuid,
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub supplier_id: Option<Uuid>,
    pub expiry_date: Option<NaiveDate>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}

impl NewStockMovement {
    pub fn new(ingredient_id: Uuid, kind: MovementKind, quantity: Decimal) -> Self {
        Self {
            ingredient_id,
            kind,
            quantity,
            unit_cost: None,
            supplier_id: None,
            expiry_date: None,
            reference_type: None,
            reference_id: None,
            notes: None,
            created_by: None,
        }
    }

    pub fn with_reference(mut self, reference_type: &str, reference_id: Uuid) -> Self {
        self.reference_type = Some(reference_type.to_string());
        self.reference_id = Some(reference_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn created_by(mut self, user_id: Option<Uuid>) -> Self {
        self.created_by = user_id;
        self
    }

    pub fn signed_delta(&self) -> Decimal {
        self.kind.signed_delta(self.quantity)
    }

    /// Cost of the whole movement, rounded to cents; `None` without a unit cost
    /// or when the product does not fit a decimal
    pub fn total_cost(&self) -> Option<Decimal> {
        self.unit_cost
            .and_then(|cost| cost.checked_mul(self.quantity.abs()))
            .map(|total| total.round_dp(2))
    }
}

/// Physical stock count awaiting (or after) approval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryCount {
    pub id: Uuid,
    pub ingredient_id: Uuid,
    /// Ledger quantity when the count was submitted
    pub expected_quantity: Decimal,
    pub actual_quantity: Decimal,
    /// `actual_quantity - expected_quantity`
    pub difference: Decimal,
    pub applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub counted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Recomputed ledger total compared with the stored quantity
#[derive(Debug, Clone, Serialize)]
pub struct LedgerBalance {
    pub ingredient_id: Uuid,
    pub current_quantity: Decimal,
    pub ledger_quantity: Decimal,
    pub movement_count: usize,
    pub consistent: bool,
}

impl LedgerBalance {
    pub fn from_movements(ingredient: &Ingredient, movements: &[StockMovement]) -> Self {
        let ledger_quantity: Decimal = movements.iter().map(StockMovement::signed_delta).sum();
        Self {
            ingredient_id: ingredient.id,
            current_quantity: ingredient.current_quantity,
            ledger_quantity,
            movement_count: movements.len(),
            consistent: ledger_quantity == ingredient.current_quantity,
        }
    }
}

//! Product catalog and recipe models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A menu product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Recipe edge: how much of one ingredient a single unit of a product uses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub product_id: Uuid,
    pub ingredient_id: Uuid,
    pub quantity_per_unit: Decimal,
}

/// Quantity of one ingredient needed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub ingredient_id: Uuid,
    pub quantity: Decimal,
}

/// Sum per-unit recipe requirements scaled by each line's quantity.
///
/// Returns one requirement per ingredient, ordered by ingredient id, with
/// zero totals dropped. `None` if a total does not fit a decimal.
pub fn aggregate_requirements<'a, I>(lines: I) -> Option<Vec<Requirement>>
where
    I: IntoIterator<Item = (&'a [Requirement], i32)>,
{
    let mut totals: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for (per_unit, quantity) in lines {
        let quantity = Decimal::from(quantity);
        for req in per_unit {
            let needed = req.quantity.checked_mul(quantity)?;
            let total = totals.entry(req.ingredient_id).or_insert(Decimal::ZERO);
            *total = total.checked_add(needed)?;
        }
    }

    let totals = totals
        .into_iter()
        .filter(|(_, quantity)| !quantity.is_zero())
        .map(|(ingredient_id, quantity)| Requirement {
            ingredient_id,
            quantity,
        })
        .collect();
    Some(totals)
}

//! Menu products and their recipes

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::validate_stock_amount;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{Product, RecipeLine, Requirement};
use crate::store::{CatalogRepository, Store};

/// Input for creating a product
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub name: String,
    #[validate(custom(function = "crate::services::inventory::validate_price"))]
    pub price: Decimal,
}

/// One ingredient of a recipe
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeLineInput {
    pub ingredient_id: Uuid,
    pub quantity_per_unit: Decimal,
}

/// Full replacement of a product's recipe
#[derive(Debug, Deserialize)]
pub struct SetRecipeInput {
    #[serde(default)]
    pub lines: Vec<RecipeLineInput>,
}

impl SetRecipeInput {
    /// Every violation, one message per offending line
    fn check(&self) -> Result<Vec<Requirement>, Vec<String>> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (index, line) in self.lines.iter().enumerate() {
            let position = index + 1;
            if line.quantity_per_unit <= Decimal::ZERO {
                errors.push(format!("Line {}: quantity per unit must be greater than zero", position));
            } else if let Err(message) = validate_stock_amount(line.quantity_per_unit) {
                errors.push(format!("Line {}: quantity per unit {}", position, message));
            }
            if !seen.insert(line.ingredient_id) {
                errors.push(format!("Line {}: ingredient listed more than once", position));
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(self
            .lines
            .iter()
            .map(|line| Requirement {
                ingredient_id: line.ingredient_id,
                quantity: line.quantity_per_unit,
            })
            .collect())
    }
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;

        let mut uow = self.store.begin().await?;
        let product = uow.insert_product(input.name.trim(), input.price).await?;
        uow.commit().await?;

        tracing::info!(product_id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Replace every recipe edge of a product. An empty list clears it.
    pub async fn set_recipe(
        &self,
        product_id: Uuid,
        input: SetRecipeInput,
    ) -> AppResult<Vec<RecipeLine>> {
        let requirements = input.check().map_err(AppError::Validation)?;

        let mut uow = self.store.begin().await?;
        let lines = uow.replace_recipe(product_id, &requirements).await?;
        uow.commit().await?;

        tracing::info!(product_id = %product_id, lines = lines.len(), "Recipe updated");
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: Uuid, qty: i64) -> RecipeLineInput {
        RecipeLineInput {
            ingredient_id: id,
            quantity_per_unit: Decimal::from(qty),
        }
    }

    #[test]
    fn test_recipe_check_reports_every_line() {
        let rice = Uuid::new_v4();
        let input = SetRecipeInput {
            lines: vec![line(rice, 2), line(rice, 0)],
        };

        let errors = input.check().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.starts_with("Line 2:")));
    }

    #[test]
    fn test_empty_recipe_is_allowed() {
        let input = SetRecipeInput { lines: vec![] };
        assert!(input.check().unwrap().is_empty());
    }

    #[test]
    fn test_recipe_quantity_keeps_three_decimals() {
        let input = SetRecipeInput {
            lines: vec![RecipeLineInput {
                ingredient_id: Uuid::new_v4(),
                quantity_per_unit: Decimal::new(1255, 4),
            }],
        };
        assert_eq!(
            input.check().unwrap_err(),
            vec!["Line 1: quantity per unit must have at most 3 decimal places".to_string()]
        );
    }

    #[test]
    fn test_product_price_must_fit_cents() {
        let input = CreateProductInput {
            name: "Somsa".to_string(),
            price: Decimal::new(10005, 3),
        };
        assert!(input.validate().is_err());

        let input = CreateProductInput {
            name: "Somsa".to_string(),
            price: Decimal::new(1000, 2),
        };
        assert!(input.validate().is_ok());
    }
}

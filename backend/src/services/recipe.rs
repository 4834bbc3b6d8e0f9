//! Product recipes: which ingredients one unit of a product consumes

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Requirement;
use crate::store::{CatalogRepository, Store, UnitOfWork};

#[derive(Clone)]
pub struct RecipeResolver {
    store: Arc<dyn Store>,
}

impl RecipeResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Per-unit requirements of a product. Unknown products and products
    /// without a recipe both resolve to nothing.
    pub async fn resolve(uow: &mut dyn UnitOfWork, product_id: Uuid) -> AppResult<Vec<Requirement>> {
        let lines = uow.recipe_lines(product_id).await?;
        Ok(lines
            .into_iter()
            .map(|line| Requirement {
                ingredient_id: line.ingredient_id,
                quantity: line.quantity_per_unit,
            })
            .collect())
    }

    /// Per-unit requirements of an existing product
    pub async fn requirements_for(&self, product_id: Uuid) -> AppResult<Vec<Requirement>> {
        let mut uow = self.store.begin().await?;
        uow.find_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        let requirements = Self::resolve(uow.as_mut(), product_id).await?;
        Ok(requirements)
    }
}

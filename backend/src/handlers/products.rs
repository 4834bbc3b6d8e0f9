//! HTTP handlers for products and recipes

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{Action, Product, RecipeLine, Requirement, Resource};
use crate::services::catalog::{CatalogService, CreateProductInput, SetRecipeInput};
use crate::services::RecipeResolver;
use crate::AppState;

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<Json<Product>> {
    current_user.0.require(Resource::Products, Action::Create)?;
    let product = CatalogService::new(state.store).create_product(input).await?;
    Ok(Json(product))
}

/// Replace a product's recipe
pub async fn set_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<SetRecipeInput>,
) -> AppResult<Json<Vec<RecipeLine>>> {
    current_user.0.require(Resource::Products, Action::Edit)?;
    let lines = CatalogService::new(state.store)
        .set_recipe(product_id, input)
        .await?;
    Ok(Json(lines))
}

/// Per-unit ingredient requirements of a product
pub async fn get_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Vec<Requirement>>> {
    current_user.0.require(Resource::Products, Action::View)?;
    let requirements = RecipeResolver::new(state.store)
        .requirements_for(product_id)
        .await?;
    Ok(Json(requirements))
}

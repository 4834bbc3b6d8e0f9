//! HTTP handlers for courier management endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{Action, Courier, Resource};
use crate::services::courier::{CourierAssignmentTracker, CreateCourierInput};
use crate::AppState;

/// List couriers with their current load
pub async fn list_couriers(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Courier>>> {
    current_user.0.require(Resource::Couriers, Action::View)?;
    let couriers = CourierAssignmentTracker::new(state.store).list_couriers().await?;
    Ok(Json(couriers))
}

/// Register a courier
pub async fn create_courier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCourierInput>,
) -> AppResult<Json<Courier>> {
    current_user.0.require(Resource::Couriers, Action::Create)?;
    let courier = CourierAssignmentTracker::new(state.store)
        .create_courier(input)
        .await?;
    Ok(Json(courier))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub available: bool,
}

/// Put a courier on or off shift
pub async fn set_availability(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(courier_id): Path<Uuid>,
    Json(input): Json<AvailabilityRequest>,
) -> AppResult<Json<Courier>> {
    current_user.0.require(Resource::Couriers, Action::Edit)?;
    let courier = CourierAssignmentTracker::new(state.store)
        .set_availability(courier_id, input.available)
        .await?;
    Ok(Json(courier))
}

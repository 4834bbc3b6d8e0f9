//! HTTP handlers for order intake, reads, transitions and courier pickup

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{ClientKey, CurrentUser};
use crate::models::{
    Action, Order, OrderDetails, OrderIntake, OrderStatus, OrderStatusHistory, Resource,
    StockMovement,
};
use crate::services::{
    CourierAssignmentTracker, DeductionOutcome, OrderIntakeService, OrderQueries, RateLimiter,
    StatusTransitionEngine,
};
use crate::AppState;

/// Envelope the storefront checkout expects
#[derive(Debug, Serialize, Deserialize)]
pub struct IntakeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IntakeResponse {
    fn accepted(order_id: Uuid) -> Self {
        Self {
            success: true,
            order_id: Some(order_id),
            errors: Vec::new(),
            error: None,
        }
    }

    fn rejected(err: AppError) -> (StatusCode, Self) {
        let status = err.status_code();
        let body = match err {
            AppError::Validation(errors) => Self {
                success: false,
                order_id: None,
                errors,
                error: None,
            },
            other => Self {
                success: false,
                order_id: None,
                errors: Vec::new(),
                error: Some(other.public_message().0),
            },
        };
        (status, body)
    }
}

/// Public order submission
pub async fn submit_order(
    State(state): State<AppState>,
    ClientKey(client_key): ClientKey,
    payload: Result<Json<OrderIntake>, JsonRejection>,
) -> Response {
    let Json(intake) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            let err = AppError::validation(rejection.body_text());
            let (status, body) = IntakeResponse::rejected(err);
            return (status, Json(body)).into_response();
        }
    };

    let limiter = RateLimiter::new(state.rate_limits.clone(), state.config.rate_limit.window());
    let service = OrderIntakeService::new(state.store.clone(), limiter);

    match service.submit(&client_key, &intake).await {
        Ok(order) => (StatusCode::OK, Json(IntakeResponse::accepted(order.id))).into_response(),
        Err(err) => {
            let (status, body) = IntakeResponse::rejected(err);
            (status, Json(body)).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
}

/// List orders, optionally by status
pub async fn list_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListOrdersQuery>,
) -> AppResult<Json<Vec<Order>>> {
    current_user.0.require(Resource::Orders, Action::View)?;
    let orders = OrderQueries::new(state.store).list_orders(query.status).await?;
    Ok(Json(orders))
}

/// Get an order with its items and status history
pub async fn get_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetails>> {
    current_user.0.require(Resource::Orders, Action::View)?;
    let details = OrderQueries::new(state.store).get_order(order_id).await?;
    Ok(Json(details))
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: OrderStatus,
    /// Courier picking the order up with this change
    pub courier_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub order: Order,
    pub history: OrderStatusHistory,
    /// Movements posted by this change
    pub deducted: Vec<StockMovement>,
    pub already_deducted: bool,
    pub released_courier: Option<Uuid>,
}

/// Change an order's status
pub async fn transition_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<TransitionRequest>,
) -> AppResult<Json<TransitionResponse>> {
    let user = current_user.0;
    if input.courier_id.is_some() {
        user.require(Resource::Orders, Action::Assign)?;
    }
    let actor = user.actor(Resource::Orders, Action::Transition);

    let engine = StatusTransitionEngine::new(state.store);
    let outcome = engine
        .transition_with_courier(order_id, input.status, input.courier_id, actor)
        .await?;

    let already_deducted = matches!(outcome.deduction, Some(DeductionOutcome::AlreadyDeducted));
    let deducted = outcome
        .deduction
        .as_ref()
        .map(|d| d.movements().to_vec())
        .unwrap_or_default();

    Ok(Json(TransitionResponse {
        order: outcome.order,
        history: outcome.history,
        deducted,
        already_deducted,
        released_courier: outcome.released_courier,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AssignCourierRequest {
    pub courier_id: Uuid,
}

/// Hand an order to a courier
pub async fn assign_courier(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<AssignCourierRequest>,
) -> AppResult<Json<Order>> {
    let actor = current_user.0.actor(Resource::Orders, Action::Assign);
    let tracker = CourierAssignmentTracker::new(state.store);
    let order = tracker
        .assign_courier(order_id, input.courier_id, actor)
        .await?;
    Ok(Json(order))
}

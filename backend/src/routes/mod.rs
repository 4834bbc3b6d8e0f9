//! Route definitions for the restaurant order and stock service

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Public storefront checkout, protected listing
        .route(
            "/orders",
            get(handlers::list_orders)
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
                .post(handlers::submit_order),
        )
        // Protected routes - order management
        .nest("/orders", order_routes(state.clone()))
        // Protected routes - courier management
        .nest("/couriers", courier_routes(state.clone()))
        // Protected routes - ingredient ledger
        .nest("/inventory", inventory_routes(state.clone()))
        // Protected routes - products and recipes
        .nest("/products", product_routes(state))
}

/// Order routes (protected)
fn order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:order_id", get(handlers::get_order))
        .route("/:order_id/status", post(handlers::transition_order))
        .route("/:order_id/courier", post(handlers::assign_courier))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Courier routes (protected)
fn courier_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_couriers).post(handlers::create_courier),
        )
        .route("/:courier_id/availability", post(handlers::set_availability))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Inventory routes (protected)
fn inventory_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/ingredients",
            get(handlers::list_ingredients).post(handlers::create_ingredient),
        )
        .route(
            "/ingredients/:ingredient_id/movements",
            get(handlers::list_movements),
        )
        .route(
            "/ingredients/:ingredient_id/balance",
            get(handlers::verify_balance),
        )
        .route("/movements", post(handlers::post_movement))
        .route("/low-stock", get(handlers::low_stock))
        .route("/low-stock/notify", post(handlers::notify_low_stock))
        .route(
            "/counts",
            get(handlers::list_counts).post(handlers::submit_count),
        )
        .route("/counts/:count_id/apply", post(handlers::apply_count))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Product routes (protected)
fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_product))
        .route(
            "/:product_id/recipe",
            get(handlers::get_recipe).put(handlers::set_recipe),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

//! Courier load tracking and order assignment

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};
use crate::models::{Actor, Courier, Order};
use crate::store::{CourierRepository, OrderRepository, Store, UnitOfWork};

/// Default number of concurrent orders a new courier may carry
pub const DEFAULT_MAX_ORDERS: i32 = 3;

/// Input for registering a courier
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourierInput {
    #[validate(length(min = 2, max = 100, message = "must be 2-100 characters"))]
    pub name: String,
    #[validate(custom(function = "validate_courier_phone"))]
    pub phone: String,
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub vehicle_type: Option<String>,
    #[validate(range(min = 1, max = 20, message = "must be between 1 and 20"))]
    pub max_orders: Option<i32>,
}

fn validate_courier_phone(phone: &str) -> Result<(), ValidationError> {
    shared::validate_phone(phone.trim()).map_err(|message| {
        let mut err = ValidationError::new("phone");
        err.message = Some(message.into());
        err
    })
}

#[derive(Clone)]
pub struct CourierAssignmentTracker {
    store: Arc<dyn Store>,
}

impl CourierAssignmentTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Take one slot of the courier's capacity
    pub async fn assign(uow: &mut dyn UnitOfWork, courier_id: Uuid) -> AppResult<Courier> {
        let courier = uow
            .lock_courier(courier_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Courier".to_string()))?;

        if !courier.can_accept_order() {
            tracing::warn!(
                courier_id = %courier.id,
                load = courier.current_order_count,
                max = courier.max_orders,
                available = courier.is_available,
                "Courier cannot take another order"
            );
            return Err(AppError::CourierAtCapacity);
        }

        uow.set_courier_load(courier.id, courier.current_order_count + 1)
            .await
    }

    /// Give back one slot of the courier's capacity
    pub async fn release(uow: &mut dyn UnitOfWork, courier_id: Uuid) -> AppResult<Courier> {
        let courier = uow
            .lock_courier(courier_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Courier".to_string()))?;

        if courier.current_order_count == 0 {
            tracing::warn!(courier_id = %courier.id, "Courier released with no active orders");
            return Ok(courier);
        }

        uow.set_courier_load(courier.id, courier.current_order_count - 1)
            .await
    }

    /// Attach `courier_id` to an open order inside an open unit of work
    pub async fn assign_to_order(
        uow: &mut dyn UnitOfWork,
        order: &Order,
        courier_id: Uuid,
    ) -> AppResult<(Order, Courier)> {
        if order.status.is_terminal() {
            return Err(AppError::validation(format!(
                "Order is {} and can no longer take a courier",
                order.status
            )));
        }
        if order.courier_id.is_some() {
            return Err(AppError::CourierAlreadyAssigned);
        }

        let courier = Self::assign(uow, courier_id).await?;
        let order = uow.set_order_courier(order.id, Some(courier.id)).await?;
        Ok((order, courier))
    }

    /// Hand an order to a courier
    pub async fn assign_courier(
        &self,
        order_id: Uuid,
        courier_id: Uuid,
        actor: Actor,
    ) -> AppResult<Order> {
        if !actor.authorized {
            return Err(AppError::InsufficientPermissions);
        }

        let mut uow = self.store.begin().await?;
        let order = uow
            .lock_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let (order, courier) = Self::assign_to_order(uow.as_mut(), &order, courier_id).await?;
        uow.commit().await?;

        tracing::info!(
            order_id = %order.id,
            courier_id = %courier.id,
            load = courier.current_order_count,
            actor = %actor.id,
            "Courier assigned"
        );

        Ok(order)
    }

    /// Register a courier, active and available with no load
    pub async fn create_courier(&self, input: CreateCourierInput) -> AppResult<Courier> {
        input.validate()?;

        let mut uow = self.store.begin().await?;
        let courier = uow
            .insert_courier(
                input.name.trim(),
                input.phone.trim(),
                input.vehicle_type.as_deref().map(str::trim).filter(|v| !v.is_empty()),
                input.max_orders.unwrap_or(DEFAULT_MAX_ORDERS),
            )
            .await?;
        uow.commit().await?;

        tracing::info!(courier_id = %courier.id, name = %courier.name, "Courier registered");
        Ok(courier)
    }

    pub async fn list_couriers(&self) -> AppResult<Vec<Courier>> {
        let mut uow = self.store.begin().await?;
        let couriers = uow.list_couriers().await?;
        Ok(couriers)
    }

    /// Mark a courier on or off shift
    pub async fn set_availability(&self, courier_id: Uuid, available: bool) -> AppResult<Courier> {
        let mut uow = self.store.begin().await?;
        uow.lock_courier(courier_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Courier".to_string()))?;
        let courier = uow.set_courier_availability(courier_id, available).await?;
        uow.commit().await?;

        tracing::info!(courier_id = %courier.id, available, "Courier availability changed");
        Ok(courier)
    }
}

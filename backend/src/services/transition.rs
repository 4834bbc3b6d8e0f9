//! Order status transitions
//!
//! Each accepted transition is one unit of work: audit row, status update,
//! the stock deduction on `delivered` and the courier release on any
//! terminal status. A failure in any step leaves the order where it was.

use std::sync::Arc;

use uuid::Uuid;

use super::courier::CourierAssignmentTracker;
use super::deduction::{DeductionOutcome, DeductionService};
use crate::error::{AppError, AppResult};
use crate::models::{Actor, Order, OrderStatus, OrderStatusHistory};
use crate::store::{OrderRepository, Store};

/// What an accepted transition did
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub order: Order,
    pub history: OrderStatusHistory,
    /// Present when the order reached `delivered`
    pub deduction: Option<DeductionOutcome>,
    /// Courier whose slot was freed by a terminal status
    pub released_courier: Option<Uuid>,
}

#[derive(Clone)]
pub struct StatusTransitionEngine {
    store: Arc<dyn Store>,
}

impl StatusTransitionEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Move an order to `target`
    pub async fn transition(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        actor: Actor,
    ) -> AppResult<TransitionOutcome> {
        self.transition_with_courier(order_id, target, None, actor)
            .await
    }

    /// Move an order to `target`, picking up `courier_id` on the way when
    /// the order has no courier yet
    pub async fn transition_with_courier(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        courier_id: Option<Uuid>,
        actor: Actor,
    ) -> AppResult<TransitionOutcome> {
        if !actor.authorized {
            tracing::warn!(order_id = %order_id, actor = %actor.id, "Unauthorized status change");
            return Err(AppError::InsufficientPermissions);
        }

        let mut uow = self.store.begin().await?;
        let order = uow
            .lock_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let from = order.status;
        if let Err(reason) = from.check_transition(target) {
            tracing::info!(order_id = %order.id, %from, to = %target, %reason, "Transition rejected");
            return Err(AppError::InvalidTransition { from, to: target });
        }

        if let Some(courier_id) = courier_id {
            if target.is_terminal() {
                return Err(AppError::validation(
                    "A courier can only be picked up on a non-terminal status",
                ));
            }
            match order.courier_id {
                Some(current) if current == courier_id => {}
                Some(_) => return Err(AppError::CourierAlreadyAssigned),
                None => {
                    CourierAssignmentTracker::assign_to_order(uow.as_mut(), &order, courier_id)
                        .await?;
                }
            }
        }

        let history = uow
            .insert_status_history(order.id, from, target, actor.id)
            .await?;
        let order = uow.update_order_status(order.id, target).await?;

        let deduction = if target == OrderStatus::Delivered {
            let outcome = DeductionService::deduct_within(uow.as_mut(), &order, Some(actor.id))
                .await
                .map_err(AppError::into_deduction)?;
            Some(outcome)
        } else {
            None
        };

        let released_courier = match order.courier_id {
            Some(courier_id) if target.is_terminal() => {
                CourierAssignmentTracker::release(uow.as_mut(), courier_id).await?;
                Some(courier_id)
            }
            _ => None,
        };

        uow.commit().await?;

        tracing::info!(
            order_id = %order.id,
            %from,
            to = %target,
            actor = %actor.id,
            "Order status changed"
        );

        Ok(TransitionOutcome {
            order,
            history,
            deduction,
            released_courier,
        })
    }
}

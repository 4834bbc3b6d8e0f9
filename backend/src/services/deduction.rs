//! Stock deduction for delivered orders

use std::sync::Arc;

use uuid::Uuid;

use super::inventory::post_movement;
use super::recipe::RecipeResolver;
use crate::error::{AppError, AppResult};
use crate::models::{
    aggregate_requirements, MovementKind, NewStockMovement, Order, OrderStatus, StockMovement,
    REFERENCE_ORDER,
};
use crate::store::{OrderRepository, Store, UnitOfWork};

/// Result of a deduction attempt
#[derive(Debug, Clone)]
pub enum DeductionOutcome {
    /// One `out` movement per ingredient the order consumed
    Applied(Vec<StockMovement>),
    /// The order had been deducted before; nothing was posted
    AlreadyDeducted,
}

impl DeductionOutcome {
    pub fn movements(&self) -> &[StockMovement] {
        match self {
            DeductionOutcome::Applied(movements) => movements,
            DeductionOutcome::AlreadyDeducted => &[],
        }
    }
}

#[derive(Clone)]
pub struct DeductionService {
    store: Arc<dyn Store>,
}

impl DeductionService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Deduct a delivered order's ingredients inside an open unit of work.
    ///
    /// The claim on the order's deduction marker happens first, so a second
    /// call posts nothing. Any error leaves the unit to be dropped, which
    /// discards the claim and every movement already posted.
    pub async fn deduct_within(
        uow: &mut dyn UnitOfWork,
        order: &Order,
        actor_id: Option<Uuid>,
    ) -> AppResult<DeductionOutcome> {
        if order.status != OrderStatus::Delivered {
            return Err(AppError::Deduction(format!(
                "order {} is {}, not delivered",
                order.id, order.status
            )));
        }

        if !uow.claim_deduction(order.id).await? {
            tracing::info!(order_id = %order.id, "Order stock already deducted");
            return Ok(DeductionOutcome::AlreadyDeducted);
        }

        let items = uow.order_items(order.id).await?;
        let mut per_item = Vec::with_capacity(items.len());
        for item in &items {
            if let Some(product_id) = item.product_id {
                let requirements = RecipeResolver::resolve(uow, product_id).await?;
                per_item.push((requirements, item.quantity));
            }
        }

        // Ordered by ingredient id, which also fixes the row lock order
        let totals = aggregate_requirements(
            per_item
                .iter()
                .map(|(requirements, quantity)| (requirements.as_slice(), *quantity)),
        )
        .ok_or_else(|| AppError::Deduction(format!("requirements of order {} overflow", order.id)))?;

        let mut movements = Vec::with_capacity(totals.len());
        for requirement in totals {
            let movement =
                NewStockMovement::new(requirement.ingredient_id, MovementKind::Out, requirement.quantity)
                    .with_reference(REFERENCE_ORDER, order.id)
                    .with_notes(format!("Delivered order {}", order.id))
                    .created_by(actor_id);
            let (row, _) = post_movement(uow, &movement).await?;
            movements.push(row);
        }

        tracing::info!(
            order_id = %order.id,
            movements = movements.len(),
            "Order stock deducted"
        );

        Ok(DeductionOutcome::Applied(movements))
    }

    /// Deduct a delivered order in its own unit of work
    pub async fn deduct(&self, order_id: Uuid, actor_id: Option<Uuid>) -> AppResult<DeductionOutcome> {
        let mut uow = self.store.begin().await?;
        let order = uow
            .lock_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let outcome = Self::deduct_within(uow.as_mut(), &order, actor_id)
            .await
            .map_err(AppError::into_deduction)?;
        uow.commit().await?;

        Ok(outcome)
    }
}

//! Order, line item and status history models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle status of an order
///
/// ```text
/// new -> cooking -> ready -> on_the_way -> delivered (terminal)
///   \________\________\__________\-------> cancelled (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Cooking,
    Ready,
    OnTheWay,
    Delivered,
    Cancelled,
}

/// Rejected status change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("order is already {0} and can no longer change status")]
    Terminal(OrderStatus),

    #[error("order is already {0}")]
    Unchanged(OrderStatus),
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::New,
        OrderStatus::Cooking,
        OrderStatus::Ready,
        OrderStatus::OnTheWay,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Cooking => "cooking",
            OrderStatus::Ready => "ready",
            OrderStatus::OnTheWay => "on_the_way",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// `delivered` and `cancelled` accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Check whether an order in this status may move to `target`.
    ///
    /// Any non-terminal status may move to any other status, including
    /// skipping straight to `delivered`.
    pub fn check_transition(&self, target: OrderStatus) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal(*self));
        }
        if *self == target {
            return Err(TransitionError::Unchanged(*self));
        }
        Ok(())
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(OrderStatus::New),
            "cooking" => Ok(OrderStatus::Cooking),
            "ready" => Ok(OrderStatus::Ready),
            "on_the_way" => Ok(OrderStatus::OnTheWay),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

/// Accepted payment labels. No payment is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    #[default]
    Cash,
    Card,
    Click,
    Payme,
}

impl PaymentType {
    pub const ALL: [PaymentType; 4] = [
        PaymentType::Cash,
        PaymentType::Card,
        PaymentType::Click,
        PaymentType::Payme,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::Card => "card",
            PaymentType::Click => "click",
            PaymentType::Payme => "payme",
        }
    }
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentType::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown payment type '{}'", s))
    }
}

/// A customer order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub delivery_zone: Option<String>,
    pub payment_type: PaymentType,
    pub notes: Option<String>,
    /// Fixed at creation
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub courier_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line item snapshot taken when the order was placed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl OrderItem {
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Append-only audit row for one status change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusHistory {
    pub id: Uuid,
    pub order_id: Uuid,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub changed_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Order together with its line items and audit trail
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub history: Vec<OrderStatusHistory>,
}

/// Public order submission, as posted by the storefront checkout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderIntake {
    #[serde(default)]
    pub user_fullname: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    pub delivery_zone: Option<String>,
    pub payment_type: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<IntakeItem>,
}

/// Cart line in a public order submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeItem {
    pub product_id: Option<Uuid>,
    #[serde(default)]
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i32,
}

/// A validated order ready to be persisted with status `new`
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub delivery_zone: Option<String>,
    pub payment_type: PaymentType,
    pub notes: Option<String>,
    pub items: Vec<NewOrderItem>,
    /// Sum of `price * quantity`, fixed when the submission is validated
    pub total_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i32,
}

/// Total for `(unit price, quantity)` pairs, `None` if it does not fit a decimal
pub fn order_total<I>(lines: I) -> Option<Decimal>
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    lines.into_iter().try_fold(Decimal::ZERO, |total, (price, quantity)| {
        price
            .checked_mul(Decimal::from(quantity))
            .and_then(|line| total.checked_add(line))
    })
}

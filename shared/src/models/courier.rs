//! Courier models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A delivery courier and their current load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub vehicle_type: Option<String>,
    pub is_active: bool,
    pub is_available: bool,
    /// Orders currently assigned and not yet terminal
    pub current_order_count: i32,
    pub max_orders: i32,
    pub created_at: DateTime<Utc>,
}

impl Courier {
    pub fn has_capacity(&self) -> bool {
        self.current_order_count < self.max_orders
    }

    /// Active, available and below capacity
    pub fn can_accept_order(&self) -> bool {
        self.is_active && self.is_available && self.has_capacity()
    }
}

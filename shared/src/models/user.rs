//! Staff permission model

use serde::{Deserialize, Serialize};

/// Resources staff can act on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Orders,
    Couriers,
    Inventory,
    Products,
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    /// Change an order's status
    Transition,
    /// Hand an order to a courier
    Assign,
    /// Submit a physical count
    Count,
    /// Approve a submitted count
    Approve,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Orders => "orders",
            Resource::Couriers => "couriers",
            Resource::Inventory => "inventory",
            Resource::Products => "products",
        }
    }
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Transition => "transition",
            Action::Assign => "assign",
            Action::Count => "count",
            Action::Approve => "approve",
        }
    }
}

/// Permission string as carried in staff tokens, e.g. `orders:transition`
pub fn permission_key(resource: Resource, action: Action) -> String {
    format!("{}:{}", resource.as_str(), action.as_str())
}

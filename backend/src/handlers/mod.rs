//! HTTP handlers

pub mod couriers;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod products;

pub use couriers::*;
pub use health::*;
pub use inventory::*;
pub use orders::*;
pub use products::*;

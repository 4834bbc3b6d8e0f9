//! Domain models for the restaurant order and stock platform

mod courier;
mod inventory;
mod order;
mod product;
mod user;

pub use courier::*;
pub use inventory::*;
pub use order::*;
pub use product::*;
pub use user::*;

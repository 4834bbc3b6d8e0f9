//! Domain models for the restaurant order and stock service
//!
//! Re-exports models from the shared crate

pub use shared::models::*;
pub use shared::types::{Actor, SlidingWindow};

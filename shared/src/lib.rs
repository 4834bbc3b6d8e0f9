//! Shared types and rules for the restaurant order and stock platform
//!
//! This crate contains types shared between the backend, the storefront
//! (via WASM), and other components of the system. Nothing here performs I/O.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;

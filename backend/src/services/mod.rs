//! Business logic services for the restaurant order and stock platform

pub mod catalog;
pub mod courier;
pub mod deduction;
pub mod intake;
pub mod inventory;
pub mod low_stock;
pub mod orders;
pub mod rate_limit;
pub mod recipe;
pub mod reconciliation;
pub mod transition;

pub use catalog::CatalogService;
pub use courier::CourierAssignmentTracker;
pub use deduction::{DeductionOutcome, DeductionService};
pub use intake::OrderIntakeService;
pub use inventory::IngredientLedger;
pub use low_stock::{LowStockMonitor, LowStockNotifier, TracingNotifier};
pub use orders::OrderQueries;
pub use rate_limit::RateLimiter;
pub use recipe::RecipeResolver;
pub use reconciliation::ReconciliationService;
pub use transition::{StatusTransitionEngine, TransitionOutcome};

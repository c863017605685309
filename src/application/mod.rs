// Application layer - use cases and orchestration on top of the storage layer.
// The reconciler owns the ledger write path; everything else goes through
// BusinessService.

pub mod cache;
pub mod error;
pub mod reconciler;
pub mod reporting;
pub mod service;

pub use cache::*;
pub use error::*;
pub use reconciler::*;
pub use reporting::{
    CategorySummary, DashboardStats, ExpenseSummary, OwnerSnapshot, SalesSummary, month_bounds,
};
pub use service::*;

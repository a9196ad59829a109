//! In-memory request deduplication.
//!
//! Tracks which request currently owns the work for each resource group,
//! separately for collects and scans, and resolves request completion
//! through the dependency edges recorded when a claim was refused.

mod claim;
mod manager;

pub use claim::ClaimGuard;
pub use manager::RequestStateManager;

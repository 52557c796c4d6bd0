#![forbid(unsafe_code)]

//! The four dashboard domains, each a [`DomainAdapter`] over the generic
//! engine plus an extension trait exposing its manual edits on
//! `SyncStore`.
//!
//! [`DomainAdapter`]: drift_engine::DomainAdapter

pub mod inventory;
pub mod loan;
pub mod revenue;
pub mod tax;

pub use inventory::{InventoryActions, InventoryAdapter, InventoryData};
pub use loan::{LoanActions, LoanAdapter, LoanData};
pub use revenue::{RevenueAdapter, RevenueData};
pub use tax::{TaxActions, TaxAdapter, TaxData};

/// One-line summary of a dataset for logs and the CLI.
pub trait Headline {
    fn headline(&self) -> String;
}

//! Shared types and models for the stock ledger service
//!
//! This crate holds the bookkeeping rules with no I/O: the stock map, the
//! movement arithmetic, posting planners, document lifecycle and alert
//! classification. The backend loads state, calls into this crate and
//! persists the results.

pub mod fulfillment;
pub mod models;
pub mod posting;
pub mod stock;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;

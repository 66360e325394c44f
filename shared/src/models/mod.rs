//! Domain models for the stock ledger service

mod alert;
mod document;
mod ledger;
mod product;
mod user;
mod warehouse;

pub use alert::*;
pub use document::*;
pub use ledger::*;
pub use product::*;
pub use user::*;
pub use warehouse::*;

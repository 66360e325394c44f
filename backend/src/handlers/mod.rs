//! HTTP handlers, one module per resource

mod adjustment;
mod alert;
mod auth;
mod dashboard;
mod delivery;
mod health;
mod ledger;
mod product;
mod receipt;
mod transfer;
mod user;
mod warehouse;

pub use adjustment::*;
pub use alert::*;
pub use auth::*;
pub use dashboard::*;
pub use delivery::*;
pub use health::*;
pub use ledger::*;
pub use product::*;
pub use receipt::*;
pub use transfer::*;
pub use user::*;
pub use warehouse::*;

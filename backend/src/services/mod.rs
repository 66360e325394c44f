//! Business logic services for the stock ledger

pub mod adjustment;
pub mod alert;
pub mod auth;
pub mod dashboard;
pub mod delivery;
pub mod document;
pub mod ledger;
pub mod product;
pub mod receipt;
pub mod stock;
pub mod transfer;
pub mod user;
pub mod warehouse;

pub use adjustment::AdjustmentService;
pub use alert::AlertService;
pub use auth::AuthService;
pub use dashboard::DashboardService;
pub use delivery::DeliveryService;
pub use ledger::LedgerService;
pub use product::ProductService;
pub use receipt::ReceiptService;
pub use transfer::TransferService;
pub use user::UserService;
pub use warehouse::WarehouseService;

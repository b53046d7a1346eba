//! Engine operations, one module per concern.

pub mod authz;
pub mod cash_close;
pub mod inventory;
pub mod metrics;
pub mod payments;
pub mod purchases;
pub mod reconciliation;
pub mod work_orders;

pub use cash_close::CashCloseService;
pub use inventory::InventoryService;
pub use payments::PaymentService;
pub use purchases::PurchaseService;
pub use work_orders::WorkOrderService;

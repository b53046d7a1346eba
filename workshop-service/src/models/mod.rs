//! Domain models for workshop-service.

mod cash_close;
mod catalog;
mod customer;
mod inventory;
mod payment;
mod purchase;
mod work_order;

pub use cash_close::{CashClose, CashTotals, CreateCashClose};
pub use catalog::{CatalogItem, CatalogItemType};
pub use customer::{Customer, Vehicle};
pub use inventory::{
    InventoryAdjustment, InventoryMovement, MovementRef, MovementType, ReferenceType, StockLevel,
};
pub use payment::{CreatePayment, Payment, PaymentMethod};
pub use purchase::{
    CreatePurchase, CreatePurchaseItem, Purchase, PurchaseDetail, PurchaseItem, PurchaseStatus,
    Supplier, UpdatePurchase,
};
pub use work_order::{
    CreateWorkOrder, CreateWorkOrderItem, CreateWorkOrderNote, ItemCostRow, ItemType,
    ListWorkOrdersFilter, PaymentStatus, PaymentTotals, UpdateWorkOrder, UpdateWorkOrderItem,
    WorkOrder, WorkOrderDetail, WorkOrderEvent, WorkOrderItem, WorkOrderNote, WorkOrderStatus,
    WorkOrderTotals,
};

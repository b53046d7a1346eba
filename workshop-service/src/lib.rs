//! Workshop Service - Multi-tenant work-order reconciliation engine.
//!
//! Keeps a work order's monetary snapshot (total, cost, margin, paid,
//! balance, payment status) consistent with its line items, payments, and
//! the append-only inventory ledger. Every mutating operation runs inside a
//! single store transaction.

pub mod config;
pub mod models;
pub mod services;
pub mod store;

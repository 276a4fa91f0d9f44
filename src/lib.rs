//! Distributor Stock Service
//!
//! Inventory reservation and order placement for a beverage distributor.
//!
//! ## Features
//! - Product catalog with multilingual names (fr/ar/en)
//! - Stock ledger with reserved quantities and derived availability
//! - Append-only stock movement audit trail
//! - All-or-nothing multi-item order placement under row-level locking
//! - Order history and availability checks

pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod movements;
pub mod orders;
pub mod stock;

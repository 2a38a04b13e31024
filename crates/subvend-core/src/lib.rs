//! `Subvend` Core Library
//!
//! Shared functionality for `Subvend` components:
//! - Purchase error taxonomy
//! - Pricing catalog (duration/traffic tiers)
//! - Engine configuration
//! - SQLite pool helpers
//! - Tracing initialization

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use catalog::{Catalog, PlanSelection};
pub use config::EngineConfig;
pub use error::{PurchaseError, Result};

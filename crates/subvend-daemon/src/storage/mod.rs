//! SQLite ledger for the Subvend storefront.
//!
//! Provides persistence for users, plans, purchases, credentials, and
//! top-up payments.

mod db;
mod models;
mod queries;
mod queries_purchases;


pub use db::Database;
pub use models::*;
pub use queries_purchases::PurchaseParams;
pub use subvend_core::db::DatabaseError;

//! Subvend Daemon Library
//!
//! The storefront engine behind the chat layer:
//! - JSON-backed token inventory with FIFO buckets per tier
//! - SQLite ledger for users, plans, purchases, credentials, payments
//! - Purchase coordinator with compensation on failure
//! - Top-up moderation desk
//! - Expiry-reminder background job

pub mod inventory;
pub mod jobs;
pub mod notify;
pub mod purchase;
pub mod session;
pub mod storage;
pub mod topup;

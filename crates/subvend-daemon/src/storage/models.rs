//! Data models for Subvend ledger storage.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    /// Opaque identity key supplied by the chat layer.
    pub external_id: String,
    /// Balance in the minor currency unit; never negative.
    pub balance: i64,
    pub is_admin: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub duration_days: i64,
    /// Traffic quota in GB; 0 means unlimited.
    pub traffic_gb: i64,
    pub price: i64,
    /// Concurrent connection cap; 0 means unlimited.
    pub connections: i64,
    pub active: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Purchase {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: i64,
    /// The allocated access token, consumed from inventory.
    pub token: String,
    pub label: String,
    /// Inventory bucket key the token came from, kept for refunds.
    pub duration_tier: i64,
    pub traffic_gb: i64,
    /// Serialized payload: label, token, traffic quota at purchase time.
    pub payload: String,
    pub expires_at: i64,
    pub notified: i64,
    pub active: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Credential {
    pub id: String,
    pub user_id: i64,
    pub purchase_id: i64,
    pub label: String,
    pub expires_at: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub method: String,
    pub amount: i64,
    /// One of "pending", "approved", "rejected".
    pub status: String,
    /// Receipt reference: file id for card payments, tx hash for crypto.
    pub receipt: String,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

//! Error types for `Subvend` purchase operations.

use thiserror::Error;

/// Result type alias using [`PurchaseError`].
pub type Result<T> = std::result::Result<T, PurchaseError>;

/// Errors surfaced by the purchase coordinator and its collaborators.
///
/// Every variant except [`PurchaseError::CompensationFailed`] leaves the
/// system in a consistent, previously-valid state and is reported to the
/// end user as a plain denial. `CompensationFailed` means a rollback step
/// itself failed (an inventory or balance leak) and must be escalated to
/// an operator.
#[derive(Debug, Error)]
pub enum PurchaseError {
    /// Balance is lower than the plan price.
    #[error("insufficient balance")]
    InsufficientFunds,

    /// The inventory bucket for the requested tier is empty or absent.
    #[error("no tokens available for duration tier {duration_tier}, {traffic_gb}GB")]
    NotAvailable { duration_tier: u32, traffic_gb: u32 },

    /// The (duration, traffic) pair is not in the catalog.
    #[error("unknown plan: duration tier {duration_tier}, {traffic_gb}GB")]
    UnknownPlan { duration_tier: u32, traffic_gb: u32 },

    /// Display label failed validation (must be 1-50 characters).
    #[error("invalid display label")]
    InvalidLabel,

    /// Top-up amount outside the allowed bounds for the payment method.
    #[error("amount {amount} outside allowed range {min}..={max}")]
    InvalidAmount { amount: i64, min: i64, max: i64 },

    /// A durable write failed before any state was committed.
    #[error("storage failure: {0}")]
    Storage(String),

    /// The record was already resolved by a concurrent operation
    /// (e.g. refund of an already-refunded purchase).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A compensating step (put-back or refund credit) failed after an
    /// earlier step already mutated state. Escalated, never auto-recovered.
    #[error("compensation failed: {0}")]
    CompensationFailed(String),
}

impl From<crate::db::DatabaseError> for PurchaseError {
    fn from(e: crate::db::DatabaseError) -> Self {
        match e {
            crate::db::DatabaseError::NotFound(what) => Self::NotFound(what),
            other => Self::Storage(other.to_string()),
        }
    }
}

//! Manual balance top-ups.
//!
//! Users fund their balance by card transfer or crypto; each submission
//! records a pending Payment with its receipt reference, and an admin
//! approves or rejects it. Approval credits the balance atomically with
//! the status flip, so a payment can never be credited twice.

use std::sync::Arc;

use tracing::info;

use subvend_core::config::TopupLimits;
use subvend_core::error::PurchaseError;

use crate::notify::Notifier;
use crate::storage::{Database, Payment};

/// Crypto top-ups are bounded in whole USDT, independent of the
/// card-method limits.
const CRYPTO_MIN: i64 = 10;
const CRYPTO_MAX: i64 = 500;

/// Supported top-up methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Card,
    Crypto,
}

impl PaymentMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Crypto => "crypto",
        }
    }
}

/// Top-up submission and moderation service.
#[derive(Clone)]
pub struct TopupDesk {
    db: Database,
    limits: TopupLimits,
    notifier: Arc<dyn Notifier>,
}

impl TopupDesk {
    pub fn new(db: Database, limits: TopupLimits, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, limits, notifier }
    }

    /// Record a pending top-up. `receipt` is the proof reference the user
    /// supplied: a screenshot file id for card, a tx hash for crypto.
    pub async fn submit(
        &self,
        external_user_id: &str,
        method: PaymentMethod,
        amount: i64,
        receipt: &str,
    ) -> Result<Payment, PurchaseError> {
        let (min, max) = match method {
            PaymentMethod::Card => (self.limits.min_amount, self.limits.max_amount),
            PaymentMethod::Crypto => (CRYPTO_MIN, CRYPTO_MAX),
        };
        if amount < min || amount > max {
            return Err(PurchaseError::InvalidAmount { amount, min, max });
        }

        let user = self.db.get_or_create_user(external_user_id).await?;
        let payment = self
            .db
            .create_payment(user.id, method.as_str(), amount, receipt)
            .await?;

        info!(
            payment = %reference(payment.id),
            user = external_user_id,
            amount,
            method = method.as_str(),
            "Top-up submitted"
        );
        self.notifier.admin_message(&format!(
            "New {} top-up #{} from {external_user_id}: {amount}",
            method.as_str(),
            reference(payment.id)
        ));

        Ok(payment)
    }

    /// Approve a pending payment, crediting the user's balance.
    pub async fn approve(&self, payment_id: i64) -> Result<(), PurchaseError> {
        if !self.db.approve_payment(payment_id).await? {
            return Err(PurchaseError::Conflict(format!(
                "payment {payment_id} is not pending"
            )));
        }

        let payment = self.db.get_payment(payment_id).await?;
        let user = self.db.get_user(payment.user_id).await?;
        info!(payment = %reference(payment_id), user = %user.external_id, "Top-up approved");
        self.notifier.user_message(
            &user.external_id,
            &format!("Top-up #{} approved, {} added to your balance.", reference(payment_id), payment.amount),
        );
        Ok(())
    }

    /// Reject a pending payment. The balance is untouched.
    pub async fn reject(&self, payment_id: i64) -> Result<(), PurchaseError> {
        if !self.db.reject_payment(payment_id).await? {
            return Err(PurchaseError::Conflict(format!(
                "payment {payment_id} is not pending"
            )));
        }

        let payment = self.db.get_payment(payment_id).await?;
        let user = self.db.get_user(payment.user_id).await?;
        info!(payment = %reference(payment_id), user = %user.external_id, "Top-up rejected");
        self.notifier.user_message(
            &user.external_id,
            &format!("Top-up #{} was rejected.", reference(payment_id)),
        );
        Ok(())
    }

    /// Payments awaiting moderation.
    pub async fn pending(&self) -> Result<Vec<Payment>, PurchaseError> {
        Ok(self.db.pending_payments().await?)
    }
}

/// Five-digit zero-padded tracking number shown to users and admins.
pub fn reference(payment_id: i64) -> String {
    format!("{payment_id:05}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;

    async fn desk() -> TopupDesk {
        let db = Database::open_in_memory().await.unwrap();
        TopupDesk::new(db, TopupLimits::default(), Arc::new(LogNotifier))
    }

    #[tokio::test]
    async fn submit_within_bounds() {
        let desk = desk().await;
        let payment = desk
            .submit("tg:1", PaymentMethod::Card, 300_000, "file:abc")
            .await
            .unwrap();
        assert_eq!(payment.status, "pending");
        assert_eq!(payment.method, "card");
    }

    #[tokio::test]
    async fn card_amount_out_of_bounds_is_rejected() {
        let desk = desk().await;
        let low = desk.submit("tg:1", PaymentMethod::Card, 100, "r").await;
        assert!(matches!(low, Err(PurchaseError::InvalidAmount { .. })));
        let high = desk
            .submit("tg:1", PaymentMethod::Card, 20_000_000, "r")
            .await;
        assert!(matches!(high, Err(PurchaseError::InvalidAmount { .. })));
    }

    #[tokio::test]
    async fn crypto_bounds_differ_from_card() {
        let desk = desk().await;
        assert!(desk.submit("tg:1", PaymentMethod::Crypto, 50, "tx").await.is_ok());
        assert!(desk.submit("tg:1", PaymentMethod::Crypto, 5, "tx").await.is_err());
        assert!(desk.submit("tg:1", PaymentMethod::Crypto, 501, "tx").await.is_err());
    }

    #[tokio::test]
    async fn approve_credits_once() {
        let desk = desk().await;
        let payment = desk
            .submit("tg:1", PaymentMethod::Card, 300_000, "file:abc")
            .await
            .unwrap();

        desk.approve(payment.id).await.unwrap();
        let user = desk.db.get_user_by_external_id("tg:1").await.unwrap();
        assert_eq!(user.balance, 300_000);

        let again = desk.approve(payment.id).await;
        assert!(matches!(again, Err(PurchaseError::Conflict(_))));
    }

    #[tokio::test]
    async fn reject_then_approve_conflicts() {
        let desk = desk().await;
        let payment = desk
            .submit("tg:1", PaymentMethod::Card, 300_000, "file:abc")
            .await
            .unwrap();

        desk.reject(payment.id).await.unwrap();
        assert!(desk.approve(payment.id).await.is_err());
        let user = desk.db.get_user_by_external_id("tg:1").await.unwrap();
        assert_eq!(user.balance, 0);
    }

    #[test]
    fn reference_is_zero_padded() {
        assert_eq!(reference(7), "00007");
        assert_eq!(reference(12345), "12345");
    }
}

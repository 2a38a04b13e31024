//! Purchase, credential, and payment queries for the Subvend ledger.

use subvend_core::db::{DatabaseError, unix_timestamp};

use super::db::Database;
use super::models::{Credential, Payment, Purchase};

/// Parameters for the atomic purchase + credential write.
pub struct PurchaseParams<'a> {
    pub user_id: i64,
    pub plan_id: i64,
    pub token: &'a str,
    pub label: &'a str,
    pub duration_tier: i64,
    pub traffic_gb: i64,
    pub payload: &'a str,
    pub expires_at: i64,
    pub credential_id: &'a str,
}

impl Database {
    // =========================================================================
    // Purchase queries
    // =========================================================================

    /// Create a purchase row and its credential row in one transaction.
    /// Either both rows become durable or neither does.
    pub async fn create_purchase_and_credential(
        &self,
        params: &PurchaseParams<'_>,
    ) -> Result<(Purchase, Credential), DatabaseError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            "INSERT INTO purchases (user_id, plan_id, token, label, duration_tier, traffic_gb, payload, expires_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(params.user_id)
        .bind(params.plan_id)
        .bind(params.token)
        .bind(params.label)
        .bind(params.duration_tier)
        .bind(params.traffic_gb)
        .bind(params.payload)
        .bind(params.expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let purchase_id = result.last_insert_rowid();

        sqlx::query(
            "INSERT INTO credentials (id, user_id, purchase_id, label, expires_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(params.credential_id)
        .bind(params.user_id)
        .bind(purchase_id)
        .bind(params.label)
        .bind(params.expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let purchase = self.get_purchase(purchase_id).await?;
        let credential = self.get_credential(params.credential_id).await?;
        Ok((purchase, credential))
    }

    /// Get a purchase by ID.
    pub async fn get_purchase(&self, id: i64) -> Result<Purchase, DatabaseError> {
        sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Purchase {id}")))
    }

    /// List purchases for a user, newest first.
    pub async fn purchases_for_user(&self, user_id: i64) -> Result<Vec<Purchase>, DatabaseError> {
        let purchases = sqlx::query_as::<_, Purchase>(
            "SELECT * FROM purchases WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(purchases)
    }

    /// Mark an active purchase inactive and credit the refund amount back
    /// in one transaction. Returns `false` when the purchase was already
    /// inactive (a concurrent refund won).
    pub async fn refund_purchase_tx(
        &self,
        purchase_id: i64,
        user_id: i64,
        amount: i64,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query("UPDATE purchases SET active = 0 WHERE id = ? AND active = 1")
            .bind(purchase_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE users SET balance = balance + ? WHERE id = ?")
            .bind(amount)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Get a credential by ID.
    pub async fn get_credential(&self, id: &str) -> Result<Credential, DatabaseError> {
        sqlx::query_as::<_, Credential>("SELECT * FROM credentials WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Credential {id}")))
    }

    /// Get the credential issued for a purchase, if any.
    pub async fn credential_for_purchase(
        &self,
        purchase_id: i64,
    ) -> Result<Option<Credential>, DatabaseError> {
        let credential =
            sqlx::query_as::<_, Credential>("SELECT * FROM credentials WHERE purchase_id = ?")
                .bind(purchase_id)
                .fetch_optional(self.pool())
                .await?;

        Ok(credential)
    }

    // =========================================================================
    // Expiry-reminder queries
    // =========================================================================

    /// Active, un-notified purchases expiring within `horizon_secs`.
    pub async fn expiring_purchases(
        &self,
        horizon_secs: i64,
    ) -> Result<Vec<Purchase>, DatabaseError> {
        let now = unix_timestamp();

        let purchases = sqlx::query_as::<_, Purchase>(
            "SELECT * FROM purchases WHERE active = 1 AND notified = 0 AND expires_at > ? AND expires_at <= ?",
        )
        .bind(now)
        .bind(now + horizon_secs)
        .fetch_all(self.pool())
        .await?;

        Ok(purchases)
    }

    /// Mark a purchase's expiry reminder as sent.
    pub async fn mark_notified(&self, purchase_id: i64) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE purchases SET notified = 1 WHERE id = ?")
            .bind(purchase_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    // =========================================================================
    // Payment queries
    // =========================================================================

    /// Record a pending top-up payment.
    pub async fn create_payment(
        &self,
        user_id: i64,
        method: &str,
        amount: i64,
        receipt: &str,
    ) -> Result<Payment, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "INSERT INTO payments (user_id, method, amount, receipt, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(method)
        .bind(amount)
        .bind(receipt)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_payment(result.last_insert_rowid()).await
    }

    /// Get a payment by ID.
    pub async fn get_payment(&self, id: i64) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Payment {id}")))
    }

    /// Approve a pending payment and credit its amount in one transaction.
    /// Returns `false` when the payment was not pending.
    pub async fn approve_payment(&self, id: i64) -> Result<bool, DatabaseError> {
        let payment = self.get_payment(id).await?;
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            "UPDATE payments SET status = 'approved', resolved_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE users SET balance = balance + ? WHERE id = ?")
            .bind(payment.amount)
            .bind(payment.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Reject a pending payment. Returns `false` when it was not pending.
    pub async fn reject_payment(&self, id: i64) -> Result<bool, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "UPDATE payments SET status = 'rejected', resolved_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Payments awaiting moderation, oldest first.
    pub async fn pending_payments(&self) -> Result<Vec<Payment>, DatabaseError> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE status = 'pending' ORDER BY created_at ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(payments)
    }
}

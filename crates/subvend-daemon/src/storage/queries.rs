//! User, balance, and plan queries for the Subvend ledger.

use subvend_core::db::{DatabaseError, unix_timestamp};

use super::db::Database;
use super::models::{Plan, User};

impl Database {
    // =========================================================================
    // User queries
    // =========================================================================

    /// Get a user by external identity key, creating the row on first
    /// contact with a zero balance.
    pub async fn get_or_create_user(&self, external_id: &str) -> Result<User, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query("INSERT OR IGNORE INTO users (external_id, created_at) VALUES (?, ?)")
            .bind(external_id)
            .bind(now)
            .execute(self.pool())
            .await?;

        self.get_user_by_external_id(external_id).await
    }

    /// Get a user by internal ID.
    pub async fn get_user(&self, id: i64) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {id}")))
    }

    /// Get a user by external identity key.
    pub async fn get_user_by_external_id(&self, external_id: &str) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User with external id {external_id}")))
    }

    /// Set or clear the admin flag.
    pub async fn set_admin(&self, id: i64, is_admin: bool) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET is_admin = ? WHERE id = ?")
            .bind(i64::from(is_admin))
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Atomically debit a balance. Returns `false` without mutating state
    /// when the current balance is lower than `amount`; the guard in the
    /// WHERE clause is the per-user critical section.
    pub async fn debit_balance(&self, user_id: i64, amount: i64) -> Result<bool, DatabaseError> {
        let result =
            sqlx::query("UPDATE users SET balance = balance - ? WHERE id = ? AND balance >= ?")
                .bind(amount)
                .bind(user_id)
                .bind(amount)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Credit a balance (top-up approval and refund compensation).
    pub async fn credit_balance(&self, user_id: i64, amount: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE users SET balance = balance + ? WHERE id = ?")
            .bind(amount)
            .bind(user_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("User {user_id}")));
        }
        Ok(())
    }

    // =========================================================================
    // Plan queries
    // =========================================================================

    /// Resolve a plan by (duration, traffic, price, connections), creating
    /// a new row on a true miss. Existing rows are never mutated, so plans
    /// referenced by historical purchases keep their original pricing. The
    /// uniqueness constraint makes concurrent inserts collapse to one row.
    pub async fn resolve_or_create_plan(
        &self,
        duration_days: i64,
        traffic_gb: i64,
        price: i64,
        connections: i64,
    ) -> Result<Plan, DatabaseError> {
        let now = unix_timestamp();
        let name = format!("{duration_days}d - {traffic_gb}GB");

        sqlx::query(
            "INSERT OR IGNORE INTO plans (name, duration_days, traffic_gb, price, connections, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&name)
        .bind(duration_days)
        .bind(traffic_gb)
        .bind(price)
        .bind(connections)
        .bind(now)
        .execute(self.pool())
        .await?;

        sqlx::query_as::<_, Plan>(
            "SELECT * FROM plans WHERE duration_days = ? AND traffic_gb = ? AND price = ? AND connections = ?",
        )
        .bind(duration_days)
        .bind(traffic_gb)
        .bind(price)
        .bind(connections)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Plan {name}")))
    }

    /// Get a plan by ID.
    pub async fn get_plan(&self, id: i64) -> Result<Plan, DatabaseError> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Plan {id}")))
    }
}

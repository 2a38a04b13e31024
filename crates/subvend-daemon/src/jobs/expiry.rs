//! Expiry-reminder scanner.
//!
//! Periodically finds active purchases expiring within the horizon and
//! sends each owner a one-time reminder. Append-only with respect to the
//! core invariants: it never touches balance or inventory, so it runs
//! concurrently with purchases without coordination.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use subvend_core::config::ExpiryConfig;
use subvend_core::db::DatabaseError;

use crate::notify::Notifier;
use crate::storage::Database;

pub struct ExpiryScanner {
    db: Database,
    notifier: Arc<dyn Notifier>,
    horizon_secs: i64,
    interval: Duration,
}

impl ExpiryScanner {
    pub fn new(db: Database, notifier: Arc<dyn Notifier>, config: &ExpiryConfig) -> Self {
        Self {
            db,
            notifier,
            horizon_secs: i64::from(config.horizon_days) * 86_400,
            interval: Duration::from_secs(config.interval_secs),
        }
    }

    /// Run until the shutdown channel flips.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.scan_once().await {
                        Ok(0) => {}
                        Ok(reminded) => info!(reminded, "Expiry reminders sent"),
                        Err(e) => warn!(error = %e, "Expiry scan failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("Expiry scanner stopped");
                    return;
                }
            }
        }
    }

    /// One scan pass; returns how many reminders were sent.
    pub async fn scan_once(&self) -> Result<usize, DatabaseError> {
        let expiring = self.db.expiring_purchases(self.horizon_secs).await?;
        let mut reminded = 0;

        for purchase in expiring {
            // One broken row must not block reminders for the rest.
            let user = match self.db.get_user(purchase.user_id).await {
                Ok(user) => user,
                Err(e) => {
                    warn!(purchase_id = purchase.id, error = %e, "Skipping expiry reminder");
                    continue;
                }
            };
            self.notifier.user_message(
                &user.external_id,
                &format!(
                    "Your plan '{}' expires within {} days. Renew to keep your access.",
                    purchase.label,
                    self.horizon_secs / 86_400
                ),
            );
            self.db.mark_notified(purchase.id).await?;
            reminded += 1;
        }

        Ok(reminded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;
    use crate::storage::PurchaseParams;
    use subvend_core::db::unix_timestamp;

    #[tokio::test]
    async fn scan_reminds_once() {
        let db = Database::open_in_memory().await.unwrap();
        let user = db.get_or_create_user("tg:1").await.unwrap();
        let plan = db.resolve_or_create_plan(30, 30, 50_000, 2).await.unwrap();

        db.create_purchase_and_credential(&PurchaseParams {
            user_id: user.id,
            plan_id: plan.id,
            token: "tokA",
            label: "phone",
            duration_tier: 1,
            traffic_gb: 30,
            payload: "{}",
            expires_at: unix_timestamp() + 86_400,
            credential_id: "cred-1",
        })
        .await
        .unwrap();

        let scanner = ExpiryScanner::new(db, Arc::new(LogNotifier), &ExpiryConfig::default());
        assert_eq!(scanner.scan_once().await.unwrap(), 1);
        // Already notified: nothing more to send.
        assert_eq!(scanner.scan_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn scan_skips_rows_with_missing_owner() {
        let db = Database::open_in_memory().await.unwrap();
        let user = db.get_or_create_user("tg:1").await.unwrap();
        let plan = db.resolve_or_create_plan(30, 30, 50_000, 2).await.unwrap();
        let expires_at = unix_timestamp() + 86_400;

        // An orphaned purchase row (owner gone); the single test connection
        // keeps the pragma in effect for the insert.
        sqlx::query("PRAGMA foreign_keys = OFF").execute(db.pool()).await.unwrap();
        db.create_purchase_and_credential(&PurchaseParams {
            user_id: 999,
            plan_id: plan.id,
            token: "tokOrphan",
            label: "orphan",
            duration_tier: 1,
            traffic_gb: 30,
            payload: "{}",
            expires_at,
            credential_id: "cred-orphan",
        })
        .await
        .unwrap();

        db.create_purchase_and_credential(&PurchaseParams {
            user_id: user.id,
            plan_id: plan.id,
            token: "tokB",
            label: "phone",
            duration_tier: 1,
            traffic_gb: 30,
            payload: "{}",
            expires_at,
            credential_id: "cred-2",
        })
        .await
        .unwrap();

        let scanner = ExpiryScanner::new(db, Arc::new(LogNotifier), &ExpiryConfig::default());
        // The orphan is skipped, the valid purchase is still reminded.
        assert_eq!(scanner.scan_once().await.unwrap(), 1);
        assert_eq!(scanner.scan_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let db = Database::open_in_memory().await.unwrap();
        let scanner = ExpiryScanner::new(
            db,
            Arc::new(LogNotifier),
            &ExpiryConfig { horizon_days: 3, interval_secs: 3600 },
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(scanner.run(shutdown_rx));
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}

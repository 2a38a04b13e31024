//! The purchase coordinator.
//!
//! Drives one purchase attempt through
//! Validating -> Reserving -> Debiting -> Persisting -> Committed,
//! compensating on any failure after state has been mutated:
//!
//! * debit refused after the token was reserved -> put the token back;
//! * persist failed after the debit -> put the token back and credit the
//!   debited amount.
//!
//! A failure inside a compensating step itself is an inventory or balance
//! leak; it is escalated to the operator channel and surfaced as
//! [`PurchaseError::CompensationFailed`], never silently swallowed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use subvend_core::catalog::{Catalog, PlanSelection};
use subvend_core::db::unix_timestamp;
use subvend_core::error::PurchaseError;

use crate::inventory::{Allocator, InventoryError};
use crate::notify::Notifier;
use crate::storage::{Database, PurchaseParams};

const MAX_LABEL_CHARS: usize = 50;

/// Result of a committed purchase, handed back to the chat layer.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub purchase_id: i64,
    pub credential_id: String,
    pub token: String,
    pub expires_at: i64,
}

/// Opaque payload stored on the purchase row: what the user bought,
/// frozen at purchase time.
#[derive(Debug, Serialize, Deserialize)]
struct PurchasePayload<'a> {
    version: &'a str,
    label: &'a str,
    token: &'a str,
    traffic_gb: u32,
}

/// Orchestrates the ledger, the allocator, and the catalog for the
/// storefront's purchase and refund entry points.
#[derive(Clone)]
pub struct PurchaseEngine {
    db: Database,
    allocator: Allocator,
    catalog: Catalog,
    notifier: Arc<dyn Notifier>,
}

impl PurchaseEngine {
    pub fn new(
        db: Database,
        allocator: Allocator,
        catalog: Catalog,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { db, allocator, catalog, notifier }
    }

    /// Tokens currently sellable for a tier; used by the chat layer to
    /// decide which plans to offer at all.
    pub async fn availability(&self, duration_tier: u32, traffic_gb: u32) -> usize {
        self.allocator.availability(duration_tier, traffic_gb).await
    }

    /// Execute a purchase end to end. On success the token is permanently
    /// consumed, the balance reduced, and the purchase + credential rows
    /// durable. On every recoverable failure all state is as it was before
    /// the call.
    pub async fn execute_purchase(
        &self,
        external_user_id: &str,
        duration_tier: u32,
        traffic_gb: u32,
        label: &str,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        let label = label.trim();
        if label.is_empty() || label.chars().count() > MAX_LABEL_CHARS {
            return Err(PurchaseError::InvalidLabel);
        }

        let plan = self
            .catalog
            .lookup(duration_tier, traffic_gb)
            .ok_or(PurchaseError::UnknownPlan { duration_tier, traffic_gb })?;

        // Validating: always a fresh balance read, never a value cached
        // earlier in the conversation.
        let user = self.db.get_or_create_user(external_user_id).await?;
        if user.balance < plan.price {
            debug!(user = external_user_id, price = plan.price, "Purchase refused: insufficient balance");
            return Err(PurchaseError::InsufficientFunds);
        }

        let plan_row = self
            .db
            .resolve_or_create_plan(
                i64::from(plan.duration_days),
                i64::from(plan.traffic_gb),
                plan.price,
                i64::from(plan.connections),
            )
            .await?;

        // Reserving: no side effects yet besides the token leaving its
        // bucket; every failure from here on must return it.
        let token = match self.allocator.reserve(duration_tier, traffic_gb).await {
            Ok(token) => token,
            Err(InventoryError::NotAvailable { duration_tier, traffic_gb }) => {
                return Err(PurchaseError::NotAvailable { duration_tier, traffic_gb });
            }
            Err(e) => return Err(PurchaseError::Storage(e.to_string())),
        };
        debug!(user = external_user_id, duration_tier, traffic_gb, "Token reserved");

        // Debiting: the balance may have changed since Validating; the
        // atomic guard in the ledger decides.
        match self.db.debit_balance(user.id, plan.price).await {
            Ok(true) => {}
            Ok(false) => {
                self.compensate_reservation(&token, duration_tier, traffic_gb).await?;
                return Err(PurchaseError::InsufficientFunds);
            }
            Err(e) => {
                self.compensate_reservation(&token, duration_tier, traffic_gb).await?;
                return Err(PurchaseError::Storage(e.to_string()));
            }
        }

        // Persisting: both rows or neither.
        let expires_at = unix_timestamp() + i64::from(plan.duration_days) * 86_400;
        let credential_id = uuid::Uuid::new_v4().to_string();
        let payload = serde_json::to_string(&PurchasePayload {
            version: "2",
            label,
            token: &token,
            traffic_gb: plan.traffic_gb,
        })
        .map_err(|e| PurchaseError::Storage(e.to_string()))?;

        let params = PurchaseParams {
            user_id: user.id,
            plan_id: plan_row.id,
            token: &token,
            label,
            duration_tier: i64::from(duration_tier),
            traffic_gb: i64::from(traffic_gb),
            payload: &payload,
            expires_at,
            credential_id: &credential_id,
        };

        let (purchase, credential) = match self.db.create_purchase_and_credential(&params).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(user = external_user_id, error = %e, "Persist failed, rolling back debit and reservation");
                // Both compensation steps run even when one of them fails;
                // whatever stays un-restored is reported as a leak.
                let mut leaks = Vec::new();
                if let Err(put_err) =
                    self.allocator.release(&token, duration_tier, traffic_gb).await
                {
                    leaks.push(format!(
                        "token '{token}' was not returned to inventory: {put_err}"
                    ));
                }
                if let Err(credit_err) = self.db.credit_balance(user.id, plan.price).await {
                    leaks.push(format!(
                        "debited {} was not credited back to user {}: {credit_err}",
                        plan.price, user.id
                    ));
                }
                if !leaks.is_empty() {
                    return Err(self.escalate(format!(
                        "persist fault during purchase for {external_user_id}: {}",
                        leaks.join("; ")
                    )));
                }
                return Err(PurchaseError::Storage(e.to_string()));
            }
        };

        // Committed. Notifications are best-effort from here on.
        info!(
            user = external_user_id,
            purchase_id = purchase.id,
            duration_tier,
            traffic_gb,
            price = plan.price,
            "Purchase committed"
        );
        self.announce(external_user_id, &plan, label, &token, expires_at);

        Ok(PurchaseReceipt {
            purchase_id: purchase.id,
            credential_id: credential.id,
            token,
            expires_at,
        })
    }

    /// Admin-driven cancellation, symmetric to the compensating path:
    /// deactivates the purchase and credits the price back in one ledger
    /// transaction, then returns the token to its original bucket.
    pub async fn refund_purchase(&self, purchase_id: i64) -> Result<(), PurchaseError> {
        let purchase = self.db.get_purchase(purchase_id).await?;
        if purchase.active == 0 {
            return Err(PurchaseError::Conflict(format!(
                "purchase {purchase_id} is already inactive"
            )));
        }
        let plan = self.db.get_plan(purchase.plan_id).await?;

        let refunded = self
            .db
            .refund_purchase_tx(purchase.id, purchase.user_id, plan.price)
            .await?;
        if !refunded {
            return Err(PurchaseError::Conflict(format!(
                "purchase {purchase_id} is already inactive"
            )));
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (duration_tier, traffic_gb) =
            (purchase.duration_tier as u32, purchase.traffic_gb as u32);

        // The ledger side is committed; a failed put-back is a token leak.
        if let Err(e) = self
            .allocator
            .release(&purchase.token, duration_tier, traffic_gb)
            .await
        {
            return Err(self.escalate(format!(
                "purchase {purchase_id} refunded but token '{}' was not returned to inventory: {e}",
                purchase.token
            )));
        }

        info!(purchase_id, user_id = purchase.user_id, "Purchase refunded");
        Ok(())
    }

    /// Return a reserved token during a failed purchase. A failure here is
    /// the fatal case: the token is neither in inventory nor owned by a
    /// purchase.
    async fn compensate_reservation(
        &self,
        token: &str,
        duration_tier: u32,
        traffic_gb: u32,
    ) -> Result<(), PurchaseError> {
        if let Err(e) = self.allocator.release(token, duration_tier, traffic_gb).await {
            return Err(self.escalate(format!(
                "reserved token '{token}' for tier ({duration_tier}, {traffic_gb}GB) was not returned to inventory: {e}"
            )));
        }
        Ok(())
    }

    fn escalate(&self, detail: String) -> PurchaseError {
        self.notifier.operator_alert(&detail);
        PurchaseError::CompensationFailed(detail)
    }

    fn announce(
        &self,
        external_user_id: &str,
        plan: &PlanSelection,
        label: &str,
        token: &str,
        expires_at: i64,
    ) {
        self.notifier.user_message(
            external_user_id,
            &format!(
                "Purchase complete: {} - {}GB, label '{label}', expires at {expires_at}.\nAccess token:\n{token}",
                plan.duration_name, plan.traffic_gb
            ),
        );
        self.notifier.admin_message(&format!(
            "New purchase by {external_user_id}: {} - {}GB for {}, label '{label}'",
            plan.duration_name, plan.traffic_gb, plan.price
        ));
    }
}

//! Notification seam between the engine and the chat layer.
//!
//! Notifications are best-effort: they fire only after a purchase commits
//! (or during the expiry scan) and their failure never rolls anything
//! back. Operator alerts carry the fatal cases automated recovery cannot
//! resolve, such as a failed compensation step.

use tracing::{error, info};

/// Sink for user-facing messages and operator alerts. The chat layer
/// provides the real implementation; the engine only depends on the trait.
pub trait Notifier: Send + Sync {
    /// Deliver a message to a user, addressed by external identity key.
    fn user_message(&self, external_id: &str, text: &str);

    /// Routine admin notice (new purchase, new pending payment).
    fn admin_message(&self, text: &str);

    /// Escalate to the operator channel. Used for inventory/balance leaks.
    fn operator_alert(&self, text: &str);
}

/// Default sink that emits through tracing. Useful for headless runs
/// and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn user_message(&self, external_id: &str, text: &str) {
        info!(external_id, text, "User notification");
    }

    fn admin_message(&self, text: &str) {
        info!(text, "Admin notification");
    }

    fn operator_alert(&self, text: &str) {
        error!(text, "Operator alert");
    }
}

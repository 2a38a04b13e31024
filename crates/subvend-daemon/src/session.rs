//! Conversation state for in-flight storefront flows.
//!
//! Each conversation is in exactly one flow state at a time, keyed by
//! the user's external identity. The chat layer reads the state to
//! decide how to interpret the next message, instead of probing a bag
//! of optional fields.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::topup::PaymentMethod;

/// What the storefront is currently waiting for from one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionFlow {
    /// No flow in progress.
    #[default]
    Idle,
    /// Top-up: waiting for the amount.
    AwaitingAmount { method: PaymentMethod },
    /// Top-up: amount accepted, waiting for the payment proof.
    AwaitingReceipt { method: PaymentMethod, amount: i64 },
    /// Purchase: tier chosen, waiting for the display label.
    AwaitingLabel { duration_tier: u32, traffic_gb: u32 },
    /// Purchase handed to the coordinator; input is ignored until it
    /// commits or aborts.
    Finalizing,
}

/// Shared map of conversation states.
#[derive(Clone, Default)]
pub struct SessionMap {
    flows: Arc<RwLock<HashMap<String, SessionFlow>>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current flow state for a conversation; `Idle` when unknown.
    pub async fn get(&self, external_id: &str) -> SessionFlow {
        self.flows
            .read()
            .await
            .get(external_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Move a conversation to a new flow state.
    pub async fn set(&self, external_id: &str, flow: SessionFlow) {
        self.flows
            .write()
            .await
            .insert(external_id.to_string(), flow);
    }

    /// Reset a conversation to `Idle` (flow finished or cancelled).
    pub async fn clear(&self, external_id: &str) {
        self.flows.write().await.remove(external_id);
    }

    /// Number of conversations with a flow in progress.
    pub async fn count(&self) -> usize {
        self.flows.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_conversation_is_idle() {
        let sessions = SessionMap::new();
        assert_eq!(sessions.get("tg:1").await, SessionFlow::Idle);
    }

    #[tokio::test]
    async fn flow_transitions() {
        let sessions = SessionMap::new();

        sessions
            .set("tg:1", SessionFlow::AwaitingAmount { method: PaymentMethod::Card })
            .await;
        assert_eq!(
            sessions.get("tg:1").await,
            SessionFlow::AwaitingAmount { method: PaymentMethod::Card }
        );

        sessions
            .set(
                "tg:1",
                SessionFlow::AwaitingReceipt { method: PaymentMethod::Card, amount: 300_000 },
            )
            .await;
        sessions.clear("tg:1").await;
        assert_eq!(sessions.get("tg:1").await, SessionFlow::Idle);
        assert_eq!(sessions.count().await, 0);
    }

    #[tokio::test]
    async fn conversations_are_independent() {
        let sessions = SessionMap::new();
        sessions
            .set("tg:1", SessionFlow::AwaitingLabel { duration_tier: 3, traffic_gb: 30 })
            .await;
        sessions.set("tg:2", SessionFlow::Finalizing).await;

        assert_eq!(
            sessions.get("tg:1").await,
            SessionFlow::AwaitingLabel { duration_tier: 3, traffic_gb: 30 }
        );
        assert_eq!(sessions.get("tg:2").await, SessionFlow::Finalizing);
        assert_eq!(sessions.count().await, 2);
    }
}

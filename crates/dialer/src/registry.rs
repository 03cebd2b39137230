use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use leadcall_core::domain::call::{ActiveCall, CallId};

/// Calls placed by this process and still waiting for their completion
/// webhook. Clones share the same map.
#[derive(Clone, Default)]
pub struct ActiveCallRegistry {
    calls: Arc<RwLock<HashMap<CallId, ActiveCall>>>,
}

impl ActiveCallRegistry {
    pub async fn insert(&self, call: ActiveCall) {
        let mut calls = self.calls.write().await;
        calls.insert(call.call_id.clone(), call);
    }

    /// Removes and returns the entry. At most one caller gets `Some` per id.
    pub async fn claim(&self, call_id: &CallId) -> Option<ActiveCall> {
        self.calls.write().await.remove(call_id)
    }

    pub async fn contains(&self, call_id: &CallId) -> bool {
        self.calls.read().await.contains_key(call_id)
    }

    pub async fn len(&self) -> usize {
        self.calls.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.calls.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use leadcall_core::domain::call::{ActiveCall, CallId};
    use leadcall_core::domain::lead::{Lead, LeadId};

    use super::ActiveCallRegistry;

    fn active(call_id: &str) -> ActiveCall {
        let lead = Lead::new(LeadId("L-1".to_string()), "Kavya Iyer", "9876543210", Utc::now());
        ActiveCall::new(CallId(call_id.to_string()), lead, Utc::now())
    }

    #[tokio::test]
    async fn claim_consumes_entry_exactly_once() {
        let registry = ActiveCallRegistry::default();
        registry.insert(active("call-1")).await;
        let id = CallId("call-1".to_string());

        assert!(registry.contains(&id).await);
        let claimed = registry.claim(&id).await.expect("first claim");
        assert_eq!(claimed.lead_id.0, "L-1");

        assert!(registry.claim(&id).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_claims_have_a_single_winner() {
        let registry = ActiveCallRegistry::default();
        registry.insert(active("call-race")).await;
        let id = CallId("call-race".to_string());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let id = id.clone();
                tokio::spawn(async move { registry.claim(&id).await.is_some() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.expect("claim task") {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let registry = ActiveCallRegistry::default();
        let other = registry.clone();
        registry.insert(active("call-a")).await;
        registry.insert(active("call-b")).await;

        assert_eq!(other.len().await, 2);
    }
}

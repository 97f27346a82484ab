use crate::domain::account::{Amount, Balance, PlayerId};
use crate::domain::charge::PendingChargeRequest;
use crate::domain::ports::{BalanceStore, ChargeRequestStore};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// A thread-safe in-memory store for balances and charge requests.
///
/// Nothing survives the process. Used by tests and when a host runs the
/// economy without any persistence.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    balances: Arc<RwLock<HashMap<PlayerId, Balance>>>,
    requests: Arc<RwLock<BTreeMap<u64, PendingChargeRequest>>>,
    last_id: Arc<AtomicU64>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BalanceStore for InMemoryStore {
    async fn load_all_balances(&self) -> Result<Vec<(PlayerId, Balance)>> {
        let balances = self.balances.read().await;
        Ok(balances.iter().map(|(id, balance)| (*id, *balance)).collect())
    }

    async fn save_balance(&self, id: PlayerId, balance: Balance) -> Result<()> {
        let mut balances = self.balances.write().await;
        balances.insert(id, balance);
        Ok(())
    }

    async fn delete_all_balances(&self) -> Result<()> {
        self.balances.write().await.clear();
        Ok(())
    }
}

#[async_trait]
impl ChargeRequestStore for InMemoryStore {
    async fn insert_pending_request(
        &self,
        recipient: &str,
        sender: &str,
        amount: Amount,
    ) -> Result<PendingChargeRequest> {
        let mut requests = self.requests.write().await;
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let request = PendingChargeRequest {
            id,
            recipient: recipient.to_string(),
            sender: sender.to_string(),
            amount,
            created_at: Utc::now(),
        };
        requests.insert(id, request.clone());
        Ok(request)
    }

    async fn load_pending_requests(
        &self,
        recipient: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PendingChargeRequest>> {
        let requests = self.requests.read().await;
        Ok(requests
            .values()
            .filter(|request| request.recipient == recipient)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn delete_pending_request(&self, id: u64) -> Result<()> {
        self.requests.write().await.remove(&id);
        Ok(())
    }
}

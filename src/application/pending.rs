use crate::application::ledger::DurableSwitch;
use crate::domain::account::Amount;
use crate::domain::charge::{Drain, PendingChargeRequest, recipient_key};
use crate::domain::ports::{ChargeRequestStore, ChargeRequestStoreBox, Clock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

#[derive(Default)]
struct RecipientQueue {
    /// Set once the recipient's stored requests have been read.
    hydrated: bool,
    items: VecDeque<PendingChargeRequest>,
}

/// Charge requests waiting for recipients who were offline when they were
/// raised, oldest first per recipient.
///
/// Each insertion is written to the store before it is queued in memory. A
/// recipient's stored requests are read the first time that recipient is
/// touched, so requests from earlier runs are delivered too. If the store
/// refuses a write the request is still queued in memory for this process.
///
/// Recipients whose queue has been drained empty are forgotten.
pub struct PendingRequestQueue {
    durable: Option<ChargeRequestStoreBox>,
    flat: ChargeRequestStoreBox,
    switch: DurableSwitch,
    clock: Arc<dyn Clock>,
    queues: RwLock<HashMap<String, Arc<Mutex<RecipientQueue>>>>,
    unsaved: AtomicU64,
}

impl PendingRequestQueue {
    /// A queue over a single store.
    pub fn new(store: ChargeRequestStoreBox, clock: Arc<dyn Clock>) -> Self {
        Self::with_fallback(None, store, DurableSwitch::new(false), clock)
    }

    /// A queue that writes to `durable` while `switch` is on and to `flat`
    /// once it has been turned off.
    pub fn with_fallback(
        durable: Option<ChargeRequestStoreBox>,
        flat: ChargeRequestStoreBox,
        switch: DurableSwitch,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            durable,
            flat,
            switch,
            clock,
            queues: RwLock::new(HashMap::new()),
            unsaved: AtomicU64::new(0),
        }
    }

    fn store(&self) -> &dyn ChargeRequestStore {
        match &self.durable {
            Some(store) if self.switch.is_on() => store.as_ref(),
            _ => self.flat.as_ref(),
        }
    }

    async fn slot(&self, key: &str) -> Arc<Mutex<RecipientQueue>> {
        if let Some(slot) = self.queues.read().await.get(key) {
            return Arc::clone(slot);
        }
        let mut queues = self.queues.write().await;
        Arc::clone(queues.entry(key.to_string()).or_default())
    }

    /// Forgets `key` if its queue is loaded, empty and held by nobody else.
    async fn release(&self, key: &str, slot: Arc<Mutex<RecipientQueue>>) {
        let mut queues = self.queues.write().await;
        let idle = Arc::strong_count(&slot) == 2
            && slot
                .try_lock()
                .is_ok_and(|queue| queue.hydrated && queue.items.is_empty());
        if idle {
            queues.remove(key);
        }
    }

    /// Number of recipients currently held in memory.
    pub async fn tracked_recipients(&self) -> usize {
        self.queues.read().await.len()
    }

    async fn hydrate(&self, key: &str, queue: &mut RecipientQueue) {
        if queue.hydrated {
            return;
        }
        match self.store().load_pending_requests(key, None).await {
            Ok(stored) => {
                let mut merged: Vec<_> = stored;
                for item in queue.items.drain(..) {
                    if !merged.iter().any(|r| r.id == item.id) {
                        merged.push(item);
                    }
                }
                merged.sort_by_key(|r| r.created_at);
                queue.items = merged.into();
                queue.hydrated = true;
            }
            Err(e) => warn!(recipient = key, "Failed to load pending charge requests: {}", e),
        }
    }

    /// Queues a request for `recipient` (any case) and returns it.
    pub async fn add_pending(
        &self,
        recipient: &str,
        sender: &str,
        amount: Amount,
    ) -> PendingChargeRequest {
        let key = recipient_key(recipient);
        let slot = self.slot(&key).await;
        let mut queue = slot.lock().await;
        self.hydrate(&key, &mut queue).await;

        let request = match self.store().insert_pending_request(&key, sender, amount).await {
            Ok(request) => request,
            Err(e) => {
                warn!(recipient = %key, sender, "Failed to store charge request, keeping it in memory: {}", e);
                // Counted down from the top so they never collide with store ids.
                let id = u64::MAX - self.unsaved.fetch_add(1, Ordering::Relaxed);
                PendingChargeRequest {
                    id,
                    recipient: key.clone(),
                    sender: sender.to_string(),
                    amount,
                    created_at: self.clock.now(),
                }
            }
        };
        debug!(recipient = %key, sender, id = request.id, "Queued charge request");
        queue.items.push_back(request.clone());
        request
    }

    /// Hands over up to `max_shown` of the oldest requests for `recipient`.
    ///
    /// The rest stay queued in their original order for the next reconnect.
    pub async fn drain_on_reconnect(&self, recipient: &str, max_shown: usize) -> Drain {
        let key = recipient_key(recipient);
        let slot = self.slot(&key).await;
        let mut queue = slot.lock().await;
        self.hydrate(&key, &mut queue).await;

        let count = max_shown.min(queue.items.len());
        let shown: Vec<_> = queue.items.drain(..count).collect();
        for request in &shown {
            if let Err(e) = self.store().delete_pending_request(request.id).await {
                warn!(recipient = %key, id = request.id, "Failed to delete delivered charge request: {}", e);
            }
        }

        let drain = Drain {
            shown,
            remaining: queue.items.len(),
        };
        drop(queue);
        self.release(&key, slot).await;
        drain
    }

    pub async fn pending_count(&self, recipient: &str) -> usize {
        let key = recipient_key(recipient);
        let slot = self.slot(&key).await;
        let mut queue = slot.lock().await;
        self.hydrate(&key, &mut queue).await;
        let count = queue.items.len();
        drop(queue);
        self.release(&key, slot).await;
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EconomyError, Result};
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::in_memory::InMemoryStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct OfflineStore;

    #[async_trait]
    impl ChargeRequestStore for OfflineStore {
        async fn insert_pending_request(
            &self,
            _recipient: &str,
            _sender: &str,
            _amount: Amount,
        ) -> Result<PendingChargeRequest> {
            Err(EconomyError::storage("connection refused"))
        }

        async fn load_pending_requests(
            &self,
            _recipient: &str,
            _limit: Option<usize>,
        ) -> Result<Vec<PendingChargeRequest>> {
            Err(EconomyError::storage("connection refused"))
        }

        async fn delete_pending_request(&self, _id: u64) -> Result<()> {
            Err(EconomyError::storage("connection refused"))
        }
    }

    fn amount(value: Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    fn queue_over(store: InMemoryStore) -> PendingRequestQueue {
        PendingRequestQueue::new(Box::new(store), Arc::new(SystemClock))
    }

    fn summary(drain: &Drain) -> Vec<(String, Decimal)> {
        drain
            .shown
            .iter()
            .map(|r| (r.sender.clone(), r.amount.value()))
            .collect()
    }

    #[tokio::test]
    async fn test_drain_is_fifo_and_defers_the_rest() {
        let queue = queue_over(InMemoryStore::new());
        queue.add_pending("r", "A", amount(dec!(10))).await;
        queue.add_pending("r", "B", amount(dec!(20))).await;

        let first = queue.drain_on_reconnect("r", 1).await;
        assert_eq!(summary(&first), vec![("A".to_string(), dec!(10))]);
        assert_eq!(first.remaining, 1);

        let second = queue.drain_on_reconnect("r", 1).await;
        assert_eq!(summary(&second), vec![("B".to_string(), dec!(20))]);
        assert_eq!(second.remaining, 0);

        assert!(queue.drain_on_reconnect("r", 1).await.is_empty());
    }

    #[tokio::test]
    async fn test_recipient_is_case_insensitive() {
        let queue = queue_over(InMemoryStore::new());
        queue.add_pending("Notch", "A", amount(dec!(1))).await;
        queue.add_pending("NOTCH", "B", amount(dec!(2))).await;

        let drain = queue.drain_on_reconnect("notch", 5).await;
        assert_eq!(drain.shown.len(), 2);
        assert!(drain.shown.iter().all(|r| r.recipient == "notch"));
    }

    #[tokio::test]
    async fn test_requests_survive_a_restart() {
        let store = InMemoryStore::new();
        {
            let queue = queue_over(store.clone());
            queue.add_pending("bob", "A", amount(dec!(10))).await;
            queue.add_pending("bob", "B", amount(dec!(20))).await;
            queue.drain_on_reconnect("bob", 1).await;
        }

        let queue = queue_over(store.clone());
        assert_eq!(queue.pending_count("bob").await, 1);
        let drain = queue.drain_on_reconnect("bob", 5).await;
        assert_eq!(summary(&drain), vec![("B".to_string(), dec!(20))]);
        assert!(store.load_pending_requests("bob", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_keeps_request_in_memory() {
        let queue = PendingRequestQueue::new(Box::new(OfflineStore), Arc::new(SystemClock));
        let request = queue.add_pending("bob", "A", amount(dec!(5))).await;
        assert_eq!(request.id, u64::MAX);

        let drain = queue.drain_on_reconnect("bob", 5).await;
        assert_eq!(summary(&drain), vec![("A".to_string(), dec!(5))]);
    }

    #[tokio::test]
    async fn test_drained_recipients_are_forgotten() {
        let queue = queue_over(InMemoryStore::new());
        queue.add_pending("bob", "A", amount(dec!(5))).await;
        for name in ["carol", "dave", "erin"] {
            assert!(queue.drain_on_reconnect(name, 5).await.is_empty());
        }
        assert_eq!(queue.tracked_recipients().await, 1);

        queue.drain_on_reconnect("bob", 5).await;
        assert_eq!(queue.tracked_recipients().await, 0);
        assert_eq!(queue.pending_count("bob").await, 0);
        assert_eq!(queue.tracked_recipients().await, 0);
    }

    #[tokio::test]
    async fn test_writes_follow_the_durable_switch() {
        let durable = InMemoryStore::new();
        let flat = InMemoryStore::new();
        let switch = DurableSwitch::new(true);
        let queue = PendingRequestQueue::with_fallback(
            Some(Box::new(durable.clone())),
            Box::new(flat.clone()),
            switch.clone(),
            Arc::new(SystemClock),
        );

        queue.add_pending("bob", "A", amount(dec!(1))).await;
        assert_eq!(durable.load_pending_requests("bob", None).await.unwrap().len(), 1);

        switch.disable();
        queue.add_pending("carol", "A", amount(dec!(2))).await;
        assert!(durable.load_pending_requests("carol", None).await.unwrap().is_empty());
        assert_eq!(flat.load_pending_requests("carol", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_cap_shows_nothing_and_keeps_everything() {
        let queue = queue_over(InMemoryStore::new());
        queue.add_pending("bob", "A", amount(dec!(5))).await;

        let drain = queue.drain_on_reconnect("bob", 0).await;
        assert!(drain.shown.is_empty());
        assert_eq!(drain.remaining, 1);
        assert_eq!(drain.total(), 1);
    }
}

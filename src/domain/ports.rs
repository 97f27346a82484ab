use super::account::{Amount, Balance, PlayerId};
use super::charge::PendingChargeRequest;
use super::notice::Notice;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Durable storage for account balances.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Every stored balance. Rows whose key is not a valid player id are
    /// skipped and logged by the implementation.
    async fn load_all_balances(&self) -> Result<Vec<(PlayerId, Balance)>>;

    /// Insert or update one balance.
    async fn save_balance(&self, id: PlayerId, balance: Balance) -> Result<()>;

    /// Upsert many balances. Backends with a cheaper bulk path override this.
    async fn save_balances(&self, balances: Vec<(PlayerId, Balance)>) -> Result<()> {
        for (id, balance) in balances {
            self.save_balance(id, balance).await?;
        }
        Ok(())
    }

    async fn delete_all_balances(&self) -> Result<()>;
}

/// Durable queue of charge requests, indexed by recipient and creation order.
#[async_trait]
pub trait ChargeRequestStore: Send + Sync {
    /// Stores a request and returns its id. Ids grow with insertion order.
    async fn insert_pending_request(
        &self,
        recipient: &str,
        sender: &str,
        amount: Amount,
    ) -> Result<PendingChargeRequest>;

    /// Requests for `recipient`, oldest first, at most `limit` when given.
    async fn load_pending_requests(
        &self,
        recipient: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PendingChargeRequest>>;

    async fn delete_pending_request(&self, id: u64) -> Result<()>;
}

pub type BalanceStoreBox = Box<dyn BalanceStore>;
pub type ChargeRequestStoreBox = Box<dyn ChargeRequestStore>;

/// A connected player as the host sees them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// A player identified only by name, using the deterministic offline id.
    pub fn offline(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: PlayerId::offline(&name),
            name,
        }
    }
}

pub type MainTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Services the embedding host provides to the core.
pub trait Host: Send + Sync {
    /// The online player with this name, matched case-insensitively.
    fn online_player(&self, name: &str) -> Option<Player>;

    /// Any player the host has seen, online or not, matched
    /// case-insensitively.
    fn known_player(&self, name: &str) -> Option<Player>;

    fn has_permission(&self, player: &Player, permission: &str) -> bool;

    fn notify(&self, player: &Player, notice: Notice);

    /// Schedules `task` on the host's single main execution context.
    fn run_on_main(&self, task: MainTask);
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

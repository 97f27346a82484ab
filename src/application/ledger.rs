use crate::domain::account::{Amount, Balance, PlayerId, format_amount};
use crate::domain::ports::{BalanceStore, BalanceStoreBox};
use crate::error::{EconomyError, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Provider operations the ledger deliberately does not implement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyOperation {
    /// Any shared bank account call.
    Bank { bank: String },
    /// Calls that identify the account by player name instead of id.
    ByName { player: String },
}

/// Whether the durable backend is still in use, shared by everything that
/// writes to it. Once turned off it stays off for the rest of the process.
#[derive(Debug, Clone)]
pub struct DurableSwitch(Arc<AtomicBool>);

impl DurableSwitch {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn disable(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Authoritative balances for every player the process has seen.
///
/// Memory is the source of truth. Every mutation is mirrored to the active
/// backend; a failed write is logged and the in-memory value stands. Each
/// account has its own lock, held across the backend write, so concurrent
/// withdrawals and deposits on one player are serialized and reach the store
/// in the order they were applied.
pub struct Ledger {
    accounts: RwLock<HashMap<PlayerId, Arc<Mutex<Balance>>>>,
    durable: Option<BalanceStoreBox>,
    switch: DurableSwitch,
    flat: BalanceStoreBox,
}

impl Ledger {
    /// Creates a ledger over an optional durable backend and the flat-file
    /// fallback. Nothing is loaded until [`Ledger::load_all`] runs.
    pub fn new(durable: Option<BalanceStoreBox>, flat: BalanceStoreBox) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            switch: DurableSwitch::new(durable.is_some()),
            durable,
            flat,
        }
    }

    /// Whether balances are currently mirrored to the durable backend.
    pub fn is_durable(&self) -> bool {
        self.durable.is_some() && self.switch.is_on()
    }

    /// The switch that [`Ledger::load_all`] turns off when the durable
    /// backend cannot be read. Hand it to the pending-request queue so both
    /// fall back together.
    pub fn durable_switch(&self) -> DurableSwitch {
        self.switch.clone()
    }

    fn active(&self) -> &dyn BalanceStore {
        match &self.durable {
            Some(store) if self.switch.is_on() => store.as_ref(),
            _ => self.flat.as_ref(),
        }
    }

    async fn slot(&self, id: PlayerId) -> Arc<Mutex<Balance>> {
        if let Some(slot) = self.accounts.read().await.get(&id) {
            return Arc::clone(slot);
        }
        let mut accounts = self.accounts.write().await;
        Arc::clone(accounts.entry(id).or_default())
    }

    async fn persist(&self, id: PlayerId, balance: Balance, operation: &str) {
        if let Err(e) = self.active().save_balance(id, balance).await {
            warn!(player = %id, "Failed to save balance after {}: {}", operation, e);
        }
    }

    /// Zero for players the ledger has never seen.
    pub async fn balance(&self, id: PlayerId) -> Balance {
        let slot = self.accounts.read().await.get(&id).cloned();
        match slot {
            Some(slot) => *slot.lock().await,
            None => Balance::ZERO,
        }
    }

    pub async fn has(&self, id: PlayerId, amount: Amount) -> bool {
        self.balance(id).await.covers(amount)
    }

    pub async fn has_account(&self, id: PlayerId) -> bool {
        self.accounts.read().await.contains_key(&id)
    }

    /// Ensures the account exists, keeping any existing balance, and writes
    /// that balance to the backend.
    pub async fn create_account(&self, id: PlayerId) -> Balance {
        let slot = self.slot(id).await;
        let balance = slot.lock().await;
        self.persist(id, *balance, "account creation").await;
        *balance
    }

    /// Returns the new balance. Fails without any change when the balance
    /// does not cover `amount`.
    pub async fn withdraw(&self, id: PlayerId, amount: Amount) -> Result<Balance> {
        let slot = self.slot(id).await;
        let mut balance = slot.lock().await;
        if !balance.covers(amount) {
            return Err(EconomyError::InsufficientFunds {
                balance: balance.0,
                requested: amount.value(),
            });
        }
        *balance -= amount.into();
        debug!(player = %id, amount = %amount, balance = %balance.0, "Withdrew");
        self.persist(id, *balance, "withdraw").await;
        Ok(*balance)
    }

    /// Returns the new balance. Fails without any change when the result
    /// would not fit in a `Decimal`.
    pub async fn deposit(&self, id: PlayerId, amount: Amount) -> Result<Balance> {
        let slot = self.slot(id).await;
        let mut balance = slot.lock().await;
        let updated = balance
            .checked_add(amount)
            .ok_or(EconomyError::BalanceOverflow {
                balance: balance.0,
                requested: amount.value(),
            })?;
        *balance = updated;
        debug!(player = %id, amount = %amount, balance = %balance.0, "Deposited");
        self.persist(id, *balance, "deposit").await;
        Ok(*balance)
    }

    /// Replaces memory with the stored balances.
    ///
    /// Reads the durable backend when one is active. If that read fails the
    /// durable backend is disabled for the rest of the process and the flat
    /// file is read instead. Never fails; returns how many accounts loaded.
    pub async fn load_all(&self) -> usize {
        let mut loaded = None;
        if let Some(store) = &self.durable
            && self.switch.is_on()
        {
            match store.load_all_balances().await {
                Ok(balances) => loaded = Some(balances),
                Err(e) => {
                    warn!("Failed to load balances from durable storage, using flat file: {}", e);
                    self.switch.disable();
                }
            }
        }

        let balances = match loaded {
            Some(balances) => balances,
            None => self.flat.load_all_balances().await.unwrap_or_else(|e| {
                warn!("Failed to load balances from flat file: {}", e);
                Vec::new()
            }),
        };

        let count = balances.len();
        let mut accounts = self.accounts.write().await;
        accounts.clear();
        for (id, balance) in balances {
            accounts.insert(id, Arc::new(Mutex::new(balance)));
        }
        info!(count, durable = self.is_durable(), "Loaded balances");
        count
    }

    /// Writes every balance to the active backend.
    pub async fn save_all(&self) {
        let snapshot = self.snapshot().await;
        let count = snapshot.len();
        match self.active().save_balances(snapshot).await {
            Ok(()) => info!(count, durable = self.is_durable(), "Saved balances"),
            Err(e) => warn!("Failed to save balances: {}", e),
        }
    }

    /// All accounts, ordered by player id.
    pub async fn snapshot(&self) -> Vec<(PlayerId, Balance)> {
        let slots: Vec<_> = self
            .accounts
            .read()
            .await
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();

        let mut snapshot = Vec::with_capacity(slots.len());
        for (id, slot) in slots {
            snapshot.push((id, *slot.lock().await));
        }
        snapshot.sort_by_key(|(id, _)| *id);
        snapshot
    }

    /// Clears every account in memory and in the active backend.
    pub async fn reset(&self) {
        self.accounts.write().await.clear();
        if let Err(e) = self.active().delete_all_balances().await {
            warn!("Failed to clear stored balances: {}", e);
        }
        info!("All balances reset");
    }

    pub fn format(amount: Decimal) -> String {
        format_amount(amount)
    }

    pub fn legacy(&self, operation: &LegacyOperation) -> Result<()> {
        Err(EconomyError::Unsupported(match operation {
            LegacyOperation::Bank { .. } => "bank accounts",
            LegacyOperation::ByName { .. } => "name-keyed accounts",
        }))
    }
}

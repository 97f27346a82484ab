use crate::domain::account::{Amount, Balance, PlayerId};
use crate::domain::charge::PendingChargeRequest;
use crate::domain::ports::{BalanceStore, ChargeRequestStore};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

pub const BALANCES_FILE: &str = "balances.csv";
pub const REQUESTS_FILE: &str = "charge_requests.csv";
/// `key,value` rows; holds the last charge request id ever issued.
pub const META_FILE: &str = "meta.csv";

const LAST_REQUEST_ID: &str = "last_request_id";

/// One balance per line, keyed by the player's id in text form.
#[derive(Debug, Serialize, Deserialize)]
struct BalanceRow {
    player: String,
    balance: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RequestRow {
    id: u64,
    recipient: String,
    sender: String,
    amount: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetaRow {
    key: String,
    value: String,
}

#[derive(Default)]
struct FlatState {
    balances: BTreeMap<PlayerId, Balance>,
    requests: BTreeMap<u64, PendingChargeRequest>,
    last_id: u64,
}

/// Human-readable CSV files in a local directory.
///
/// The whole file is rewritten (to a temporary file, then renamed) on every
/// mutation, so the on-disk copy always matches the last successful call.
/// File I/O runs on the blocking pool.
#[derive(Clone)]
pub struct FlatFileStore {
    balances_path: Arc<PathBuf>,
    requests_path: Arc<PathBuf>,
    meta_path: Arc<PathBuf>,
    state: Arc<Mutex<FlatState>>,
}

impl FlatFileStore {
    /// Opens the store in `dir`, creating the directory if needed and reading
    /// whatever files already exist.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let balances_path = dir.join(BALANCES_FILE);
        let requests_path = dir.join(REQUESTS_FILE);
        let meta_path = dir.join(META_FILE);

        let balances = read_balances(&balances_path)?;
        let requests = read_requests(&requests_path)?;
        let last_id = read_last_request_id(&meta_path)?
            .max(requests.keys().next_back().copied().unwrap_or(0));

        Ok(Self {
            balances_path: Arc::new(balances_path),
            requests_path: Arc::new(requests_path),
            meta_path: Arc::new(meta_path),
            state: Arc::new(Mutex::new(FlatState {
                balances,
                requests,
                last_id,
            })),
        })
    }

    async fn flush_balances(&self, state: &FlatState) -> Result<()> {
        let path = Arc::clone(&self.balances_path);
        let rows: Vec<BalanceRow> = state
            .balances
            .iter()
            .map(|(id, balance)| BalanceRow {
                player: id.to_string(),
                balance: balance.0.to_string(),
            })
            .collect();
        tokio::task::spawn_blocking(move || write_rows(&path, &rows)).await?
    }

    async fn flush_meta(&self, last_id: u64) -> Result<()> {
        let path = Arc::clone(&self.meta_path);
        let rows = vec![MetaRow {
            key: LAST_REQUEST_ID.to_string(),
            value: last_id.to_string(),
        }];
        tokio::task::spawn_blocking(move || write_rows(&path, &rows)).await?
    }

    async fn flush_requests(&self, state: &FlatState) -> Result<()> {
        let path = Arc::clone(&self.requests_path);
        let rows: Vec<RequestRow> = state
            .requests
            .values()
            .map(|request| RequestRow {
                id: request.id,
                recipient: request.recipient.clone(),
                sender: request.sender.clone(),
                amount: request.amount.value().to_string(),
                created_at: request.created_at,
            })
            .collect();
        tokio::task::spawn_blocking(move || write_rows(&path, &rows)).await?
    }
}

fn read_balances(path: &Path) -> Result<BTreeMap<PlayerId, Balance>> {
    let mut balances = BTreeMap::new();
    if !path.exists() {
        return Ok(balances);
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    for row in reader.deserialize::<BalanceRow>() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(path = %path.display(), "Skipping unreadable balance row: {}", e);
                continue;
            }
        };
        let Ok(id) = PlayerId::from_str(&row.player) else {
            warn!(path = %path.display(), "Invalid balance entry: {}", row.player);
            continue;
        };
        let Ok(balance) = Decimal::from_str(&row.balance) else {
            warn!(player = %id, "Invalid balance value: {}", row.balance);
            continue;
        };
        balances.insert(id, Balance::new(balance));
    }
    Ok(balances)
}

fn read_last_request_id(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    for row in reader.deserialize::<MetaRow>() {
        match row {
            Ok(row) if row.key == LAST_REQUEST_ID => match row.value.parse() {
                Ok(id) => return Ok(id),
                Err(_) => warn!(path = %path.display(), "Invalid last request id: {}", row.value),
            },
            Ok(_) => {}
            Err(e) => warn!(path = %path.display(), "Skipping unreadable meta row: {}", e),
        }
    }
    Ok(0)
}

fn read_requests(path: &Path) -> Result<BTreeMap<u64, PendingChargeRequest>> {
    let mut requests = BTreeMap::new();
    if !path.exists() {
        return Ok(requests);
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    for row in reader.deserialize::<RequestRow>() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(path = %path.display(), "Skipping unreadable charge request row: {}", e);
                continue;
            }
        };
        let amount = Decimal::from_str(&row.amount)
            .ok()
            .and_then(|value| Amount::new(value).ok());
        let Some(amount) = amount else {
            warn!(id = row.id, "Invalid charge request amount: {}", row.amount);
            continue;
        };
        requests.insert(
            row.id,
            PendingChargeRequest {
                id: row.id,
                recipient: row.recipient,
                sender: row.sender,
                amount,
                created_at: row.created_at,
            },
        );
    }
    Ok(requests)
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl BalanceStore for FlatFileStore {
    async fn load_all_balances(&self) -> Result<Vec<(PlayerId, Balance)>> {
        let path = Arc::clone(&self.balances_path);
        let balances = tokio::task::spawn_blocking(move || read_balances(&path)).await??;

        let mut state = self.state.lock().await;
        state.balances = balances;
        Ok(state
            .balances
            .iter()
            .map(|(id, balance)| (*id, *balance))
            .collect())
    }

    async fn save_balance(&self, id: PlayerId, balance: Balance) -> Result<()> {
        let mut state = self.state.lock().await;
        state.balances.insert(id, balance);
        self.flush_balances(&state).await
    }

    async fn save_balances(&self, balances: Vec<(PlayerId, Balance)>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.balances.extend(balances);
        self.flush_balances(&state).await
    }

    async fn delete_all_balances(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.balances.clear();
        self.flush_balances(&state).await
    }
}

#[async_trait]
impl ChargeRequestStore for FlatFileStore {
    async fn insert_pending_request(
        &self,
        recipient: &str,
        sender: &str,
        amount: Amount,
    ) -> Result<PendingChargeRequest> {
        let mut state = self.state.lock().await;
        state.last_id += 1;
        // The counter goes to disk first so an id is never handed out twice.
        self.flush_meta(state.last_id).await?;
        let request = PendingChargeRequest {
            id: state.last_id,
            recipient: recipient.to_string(),
            sender: sender.to_string(),
            amount,
            created_at: Utc::now(),
        };
        state.requests.insert(request.id, request.clone());
        if let Err(e) = self.flush_requests(&state).await {
            state.requests.remove(&request.id);
            return Err(e);
        }
        Ok(request)
    }

    async fn load_pending_requests(
        &self,
        recipient: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PendingChargeRequest>> {
        let state = self.state.lock().await;
        let mut requests: Vec<_> = state
            .requests
            .values()
            .filter(|request| request.recipient == recipient)
            .cloned()
            .collect();
        requests.sort_by_key(|request| (request.created_at, request.id));
        requests.truncate(limit.unwrap_or(usize::MAX));
        Ok(requests)
    }

    async fn delete_pending_request(&self, id: u64) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.requests.remove(&id).is_some() {
            self.flush_requests(&state).await?;
        }
        Ok(())
    }
}

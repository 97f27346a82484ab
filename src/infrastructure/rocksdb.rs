use crate::domain::account::{Amount, Balance, PlayerId};
use crate::domain::charge::PendingChargeRequest;
use crate::domain::ports::{BalanceStore, ChargeRequestStore};
use crate::error::{EconomyError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Column Family for account balances, keyed by player id text.
pub const CF_BALANCES: &str = "balances";
/// Column Family for charge requests, keyed by big-endian request id.
pub const CF_CHARGE_REQUESTS: &str = "charge_requests";
/// Recipient index: `recipient \0 id` -> empty. Ids sort in creation order.
pub const CF_REQUESTS_BY_RECIPIENT: &str = "charge_requests_by_recipient";
/// Counters.
pub const CF_META: &str = "meta";

const LAST_REQUEST_ID: &[u8] = b"last_request_id";

/// A persistent store implementation using RocksDB.
///
/// Holds balances and charge requests in separate Column Families, plus a
/// recipient index so one player's requests can be read without a scan.
/// Column families are created on open when missing.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
/// Every call runs on the blocking pool.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    id_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_BALANCES, CF_CHARGE_REQUESTS, CF_REQUESTS_BY_RECIPIENT, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            id_lock: Arc::new(Mutex::new(())),
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&DB) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db)).await?
    }
}

fn cf<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| EconomyError::storage(format!("{name} column family not found")))
}

fn index_key(recipient: &str, id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(recipient.len() + 9);
    key.extend_from_slice(recipient.as_bytes());
    key.push(0);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn read_u64(bytes: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

#[async_trait]
impl BalanceStore for RocksDBStore {
    async fn load_all_balances(&self) -> Result<Vec<(PlayerId, Balance)>> {
        self.blocking(|db| {
            let handle = cf(db, CF_BALANCES)?;
            let mut balances = Vec::new();
            for item in db.iterator_cf(handle, IteratorMode::Start) {
                let (key, value) = item?;
                let key = String::from_utf8_lossy(&key);
                let Ok(id) = key.parse::<PlayerId>() else {
                    warn!("Skipping invalid player id in RocksDB: {}", key);
                    continue;
                };
                match serde_json::from_slice::<Balance>(&value) {
                    Ok(balance) => balances.push((id, balance)),
                    Err(e) => warn!(player = %id, "Skipping unreadable balance: {}", e),
                }
            }
            Ok(balances)
        })
        .await
    }

    async fn save_balance(&self, id: PlayerId, balance: Balance) -> Result<()> {
        self.blocking(move |db| {
            let handle = cf(db, CF_BALANCES)?;
            let value = serde_json::to_vec(&balance)?;
            db.put_cf(handle, id.to_string(), value)?;
            Ok(())
        })
        .await
    }

    async fn save_balances(&self, balances: Vec<(PlayerId, Balance)>) -> Result<()> {
        self.blocking(move |db| {
            let handle = cf(db, CF_BALANCES)?;
            let mut batch = WriteBatch::default();
            for (id, balance) in balances {
                batch.put_cf(handle, id.to_string(), serde_json::to_vec(&balance)?);
            }
            db.write(batch)?;
            Ok(())
        })
        .await
    }

    async fn delete_all_balances(&self) -> Result<()> {
        self.blocking(|db| {
            let handle = cf(db, CF_BALANCES)?;
            let mut batch = WriteBatch::default();
            for item in db.iterator_cf(handle, IteratorMode::Start) {
                let (key, _) = item?;
                batch.delete_cf(handle, key);
            }
            db.write(batch)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ChargeRequestStore for RocksDBStore {
    async fn insert_pending_request(
        &self,
        recipient: &str,
        sender: &str,
        amount: Amount,
    ) -> Result<PendingChargeRequest> {
        // Serializes id allocation across tasks.
        let _guard = self.id_lock.lock().await;
        let recipient = recipient.to_string();
        let sender = sender.to_string();
        self.blocking(move |db| {
            let meta = cf(db, CF_META)?;
            let last = db
                .get_cf(meta, LAST_REQUEST_ID)?
                .and_then(|bytes| read_u64(&bytes))
                .unwrap_or(0);
            let request = PendingChargeRequest {
                id: last + 1,
                recipient,
                sender,
                amount,
                created_at: Utc::now(),
            };

            let mut batch = WriteBatch::default();
            batch.put_cf(meta, LAST_REQUEST_ID, request.id.to_be_bytes());
            batch.put_cf(
                cf(db, CF_CHARGE_REQUESTS)?,
                request.id.to_be_bytes(),
                serde_json::to_vec(&request)?,
            );
            batch.put_cf(
                cf(db, CF_REQUESTS_BY_RECIPIENT)?,
                index_key(&request.recipient, request.id),
                b"",
            );
            db.write(batch)?;
            Ok(request)
        })
        .await
    }

    async fn load_pending_requests(
        &self,
        recipient: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PendingChargeRequest>> {
        let mut prefix = recipient.as_bytes().to_vec();
        prefix.push(0);
        self.blocking(move |db| {
            let index = cf(db, CF_REQUESTS_BY_RECIPIENT)?;
            let requests_cf = cf(db, CF_CHARGE_REQUESTS)?;
            let limit = limit.unwrap_or(usize::MAX);

            let mut requests = Vec::new();
            for item in db.iterator_cf(index, IteratorMode::From(prefix.as_slice(), Direction::Forward)) {
                if requests.len() >= limit {
                    break;
                }
                let (key, _) = item?;
                if !key.starts_with(prefix.as_slice()) {
                    break;
                }
                let Some(id) = read_u64(&key[prefix.len()..]) else {
                    warn!("Skipping malformed recipient index key");
                    continue;
                };
                match db.get_cf(requests_cf, id.to_be_bytes())? {
                    Some(bytes) => requests.push(serde_json::from_slice(&bytes)?),
                    None => warn!(id, "Recipient index points at a missing charge request"),
                }
            }
            Ok(requests)
        })
        .await
    }

    async fn delete_pending_request(&self, id: u64) -> Result<()> {
        self.blocking(move |db| {
            let requests_cf = cf(db, CF_CHARGE_REQUESTS)?;
            let Some(bytes) = db.get_cf(requests_cf, id.to_be_bytes())? else {
                return Ok(());
            };
            let request: PendingChargeRequest = serde_json::from_slice(&bytes)?;

            let mut batch = WriteBatch::default();
            batch.delete_cf(requests_cf, id.to_be_bytes());
            batch.delete_cf(
                cf(db, CF_REQUESTS_BY_RECIPIENT)?,
                index_key(&request.recipient, id),
            );
            db.write(batch)?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        for name in [CF_BALANCES, CF_CHARGE_REQUESTS, CF_REQUESTS_BY_RECIPIENT, CF_META] {
            assert!(store.db.cf_handle(name).is_some());
        }
    }

    #[tokio::test]
    async fn test_rocksdb_balance_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let id = PlayerId::random();

        store.save_balance(id, Balance::new(dec!(100.0))).await.unwrap();
        store.save_balance(id, Balance::new(dec!(75.5))).await.unwrap();

        let all = store.load_all_balances().await.unwrap();
        assert_eq!(all, vec![(id, Balance::new(dec!(75.5)))]);

        store.delete_all_balances().await.unwrap();
        assert!(store.load_all_balances().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rocksdb_requests_by_recipient() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let ten = Amount::new(dec!(10)).unwrap();

        let first = store.insert_pending_request("bob", "A", ten).await.unwrap();
        store.insert_pending_request("bobby", "X", ten).await.unwrap();
        let second = store.insert_pending_request("bob", "B", ten).await.unwrap();
        assert_eq!((first.id, second.id), (1, 3));

        let bobs = store.load_pending_requests("bob", None).await.unwrap();
        assert_eq!(bobs, vec![first.clone(), second.clone()]);

        let one = store.load_pending_requests("bob", Some(1)).await.unwrap();
        assert_eq!(one, vec![first.clone()]);

        store.delete_pending_request(first.id).await.unwrap();
        let bobs = store.load_pending_requests("bob", None).await.unwrap();
        assert_eq!(bobs, vec![second]);
    }

    #[tokio::test]
    async fn test_rocksdb_reopen_keeps_ids_growing() {
        let dir = tempdir().unwrap();
        let ten = Amount::new(dec!(10)).unwrap();
        {
            let store = RocksDBStore::open(dir.path()).unwrap();
            store.insert_pending_request("bob", "A", ten).await.unwrap();
        }
        let store = RocksDBStore::open(dir.path()).unwrap();
        let next = store.insert_pending_request("bob", "B", ten).await.unwrap();
        assert_eq!(next.id, 2);
    }
}

//! Storage backends and host-side plumbing.

pub mod clock;
pub mod flat_file;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod scheduler;

use crate::config::StorageSettings;
use crate::domain::ports::{BalanceStoreBox, ChargeRequestStoreBox};
use flat_file::FlatFileStore;
use in_memory::InMemoryStore;
use std::path::Path;
use tracing::warn;

/// The stores the ledger and the pending-request queue run on.
///
/// The durable pair is present only when durable storage was requested and
/// opened. The flat pair is always there to fall back on.
pub struct Backends {
    pub durable_balances: Option<BalanceStoreBox>,
    pub durable_requests: Option<ChargeRequestStoreBox>,
    pub flat_balances: BalanceStoreBox,
    pub flat_requests: ChargeRequestStoreBox,
}

/// Opens the configured backends. Never fails: a durable backend that cannot
/// be opened is disabled for this process, and an unusable data directory
/// degrades to memory-only storage.
pub fn open_backends(storage: &StorageSettings) -> Backends {
    let flat: (BalanceStoreBox, ChargeRequestStoreBox) = match FlatFileStore::open(&storage.data_dir) {
        Ok(store) => (Box::new(store.clone()), Box::new(store)),
        Err(e) => {
            warn!(
                dir = %storage.data_dir.display(),
                "Flat-file storage unavailable, balances will not persist: {}", e
            );
            let store = InMemoryStore::new();
            (Box::new(store.clone()), Box::new(store))
        }
    };

    let durable = if storage.use_durable_backend {
        open_durable(&storage.durable.path)
    } else {
        None
    };

    let (durable_balances, durable_requests) = durable.unzip();
    Backends {
        durable_balances,
        durable_requests,
        flat_balances: flat.0,
        flat_requests: flat.1,
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_durable(path: &Path) -> Option<(BalanceStoreBox, ChargeRequestStoreBox)> {
    match rocksdb::RocksDBStore::open(path) {
        Ok(store) => {
            tracing::info!(path = %path.display(), "Durable storage enabled");
            Some((Box::new(store.clone()), Box::new(store)))
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                "Failed to initialize durable storage, using flat files: {}", e
            );
            None
        }
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_durable(path: &Path) -> Option<(BalanceStoreBox, ChargeRequestStoreBox)> {
    warn!(
        path = %path.display(),
        "WARNING: Durable storage requested, but 'storage-rocksdb' feature is not enabled. Falling back to flat-file storage."
    );
    None
}

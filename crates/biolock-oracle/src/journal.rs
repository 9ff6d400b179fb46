//! Record of results already delivered to the ledger.
//!
//! Consulted before processing so that replayed history does not produce a
//! second submission for a request that was already answered.

use biolock_core::{EventPosition, RequestKey};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::OracleError;

const CF_RESULTS: &str = "results";
const CF_STATE: &str = "state";
const KEY_LAST_POSITION: &[u8] = b"last_position";

/// A delivered result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position of the request event the result answers.
    pub position: EventPosition,
    pub matched: bool,
    pub attempts: u32,
    pub submitted_at: DateTime<Utc>,
}

/// Storage for delivered results, keyed by `(user, credId)`.
pub trait ResultJournal: Send + Sync {
    fn get(&self, key: &RequestKey) -> Result<Option<JournalEntry>, OracleError>;

    fn record(&self, key: &RequestKey, entry: &JournalEntry) -> Result<(), OracleError>;

    /// Highest event position recorded so far.
    fn last_position(&self) -> Result<Option<EventPosition>, OracleError>;

    /// Whether the request at `position` has already been answered.
    fn is_resolved(&self, key: &RequestKey, position: EventPosition) -> Result<bool, OracleError> {
        Ok(self
            .get(key)?
            .is_some_and(|entry| entry.position >= position))
    }
}

/// Non-persistent journal for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: DashMap<RequestKey, JournalEntry>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResultJournal for MemoryJournal {
    fn get(&self, key: &RequestKey) -> Result<Option<JournalEntry>, OracleError> {
        Ok(self.entries.get(key).map(|e| e.clone()))
    }

    fn record(&self, key: &RequestKey, entry: &JournalEntry) -> Result<(), OracleError> {
        self.entries.insert(key.clone(), entry.clone());
        Ok(())
    }

    fn last_position(&self) -> Result<Option<EventPosition>, OracleError> {
        Ok(self.entries.iter().map(|e| e.position).max())
    }
}

/// RocksDB-backed journal that survives restarts.
pub struct RocksJournal {
    db: DB,
}

impl RocksJournal {
    /// Open or create a journal database at the given path.
    pub fn open(path: &Path) -> Result<Self, OracleError> {
        std::fs::create_dir_all(path)
            .map_err(|e| OracleError::Journal(format!("cannot create {}: {}", path.display(), e)))?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_RESULTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_STATE, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| OracleError::Journal(e.to_string()))?;
        tracing::info!(path = %path.display(), "result journal opened");
        Ok(Self { db })
    }

    fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<(), OracleError> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| OracleError::Journal(format!("column family '{}' not found", cf_name)))?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| OracleError::Journal(e.to_string()))
    }

    fn get_raw(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>, OracleError> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| OracleError::Journal(format!("column family '{}' not found", cf_name)))?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| OracleError::Journal(e.to_string()))
    }
}

impl ResultJournal for RocksJournal {
    fn get(&self, key: &RequestKey) -> Result<Option<JournalEntry>, OracleError> {
        match self.get_raw(CF_RESULTS, &key.storage_key())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| OracleError::Journal(format!("corrupt entry for {}: {}", key, e))),
            None => Ok(None),
        }
    }

    fn record(&self, key: &RequestKey, entry: &JournalEntry) -> Result<(), OracleError> {
        let bytes = serde_json::to_vec(entry).map_err(|e| OracleError::Journal(e.to_string()))?;
        self.put(CF_RESULTS, &key.storage_key(), &bytes)?;

        if self.last_position()?.map_or(true, |last| entry.position > last) {
            let pos = serde_json::to_vec(&entry.position)
                .map_err(|e| OracleError::Journal(e.to_string()))?;
            self.put(CF_STATE, KEY_LAST_POSITION, &pos)?;
        }
        Ok(())
    }

    fn last_position(&self) -> Result<Option<EventPosition>, OracleError> {
        match self.get_raw(CF_STATE, KEY_LAST_POSITION)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| OracleError::Journal(format!("corrupt last position: {}", e))),
            None => Ok(None),
        }
    }
}

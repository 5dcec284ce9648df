//! Storage layer
//!
//! One ordered key-value namespace shared by every ledger. Each ledger owns a
//! one-byte prefix region (see [`crate::keys::Namespace`]).
//!
//! # Backends
//!
//! - [`RocksStore`] - RocksDB, single column family `ledger`
//! - [`MemStore`] - `BTreeMap` behind a lock, for tests and simulations
//!
//! # Atomicity
//!
//! Operations never write the backend directly. They stage writes in a
//! [`Transaction`] overlay (reads see staged writes) and commit the overlay as
//! one backend batch. Dropping an uncommitted transaction discards it.

use crate::{
    config::{Config, RocksDBConfig},
    error::{Error, Result},
};
use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options, WriteBatch, DB};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

/// Column family holding the ledger key space
const CF_LEDGER: &str = "ledger";

/// Raw key/value pair
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Staged writes: `Some(value)` = put, `None` = delete
pub type WriteSet = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Ordered key-value backend
pub trait KvStore: Send + Sync {
    /// Point lookup
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// All pairs whose key starts with `prefix`, in ascending key order
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>>;

    /// Apply every staged write atomically
    fn write(&self, writes: WriteSet) -> Result<()>;

    /// Start a transaction over this store
    fn begin(&self) -> Transaction<'_>
    where
        Self: Sized,
    {
        Transaction::new(self)
    }
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// No keys held?
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>> {
        let data = self.data.read();
        Ok(data
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write(&self, writes: WriteSet) -> Result<()> {
        let mut data = self.data.write();
        for (key, value) in writes {
            match value {
                Some(v) => {
                    data.insert(key, v);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }
}

/// RocksDB backend
pub struct RocksStore {
    db: Arc<DB>,
}

impl std::fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksStore")
            .field("path", &self.db.path())
            .finish()
    }
}

impl RocksStore {
    /// Open or create the database under `config.data_dir`
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_at(&config.data_dir, &config.rocksdb)
    }

    /// Open or create the database at `path`
    pub fn open_at(path: &Path, tuning: &RocksDBConfig) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(tuning.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(tuning.max_write_buffer_number);
        db_opts.set_target_file_size_base(tuning.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(tuning.max_background_jobs);
        db_opts.set_level_zero_file_num_compaction_trigger(
            tuning.level0_file_num_compaction_trigger,
        );
        db_opts.set_compaction_style(DBCompactionStyle::Level);

        if tuning.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(
            CF_LEDGER,
            Self::cf_options_ledger(),
        )];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;
        tracing::info!(path = ?path, "Opened RocksDB ledger store");

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_ledger() -> Options {
        let mut opts = Options::default();
        // Balances are read on every operation, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(CF_LEDGER)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", CF_LEDGER)))
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

impl KvStore for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get_cf(self.cf()?, key)?)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>> {
        let iter = self
            .db
            .iterator_cf(self.cf()?, IteratorMode::From(prefix, Direction::Forward));

        let mut out = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    fn write(&self, writes: WriteSet) -> Result<()> {
        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        for (key, value) in &writes {
            match value {
                Some(v) => batch.put_cf(cf, key, v),
                None => batch.delete_cf(cf, key),
            }
        }
        // Atomic commit
        self.db.write(batch)?;
        Ok(())
    }
}

/// Write overlay over a [`KvStore`]
pub struct Transaction<'a> {
    store: &'a dyn KvStore,
    writes: WriteSet,
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("pending", &self.writes.len())
            .finish()
    }
}

impl<'a> Transaction<'a> {
    /// Start an empty overlay
    pub fn new(store: &'a dyn KvStore) -> Self {
        Self {
            store,
            writes: WriteSet::new(),
        }
    }

    /// Point lookup, staged writes first
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => self.store.get(key),
        }
    }

    /// Prefix scan merging committed state with staged writes
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.store.scan_prefix(prefix)?.into_iter().collect();

        let staged = self
            .writes
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix));
        for (key, value) in staged {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    /// Stage a put
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    /// Stage a delete
    pub fn delete(&mut self, key: Vec<u8>) {
        self.writes.insert(key, None);
    }

    /// Number of staged writes
    pub fn pending(&self) -> usize {
        self.writes.len()
    }

    /// Commit staged writes as one batch
    pub fn commit(self) -> Result<()> {
        if self.writes.is_empty() {
            return Ok(());
        }
        let count = self.writes.len();
        self.store.write(self.writes)?;
        tracing::debug!(writes = count, "Transaction committed");
        Ok(())
    }
}

//! RocksDB-backed `PlaneStore`.
//!
//! Column families:
//! - `planes` — packed color/attribution plane bytes, one value per key
//! - `maps`   — identity-map fields, keyed `map_key \x1f field`
//! - `leases` — cooldown keys, value = expiry millis (big-endian u64)
//!
//! Bit-field writes are read-modify-write on the plane value; a single
//! commit lock serializes them and the final `WriteBatch` makes each batch
//! all-or-nothing. Leases are lazily expired: an entry past its expiry
//! timestamp counts as absent.

use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    Options, SingleThreaded, WriteBatch,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::{CommitBatch, PlaneStore, StoreError, write_bitfield};

const CF_PLANES: &str = "planes";
const CF_MAPS: &str = "maps";
const CF_LEASES: &str = "leases";

const COLUMN_FAMILIES: &[&str] = &[CF_PLANES, CF_MAPS, CF_LEASES];

/// Separator between map key and field in the `maps` column family.
const MAP_FIELD_SEP: u8 = 0x1f;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database directory path
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Bloom filter bits per key (default: 10)
    pub bloom_filter_bits: f64,
    /// Max open files for RocksDB (default: 256)
    pub max_open_files: i32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("pixelfield_data"),
            block_cache_size: 64 * 1024 * 1024,
            bloom_filter_bits: 10.0,
            max_open_files: 256,
        }
    }
}

impl StoreConfig {
    /// Config for testing: small caches, caller-supplied temp directory.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 4 * 1024 * 1024,
            max_open_files: 64,
            ..Self::default()
        }
    }
}

/// RocksDB-backed plane store.
pub struct RocksStore {
    /// RocksDB instance (single-threaded mode — concurrency via tokio)
    db: DBWithThreadMode<SingleThreaded>,
    /// Serializes read-modify-write commits and lease check-and-set.
    commit_lock: Mutex<()>,
}

impl RocksStore {
    /// Open the store at the configured path, creating it if missing.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(config.max_open_files);
        db_opts.set_keep_log_file_num(5);

        let cache = Cache::new_lru_cache(config.block_cache_size);
        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                let mut block_opts = BlockBasedOptions::default();
                block_opts.set_block_cache(&cache);
                block_opts.set_bloom_filter(config.bloom_filter_bits, false);
                cf_opts.set_block_based_table_factory(&block_opts);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DBWithThreadMode::<SingleThreaded>::open_cf_descriptors(
            &db_opts,
            &config.path,
            cf_descriptors,
        )?;

        log::info!("Plane store opened at {}", config.path.display());

        Ok(Self {
            db,
            commit_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Backend(format!("missing column family {name}")))
    }

    fn map_field_key(map_key: &str, field: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(map_key.len() + 1 + field.len());
        key.extend_from_slice(map_key.as_bytes());
        key.push(MAP_FIELD_SEP);
        key.extend_from_slice(field.as_bytes());
        key
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.commit_lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl PlaneStore for RocksStore {
    fn get_range(
        &self,
        key: &str,
        byte_start: usize,
        byte_end: usize,
    ) -> Result<Vec<u8>, StoreError> {
        let cf = self.cf(CF_PLANES)?;
        let mut out = vec![0u8; byte_end.saturating_sub(byte_start)];
        if let Some(value) = self.db.get_cf(cf, key.as_bytes())? {
            if byte_start < value.len() {
                let copy_end = byte_end.min(value.len());
                out[..copy_end - byte_start].copy_from_slice(&value[byte_start..copy_end]);
            }
        }
        Ok(out)
    }

    fn commit(&self, batch: &CommitBatch) -> Result<(), StoreError> {
        let planes_cf = self.cf(CF_PLANES)?;
        let maps_cf = self.cf(CF_MAPS)?;

        // Serialize read-modify-write so two commits can't interleave
        // between reading a plane value and writing it back.
        let _guard = self.lock();

        let mut write = WriteBatch::default();
        // Coalesce bit-field sets per key: each key is read once, mutated
        // in memory, and written once.
        let mut staged: HashMap<&str, Vec<u8>> = HashMap::new();
        for set in &batch.bitfields {
            if !staged.contains_key(set.key.as_str()) {
                let current = self
                    .db
                    .get_cf(planes_cf, set.key.as_bytes())?
                    .unwrap_or_default();
                staged.insert(set.key.as_str(), current);
            }
            let buf = staged
                .get_mut(set.key.as_str())
                .ok_or_else(|| StoreError::Backend("staged plane vanished".to_string()))?;
            write_bitfield(buf, set.bit_offset, set.bit_width, set.value);
        }
        for (key, value) in &staged {
            write.put_cf(planes_cf, key.as_bytes(), value);
        }
        for upsert in &batch.upserts {
            write.put_cf(
                maps_cf,
                Self::map_field_key(&upsert.map_key, &upsert.field),
                upsert.value.as_bytes(),
            );
        }
        self.db.write(write)?;
        Ok(())
    }

    fn set_if_absent_with_expiry(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let cf = self.cf(CF_LEASES)?;
        let _guard = self.lock();

        let now = now_unix_ms();
        if let Some(value) = self.db.get_cf(cf, key.as_bytes())? {
            let expiry = value
                .try_into()
                .map(u64::from_be_bytes)
                .map_err(|_| StoreError::Corrupt(format!("lease value for {key}")))?;
            if now < expiry {
                return Ok(false);
            }
        }
        let expiry = now + ttl.as_millis() as u64;
        self.db.put_cf(cf, key.as_bytes(), expiry.to_be_bytes())?;
        Ok(true)
    }

    fn upsert_map_field(&self, map_key: &str, field: &str, value: &str)
        -> Result<(), StoreError> {
        let cf = self.cf(CF_MAPS)?;
        self.db
            .put_cf(cf, Self::map_field_key(map_key, field), value.as_bytes())?;
        Ok(())
    }

    fn get_map(&self, map_key: &str) -> Result<HashMap<String, String>, StoreError> {
        let cf = self.cf(CF_MAPS)?;
        let mut prefix = map_key.as_bytes().to_vec();
        prefix.push(MAP_FIELD_SEP);

        let mut map = HashMap::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for entry in iter {
            let (key, value) = entry?;
            if !key.starts_with(&prefix) {
                break;
            }
            let field = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            let value = String::from_utf8_lossy(&value).into_owned();
            map.insert(field, value);
        }
        Ok(map)
    }

    fn ping(&self) -> Result<Duration, StoreError> {
        let cf = self.cf(CF_LEASES)?;
        let start = Instant::now();
        let _ = self.db.get_cf(cf, b"__ping__")?;
        Ok(start.elapsed())
    }
}

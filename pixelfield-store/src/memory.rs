//! In-memory `PlaneStore` for tests and single-node development.
//!
//! Implements the same contract as [`crate::RocksStore`] over plain maps
//! behind one mutex, which trivially gives batch atomicity and a serialized
//! check-and-set for leases. A manual clock offset makes lease-expiry tests
//! deterministic.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::{CommitBatch, PlaneStore, StoreError, write_bitfield};

#[derive(Default)]
struct Inner {
    planes: HashMap<String, Vec<u8>>,
    maps: HashMap<String, HashMap<String, String>>,
    /// Lease key → expiry instant (base clock + offset at creation).
    leases: HashMap<String, Instant>,
    /// Manual clock advance, added to `Instant::now()` everywhere.
    clock_offset: Duration,
}

/// HashMap-backed store, contract-identical to the RocksDB one.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Advance the store's clock without sleeping.
    ///
    /// Test hook: lets lease-expiry behavior (`cooldown` keys) be asserted
    /// deterministically. Production code never calls this.
    pub fn advance(&self, by: Duration) {
        let mut inner = self.lock();
        inner.clock_offset += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned mutex means a panic mid-write; propagating the panic
        // is the only sound option for an in-memory store.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn now(&self) -> Instant {
        Instant::now() + self.clock_offset
    }
}

impl PlaneStore for MemoryStore {
    fn get_range(
        &self,
        key: &str,
        byte_start: usize,
        byte_end: usize,
    ) -> Result<Vec<u8>, StoreError> {
        let inner = self.lock();
        let mut out = vec![0u8; byte_end.saturating_sub(byte_start)];
        if let Some(value) = inner.planes.get(key) {
            if byte_start < value.len() {
                let copy_end = byte_end.min(value.len());
                out[..copy_end - byte_start].copy_from_slice(&value[byte_start..copy_end]);
            }
        }
        Ok(out)
    }

    fn commit(&self, batch: &CommitBatch) -> Result<(), StoreError> {
        let mut inner = self.lock();
        for set in &batch.bitfields {
            let buf = inner.planes.entry(set.key.clone()).or_default();
            write_bitfield(buf, set.bit_offset, set.bit_width, set.value);
        }
        for upsert in &batch.upserts {
            inner
                .maps
                .entry(upsert.map_key.clone())
                .or_default()
                .insert(upsert.field.clone(), upsert.value.clone());
        }
        Ok(())
    }

    fn set_if_absent_with_expiry(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let now = inner.now();
        if let Some(&expiry) = inner.leases.get(key) {
            if now < expiry {
                return Ok(false);
            }
        }
        inner.leases.insert(key.to_string(), now + ttl);
        Ok(true)
    }

    fn upsert_map_field(&self, map_key: &str, field: &str, value: &str)
        -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner
            .maps
            .entry(map_key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    fn get_map(&self, map_key: &str) -> Result<HashMap<String, String>, StoreError> {
        let inner = self.lock();
        Ok(inner.maps.get(map_key).cloned().unwrap_or_default())
    }

    fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        drop(self.lock());
        Ok(start.elapsed())
    }
}

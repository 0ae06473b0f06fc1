//! # pixelfield-store — keyed byte-store client for the canvas planes
//!
//! Thin adapter over an external keyed byte-store. The write pipeline and
//! the snapshot readers only ever speak this contract:
//!
//! ```text
//! ┌──────────────┐   get_range / commit / lease   ┌──────────────┐
//! │ WritePipeline│ ─────────────────────────────► │  PlaneStore  │
//! │ + snapshots  │                                │  (trait)     │
//! └──────────────┘                                └──────┬───────┘
//!                                          ┌─────────────┴─────────────┐
//!                                          ▼                           ▼
//!                                   ┌─────────────┐            ┌──────────────┐
//!                                   │ RocksStore  │            │ MemoryStore  │
//!                                   │ (RocksDB)   │            │ (tests/dev)  │
//!                                   └─────────────┘            └──────────────┘
//! ```
//!
//! Contract highlights:
//! - `get_range` on a missing key returns a zero-filled buffer, never an
//!   error — an unwritten plane reads as all zeroes.
//! - `commit` applies every bit-field set and map upsert in one
//!   all-or-nothing batch. Partial commit is a store defect, not something
//!   callers detect or compensate for.
//! - `set_if_absent_with_expiry` is the sole concurrency gate for rate
//!   limiting: exactly one of N concurrent callers wins.
//!
//! Any call may fail with [`StoreError`]; callers treat that as fatal for
//! the current request and never retry mid-request.

pub mod memory;
pub mod rocks;

pub use memory::MemoryStore;
pub use rocks::{RocksStore, StoreConfig};

use std::collections::HashMap;
use std::time::Duration;

/// One arbitrary-bit-aligned unsigned field write into a plane key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitfieldSet {
    pub key: String,
    pub bit_offset: u64,
    /// Field width in bits, 1..=64.
    pub bit_width: u8,
    pub value: u64,
}

/// One idempotent insert/overwrite into a map key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapUpsert {
    pub map_key: String,
    pub field: String,
    pub value: String,
}

/// An all-or-nothing batch of plane and map writes.
#[derive(Debug, Clone, Default)]
pub struct CommitBatch {
    pub bitfields: Vec<BitfieldSet>,
    pub upserts: Vec<MapUpsert>,
}

impl CommitBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a bit-field write.
    pub fn set_bitfield(
        &mut self,
        key: impl Into<String>,
        bit_offset: u64,
        bit_width: u8,
        value: u64,
    ) -> &mut Self {
        debug_assert!((1..=64).contains(&bit_width));
        self.bitfields.push(BitfieldSet {
            key: key.into(),
            bit_offset,
            bit_width,
            value,
        });
        self
    }

    /// Queue a map upsert.
    pub fn upsert_map_field(
        &mut self,
        map_key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.upserts.push(MapUpsert {
            map_key: map_key.into(),
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bitfields.is_empty() && self.upserts.is_empty()
    }
}

/// Storage errors.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// Backend/transport failure
    Backend(String),
    /// Stored bytes failed to parse
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Backend(e) => write!(f, "Store backend error: {e}"),
            StoreError::Corrupt(e) => write!(f, "Corrupt store value: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// The external keyed byte-store contract.
pub trait PlaneStore: Send + Sync {
    /// Read bytes `[byte_start, byte_end)` of a key.
    ///
    /// Always returns exactly `byte_end - byte_start` bytes; a missing key
    /// or a value shorter than the range reads as zeroes.
    fn get_range(&self, key: &str, byte_start: usize, byte_end: usize)
        -> Result<Vec<u8>, StoreError>;

    /// Apply a batch atomically: either every operation lands or none do.
    fn commit(&self, batch: &CommitBatch) -> Result<(), StoreError>;

    /// Create an expiring key only if it does not currently exist.
    ///
    /// Returns `true` iff this call created the key (the caller won the
    /// race). The key vanishes automatically after `ttl`.
    fn set_if_absent_with_expiry(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Idempotent insert/overwrite of one map field.
    fn upsert_map_field(&self, map_key: &str, field: &str, value: &str)
        -> Result<(), StoreError>;

    /// Read a whole map.
    fn get_map(&self, map_key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Liveness probe; returns observed round-trip latency.
    fn ping(&self) -> Result<Duration, StoreError>;
}

/// Write an unsigned bit field into a byte buffer, growing it as needed.
///
/// Bit 0 is the most significant bit of byte 0, matching the plane
/// encoding (most-significant sub-field first).
pub(crate) fn write_bitfield(buf: &mut Vec<u8>, bit_offset: u64, bit_width: u8, value: u64) {
    let last_bit = bit_offset + bit_width as u64 - 1;
    let needed_bytes = (last_bit / 8 + 1) as usize;
    if buf.len() < needed_bytes {
        buf.resize(needed_bytes, 0);
    }
    for i in 0..bit_width as u64 {
        let bit = (value >> (bit_width as u64 - 1 - i)) & 1;
        let pos = bit_offset + i;
        let byte = (pos / 8) as usize;
        let shift = 7 - (pos % 8) as u8;
        if bit == 1 {
            buf[byte] |= 1 << shift;
        } else {
            buf[byte] &= !(1 << shift);
        }
    }
}

//! Local durable cart record adapters.
//!
//! The guest cart lives in a small synchronous per-profile store, the
//! desktop analog of a browser's per-origin storage. A record that fails
//! to decode is treated as absent - malformed state means an empty cart,
//! never a crash.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use tracing::warn;

use sundry_core::{CartRecord, CompactItem};

use crate::error::StorageError;

/// Synchronous local persistence of the compact cart record.
pub trait LocalCartStorage: Send + Sync {
    /// Load the stored compact items; empty if absent or malformed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] only when the store itself is unavailable,
    /// not for malformed content.
    fn load(&self) -> Result<Vec<CompactItem>, StorageError>;

    /// Replace the stored record with a full snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the record cannot be written.
    fn store(&self, items: &[CompactItem]) -> Result<(), StorageError>;

    /// Remove the stored record entirely.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store is unavailable.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Decode a raw record, downgrading malformed content to an empty cart.
fn decode_record(raw: &str) -> Vec<CompactItem> {
    match serde_json::from_str::<CartRecord>(raw) {
        Ok(record) => record.items,
        Err(error) => {
            warn!(%error, "malformed local cart record, treating as empty");
            Vec::new()
        }
    }
}

/// In-memory local store.
///
/// Holds the serialized record like a real key-value store would, so tests
/// can exercise the malformed-record path via [`MemoryLocalStorage::set_raw`].
#[derive(Default)]
pub struct MemoryLocalStorage {
    record: Mutex<Option<String>>,
}

impl MemoryLocalStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw stored record, if any.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Overwrite the raw stored record, bypassing serialization.
    pub fn set_raw(&self, raw: impl Into<String>) {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw.into());
    }
}

impl LocalCartStorage for MemoryLocalStorage {
    fn load(&self) -> Result<Vec<CompactItem>, StorageError> {
        Ok(self.raw().as_deref().map(decode_record).unwrap_or_default())
    }

    fn store(&self, items: &[CompactItem]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&CartRecord::new(items.to_vec()))?;
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// JSON-file local store under a profile directory.
pub struct FileLocalStorage {
    path: PathBuf,
}

impl FileLocalStorage {
    /// Use the file at `path` as the durable record.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LocalCartStorage for FileLocalStorage {
    fn load(&self) -> Result<Vec<CompactItem>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(decode_record(&raw)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(error) => Err(error.into()),
        }
    }

    fn store(&self, items: &[CompactItem]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(&CartRecord::new(items.to_vec()))?;
        fs::write(&self.path, raw)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

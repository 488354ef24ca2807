// crates/error-archive-store-capped/src/client.rs
// ============================================================================
// Module: List Key-Value Client
// Description: Driver contract for list + blob key-value services.
// Purpose: Decouple the capped store from any particular service client.
// Dependencies: async-trait, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`ListKeyValueClient`] is the narrow set of commands the capped store needs
//! from a key-value service: string blobs with an optional time-to-live and
//! ordered lists with front insertion, ranged reads, and trimming. A network
//! driver implements it over its own connection handling;
//! [`InProcessListClient`] keeps everything in process memory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Driver errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListClientError {
    /// Connection or command transport failure.
    #[error("list client transport error: {0}")]
    Transport(String),
    /// Key holds a value of another kind.
    #[error("list client wrong type for key: {0}")]
    WrongType(String),
}

// ============================================================================
// SECTION: Contract
// ============================================================================

/// Commands a list + blob key-value service must support.
///
/// # Invariants
/// - Lists are ordered front to back; index 0 is the front.
/// - Missing keys behave as empty lists or absent blobs.
#[async_trait]
pub trait ListKeyValueClient: Send + Sync {
    /// Stores a blob, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`ListClientError`] when the command fails.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), ListClientError>;

    /// Reads one blob.
    ///
    /// # Errors
    ///
    /// Returns [`ListClientError`] when the command fails.
    async fn get(&self, key: &str) -> Result<Option<String>, ListClientError>;

    /// Reads many blobs; the result is positionally aligned with `keys`.
    ///
    /// # Errors
    ///
    /// Returns [`ListClientError`] when the command fails.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, ListClientError>;

    /// Deletes keys and returns how many existed.
    ///
    /// # Errors
    ///
    /// Returns [`ListClientError`] when the command fails.
    async fn delete(&self, keys: &[String]) -> Result<usize, ListClientError>;

    /// Pushes a value onto the front of a list and returns the new length.
    ///
    /// # Errors
    ///
    /// Returns [`ListClientError`] when the command fails.
    async fn push_front(&self, key: &str, value: String) -> Result<usize, ListClientError>;

    /// Reads up to `count` list values starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`ListClientError`] when the command fails.
    async fn range(&self, key: &str, start: usize, count: usize) -> Result<Vec<String>, ListClientError>;

    /// Returns the list length.
    ///
    /// # Errors
    ///
    /// Returns [`ListClientError`] when the command fails.
    async fn len(&self, key: &str) -> Result<usize, ListClientError>;

    /// Keeps only the first `keep` values of a list.
    ///
    /// # Errors
    ///
    /// Returns [`ListClientError`] when the command fails.
    async fn trim(&self, key: &str, keep: usize) -> Result<(), ListClientError>;
}

// ============================================================================
// SECTION: In-Process Driver
// ============================================================================

/// Value held under one key.
#[derive(Debug, Clone)]
enum Entry {
    /// String blob with an optional expiry.
    Blob {
        /// Stored value.
        value: String,
        /// Expiry instant, if any.
        expires_at: Option<Instant>,
    },
    /// Ordered list.
    List(VecDeque<String>),
}

impl Entry {
    /// Returns true when the entry has expired.
    fn expired(&self, now: Instant) -> bool {
        matches!(self, Self::Blob { expires_at: Some(deadline), .. } if *deadline <= now)
    }
}

/// In-process list + blob driver.
///
/// # Invariants
/// - Clones share the same key space.
/// - Expired blobs read as absent.
#[derive(Debug, Default, Clone)]
pub struct InProcessListClient {
    /// Key space.
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InProcessListClient {
    /// Creates an empty key space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when a live value exists under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ListClientError::Transport`] when the lock is poisoned.
    pub fn contains(&self, key: &str) -> Result<bool, ListClientError> {
        let now = Instant::now();
        Ok(self.lock()?.get(key).is_some_and(|entry| !entry.expired(now)))
    }

    /// Acquires the key space, dropping expired blobs.
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, ListClientError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| ListClientError::Transport("in-process client mutex poisoned".to_string()))?;
        let now = Instant::now();
        guard.retain(|_, entry| !entry.expired(now));
        Ok(guard)
    }
}

/// Borrows a list, treating a missing key as empty.
fn list<'a>(
    entries: &'a HashMap<String, Entry>,
    key: &str,
) -> Result<Option<&'a VecDeque<String>>, ListClientError> {
    match entries.get(key) {
        None => Ok(None),
        Some(Entry::List(values)) => Ok(Some(values)),
        Some(Entry::Blob { .. }) => Err(ListClientError::WrongType(key.to_string())),
    }
}

#[async_trait]
impl ListKeyValueClient for InProcessListClient {
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), ListClientError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.lock()?.insert(
            key.to_string(),
            Entry::Blob {
                value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ListClientError> {
        match self.lock()?.get(key) {
            None => Ok(None),
            Some(Entry::Blob { value, .. }) => Ok(Some(value.clone())),
            Some(Entry::List(_)) => Err(ListClientError::WrongType(key.to_string())),
        }
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, ListClientError> {
        let entries = self.lock()?;
        Ok(keys
            .iter()
            .map(|key| match entries.get(key) {
                Some(Entry::Blob { value, .. }) => Some(value.clone()),
                Some(Entry::List(_)) | None => None,
            })
            .collect())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, ListClientError> {
        let mut entries = self.lock()?;
        Ok(keys.iter().filter(|key| entries.remove(key.as_str()).is_some()).count())
    }

    async fn push_front(&self, key: &str, value: String) -> Result<usize, ListClientError> {
        let mut entries = self.lock()?;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry::List(VecDeque::new()));
        match entry {
            Entry::List(values) => {
                values.push_front(value);
                Ok(values.len())
            }
            Entry::Blob { .. } => Err(ListClientError::WrongType(key.to_string())),
        }
    }

    async fn range(&self, key: &str, start: usize, count: usize) -> Result<Vec<String>, ListClientError> {
        let entries = self.lock()?;
        Ok(list(&entries, key)?
            .map(|values| values.iter().skip(start).take(count).cloned().collect())
            .unwrap_or_default())
    }

    async fn len(&self, key: &str) -> Result<usize, ListClientError> {
        let entries = self.lock()?;
        Ok(list(&entries, key)?.map_or(0, VecDeque::len))
    }

    async fn trim(&self, key: &str, keep: usize) -> Result<(), ListClientError> {
        let mut entries = self.lock()?;
        match entries.get_mut(key) {
            None => Ok(()),
            Some(Entry::List(values)) => {
                values.truncate(keep);
                Ok(())
            }
            Some(Entry::Blob { .. }) => Err(ListClientError::WrongType(key.to_string())),
        }
    }
}

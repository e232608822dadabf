//! History Store
//!
//! Bounded, deduplicated, newest-first clipboard history shared between the
//! capture loop and every client connection.
//!
//! # Locking
//!
//! All state lives behind one [`parking_lot::Mutex`]. Every public operation
//! takes the lock exactly once, so a `list()` observes either the state before
//! or after a concurrent `insert()`, never a mix. Hashing and preview
//! extraction happen before the lock is taken; nothing under the lock blocks
//! on I/O.
//!
//! # Deduplication
//!
//! Each entry carries the SHA-256 digest of its payload. Re-inserting content
//! that is byte-identical to a stored entry (same content type, same bytes)
//! moves that entry to the front and refreshes its timestamp instead of
//! allocating a new id.

use bytes::Bytes;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use tokio::sync::watch;
use tracing::{debug, trace};

use super::entry::{make_preview, now_millis, ContentType, Entry, EntrySummary};
use super::{HistoryError, Result};

/// Default number of retained entries
pub const DEFAULT_CAPACITY: usize = 100;

/// Default byte budget across all payloads (100 MB)
pub const DEFAULT_MAX_TOTAL_BYTES: usize = 100_000_000;

/// Default preview length in characters
pub const DEFAULT_PREVIEW_CHARS: usize = 100;

/// Store limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    /// Maximum number of entries
    pub capacity: usize,
    /// Maximum sum of payload sizes; the newest entry is always kept
    pub max_total_bytes: usize,
    /// Characters kept in text previews
    pub preview_chars: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

impl HistoryLimits {
    /// Limits with the given entry capacity and default byte budget
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }
}

/// Result of [`HistoryStore::insert`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New entry prepended; `evicted` lists ids dropped to stay within limits
    Inserted {
        /// The new entry
        entry: Entry,
        /// Ids evicted oldest-first
        evicted: Vec<u64>,
    },
    /// Identical content already stored; it was moved to the front
    Promoted {
        /// The promoted entry with its refreshed timestamp
        entry: Entry,
        /// Position the entry occupied before promotion (0 = already newest)
        previous_position: usize,
    },
}

impl InsertOutcome {
    /// The stored entry
    pub fn entry(&self) -> &Entry {
        match self {
            Self::Inserted { entry, .. } | Self::Promoted { entry, .. } => entry,
        }
    }

    /// Returns true if a new id was allocated
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Inserted { .. })
    }
}

#[derive(Debug)]
struct Slot {
    entry: Entry,
    digest: [u8; 32],
    preview: String,
}

impl Slot {
    fn matches(&self, content_type: ContentType, digest: &[u8; 32], payload: &[u8]) -> bool {
        self.entry.content_type == content_type
            && &self.digest == digest
            && self.entry.payload.as_ref() == payload
    }

    fn summary(&self) -> EntrySummary {
        EntrySummary {
            id: self.entry.id,
            content_type: self.entry.content_type,
            size: self.entry.payload.len() as u64,
            captured_at: self.entry.captured_at,
            preview: self.preview.clone(),
        }
    }
}

#[derive(Debug)]
struct History {
    /// Newest first
    slots: VecDeque<Slot>,
    next_id: u64,
    total_bytes: usize,
    revision: u64,
}

impl History {
    fn position(&self, id: u64) -> Option<usize> {
        self.slots.iter().position(|slot| slot.entry.id == id)
    }

    fn evict(&mut self, limits: &HistoryLimits) -> Vec<u64> {
        let mut evicted = Vec::new();
        while self.slots.len() > limits.capacity
            || (self.total_bytes > limits.max_total_bytes && self.slots.len() > 1)
        {
            let Some(slot) = self.slots.pop_back() else {
                break;
            };
            self.total_bytes -= slot.entry.payload.len();
            evicted.push(slot.entry.id);
        }
        evicted
    }

    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    #[cfg(debug_assertions)]
    fn check_invariants(&self, limits: &HistoryLimits) {
        debug_assert!(self.slots.len() <= limits.capacity, "history exceeds capacity");
        debug_assert_eq!(
            self.total_bytes,
            self.slots.iter().map(|s| s.entry.payload.len()).sum::<usize>(),
            "byte accounting drifted"
        );
        for (i, slot) in self.slots.iter().enumerate() {
            debug_assert!(slot.entry.id < self.next_id, "id from the future");
            for other in self.slots.iter().skip(i + 1) {
                debug_assert_ne!(slot.entry.id, other.entry.id, "duplicate id");
                debug_assert!(
                    !other.matches(slot.entry.content_type, &slot.digest, &slot.entry.payload),
                    "duplicate content"
                );
            }
        }
    }

    #[cfg(not(debug_assertions))]
    fn check_invariants(&self, _limits: &HistoryLimits) {}
}

/// Shared clipboard history
#[derive(Debug)]
pub struct HistoryStore {
    limits: HistoryLimits,
    inner: Mutex<History>,
    revision_tx: watch::Sender<u64>,
}

impl HistoryStore {
    /// Create an empty store
    ///
    /// A capacity of zero is raised to one; configuration validation rejects it earlier.
    pub fn new(limits: HistoryLimits) -> Self {
        let limits = HistoryLimits {
            capacity: limits.capacity.max(1),
            ..limits
        };
        let (revision_tx, _) = watch::channel(0);

        Self {
            limits,
            inner: Mutex::new(History {
                slots: VecDeque::with_capacity(limits.capacity.min(1024)),
                next_id: 1,
                total_bytes: 0,
                revision: 0,
            }),
            revision_tx,
        }
    }

    /// Store limits
    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.limits.capacity
    }

    /// Insert content, or promote an identical existing entry
    pub fn insert(&self, content_type: ContentType, payload: impl Into<Bytes>) -> InsertOutcome {
        let payload = payload.into();
        let digest = content_digest(content_type, &payload);
        let preview = make_preview(content_type, &payload, self.limits.preview_chars);
        let captured_at = now_millis();

        let mut history = self.inner.lock();

        let existing = history
            .slots
            .iter()
            .position(|slot| slot.matches(content_type, &digest, &payload));

        let outcome = match existing.and_then(|pos| history.slots.remove(pos).map(|s| (pos, s))) {
            Some((previous_position, mut slot)) => {
                slot.entry.captured_at = captured_at;
                let entry = slot.entry.clone();
                history.slots.push_front(slot);
                InsertOutcome::Promoted {
                    entry,
                    previous_position,
                }
            }
            None => {
                let id = history.next_id;
                history.next_id += 1;

                let entry = Entry {
                    id,
                    content_type,
                    payload,
                    captured_at,
                };
                history.total_bytes += entry.payload.len();
                history.slots.push_front(Slot {
                    entry: entry.clone(),
                    digest,
                    preview,
                });

                let evicted = history.evict(&self.limits);
                InsertOutcome::Inserted { entry, evicted }
            }
        };

        history.check_invariants(&self.limits);
        let revision = history.bump();
        self.revision_tx.send_replace(revision);
        drop(history);

        match &outcome {
            InsertOutcome::Inserted { entry, evicted } => {
                debug!(
                    "Stored entry {} ({}, {} bytes)",
                    entry.id,
                    entry.content_type,
                    entry.size()
                );
                if !evicted.is_empty() {
                    debug!("Evicted entries {:?}", evicted);
                }
            }
            InsertOutcome::Promoted {
                entry,
                previous_position,
            } => {
                debug!(
                    "Promoted entry {} from position {}",
                    entry.id, previous_position
                );
            }
        }

        outcome
    }

    /// Snapshot of the manifest, newest first
    pub fn list(&self) -> Vec<EntrySummary> {
        let history = self.inner.lock();
        history.slots.iter().map(Slot::summary).collect()
    }

    /// Fetch a full entry by id
    pub fn get(&self, id: u64) -> Result<Entry> {
        let history = self.inner.lock();
        history
            .slots
            .iter()
            .find(|slot| slot.entry.id == id)
            .map(|slot| slot.entry.clone())
            .ok_or(HistoryError::NotFound(id))
    }

    /// Most recent entry, if any
    pub fn latest(&self) -> Option<Entry> {
        let history = self.inner.lock();
        history.slots.front().map(|slot| slot.entry.clone())
    }

    /// Delete an entry by id
    pub fn remove(&self, id: u64) -> Result<()> {
        let mut history = self.inner.lock();
        let pos = history.position(id).ok_or(HistoryError::NotFound(id))?;
        if let Some(slot) = history.slots.remove(pos) {
            history.total_bytes -= slot.entry.payload.len();
        }

        history.check_invariants(&self.limits);
        let revision = history.bump();
        self.revision_tx.send_replace(revision);
        drop(history);

        debug!("Removed entry {}", id);
        Ok(())
    }

    /// Remove every entry; ids are not reused afterwards
    pub fn clear(&self) -> usize {
        let mut history = self.inner.lock();
        let removed = history.slots.len();
        history.slots.clear();
        history.total_bytes = 0;

        history.check_invariants(&self.limits);
        let revision = history.bump();
        self.revision_tx.send_replace(revision);
        drop(history);

        debug!("Cleared {} entries", removed);
        removed
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Returns true if the history is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().slots.is_empty()
    }

    /// Sum of payload sizes
    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    /// Mutation counter, bumped once per insert/remove/clear
    pub fn revision(&self) -> u64 {
        *self.revision_tx.borrow()
    }

    /// Watch the mutation counter
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        trace!("New history subscriber");
        self.revision_tx.subscribe()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(HistoryLimits::default())
    }
}

/// SHA-256 over the content type tag and payload
pub fn content_digest(content_type: ContentType, payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([content_type.as_u8()]);
    hasher.update(payload);
    hasher.finalize().into()
}

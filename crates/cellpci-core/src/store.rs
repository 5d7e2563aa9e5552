//! # Cell Fact Store
//!
//! Concurrent keyed store of the latest fact per cell, with a change feed.
//!
//! ## Locking
//!
//! - One reader/writer lock guards the `CellKey -> CellFact` map.
//! - A separate mutex guards the subscriber registry.
//! - Neither lock is held across an await point.
//!
//! ## Change Feed
//!
//! Every mutation is handed to each subscriber with a non-blocking
//! `try_send` while the map lock is still held, so a subscriber observes
//! mutations in the order they completed. Writers never wait on a
//! subscriber: when a subscriber's queue is full the event is dropped for
//! that subscriber only and counted in [`FactStore::dropped_events`].

use crate::primitives::EVENT_QUEUE_CAPACITY;
use crate::{CellFact, CellKey, Pci, PciError};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

// =============================================================================
// ENTRIES & EVENTS
// =============================================================================

/// A stored fact together with its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: CellKey,
    pub fact: CellFact,
}

/// Kind of mutation carried by an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// A report was put (new or refreshed cell).
    Created,
    /// Full replace without history carry-over.
    Updated,
    /// Arbitration-driven PCI correction.
    UpdatedPci,
    /// Administrative removal.
    Deleted,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::UpdatedPci => "UpdatedPCI",
            Self::Deleted => "Deleted",
        };
        f.write_str(name)
    }
}

/// A store mutation as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub key: CellKey,
    pub fact: CellFact,
    pub kind: EventType,
}

/// Point-in-time copy of every stored fact, in key order.
pub type FactSnapshot = BTreeMap<CellKey, CellFact>;

// =============================================================================
// WATCHERS
// =============================================================================

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct SubscriptionId(u64);

/// Registry of active subscribers.
#[derive(Debug, Default)]
struct Watchers {
    senders: Mutex<BTreeMap<SubscriptionId, mpsc::Sender<Event>>>,
    next_id: AtomicU64,
    dropped: AtomicU64,
}

impl Watchers {
    fn add(&self, tx: mpsc::Sender<Event>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.senders.lock().insert(id, tx);
        id
    }

    /// Remove a subscriber. Dropping its sender closes the sink.
    fn remove(&self, id: SubscriptionId) -> bool {
        self.senders.lock().remove(&id).is_some()
    }

    fn len(&self) -> usize {
        self.senders.lock().len()
    }

    fn send(&self, event: &Event) {
        let mut senders = self.senders.lock();
        let mut closed = Vec::new();
        for (id, tx) in senders.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        subscription = id.0,
                        cell = %event.key,
                        kind = %event.kind,
                        "Subscriber queue full, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }
        for id in closed {
            senders.remove(&id);
            tracing::debug!(subscription = id.0, "Removed closed subscriber");
        }
    }
}

// =============================================================================
// FACT STORE
// =============================================================================

/// The Cell Fact Store.
///
/// Holds exactly one [`CellFact`] per key. Cloning a stored fact out is the
/// only way to read it; all mutation goes through the methods below.
#[derive(Debug)]
pub struct FactStore {
    facts: RwLock<BTreeMap<CellKey, CellFact>>,
    watchers: Arc<Watchers>,
    queue_capacity: usize,
}

impl Default for FactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FactStore {
    /// Create an empty store with the default subscriber queue length.
    #[must_use]
    pub fn new() -> Self {
        Self::with_queue_capacity(EVENT_QUEUE_CAPACITY)
    }

    /// Create an empty store whose subscribers buffer up to `capacity`
    /// events each.
    #[must_use]
    pub fn with_queue_capacity(capacity: usize) -> Self {
        Self {
            facts: RwLock::new(BTreeMap::new()),
            watchers: Arc::new(Watchers::default()),
            queue_capacity: capacity.max(1),
        }
    }

    /// Insert or replace the fact at `key`.
    ///
    /// Resolution history (`previous_pci`, `resolved_conflicts`) of an
    /// existing entry is carried into the new fact. Emits `Created`.
    pub fn put(&self, key: CellKey, mut fact: CellFact) -> CellFact {
        let mut facts = self.facts.write();
        if let Some(prior) = facts.get(&key) {
            fact.metric.previous_pci = prior.metric.previous_pci;
            fact.metric.resolved_conflicts = prior.metric.resolved_conflicts;
        }
        facts.insert(key, fact.clone());
        self.watchers.send(&Event {
            key,
            fact: fact.clone(),
            kind: EventType::Created,
        });
        fact
    }

    /// Point lookup.
    pub fn get(&self, key: CellKey) -> Result<CellFact, PciError> {
        self.facts
            .read()
            .get(&key)
            .cloned()
            .ok_or(PciError::CellNotFound(key))
    }

    /// Full replace of an existing entry, without history carry-over.
    /// Emits `Updated`.
    pub fn update(&self, key: CellKey, fact: CellFact) -> Result<(), PciError> {
        let mut facts = self.facts.write();
        let Some(slot) = facts.get_mut(&key) else {
            return Err(PciError::CellNotFound(key));
        };
        *slot = fact.clone();
        self.watchers.send(&Event {
            key,
            fact,
            kind: EventType::Updated,
        });
        Ok(())
    }

    /// Apply an arbitration-driven PCI correction.
    ///
    /// Rotates the current PCI into `previous_pci` and increments
    /// `resolved_conflicts`. Emits `UpdatedPci`.
    pub fn update_pci(&self, key: CellKey, pci: Pci) -> Result<(), PciError> {
        let mut facts = self.facts.write();
        let Some(fact) = facts.get_mut(&key) else {
            return Err(PciError::CellNotFound(key));
        };
        fact.metric.previous_pci = Some(fact.metric.pci);
        fact.metric.pci = pci;
        fact.metric.resolved_conflicts = fact.metric.resolved_conflicts.saturating_add(1);
        let event = Event {
            key,
            fact: fact.clone(),
            kind: EventType::UpdatedPci,
        };
        self.watchers.send(&event);
        Ok(())
    }

    /// Remove the entry at `key`; absent keys are not an error.
    /// Emits `Deleted` when something was removed.
    pub fn delete(&self, key: CellKey) {
        let mut facts = self.facts.write();
        if let Some(fact) = facts.remove(&key) {
            self.watchers.send(&Event {
                key,
                fact,
                kind: EventType::Deleted,
            });
        }
    }

    /// Snapshot of all entries in key order.
    ///
    /// Fails with `StoreEmpty` when nothing is stored.
    pub fn entries(&self) -> Result<Vec<Entry>, PciError> {
        let facts = self.facts.read();
        if facts.is_empty() {
            return Err(PciError::StoreEmpty);
        }
        Ok(facts
            .iter()
            .map(|(key, fact)| Entry {
                key: *key,
                fact: fact.clone(),
            })
            .collect())
    }

    /// Copy of the whole fact map, for arbitration.
    #[must_use]
    pub fn snapshot(&self) -> FactSnapshot {
        self.facts.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.read().is_empty()
    }

    /// Subscribe to every mutation completed after this call.
    ///
    /// The subscription ends when `ctx` is cancelled or the receiver is
    /// dropped; the receiver then yields `None` once buffered events are
    /// drained. Must be called from within a Tokio runtime.
    pub fn watch(&self, ctx: CancellationToken) -> Result<mpsc::Receiver<Event>, PciError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| PciError::NoRuntime)?;
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let closed = tx.clone();
        let id = self.watchers.add(tx);
        let watchers = Arc::clone(&self.watchers);

        handle.spawn(async move {
            tokio::select! {
                () = ctx.cancelled() => {}
                () = closed.closed() => {}
            }
            if watchers.remove(id) {
                tracing::debug!(subscription = id.0, "Subscription torn down");
            }
            // `closed` drops here, releasing the last sender.
        });

        Ok(rx)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.watchers.len()
    }

    /// Events dropped because a subscriber queue was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.watchers.dropped.load(Ordering::Relaxed)
    }
}

// =============================================================================
// TESTS
// =============================================================================

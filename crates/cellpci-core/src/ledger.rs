//! # Conflict Ledger
//!
//! Per-cell accounting of detected and resolved PCI conflicts.
//!
//! The ledger has its own lock, independent of the fact store: counters
//! move after an acknowledgement completes, not when arbitration runs.

use crate::CellKey;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a corrective action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckOutcome {
    /// The network element confirmed the new PCI.
    Applied,
    /// The network element refused it.
    Rejected,
    /// No answer within the acknowledgement timeout.
    TimedOut,
    /// The request could not be delivered.
    Undelivered,
}

impl AckOutcome {
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Counters of one cell (or the aggregate over all cells).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictCounters {
    /// Collisions found by arbitration, including ones with no free PCI.
    pub detected: u64,
    /// Correction attempts that ran to completion, whatever the outcome.
    pub resolved: u64,
    /// Completed attempts confirmed by the network element.
    pub acknowledged: u64,
    /// Completed attempts that were refused, timed out or undelivered.
    pub unacknowledged: u64,
}

impl ConflictCounters {
    /// Add `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        self.detected = self.detected.saturating_add(other.detected);
        self.resolved = self.resolved.saturating_add(other.resolved);
        self.acknowledged = self.acknowledged.saturating_add(other.acknowledged);
        self.unacknowledged = self.unacknowledged.saturating_add(other.unacknowledged);
    }
}

/// Thread-safe per-cell conflict counters.
#[derive(Debug, Default)]
pub struct ConflictLedger {
    cells: RwLock<BTreeMap<CellKey, ConflictCounters>>,
}

impl ConflictLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a collision found for `key`.
    pub fn record_detected(&self, key: CellKey) {
        let mut cells = self.cells.write();
        let counters = cells.entry(key).or_default();
        counters.detected = counters.detected.saturating_add(1);
    }

    /// Count a finished correction attempt for `key`.
    pub fn record_resolution(&self, key: CellKey, outcome: AckOutcome) {
        let mut cells = self.cells.write();
        let counters = cells.entry(key).or_default();
        counters.resolved = counters.resolved.saturating_add(1);
        if outcome.is_success() {
            counters.acknowledged = counters.acknowledged.saturating_add(1);
        } else {
            counters.unacknowledged = counters.unacknowledged.saturating_add(1);
        }
    }

    #[must_use]
    pub fn get(&self, key: CellKey) -> Option<ConflictCounters> {
        self.cells.read().get(&key).copied()
    }

    /// Copy of every cell's counters, in key order.
    #[must_use]
    pub fn all(&self) -> BTreeMap<CellKey, ConflictCounters> {
        self.cells.read().clone()
    }

    /// Sum over all cells.
    #[must_use]
    pub fn totals(&self) -> ConflictCounters {
        let cells = self.cells.read();
        let mut total = ConflictCounters::default();
        for counters in cells.values() {
            total.merge(counters);
        }
        total
    }
}

// =============================================================================
// TESTS
// =============================================================================

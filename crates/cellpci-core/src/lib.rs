//! # cellpci-core
//!
//! The PCI collision engine - THE LOGIC.
//!
//! This crate keeps the latest fact reported by every cell, finds cells
//! whose Physical Cell Identifier collides with a cell within two neighbor
//! hops, picks a free PCI from the cell's pools and drives the correction
//! to the network element.
//!
//! ## Layout
//!
//! - `types` - identifiers, PCI pools, cell facts and `PciError`
//! - `store` - concurrent fact store with a change feed
//! - `arbitrator` - bounded neighborhood search and first-fit selection
//! - `controller` - event loop, corrective action and acknowledgement wait
//! - `ledger` - per-cell conflict counters
//! - `query` - read-only operator views
//!
//! ## Constraints
//!
//! - Every map keyed by cell is a `BTreeMap`, so iteration order and
//!   arbitration results are deterministic.
//! - Arbitration is a pure function of a snapshot; only the store mutates
//!   facts.
//! - No network dependencies: corrective actions leave the crate through
//!   the `ControlTransport` trait.

// =============================================================================
// MODULES
// =============================================================================

pub mod arbitrator;
pub mod controller;
pub mod ledger;
pub mod primitives;
pub mod query;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CellFact, CellIdentity, CellKey, CellMetric, CellSize, Cgi, NeighborRef, NodeId, Pci,
    PciError, PciPool, PlmnId,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use arbitrator::{
    Arbitration, Arbitrator, GlobalPciIndex, InScope, NeighborLookup, Neighborhood, Verdict,
};
pub use controller::{
    Acknowledgement, ControlAction, ControlTransport, ControllerConfig, Decision, PciController,
};
pub use ledger::{AckOutcome, ConflictCounters, ConflictLedger};
pub use query::{Conflict, Resolution, conflicts, resolutions};
pub use store::{Entry, Event, EventType, FactSnapshot, FactStore};

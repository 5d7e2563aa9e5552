//! # Primitives
//!
//! Fixed constants of the arbitration engine.
//!
//! These values are compiled into the binary. Operators configure PCI pools
//! and the acknowledgement timeout; everything here is deliberately not
//! configurable.

/// How many hops around a target cell are searched for PCI collisions.
///
/// - `1`: direct neighbors only.
/// - `2`: neighbors and neighbors' neighbors.
///
/// Two hops is the handover relevance horizon: a UE in the target cell may
/// be handed to a 1-hop neighbor, and that neighbor must be able to tell the
/// target apart from every cell it can itself hand over to.
pub const SEARCH_DEPTH: usize = 2;

/// Lower bound of the default PCI pool.
pub const DEFAULT_LOWER_PCI: u32 = 1;

/// Upper bound of the default PCI pool.
pub const DEFAULT_UPPER_PCI: u32 = 512;

/// Largest PCI an NR cell may broadcast (3GPP TS 38.211: 0..=1007).
pub const MAX_NR_PCI: u32 = 1007;

/// Bit position of the PLMN identity inside a [`CellKey`](crate::CellKey).
///
/// The cell field below it is the identity plus a marker bit at position
/// `bit_len`, so it needs one bit more than the widest (NR) identity.
pub const PLMN_SHIFT: u32 = 37;

/// Widest cell identity accepted (NR cell identity).
pub const MAX_CELL_ID_BITS: u8 = 36;

/// Width of an E-UTRA cell identity.
pub const EUTRA_CELL_ID_BITS: u8 = 28;

/// Largest 24-bit PLMN identity.
pub const MAX_PLMN_ID: u32 = 0x00FF_FFFF;

/// Per-subscriber queue length of the store's change feed.
///
/// Events that do not fit are dropped for that subscriber only; writers
/// never wait on a subscriber.
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Default bound on the wait for a control acknowledgement.
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 5000;

/// Maximum neighbor entries accepted in one report.
pub const MAX_REPORTED_NEIGHBORS: usize = 512;

/// Maximum PCI pools accepted per cell.
pub const MAX_POOLS_PER_CELL: usize = 16;

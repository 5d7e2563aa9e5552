//! # Core Type Definitions
//!
//! This module contains the data model of the arbitration engine:
//! - Cell identifiers (`PlmnId`, `CellIdentity`, `Cgi`, `CellKey`, `NodeId`)
//! - PCI values and pools (`Pci`, `PciPool`)
//! - Per-cell state (`CellMetric`, `NeighborRef`, `CellFact`)
//! - Error types (`PciError`)
//!
//! ## Key Canonicalisation
//!
//! CGI equality is structural. Every map keyed by a cell uses `CellKey`,
//! and `Cgi::key()` is the only function that produces one.

use crate::primitives::{
    DEFAULT_LOWER_PCI, DEFAULT_UPPER_PCI, MAX_CELL_ID_BITS, MAX_PLMN_ID, PLMN_SHIFT,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// CELL IDENTIFIERS
// =============================================================================

/// 24-bit PLMN identity (MCC + MNC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PlmnId(u32);

impl PlmnId {
    /// Create a PLMN identity, rejecting values wider than 24 bits.
    pub fn new(value: u32) -> Result<Self, PciError> {
        if value > MAX_PLMN_ID {
            return Err(PciError::InvalidCgi(format!(
                "PLMN identity {value:#x} exceeds 24 bits"
            )));
        }
        Ok(Self(value))
    }

    /// Decode the 3-octet wire form (first octet is least significant).
    #[must_use]
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self(u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16))
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for PlmnId {
    type Error = PciError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PlmnId> for u32 {
    fn from(plmn: PlmnId) -> Self {
        plmn.0
    }
}

/// Right-aligned cell identity with an explicit bit length.
///
/// The value is masked to `bit_len` bits on construction, so two
/// identities that compare equal are bit-identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCellIdentity")]
pub struct CellIdentity {
    value: u64,
    bit_len: u8,
}

#[derive(Deserialize)]
struct RawCellIdentity {
    value: u64,
    bit_len: u8,
}

impl TryFrom<RawCellIdentity> for CellIdentity {
    type Error = PciError;

    fn try_from(raw: RawCellIdentity) -> Result<Self, Self::Error> {
        Self::new(raw.value, raw.bit_len)
    }
}

impl CellIdentity {
    /// Create a cell identity of `bit_len` bits (1..=36).
    pub fn new(value: u64, bit_len: u8) -> Result<Self, PciError> {
        if bit_len == 0 || bit_len > MAX_CELL_ID_BITS {
            return Err(PciError::InvalidCgi(format!(
                "cell identity length {bit_len} outside 1..={MAX_CELL_ID_BITS}"
            )));
        }
        Ok(Self {
            value: value & ((1u64 << bit_len) - 1),
            bit_len,
        })
    }

    /// Decode a left-aligned, big-endian bit string of `bit_len` bits.
    ///
    /// This is the layout of an ASN.1 BIT STRING: trailing padding bits of
    /// the last octet are discarded.
    pub fn from_bit_string(bytes: &[u8], bit_len: u8) -> Result<Self, PciError> {
        let total_bits = bytes.len().saturating_mul(8);
        if bit_len == 0 || bytes.len() > 8 || usize::from(bit_len) > total_bits {
            return Err(PciError::InvalidCgi(format!(
                "bit string of {} octets cannot hold {bit_len} bits",
                bytes.len()
            )));
        }
        let raw = bytes
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        let padding = total_bits - usize::from(bit_len);
        Self::new(raw >> padding, bit_len)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.value
    }

    #[must_use]
    pub const fn bit_len(self) -> u8 {
        self.bit_len
    }
}

/// Cell Global Identity: PLMN plus cell identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cgi {
    pub plmn: PlmnId,
    pub cell: CellIdentity,
}

impl Cgi {
    #[must_use]
    pub const fn new(plmn: PlmnId, cell: CellIdentity) -> Self {
        Self { plmn, cell }
    }

    /// Convenience constructor for a 36-bit NR cell identity.
    pub fn nr(plmn: u32, nci: u64) -> Result<Self, PciError> {
        Ok(Self::new(
            PlmnId::new(plmn)?,
            CellIdentity::new(nci, MAX_CELL_ID_BITS)?,
        ))
    }

    /// The canonical store key of this cell.
    ///
    /// Layout: `plmn << PLMN_SHIFT | 1 << bit_len | value`. The marker bit
    /// keeps identities of different widths apart, so two CGIs share a key
    /// only when they are equal.
    #[must_use]
    pub const fn key(&self) -> CellKey {
        let cell = (1u64 << (self.cell.bit_len as u32)) | self.cell.value;
        CellKey(((self.plmn.0 as u64) << PLMN_SHIFT) | cell)
    }
}

impl fmt::Display for Cgi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:06x}/{:x}:{}",
            self.plmn.0, self.cell.value, self.cell.bit_len
        )
    }
}

/// Fixed-width key derived from a [`Cgi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellKey(pub u64);

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the network element (E2 node) owning a cell.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// PCI
// =============================================================================

/// Physical Cell Identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Pci(pub u32);

impl Pci {
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pci {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive range of PCIs that may be assigned to a cell.
///
/// Pools are not validated on construction: a malformed pool is reported
/// by the arbitration call that tries to use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PciPool {
    pub lower: Pci,
    pub upper: Pci,
}

impl PciPool {
    #[must_use]
    pub const fn new(lower: u32, upper: u32) -> Self {
        Self {
            lower: Pci(lower),
            upper: Pci(upper),
        }
    }

    /// Check `lower <= upper`.
    pub fn validate(&self) -> Result<(), PciError> {
        if self.lower > self.upper {
            return Err(PciError::InvalidPool {
                lower: self.lower,
                upper: self.upper,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, pci: Pci) -> bool {
        self.lower <= pci && pci <= self.upper
    }

    /// Iterate the pool in ascending order. Empty when malformed.
    pub fn iter(&self) -> impl Iterator<Item = Pci> + use<> {
        (self.lower.0..=self.upper.0).map(Pci)
    }
}

impl Default for PciPool {
    fn default() -> Self {
        Self::new(DEFAULT_LOWER_PCI, DEFAULT_UPPER_PCI)
    }
}

// =============================================================================
// CELL STATE
// =============================================================================

/// Coverage class reported alongside the PCI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CellSize {
    Femto,
    Enterprise,
    OutdoorSmall,
    #[default]
    Macro,
}

/// Measured and assigned per-cell state.
///
/// Only the store mutates `previous_pci` and `resolved_conflicts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CellMetric {
    pub pci: Pci,
    #[serde(default)]
    pub previous_pci: Option<Pci>,
    #[serde(default)]
    pub resolved_conflicts: u32,
    #[serde(default)]
    pub dl_earfcn: u32,
    #[serde(default)]
    pub cell_size: CellSize,
}

impl CellMetric {
    #[must_use]
    pub fn new(pci: Pci) -> Self {
        Self {
            pci,
            ..Self::default()
        }
    }
}

/// One entry of a cell's reported neighbor list.
///
/// `pci` is the neighbor's PCI as seen by the reporting cell and may lag
/// behind the neighbor's own fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborRef {
    pub cgi: Cgi,
    pub pci: Pci,
}

impl NeighborRef {
    #[must_use]
    pub const fn new(cgi: Cgi, pci: Pci) -> Self {
        Self { cgi, pci }
    }
}

/// Latest observed state of one cell: the unit of storage, notification and
/// arbitration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellFact {
    pub cgi: Cgi,
    #[serde(default)]
    pub node_id: NodeId,
    pub metric: CellMetric,
    #[serde(default = "default_pools")]
    pub pools: Vec<PciPool>,
    #[serde(default)]
    pub neighbors: Vec<NeighborRef>,
}

fn default_pools() -> Vec<PciPool> {
    vec![PciPool::default()]
}

impl CellFact {
    /// Create a fact with the default pool and no neighbors.
    #[must_use]
    pub fn new(cgi: Cgi, node_id: NodeId, pci: Pci) -> Self {
        Self {
            cgi,
            node_id,
            metric: CellMetric::new(pci),
            pools: default_pools(),
            neighbors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_pools(mut self, pools: Vec<PciPool>) -> Self {
        self.pools = pools;
        self
    }

    #[must_use]
    pub fn with_neighbor(mut self, cgi: Cgi, pci: Pci) -> Self {
        self.neighbors.push(NeighborRef::new(cgi, pci));
        self
    }

    #[must_use]
    pub fn with_neighbors(mut self, neighbors: Vec<NeighborRef>) -> Self {
        self.neighbors = neighbors;
        self
    }

    #[must_use]
    pub fn key(&self) -> CellKey {
        self.cgi.key()
    }

    #[must_use]
    pub fn pci(&self) -> Pci {
        self.metric.pci
    }

    /// Whether `pci` lies in any of this cell's pools.
    #[must_use]
    pub fn in_pools(&self, pci: Pci) -> bool {
        self.pools.iter().any(|p| p.contains(pci))
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by the engine and the application around it.
///
/// The store and the arbitrator return these to their caller; only the
/// controller decides what is logged and what aborts an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PciError {
    /// A PCI pool has `lower > upper`.
    #[error("Invalid PCI pool: lower {lower} is above upper {upper}")]
    InvalidPool { lower: Pci, upper: Pci },

    /// A cell identifier could not be decoded.
    #[error("Invalid CGI: {0}")]
    InvalidCgi(String),

    /// No fact is stored under the key.
    #[error("Cell not found: {0}")]
    CellNotFound(CellKey),

    /// Enumeration of an empty store.
    #[error("No cell facts stored")]
    StoreEmpty,

    /// Every PCI of every pool is occupied by the neighborhood.
    #[error("No available PCI in any pool for cell {0}")]
    PciExhausted(CellKey),

    /// No acknowledgement arrived in time.
    #[error("Control acknowledgement for cell {cell} timed out after {after_ms} ms")]
    AckTimeout { cell: CellKey, after_ms: u64 },

    /// The network element refused the corrective action.
    #[error("Control rejected for cell {cell}: {cause}")]
    AckRejected { cell: CellKey, cause: String },

    /// The control transport failed to deliver or dropped the request.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A watch was requested outside an async runtime.
    #[error("No async runtime available for the change feed")]
    NoRuntime,

    /// Application configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PciError {
    /// Not-found is a normal signal callers branch on.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CellNotFound(_) | Self::StoreEmpty)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plmn_from_bytes_is_little_endian() {
        let plmn = PlmnId::from_bytes([0x13, 0xF1, 0x84]);
        assert_eq!(plmn.value(), 0x0084_F113);
    }

    #[test]
    fn plmn_rejects_wide_values() {
        assert!(PlmnId::new(0x0100_0000).is_err());
        assert!(PlmnId::new(0x00FF_FFFF).is_ok());
    }

    #[test]
    fn cell_identity_is_masked() {
        let a = CellIdentity::new(0xF_0000_0001, 28).expect("valid");
        let b = CellIdentity::new(0x1, 28).expect("valid");
        assert_eq!(a, b);
    }

    #[test]
    fn cell_identity_rejects_bad_length() {
        assert!(CellIdentity::new(1, 0).is_err());
        assert!(CellIdentity::new(1, 37).is_err());
    }

    #[test]
    fn bit_string_drops_padding() {
        // 36 bits left-aligned in 5 octets: 4 padding bits at the end
        let cell = CellIdentity::from_bit_string(&[0x00, 0x00, 0x01, 0x42, 0x50], 36)
            .expect("decode");
        assert_eq!(cell.value(), 0x1425);
        assert_eq!(cell.bit_len(), 36);
    }

    #[test]
    fn bit_string_too_short_fails() {
        assert!(CellIdentity::from_bit_string(&[0xFF], 9).is_err());
    }

    #[test]
    fn key_is_structural() {
        let a = Cgi::nr(0x138426, 82530).expect("cgi");
        let b = Cgi::nr(0x138426, 82530).expect("cgi");
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), CellKey((0x138426 << 37) | (1 << 36) | 82530));
    }

    #[test]
    fn width_is_part_of_the_key() {
        let nr = Cgi::new(
            PlmnId::new(1).expect("plmn"),
            CellIdentity::new(5, MAX_CELL_ID_BITS).expect("nci"),
        );
        let eutra = Cgi::new(
            PlmnId::new(1).expect("plmn"),
            CellIdentity::new(5, 28).expect("eci"),
        );
        assert_ne!(nr, eutra);
        assert_ne!(nr.key(), eutra.key());
    }

    #[test]
    fn widest_key_keeps_plmn_bits() {
        let a = Cgi::nr(MAX_PLMN_ID, (1 << 36) - 1).expect("cgi");
        let b = Cgi::nr(MAX_PLMN_ID - 1, (1 << 36) - 1).expect("cgi");
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key().0 >> PLMN_SHIFT, u64::from(MAX_PLMN_ID));
    }

    #[test]
    fn different_plmn_different_key() {
        let a = Cgi::nr(1, 7).expect("cgi");
        let b = Cgi::nr(2, 7).expect("cgi");
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn pool_validation() {
        assert!(PciPool::new(1, 10).validate().is_ok());
        assert!(PciPool::new(5, 5).validate().is_ok());
        assert!(matches!(
            PciPool::new(10, 1).validate(),
            Err(PciError::InvalidPool { .. })
        ));
    }

    #[test]
    fn pool_iterates_ascending() {
        let values: Vec<_> = PciPool::new(3, 6).iter().map(Pci::value).collect();
        assert_eq!(values, vec![3, 4, 5, 6]);
        assert_eq!(PciPool::new(6, 3).iter().count(), 0);
    }

    #[test]
    fn fact_defaults_to_single_pool() {
        let fact = CellFact::new(Cgi::nr(1, 1).expect("cgi"), NodeId::new("e2:1"), Pci(7));
        assert_eq!(fact.pools, vec![PciPool::new(1, 512)]);
        assert!(fact.in_pools(Pci(512)));
        assert!(!fact.in_pools(Pci(513)));
    }

    #[test]
    fn fact_json_roundtrip_applies_defaults() {
        let json = r#"{
            "cgi": {"plmn": 1, "cell": {"value": 5, "bit_len": 36}},
            "metric": {"pci": 3}
        }"#;
        let fact: CellFact = serde_json::from_str(json).expect("parse");
        assert_eq!(fact.pci(), Pci(3));
        assert_eq!(fact.pools.len(), 1);
        assert!(fact.neighbors.is_empty());
        assert_eq!(fact.metric.resolved_conflicts, 0);
    }

    #[test]
    fn not_found_classification() {
        assert!(PciError::StoreEmpty.is_not_found());
        assert!(PciError::CellNotFound(CellKey(1)).is_not_found());
        assert!(!PciError::PciExhausted(CellKey(1)).is_not_found());
    }
}

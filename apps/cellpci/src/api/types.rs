//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use cellpci_core::{
    CellFact, CellIdentity, CellKey, CellSize, Cgi, Conflict, ConflictCounters, Entry, NeighborRef,
    Neighborhood, NodeId, Pci, PciError, PciPool, PlmnId, Resolution,
    primitives::{
        EUTRA_CELL_ID_BITS, MAX_CELL_ID_BITS, MAX_NR_PCI, MAX_POOLS_PER_CELL,
        MAX_REPORTED_NEIGHBORS,
    },
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error body for 4xx/5xx answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

// =============================================================================
// TELEMETRY REPORT
// =============================================================================

/// Radio access technology of a reported cell; selects the cell identity width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rat {
    #[default]
    Nr,
    Eutra,
}

impl Rat {
    #[must_use]
    pub fn cell_id_bits(self) -> u8 {
        match self {
            Self::Nr => MAX_CELL_ID_BITS,
            Self::Eutra => EUTRA_CELL_ID_BITS,
        }
    }
}

fn to_cgi(plmn: u32, cell_id: u64, rat: Rat) -> Result<Cgi, PciError> {
    let bits = rat.cell_id_bits();
    if cell_id >> bits != 0 {
        return Err(PciError::InvalidCgi(format!(
            "cell id {:#x} does not fit in {} bits",
            cell_id, bits
        )));
    }
    Ok(Cgi::new(PlmnId::new(plmn)?, CellIdentity::new(cell_id, bits)?))
}

fn check_pci(pci: u32) -> Result<Pci, PciError> {
    if pci > MAX_NR_PCI {
        return Err(PciError::Serialization(format!(
            "PCI {} exceeds maximum {}",
            pci, MAX_NR_PCI
        )));
    }
    Ok(Pci(pci))
}

/// One neighbor entry of a [`Report`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborReport {
    pub plmn: u32,
    pub cell_id: u64,
    #[serde(default)]
    pub rat: Rat,
    pub pci: u32,
}

/// A decoded per-cell telemetry report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub plmn: u32,
    pub cell_id: u64,
    #[serde(default)]
    pub rat: Rat,
    #[serde(default)]
    pub node_id: String,
    pub pci: u32,
    #[serde(default)]
    pub dl_earfcn: u32,
    #[serde(default)]
    pub cell_size: CellSize,
    /// Pools for this cell; the configured defaults apply when empty.
    #[serde(default)]
    pub pools: Vec<PciPool>,
    #[serde(default)]
    pub neighbors: Vec<NeighborReport>,
}

impl Report {
    /// Convert to a [`CellFact`], validating every field.
    ///
    /// Bounds on neighbor and pool counts keep a single report from
    /// inflating arbitration cost.
    pub fn to_fact(&self, default_pools: &[PciPool]) -> Result<CellFact, PciError> {
        let cgi = to_cgi(self.plmn, self.cell_id, self.rat)?;
        let pci = check_pci(self.pci)?;

        if self.neighbors.len() > MAX_REPORTED_NEIGHBORS {
            return Err(PciError::Serialization(format!(
                "{} neighbors exceed maximum {}",
                self.neighbors.len(),
                MAX_REPORTED_NEIGHBORS
            )));
        }
        if self.pools.len() > MAX_POOLS_PER_CELL {
            return Err(PciError::Serialization(format!(
                "{} pools exceed maximum {}",
                self.pools.len(),
                MAX_POOLS_PER_CELL
            )));
        }
        for pool in &self.pools {
            pool.validate()?;
            if pool.upper.value() > MAX_NR_PCI {
                return Err(PciError::Serialization(format!(
                    "PCI pool upper bound {} exceeds {}",
                    pool.upper, MAX_NR_PCI
                )));
            }
        }

        let neighbors = self
            .neighbors
            .iter()
            .map(|n| Ok(NeighborRef::new(to_cgi(n.plmn, n.cell_id, n.rat)?, check_pci(n.pci)?)))
            .collect::<Result<Vec<_>, PciError>>()?;

        let pools = if self.pools.is_empty() {
            default_pools.to_vec()
        } else {
            self.pools.clone()
        };

        let mut fact = CellFact::new(cgi, NodeId::new(&self.node_id), pci)
            .with_pools(pools)
            .with_neighbors(neighbors);
        fact.metric.dl_earfcn = self.dl_earfcn;
        fact.metric.cell_size = self.cell_size;
        Ok(fact)
    }
}

/// Indication ingest response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicationResponse {
    pub success: bool,
    pub key: Option<CellKey>,
    pub error: Option<String>,
}

impl IndicationResponse {
    pub fn success(key: CellKey) -> Self {
        Self {
            success: true,
            key: Some(key),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            key: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// QUERY RESPONSES
// =============================================================================

/// Two-hop search horizon of one cell, as arbitration sees it now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborhoodResponse {
    pub key: CellKey,
    pub pci: Pci,
    /// Whether `pci` is in use within the horizon.
    pub collides: bool,
    pub neighborhood: Neighborhood,
}

/// All stored cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellsResponse {
    pub count: usize,
    pub cells: Vec<Entry>,
}

/// Cells currently colliding with a direct neighbor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictsResponse {
    pub count: usize,
    pub conflicts: Vec<Conflict>,
}

/// Cells whose PCI was changed by arbitration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionsResponse {
    pub count: usize,
    pub resolutions: Vec<Resolution>,
}

/// Counters of one cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellCounters {
    pub key: CellKey,
    #[serde(flatten)]
    pub counters: ConflictCounters,
}

/// Aggregate and per-cell conflict counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountersResponse {
    pub totals: ConflictCounters,
    pub cells: Vec<CellCounters>,
}

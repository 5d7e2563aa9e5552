//! # Conflict Queries
//!
//! Read-only views over a [`FactSnapshot`] for operators: cells currently
//! colliding with a direct neighbor, and cells that have been corrected.

use crate::store::FactSnapshot;
use crate::{CellFact, CellKey, Cgi, NeighborRef, Pci, PciError};
use serde::{Deserialize, Serialize};

/// A cell sharing its PCI with at least one direct neighbor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub key: CellKey,
    pub cgi: Cgi,
    pub pci: Pci,
    /// Colliding neighbors, with the PCI they currently hold.
    pub neighbors: Vec<NeighborRef>,
}

/// A cell whose PCI was changed at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub key: CellKey,
    pub cgi: Cgi,
    pub resolved_pci: Pci,
    pub original_pci: Option<Pci>,
    pub resolved_conflicts: u32,
}

fn colliding(snapshot: &FactSnapshot, fact: &CellFact) -> Option<Conflict> {
    let own = fact.key();
    let pci = fact.pci();
    let neighbors: Vec<NeighborRef> = fact
        .neighbors
        .iter()
        .filter(|n| n.cgi.key() != own)
        .map(|n| {
            let held = snapshot.get(&n.cgi.key()).map_or(n.pci, CellFact::pci);
            NeighborRef::new(n.cgi, held)
        })
        .filter(|n| n.pci == pci)
        .collect();

    (!neighbors.is_empty()).then(|| Conflict {
        key: own,
        cgi: fact.cgi,
        pci,
        neighbors,
    })
}

/// Direct-neighbor collisions, for one cell or for all of them.
///
/// With `Some(key)` the result holds at most one entry; an unknown key is
/// `CellNotFound`.
pub fn conflicts(snapshot: &FactSnapshot, key: Option<CellKey>) -> Result<Vec<Conflict>, PciError> {
    match key {
        Some(key) => {
            let fact = snapshot.get(&key).ok_or(PciError::CellNotFound(key))?;
            Ok(colliding(snapshot, fact).into_iter().collect())
        }
        None => Ok(snapshot
            .values()
            .filter_map(|fact| colliding(snapshot, fact))
            .collect()),
    }
}

/// Every cell with a non-zero correction count, in key order.
pub fn resolutions(snapshot: &FactSnapshot) -> Vec<Resolution> {
    snapshot
        .iter()
        .filter(|(_, fact)| fact.metric.resolved_conflicts > 0)
        .map(|(key, fact)| Resolution {
            key: *key,
            cgi: fact.cgi,
            resolved_pci: fact.metric.pci,
            original_pci: fact.metric.previous_pci,
            resolved_conflicts: fact.metric.resolved_conflicts,
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

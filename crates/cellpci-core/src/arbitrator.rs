//! # Neighbor Graph Arbitrator
//!
//! Decides whether a cell's PCI collides with its neighborhood and, if so,
//! which PCI replaces it.
//!
//! The neighborhood is every cell within [`SEARCH_DEPTH`] hops of the
//! target, found by a breadth-first walk over reported neighbor lists.
//! A cell is expanded only when it is present as a full fact; cells known
//! only through a neighbor reference contribute their PCI and stop there.
//!
//! Arbitration is a pure function of its inputs. It never touches the
//! store; persisting the outcome is the caller's job.

use crate::primitives::SEARCH_DEPTH;
use crate::store::FactSnapshot;
use crate::{CellFact, CellKey, Pci, PciError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// LOOKUP TRAIT
// =============================================================================

/// Read access to the fact population during a traversal.
pub trait NeighborLookup {
    /// The full fact stored for `key`, if any.
    fn fact(&self, key: CellKey) -> Option<&CellFact>;
}

impl NeighborLookup for FactSnapshot {
    fn fact(&self, key: CellKey) -> Option<&CellFact> {
        self.get(&key)
    }
}

/// Last-known PCI of cells that are referenced but have no fact yet.
///
/// This is a library input: the embedding application fills it from an
/// external topology or inventory source. The bundled `cellpci` binary has
/// no such source and runs without an index, so fact-less neighbors are
/// judged by their reported PCI alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPciIndex {
    pcis: BTreeMap<CellKey, Pci>,
}

impl GlobalPciIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest known PCI of a cell, returning the previous one.
    pub fn record(&mut self, key: CellKey, pci: Pci) -> Option<Pci> {
        self.pcis.insert(key, pci)
    }

    #[must_use]
    pub fn get(&self, key: CellKey) -> Option<Pci> {
        self.pcis.get(&key).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pcis.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pcis.is_empty()
    }
}

// =============================================================================
// RESULT TYPES
// =============================================================================

/// A cell inside the target's search horizon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InScope {
    /// Hop distance from the target (1 or 2).
    pub hops: usize,
    /// PCIs the cell is taken to occupy.
    ///
    /// A stored fact contributes its own PCI. A cell without a fact
    /// contributes every PCI it was reported with, since the reports may
    /// disagree.
    pub pcis: BTreeSet<Pci>,
    /// Whether the cell is present as a full fact.
    pub known: bool,
}

impl InScope {
    #[must_use]
    pub fn holds(&self, pci: Pci) -> bool {
        self.pcis.contains(&pci)
    }
}

/// Every cell within the search horizon of one target, keyed by cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighborhood {
    cells: BTreeMap<CellKey, InScope>,
}

impl Neighborhood {
    /// The set of PCIs occupied by the neighborhood.
    #[must_use]
    pub fn occupied(&self) -> BTreeSet<Pci> {
        self.cells.values().flat_map(|c| c.pcis.iter().copied()).collect()
    }

    #[must_use]
    pub fn contains_pci(&self, pci: Pci) -> bool {
        self.cells.values().any(|c| c.holds(pci))
    }

    /// Cells of the neighborhood holding `pci`.
    pub fn holders(&self, pci: Pci) -> impl Iterator<Item = CellKey> + '_ {
        self.cells
            .iter()
            .filter(move |(_, c)| c.holds(pci))
            .map(|(k, _)| *k)
    }

    #[must_use]
    pub fn get(&self, key: CellKey) -> Option<&InScope> {
        self.cells.get(&key)
    }

    /// Cells at exactly `hops` distance.
    pub fn at_hops(&self, hops: usize) -> impl Iterator<Item = (CellKey, &InScope)> + '_ {
        self.cells
            .iter()
            .filter(move |(_, c)| c.hops == hops)
            .map(|(k, c)| (*k, c))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// What arbitration decided for the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// The current PCI is collision-free.
    Unchanged { pci: Pci },
    /// The current PCI collides; switch to `to`.
    Reassign { from: Pci, to: Pci },
}

impl Verdict {
    #[must_use]
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Reassign { .. })
    }
}

/// Verdict plus the neighborhood it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arbitration {
    pub verdict: Verdict,
    pub neighborhood: Neighborhood,
}

// =============================================================================
// ARBITRATOR
// =============================================================================

/// Arbitrates the PCI of one target cell.
///
/// ```
/// use cellpci_core::{Arbitrator, CellFact, Cgi, NodeId, Pci, FactSnapshot, Verdict};
///
/// let a = Cgi::nr(1, 1).unwrap();
/// let b = Cgi::nr(1, 2).unwrap();
/// let target = CellFact::new(a, NodeId::new("n"), Pci(1)).with_neighbor(b, Pci(1));
/// let snapshot = FactSnapshot::new();
///
/// let result = Arbitrator::new(&target).arbitrate(&snapshot).unwrap();
/// assert_eq!(result.verdict, Verdict::Reassign { from: Pci(1), to: Pci(2) });
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Arbitrator<'a> {
    target: &'a CellFact,
    global: Option<&'a GlobalPciIndex>,
}

impl<'a> Arbitrator<'a> {
    #[must_use]
    pub fn new(target: &'a CellFact) -> Self {
        Self {
            target,
            global: None,
        }
    }

    /// Resolve fact-less neighbors through a global PCI index.
    #[must_use]
    pub fn with_global_index(mut self, index: &'a GlobalPciIndex) -> Self {
        self.global = Some(index);
        self
    }

    /// Run arbitration against `lookup`.
    ///
    /// Pools are validated before the lookup is consulted. Replacement is
    /// first-fit: pools in declaration order, each ascending.
    pub fn arbitrate<L: NeighborLookup>(&self, lookup: &L) -> Result<Arbitration, PciError> {
        for pool in &self.target.pools {
            pool.validate()?;
        }

        let neighborhood = self.neighborhood(lookup);
        let current = self.target.pci();

        if !neighborhood.contains_pci(current) {
            return Ok(Arbitration {
                verdict: Verdict::Unchanged { pci: current },
                neighborhood,
            });
        }

        let occupied = neighborhood.occupied();
        let replacement = self
            .target
            .pools
            .iter()
            .flat_map(|pool| pool.iter())
            .find(|pci| !occupied.contains(pci))
            .ok_or(PciError::PciExhausted(self.target.key()))?;

        Ok(Arbitration {
            verdict: Verdict::Reassign {
                from: current,
                to: replacement,
            },
            neighborhood,
        })
    }

    /// Bounded breadth-first walk of the target's neighborhood.
    ///
    /// Layer `n` holds the facts reached at `n` hops; only facts are
    /// expanded into the next layer. A cell reached again keeps its first
    /// hop distance, but a fact-less cell still collects the PCI of every
    /// reference to it.
    pub fn neighborhood<L: NeighborLookup>(&self, lookup: &L) -> Neighborhood {
        let root = self.target.key();
        let mut cells: BTreeMap<CellKey, InScope> = BTreeMap::new();
        let mut frontier: Vec<&CellFact> = vec![self.target];

        for hops in 1..=SEARCH_DEPTH {
            let mut next = Vec::new();
            for fact in frontier {
                for neighbor in &fact.neighbors {
                    let key = neighbor.cgi.key();
                    if key == root {
                        continue;
                    }
                    let indexed = self.global.and_then(|g| g.get(key));
                    if let Some(seen) = cells.get_mut(&key) {
                        if !seen.known && indexed.is_none() {
                            seen.pcis.insert(neighbor.pci);
                        }
                        continue;
                    }
                    let scope = match lookup.fact(key) {
                        Some(known) => {
                            next.push(known);
                            InScope {
                                hops,
                                pcis: BTreeSet::from([known.pci()]),
                                known: true,
                            }
                        }
                        None => InScope {
                            hops,
                            pcis: BTreeSet::from([indexed.unwrap_or(neighbor.pci)]),
                            known: false,
                        },
                    };
                    cells.insert(key, scope);
                }
            }
            frontier = next;
        }

        Neighborhood { cells }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cgi, NodeId, PciPool};

    fn cgi(nci: u64) -> Cgi {
        Cgi::nr(0x13F184, nci).expect("cgi")
    }

    fn cell(nci: u64, pci: u32) -> CellFact {
        CellFact::new(cgi(nci), NodeId::new("e2:1"), Pci(pci))
    }

    fn snapshot(facts: &[CellFact]) -> FactSnapshot {
        facts.iter().map(|f| (f.key(), f.clone())).collect()
    }

    #[test]
    fn no_neighbors_is_unchanged() {
        let target = cell(1, 5);
        let result = Arbitrator::new(&target)
            .arbitrate(&FactSnapshot::new())
            .expect("arbitrate");
        assert_eq!(result.verdict, Verdict::Unchanged { pci: Pci(5) });
        assert!(result.neighborhood.is_empty());
    }

    #[test]
    fn one_hop_collision_reassigns_first_fit() {
        let target = cell(1, 1)
            .with_pools(vec![PciPool::new(1, 10)])
            .with_neighbor(cgi(2), Pci(1))
            .with_neighbor(cgi(3), Pci(2));
        let result = Arbitrator::new(&target)
            .arbitrate(&FactSnapshot::new())
            .expect("arbitrate");
        assert_eq!(
            result.verdict,
            Verdict::Reassign {
                from: Pci(1),
                to: Pci(3)
            }
        );
    }

    #[test]
    fn two_hop_collision_detected() {
        // target(1) -> b(2) -> c(1)
        let b = cell(2, 2).with_neighbor(cgi(3), Pci(1));
        let target = cell(1, 1).with_neighbor(cgi(2), Pci(2));
        let result = Arbitrator::new(&target)
            .arbitrate(&snapshot(&[b]))
            .expect("arbitrate");

        assert!(result.verdict.is_change());
        assert_eq!(result.neighborhood.get(cgi(3).key()).map(|c| c.hops), Some(2));
    }

    #[test]
    fn third_hop_is_out_of_scope() {
        // target -> b -> c -> d(PCI 1); d is three hops away
        let b = cell(2, 2).with_neighbor(cgi(3), Pci(3));
        let c = cell(3, 3).with_neighbor(cgi(4), Pci(1));
        let target = cell(1, 1).with_neighbor(cgi(2), Pci(2));
        let result = Arbitrator::new(&target)
            .arbitrate(&snapshot(&[b, c]))
            .expect("arbitrate");

        assert_eq!(result.verdict, Verdict::Unchanged { pci: Pci(1) });
        assert!(result.neighborhood.get(cgi(4).key()).is_none());
    }

    #[test]
    fn target_reference_in_neighbor_list_ignored() {
        let b = cell(2, 2).with_neighbor(cgi(1), Pci(1));
        let target = cell(1, 1)
            .with_neighbor(cgi(1), Pci(1))
            .with_neighbor(cgi(2), Pci(2));
        let result = Arbitrator::new(&target)
            .arbitrate(&snapshot(&[b]))
            .expect("arbitrate");
        assert_eq!(result.verdict, Verdict::Unchanged { pci: Pci(1) });
    }

    #[test]
    fn stored_fact_overrides_reported_pci() {
        // target reports b as PCI 1 but b has since moved to 4
        let b = cell(2, 4);
        let target = cell(1, 1).with_neighbor(cgi(2), Pci(1));
        let result = Arbitrator::new(&target)
            .arbitrate(&snapshot(&[b]))
            .expect("arbitrate");
        assert_eq!(result.verdict, Verdict::Unchanged { pci: Pci(1) });
    }

    #[test]
    fn global_index_resolves_unknown_neighbor() {
        let target = cell(1, 1).with_neighbor(cgi(2), Pci(7));
        let mut index = GlobalPciIndex::new();
        index.record(cgi(2).key(), Pci(1));

        let result = Arbitrator::new(&target)
            .with_global_index(&index)
            .arbitrate(&FactSnapshot::new())
            .expect("arbitrate");
        assert!(result.verdict.is_change());
    }

    #[test]
    fn pools_scanned_in_declaration_order() {
        let target = cell(1, 25)
            .with_pools(vec![PciPool::new(20, 30), PciPool::new(1, 10)])
            .with_neighbor(cgi(2), Pci(25))
            .with_neighbor(cgi(3), Pci(20));
        let result = Arbitrator::new(&target)
            .arbitrate(&FactSnapshot::new())
            .expect("arbitrate");
        assert_eq!(
            result.verdict,
            Verdict::Reassign {
                from: Pci(25),
                to: Pci(21)
            }
        );
    }

    #[test]
    fn exhausted_pool_fails() {
        let target = cell(1, 1)
            .with_pools(vec![PciPool::new(1, 2)])
            .with_neighbor(cgi(2), Pci(1))
            .with_neighbor(cgi(3), Pci(2));
        let err = Arbitrator::new(&target)
            .arbitrate(&FactSnapshot::new())
            .expect_err("exhausted");
        assert_eq!(err, PciError::PciExhausted(target.key()));
    }

    #[test]
    fn malformed_pool_fails_before_traversal() {
        let target = cell(1, 1)
            .with_pools(vec![PciPool::new(1, 10), PciPool::new(9, 3)])
            .with_neighbor(cgi(2), Pci(1));
        let err = Arbitrator::new(&target)
            .arbitrate(&FactSnapshot::new())
            .expect_err("invalid");
        assert!(matches!(err, PciError::InvalidPool { .. }));
    }

    #[test]
    fn every_reported_pci_of_unknown_cell_is_occupied() {
        // b and c both report fact-less x, on PCI 5 and on PCI 7
        let b = cell(2, 2).with_neighbor(cgi(9), Pci(5));
        let c = cell(3, 3).with_neighbor(cgi(9), Pci(7));
        let target = cell(1, 7)
            .with_pools(vec![PciPool::new(1, 10)])
            .with_neighbor(cgi(2), Pci(2))
            .with_neighbor(cgi(3), Pci(3));
        let result = Arbitrator::new(&target)
            .arbitrate(&snapshot(&[b, c]))
            .expect("arbitrate");

        let x = result.neighborhood.get(cgi(9).key()).expect("x in scope");
        assert_eq!(x.pcis, BTreeSet::from([Pci(5), Pci(7)]));
        assert!(!x.known);
        assert_eq!(
            result.verdict,
            Verdict::Reassign {
                from: Pci(7),
                to: Pci(1)
            }
        );
    }

    #[test]
    fn repeated_reference_to_known_cell_uses_fact() {
        // both the target and b report c with a stale PCI 1
        let b = cell(2, 2).with_neighbor(cgi(3), Pci(1));
        let c = cell(3, 4);
        let target = cell(1, 1)
            .with_neighbor(cgi(2), Pci(2))
            .with_neighbor(cgi(3), Pci(1));
        let result = Arbitrator::new(&target)
            .arbitrate(&snapshot(&[b, c]))
            .expect("arbitrate");
        assert_eq!(result.verdict, Verdict::Unchanged { pci: Pci(1) });
        assert_eq!(result.neighborhood.get(cgi(3).key()).map(|s| s.hops), Some(1));
    }

    #[test]
    fn neighbor_of_other_width_is_not_the_target() {
        use crate::{CellIdentity, PlmnId};

        // NR cell 5 and E-UTRA cell 5 in one PLMN are different cells
        let plmn = PlmnId::new(0x13F184).expect("plmn");
        let eutra = Cgi::new(plmn, CellIdentity::new(5, 28).expect("eci"));
        let target = CellFact::new(cgi(5), NodeId::new("e2:1"), Pci(7))
            .with_pools(vec![PciPool::new(1, 10)])
            .with_neighbor(eutra, Pci(7));
        let result = Arbitrator::new(&target)
            .arbitrate(&FactSnapshot::new())
            .expect("arbitrate");
        assert!(result.verdict.is_change());
    }

    #[test]
    fn neighborhood_records_holders() {
        let target = cell(1, 1)
            .with_neighbor(cgi(2), Pci(1))
            .with_neighbor(cgi(3), Pci(1));
        let hood = Arbitrator::new(&target).neighborhood(&FactSnapshot::new());
        let holders: Vec<_> = hood.holders(Pci(1)).collect();
        assert_eq!(holders, vec![cgi(2).key(), cgi(3).key()]);
        assert_eq!(hood.at_hops(1).count(), 2);
    }
}

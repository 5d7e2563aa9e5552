//! # Arbitration Benchmarks
//!
//! Performance benchmarks for the store and the arbitrator.
//!
//! Run with: `cargo bench -p cellpci-core`

use cellpci_core::{Arbitrator, CellFact, Cgi, FactSnapshot, FactStore, NodeId, Pci, PciPool};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn cgi(nci: u64) -> Cgi {
    Cgi::nr(1, nci).expect("cgi")
}

/// Ring of `size` cells, each listing `degree` successors as neighbors.
/// Every cell starts on PCI `nci % 3`, so collisions are frequent.
fn create_ring(size: u64, degree: u64) -> FactSnapshot {
    let mut snapshot = FactSnapshot::new();
    for i in 0..size {
        let mut fact = CellFact::new(cgi(i), NodeId::new("bench"), Pci((i % 3) as u32 + 1))
            .with_pools(vec![PciPool::new(1, 504)]);
        for d in 1..=degree {
            let j = (i + d) % size;
            fact = fact.with_neighbor(cgi(j), Pci((j % 3) as u32 + 1));
        }
        snapshot.insert(fact.key(), fact);
    }
    snapshot
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_neighborhood(c: &mut Criterion) {
    let mut group = c.benchmark_group("neighborhood");

    for degree in [4u64, 16, 32].iter() {
        let snapshot = create_ring(1000, *degree);
        let target = snapshot.get(&cgi(0).key()).expect("cell 0 should exist").clone();

        group.bench_with_input(BenchmarkId::from_parameter(degree), degree, |b, _| {
            b.iter(|| black_box(Arbitrator::new(&target).neighborhood(&snapshot)));
        });
    }

    group.finish();
}

fn bench_arbitrate(c: &mut Criterion) {
    let mut group = c.benchmark_group("arbitrate");

    for size in [100u64, 1000, 5000].iter() {
        let snapshot = create_ring(*size, 8);
        let target = snapshot.get(&cgi(0).key()).expect("cell 0 should exist").clone();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(Arbitrator::new(&target).arbitrate(&snapshot)));
        });
    }

    group.finish();
}

fn bench_store_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_put");

    for size in [100u64, 1000].iter() {
        let facts: Vec<CellFact> = create_ring(*size, 8).into_values().collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let store = FactStore::new();
                for fact in &facts {
                    store.put(fact.key(), fact.clone());
                }
                black_box(store.len())
            });
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let store = FactStore::new();
    for fact in create_ring(5000, 8).into_values() {
        store.put(fact.key(), fact);
    }

    c.bench_function("snapshot_5000", |b| {
        b.iter(|| black_box(store.snapshot()));
    });
}

criterion_group!(
    benches,
    bench_neighborhood,
    bench_arbitrate,
    bench_store_put,
    bench_snapshot,
);

criterion_main!(benches);

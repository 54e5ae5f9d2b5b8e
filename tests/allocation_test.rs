//! Integration tests for the greedy facility allocator.

use rand::SeedableRng;
use rand::rngs::StdRng;

use covisit::{
    AllocationParams, Allocator, CovisitError, DistanceStat, GeomId, Geometry, GeometryIndex,
    Method, NoopProgress, StatsConfig, TraceStore, TravelTimeStat, VisitStats,
};

/// Cells of size 50 in a row, 1000 units apart.
fn row_index(nb_cells: usize) -> GeometryIndex {
    let cells = (0..nb_cells)
        .map(|i| Geometry::Cell {
            x: i as f64 * 1000.0,
            y: 0.0,
            size: 50.0,
        })
        .collect();
    GeometryIndex::new(cells, 100.0)
}

fn region_at(index: &GeometryIndex, x: f64, y: f64) -> GeomId {
    let hits = index.regions_at(x, y);
    assert_eq!(hits.len(), 1, "expected exactly one region at ({x}, {y})");
    hits[0]
}

fn cell_center(i: usize) -> (f64, f64) {
    (i as f64 * 1000.0 + 25.0, 25.0)
}

/// One entity bouncing between the centers of cells `from` and `to` every
/// 100 time units, 10 visits to each.
fn add_commuter(traces: &mut TraceStore, id: &str, from: usize, to: usize) {
    let (fx, fy) = cell_center(from);
    let (tx, ty) = cell_center(to);
    for i in 0..20i64 {
        let (x, y) = if i % 2 == 0 { (fx, fy) } else { (tx, ty) };
        traces.add_sample(id, i * 100, x, y);
    }
}

fn build_stats(index: &GeometryIndex, traces: &TraceStore) -> VisitStats {
    let config = StatsConfig {
        sampling: 100,
        ..Default::default()
    };
    VisitStats::build(index, traces, &config, &NoopProgress)
}

#[test]
fn test_selects_highest_combined_weight() {
    let index = row_index(2);
    let mut traces = TraceStore::new();
    add_commuter(&mut traces, "walker", 0, 1);
    let stats = build_stats(&index, &traces);
    let a = region_at(&index, 25.0, 25.0);
    let b = region_at(&index, 1025.0, 25.0);

    let params = AllocationParams {
        deadline: 150,
        nb_facilities: 1,
        ..Default::default()
    };
    let allocation = Allocator::new(&stats, &index)
        .run(&params, &NoopProgress)
        .expect("allocation runs");

    // A -> B carries 10 traversals against 9 for B -> A, so B covers more.
    assert_eq!(allocation.len(), 1);
    let winner = allocation.get(&b).expect("B is selected");
    assert_eq!(winner.rank, 0);
    assert!(winner.demands.contains_key(&a));

    let expected_weight = stats.link(a, b).map(|l| l.avg_score).unwrap_or_default();
    assert!((winner.weight - expected_weight).abs() < 1e-9);
    assert_eq!(winner.backend_weight, 0.0);
}

#[test]
fn test_deadline_excludes_slow_links() {
    let index = row_index(2);
    let mut traces = TraceStore::new();
    add_commuter(&mut traces, "walker", 0, 1);
    let stats = build_stats(&index, &traces);

    // All travel times are 100; a deadline of 50 covers nothing.
    let params = AllocationParams {
        deadline: 50,
        nb_facilities: 3,
        ..Default::default()
    };
    let allocation = Allocator::new(&stats, &index)
        .run(&params, &NoopProgress)
        .expect("allocation runs");
    assert!(allocation.is_empty());
}

#[test]
fn test_disjoint_pairs_select_both_hubs() {
    // walker commutes A <-> B, rider commutes C <-> D.
    let index = row_index(4);
    let mut traces = TraceStore::new();
    add_commuter(&mut traces, "walker", 0, 1);
    add_commuter(&mut traces, "rider", 2, 3);
    let stats = build_stats(&index, &traces);
    let a = region_at(&index, 25.0, 25.0);
    let b = region_at(&index, 1025.0, 25.0);
    let c = region_at(&index, 2025.0, 25.0);
    let d = region_at(&index, 3025.0, 25.0);

    // More rounds than useful candidates: terminates once demand runs out.
    let params = AllocationParams {
        deadline: 150,
        nb_facilities: 10,
        ..Default::default()
    };
    let allocation = Allocator::new(&stats, &index)
        .run(&params, &NoopProgress)
        .expect("allocation runs");

    assert_eq!(allocation.len(), 2);
    let first = allocation.get(&b).expect("B is selected first");
    let second = allocation.get(&d).expect("D is selected second");
    assert_eq!(first.rank, 0);
    assert_eq!(second.rank, 1);

    // Each hub covers exactly its own spoke; coverage never overlaps.
    assert_eq!(first.demands.keys().collect::<Vec<_>>(), vec![&a]);
    assert_eq!(second.demands.keys().collect::<Vec<_>>(), vec![&c]);
}

#[test]
fn test_distance_exclusion_soundness() {
    // Two spokes feeding the middle cell B.
    let index = row_index(3);
    let mut traces = TraceStore::new();
    add_commuter(&mut traces, "walker", 0, 1);
    add_commuter(&mut traces, "rider", 2, 1);
    let stats = build_stats(&index, &traces);
    let a = region_at(&index, 25.0, 25.0);
    let b = region_at(&index, 1025.0, 25.0);
    let c = region_at(&index, 2025.0, 25.0);

    let params = AllocationParams {
        deadline: 150,
        nb_facilities: 3,
        d_stat: DistanceStat::Fixed,
        distance: Some(1200.0),
        ..Default::default()
    };
    let allocation = Allocator::new(&stats, &index)
        .run(&params, &NoopProgress)
        .expect("allocation runs");

    let winner = allocation.get(&b).expect("the hub is selected");
    assert_eq!(winner.deleted_candidates, [a, c].into_iter().collect());

    // Everything excluded genuinely satisfies the distance predicate.
    let geoms = index.geometries();
    let reference = geoms.get(b).expect("winner geometry");
    for &g in &winner.deleted_candidates {
        let excluded = geoms.get(g).expect("excluded geometry");
        assert!(excluded.distance(reference) <= 1200.0);
    }
}

#[test]
fn test_distance_exclusion_respects_ceiling() {
    let index = row_index(3);
    let mut traces = TraceStore::new();
    add_commuter(&mut traces, "walker", 0, 1);
    add_commuter(&mut traces, "rider", 2, 1);
    let stats = build_stats(&index, &traces);
    let b = region_at(&index, 1025.0, 25.0);

    // Spokes are 1000 units from the hub; a ceiling of 800 excludes nothing.
    let params = AllocationParams {
        deadline: 150,
        nb_facilities: 1,
        d_stat: DistanceStat::Fixed,
        distance: Some(800.0),
        ..Default::default()
    };
    let allocation = Allocator::new(&stats, &index)
        .run(&params, &NoopProgress)
        .expect("allocation runs");

    let winner = allocation.get(&b).expect("the hub is selected");
    assert!(winner.deleted_candidates.is_empty());
}

#[test]
fn test_travel_time_exclusion() {
    let index = row_index(3);
    let mut traces = TraceStore::new();
    add_commuter(&mut traces, "walker", 0, 1);
    add_commuter(&mut traces, "rider", 2, 1);
    let stats = build_stats(&index, &traces);
    let a = region_at(&index, 25.0, 25.0);
    let b = region_at(&index, 1025.0, 25.0);
    let c = region_at(&index, 2025.0, 25.0);

    // Median travel time from both spokes to the hub is 100.
    let params = AllocationParams {
        deadline: 150,
        nb_facilities: 3,
        tt_stat: TravelTimeStat::Median,
        travel_time: Some(150.0),
        ..Default::default()
    };
    let allocation = Allocator::new(&stats, &index)
        .run(&params, &NoopProgress)
        .expect("allocation runs");

    let winner = allocation.get(&b).expect("the hub is selected");
    assert_eq!(winner.deleted_candidates, [a, c].into_iter().collect());
}

#[test]
fn test_unsupported_methods() {
    let index = row_index(2);
    let mut traces = TraceStore::new();
    add_commuter(&mut traces, "walker", 0, 1);
    let stats = build_stats(&index, &traces);
    let allocator = Allocator::new(&stats, &index);

    for method in [Method::PageRank, Method::KMeans] {
        let params = AllocationParams {
            method: method.clone(),
            ..Default::default()
        };
        let err = allocator
            .run(&params, &NoopProgress)
            .expect_err("method is unsupported");
        assert!(matches!(err, CovisitError::UnsupportedMethod { .. }));
    }
}

#[test]
fn test_empty_model_is_rejected() {
    let index = row_index(2);
    let stats = build_stats(&index, &TraceStore::new());
    let allocator = Allocator::new(&stats, &index);

    let err = allocator
        .run(&AllocationParams::default(), &NoopProgress)
        .expect_err("nothing to allocate over");
    assert!(matches!(err, CovisitError::EmptyModel));
}

#[test]
fn test_random_allocation_is_seeded() {
    let index = row_index(4);
    let mut traces = TraceStore::new();
    add_commuter(&mut traces, "walker", 0, 1);
    add_commuter(&mut traces, "rider", 2, 3);
    let stats = build_stats(&index, &traces);
    let allocator = Allocator::new(&stats, &index);

    let first = allocator
        .run_random(2, &mut StdRng::seed_from_u64(7))
        .expect("random allocation runs");
    let second = allocator
        .run_random(2, &mut StdRng::seed_from_u64(7))
        .expect("random allocation runs");

    assert_eq!(first.len(), 2);
    assert_eq!(
        first.keys().collect::<Vec<_>>(),
        second.keys().collect::<Vec<_>>()
    );
    for alloc in first.values() {
        assert_eq!(alloc.weight, 1.0);
        assert_eq!(alloc.backend_weight, 0.0);
        assert!(alloc.demands.is_empty());
    }
}

#[test]
fn test_random_allocation_exhausts_pool() {
    let index = row_index(2);
    let mut traces = TraceStore::new();
    add_commuter(&mut traces, "walker", 0, 1);
    let stats = build_stats(&index, &traces);

    // More facilities than visited regions: returns every region once.
    let allocation = Allocator::new(&stats, &index)
        .run_random(10, &mut StdRng::seed_from_u64(1))
        .expect("random allocation runs");
    assert_eq!(allocation.len(), 2);
}

#[test]
fn test_sites_are_rank_ordered() {
    let index = row_index(4);
    let mut traces = TraceStore::new();
    add_commuter(&mut traces, "walker", 0, 1);
    add_commuter(&mut traces, "rider", 2, 3);
    let stats = build_stats(&index, &traces);
    let allocator = Allocator::new(&stats, &index);

    let params = AllocationParams {
        deadline: 150,
        nb_facilities: 2,
        ..Default::default()
    };
    let allocation = allocator.run(&params, &NoopProgress).expect("allocation runs");
    let sites = allocator.sites(&allocation);

    assert_eq!(sites.len(), 2);
    assert_eq!(sites[0].rank, 0);
    assert_eq!(sites[1].rank, 1);
    // Rank 0 is the A <-> B hub at x = 1025.
    assert!((sites[0].x - 1025.0).abs() < 1e-9);
    assert_eq!(sites[0].nb_allocated, 1);
    assert_eq!(sites[0].nb_deleted, 0);
}

//! Co-visitation statistics over mobility traces.
//!
//! [`VisitStats::build`] replays every entity's trace into visit intervals,
//! then derives per-region aggregates ([`RegionStats`]) and per-ordered-pair
//! aggregates ([`LinkStats`]): how often a region is visited, how long
//! entities take to travel from one region to the next, and how regular the
//! returns are. The allocator consumes these aggregates as demand and
//! synergy weights.
//!
//! The build runs as one batch pass and reports fractional progress; the
//! finished model is immutable and safe to share across threads.

use std::collections::{BTreeMap, BTreeSet};

use log::info;

use crate::distribution::Distribution;
use crate::geometry::GeomId;
use crate::index::GeometryIndex;
use crate::progress::ProgressSink;
use crate::trace::{MobileNode, TraceStore, VisitMap};

/// Configuration for a statistics build.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Interpolation cadence for trace ingestion, in time units.
    pub sampling: i64,
    /// Ignore samples before this timestamp.
    pub start_time: Option<i64>,
    /// Ignore samples after this timestamp.
    pub end_time: Option<i64>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            sampling: 1,
            start_time: None,
            end_time: None,
        }
    }
}

/// Aggregate statistics for one region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionStats {
    /// Visit intervals, start time → end times (one entry per occasion).
    pub visits: BTreeMap<i64, Vec<i64>>,
    /// Start timestamp of every visit occasion, in recording order.
    pub visit_frequency: Vec<i64>,
    /// Durations between consecutive visit starts.
    pub inter_visit: Distribution,
    /// Rounded average travel times of incoming reverse links.
    pub travel_times: Distribution,
    /// Entities that visited the region.
    pub nodes: BTreeSet<String>,
    /// Number of regions with flow in both directions to this one.
    pub connections: u32,
    /// Sum of incoming link scores (median variant).
    pub med_incoming_score: f64,
    /// Sum of incoming link scores (average variant).
    pub avg_incoming_score: f64,
    /// Visits per unit of median inter-visit duration.
    pub med_score: f64,
    /// Visits per unit of average inter-visit duration.
    pub avg_score: f64,
}

impl RegionStats {
    /// Total number of visit occasions.
    pub fn visit_count(&self) -> usize {
        self.visits.values().map(Vec::len).sum()
    }
}

/// Aggregate statistics for one ordered pair of regions.
///
/// A link `A → B` exists when some entity visited `A` and later visited `B`
/// before returning to `A`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkStats {
    /// Time from the source visit start to the destination visit start.
    pub travel_time: Distribution,
    /// Durations between consecutive source-occasion starts on this link.
    pub inter_visit: Distribution,
    /// Start timestamp of every source occasion that used the link.
    pub visit_frequency: Vec<i64>,
    /// Source visit intervals, start time → end times.
    pub visits: BTreeMap<i64, Vec<i64>>,
    /// Entities that traversed the link.
    pub nodes: BTreeSet<String>,
    /// Traversals per unit of median inter-visit duration.
    pub med_score: f64,
    /// Traversals per unit of average inter-visit duration.
    pub avg_score: f64,
}

impl LinkStats {
    /// Total number of recorded traversals.
    pub fn visit_count(&self) -> usize {
        self.visits.values().map(Vec::len).sum()
    }
}

/// The built co-visitation model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitStats {
    regions: BTreeMap<GeomId, RegionStats>,
    links: BTreeMap<GeomId, BTreeMap<GeomId, LinkStats>>,
    average_speed: f64,
}

impl VisitStats {
    /// Build the model from every entity's trace.
    ///
    /// Runs to completion as a single batch task, pushing fractional progress
    /// through `progress`.
    pub fn build(
        index: &GeometryIndex,
        traces: &TraceStore,
        config: &StatsConfig,
        progress: &dyn ProgressSink,
    ) -> Self {
        progress.report(0.0, "Populating mobile nodes");
        let visit_maps = populate_nodes(index, traces, config, progress);

        let mut stats = VisitStats {
            average_speed: traces.average_speed(),
            ..Default::default()
        };

        let message = format!("Computing visit matrix ({} nodes)", visit_maps.len());
        progress.report(0.1, &message);
        info!("{message}");

        let nb_nodes = visit_maps.len().max(1);
        for (done, (node_id, visit_map)) in visit_maps.iter().enumerate() {
            stats.record_node(node_id, visit_map);
            progress.report(
                0.1 + 0.4 * (done + 1) as f64 / nb_nodes as f64,
                &message,
            );
        }

        info!(
            "visit matrix: {} regions, {} link sources",
            stats.regions.len(),
            stats.links.len()
        );

        progress.report(0.5, "Computing inter-visit durations (regions)");
        stats.compute_region_intervals();

        progress.report(0.66, "Computing inter-visit durations (links)");
        stats.compute_link_intervals();

        progress.report(0.82, "Computing scores");
        stats.compute_scores();

        progress.report(1.0, "Done");
        stats
    }

    /// Aggregates for one region, `None` if it was never visited.
    pub fn region(&self, geom: GeomId) -> Option<&RegionStats> {
        self.regions.get(&geom)
    }

    /// Aggregates for the ordered pair `from → to`, `None` if no entity ever
    /// made that trip.
    pub fn link(&self, from: GeomId, to: GeomId) -> Option<&LinkStats> {
        self.links.get(&from).and_then(|m| m.get(&to))
    }

    /// Visited regions in handle order.
    pub fn regions(&self) -> impl Iterator<Item = (GeomId, &RegionStats)> {
        self.regions.iter().map(|(&id, stats)| (id, stats))
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Mean entity speed observed in the traces, used by the automatic
    /// exclusion-distance policy.
    pub fn average_speed(&self) -> f64 {
        self.average_speed
    }

    /// Record every visit occasion of one entity and the ordered region
    /// pairs it induces.
    fn record_node(&mut self, node_id: &str, visit_map: &VisitMap) {
        for (&start1, regions1) in visit_map {
            for (&geom1, &end1) in regions1 {
                let region = self.regions.entry(geom1).or_default();
                region.visits.entry(start1).or_default().push(end1);
                region.visit_frequency.push(start1);
                region.nodes.insert(node_id.to_string());

                // Scan the later occasions of the same entity. The scan for
                // this occasion ends once the entity returns to the region it
                // started from; each destination counts at most once.
                let mut seen = BTreeSet::new();
                'scan: for (&start2, regions2) in
                    visit_map.range(start1 + 1..)
                {
                    for &geom2 in regions2.keys() {
                        if geom2 == geom1 {
                            break 'scan;
                        }
                        if !seen.insert(geom2) {
                            continue;
                        }
                        let link = self
                            .links
                            .entry(geom1)
                            .or_default()
                            .entry(geom2)
                            .or_default();
                        link.travel_time.add_value((start2 - start1).max(0));
                        link.visit_frequency.push(start1);
                        link.visits.entry(start1).or_default().push(end1);
                        link.nodes.insert(node_id.to_string());
                    }
                }
            }
        }
    }

    fn compute_region_intervals(&mut self) {
        for region in self.regions.values_mut() {
            let RegionStats {
                visits, inter_visit, ..
            } = region;
            add_start_intervals(visits, inter_visit);
        }
    }

    /// Link inter-visit durations, plus the bidirectional-flow counters: a
    /// region gains a connection (and a travel-time sample) for every link
    /// whose reverse also exists.
    fn compute_link_intervals(&mut self) {
        let sources: Vec<GeomId> = self.links.keys().copied().collect();
        for &geom1 in &sources {
            let destinations: Vec<GeomId> = match self.links.get(&geom1) {
                Some(m) => m.keys().copied().collect(),
                None => continue,
            };
            for geom2 in destinations {
                if let Some(link) = self.links.get_mut(&geom1).and_then(|m| m.get_mut(&geom2)) {
                    let LinkStats {
                        visits, inter_visit, ..
                    } = link;
                    add_start_intervals(visits, inter_visit);
                }
                let reverse_avg = self
                    .links
                    .get(&geom2)
                    .and_then(|m| m.get(&geom1))
                    .map(|link| link.travel_time.average());
                if let Some(avg) = reverse_avg {
                    if let Some(region) = self.regions.get_mut(&geom2) {
                        region.connections += 1;
                        region.travel_times.add_value(avg.ceil() as i64);
                    }
                }
            }
        }
    }

    /// Per-region and per-link scores, with link scores accumulated into the
    /// destination region's incoming totals. Divisors are floored at 1.0 so a
    /// region or link with a degenerate inter-visit distribution yields a
    /// finite score.
    fn compute_scores(&mut self) {
        for region in self.regions.values_mut() {
            let count = region.visit_count() as f64;
            region.med_score = count / region.inter_visit.median().max(1.0);
            region.avg_score = count / region.inter_visit.average().max(1.0);
        }

        let sources: Vec<GeomId> = self.links.keys().copied().collect();
        for &geom1 in &sources {
            let destinations: Vec<GeomId> = match self.links.get(&geom1) {
                Some(m) => m.keys().copied().collect(),
                None => continue,
            };
            for geom2 in destinations {
                let scores = self
                    .links
                    .get_mut(&geom1)
                    .and_then(|m| m.get_mut(&geom2))
                    .map(|link| {
                        let count = link.visit_count() as f64;
                        link.med_score = count / link.inter_visit.median().max(1.0);
                        link.avg_score = count / link.inter_visit.average().max(1.0);
                        (link.med_score, link.avg_score)
                    });
                if let Some((med, avg)) = scores {
                    if let Some(region) = self.regions.get_mut(&geom2) {
                        region.med_incoming_score += med;
                        region.avg_incoming_score += avg;
                    }
                }
            }
        }
    }
}

/// Difference consecutive visit starts into a distribution.
///
/// The walk is seeded with the first start time, so the first occasion
/// contributes a zero-length sample. The scores downstream are calibrated
/// against that baseline; see DESIGN.md before changing it.
fn add_start_intervals(visits: &BTreeMap<i64, Vec<i64>>, dist: &mut Distribution) {
    let mut prev_start = match visits.keys().next() {
        Some(&first) => first,
        None => return,
    };
    for (&start, ends) in visits {
        for _ in ends {
            dist.add_value(start - prev_start);
            prev_start = start;
        }
    }
}

/// Replay every entity's samples into visit intervals, honoring the
/// configured time window.
#[cfg(not(feature = "parallel"))]
fn populate_nodes(
    index: &GeometryIndex,
    traces: &TraceStore,
    config: &StatsConfig,
    progress: &dyn ProgressSink,
) -> BTreeMap<String, VisitMap> {
    let total = traces.len().max(1);
    let mut maps = BTreeMap::new();
    for (done, (node_id, samples)) in traces.nodes().enumerate() {
        maps.insert(node_id.clone(), ingest_node(index, samples, config));
        progress.report(
            0.1 * (done + 1) as f64 / total as f64,
            "Populating mobile nodes",
        );
    }
    maps
}

/// Replay every entity's samples into visit intervals, honoring the
/// configured time window. Entities are independent, so they are ingested in
/// parallel.
#[cfg(feature = "parallel")]
fn populate_nodes(
    index: &GeometryIndex,
    traces: &TraceStore,
    config: &StatsConfig,
    progress: &dyn ProgressSink,
) -> BTreeMap<String, VisitMap> {
    use rayon::prelude::*;

    let nodes: Vec<_> = traces.nodes().collect();
    let maps = nodes
        .par_iter()
        .map(|(node_id, samples)| ((*node_id).clone(), ingest_node(index, samples, config)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect();
    progress.report(0.1, "Populating mobile nodes");
    maps
}

fn ingest_node(
    index: &GeometryIndex,
    samples: &BTreeMap<i64, (f64, f64)>,
    config: &StatsConfig,
) -> VisitMap {
    let mut node = MobileNode::new(config.sampling);
    for (&time, &(x, y)) in samples {
        if let Some(start) = config.start_time {
            if time < start {
                continue;
            }
        }
        if let Some(end) = config.end_time {
            if time > end {
                break;
            }
        }
        node.add_position(index, time, x, y);
    }
    node.into_visits()
}

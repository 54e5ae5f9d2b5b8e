//! Mobility trace storage and per-entity visit extraction.
//!
//! A [`TraceStore`] holds the raw, irregularly-sampled position timeline of
//! every mobile entity. A [`MobileNode`] replays one entity's timeline
//! against a [`GeometryIndex`] and turns it into closed visit intervals per
//! region, interpolating between raw samples at a fixed cadence and starting
//! a fresh recording whenever the timeline gaps.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::geometry::{Bounds, GeomId};
use crate::index::GeometryIndex;

/// Gap between consecutive raw samples beyond which a new visit recording
/// starts, in trace time units.
pub const MAX_SAMPLE_GAP: i64 = 300;

/// Per-entity visit intervals: start time → region → end time.
pub type VisitMap = BTreeMap<i64, BTreeMap<GeomId, i64>>;

/// Raw position samples for a set of mobile entities.
///
/// Samples are planar coordinates, already reprojected by the caller, keyed
/// by timestamp; adding a sample with an existing timestamp overwrites it.
#[derive(Debug, Clone, Default)]
pub struct TraceStore {
    nodes: BTreeMap<String, BTreeMap<i64, (f64, f64)>>,
}

impl TraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one `(timestamp, x, y)` sample for an entity.
    pub fn add_sample(&mut self, node_id: &str, time: i64, x: f64, y: f64) {
        self.nodes
            .entry(node_id.to_string())
            .or_default()
            .insert(time, (x, y));
    }

    /// Number of entities with at least one sample.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Entities and their time-ordered samples.
    pub fn nodes(&self) -> impl Iterator<Item = (&String, &BTreeMap<i64, (f64, f64)>)> {
        self.nodes.iter()
    }

    /// Bounding box of every recorded sample, `None` when empty.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        for samples in self.nodes.values() {
            for &(x, y) in samples.values() {
                match bounds.as_mut() {
                    Some(b) => b.extend(x, y),
                    None => bounds = Some(Bounds::new(x, x, y, y)),
                }
            }
        }
        bounds
    }

    /// Mean speed over all entities, in coordinate units per time unit.
    ///
    /// Each entity contributes the mean of its consecutive-sample segment
    /// speeds; entities with fewer than two samples (or no positive time
    /// deltas) contribute nothing.
    pub fn average_speed(&self) -> f64 {
        let mut node_means = Vec::new();
        for samples in self.nodes.values() {
            let mut sum = 0.0;
            let mut count = 0u64;
            let mut iter = samples.iter();
            if let Some((&t0, &(x0, y0))) = iter.next() {
                let (mut prev_t, mut prev_x, mut prev_y) = (t0, x0, y0);
                for (&t, &(x, y)) in iter {
                    let dt = t - prev_t;
                    if dt > 0 {
                        let distance =
                            crate::geometry::euclidean_distance(prev_x, prev_y, x, y);
                        sum += distance / dt as f64;
                        count += 1;
                    }
                    prev_t = t;
                    prev_x = x;
                    prev_y = y;
                }
            }
            if count > 0 {
                node_means.push(sum / count as f64);
            }
        }
        if node_means.is_empty() {
            0.0
        } else {
            node_means.iter().sum::<f64>() / node_means.len() as f64
        }
    }
}

/// Converts one entity's position timeline into visit intervals.
///
/// Positions must be fed in increasing timestamp order. The first sample, or
/// any sample arriving more than [`MAX_SAMPLE_GAP`] after its predecessor,
/// restarts the recording: every region containing the sample opens a fresh
/// degenerate interval. Otherwise the segment to the previous sample is
/// resampled linearly at the configured cadence; each intermediate point
/// opens intervals for newly-entered regions and extends the open interval of
/// regions that stayed occupied.
#[derive(Debug)]
pub struct MobileNode {
    sampling: i64,
    prev: Option<(i64, f64, f64)>,
    prev_regions: BTreeSet<GeomId>,
    start_times: HashMap<GeomId, i64>,
    visits: VisitMap,
}

impl MobileNode {
    /// Create an ingestor interpolating at the given cadence (time units).
    pub fn new(sampling: i64) -> Self {
        Self {
            sampling: sampling.max(1),
            prev: None,
            prev_regions: BTreeSet::new(),
            start_times: HashMap::new(),
            visits: VisitMap::new(),
        }
    }

    /// Feed the next raw sample.
    pub fn add_position(&mut self, index: &GeometryIndex, time: i64, x: f64, y: f64) {
        match self.prev {
            None => self.restart(index, time, x, y),
            Some((prev_time, _, _)) if time - prev_time > MAX_SAMPLE_GAP => {
                self.restart(index, time, x, y)
            }
            Some((prev_time, _, _)) if time <= prev_time => {
                // duplicate or out-of-order timestamp: position update only
            }
            Some((prev_time, prev_x, prev_y)) => {
                let dt = time - prev_time;
                let steps = ((dt as f64) / self.sampling as f64).ceil() as i64;
                for i in 1..=steps.max(1) {
                    let t = (prev_time + i * self.sampling).min(time);
                    let w = (t - prev_time) as f64 / dt as f64;
                    let ix = prev_x + (x - prev_x) * w;
                    let iy = prev_y + (y - prev_y) * w;
                    self.step(index, t, ix, iy);
                }
            }
        }
        self.prev = Some((time, x, y));
    }

    /// Consume the ingestor, returning the recorded visit intervals.
    pub fn into_visits(self) -> VisitMap {
        self.visits
    }

    pub fn visits(&self) -> &VisitMap {
        &self.visits
    }

    fn restart(&mut self, index: &GeometryIndex, time: i64, x: f64, y: f64) {
        self.start_times.clear();
        let here: BTreeSet<GeomId> = index.regions_at(x, y).into_iter().collect();
        for &geom in &here {
            self.start_times.insert(geom, time);
            self.visits.entry(time).or_default().insert(geom, time);
        }
        self.prev_regions = here;
    }

    fn step(&mut self, index: &GeometryIndex, t: i64, x: f64, y: f64) {
        let here: BTreeSet<GeomId> = index.regions_at(x, y).into_iter().collect();

        for &geom in here.difference(&self.prev_regions) {
            self.start_times.insert(geom, t);
            self.visits.entry(t).or_default().insert(geom, t);
        }
        for &geom in here.intersection(&self.prev_regions) {
            if let Some(&start) = self.start_times.get(&geom) {
                if let Some(intervals) = self.visits.get_mut(&start) {
                    intervals.insert(geom, t);
                }
            }
        }
        self.prev_regions = here;
    }
}

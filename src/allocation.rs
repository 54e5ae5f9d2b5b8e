//! Greedy maximum-coverage facility location over a co-visitation model.
//!
//! The allocator repeatedly picks the candidate region that covers the most
//! uncovered demand within a travel-time deadline, keeps a bounded shortlist
//! of the best candidates per round, lets synergy with already-chosen
//! facilities arbitrate among the shortlisted candidates, excludes candidates
//! too close to each winner, and finishes every round with a single
//! substitution pass that may swap an earlier facility for a better site.
//!
//! This is a heuristic: no optimality is claimed, and a round in which no
//! candidate covers anything simply selects nothing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{CovisitError, Result};
use crate::geometry::GeomId;
use crate::index::GeometryIndex;
use crate::progress::ProgressSink;
use crate::stats::VisitStats;

/// Number of candidates retained in the per-round shortlist.
pub const SHORTLIST_SIZE: usize = 5;

/// Which travel-time statistic the exclusion predicate compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelTimeStat {
    /// Travel time plays no part in exclusion.
    None,
    Median,
    Average,
}

/// How the exclusion distance ceiling is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceStat {
    /// Distance plays no part in exclusion.
    None,
    /// Derived from the traces' average speed and the deadline.
    Auto,
    /// Fixed value supplied by the caller.
    Fixed,
}

/// Allocation method selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    LocationAllocation,
    PageRank,
    KMeans,
    Random,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::LocationAllocation => "location-allocation",
            Method::PageRank => "page-rank",
            Method::KMeans => "k-means",
            Method::Random => "random",
        };
        f.write_str(name)
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "loc" | "location-allocation" | "location_allocation" => {
                Ok(Method::LocationAllocation)
            }
            "pgrk" | "page-rank" | "pagerank" => Ok(Method::PageRank),
            "kmeans" | "k-means" => Ok(Method::KMeans),
            "rnd" | "random" => Ok(Method::Random),
            other => Err(format!("unknown allocation method {other:?}")),
        }
    }
}

/// Parameters of one allocation run.
#[derive(Debug, Clone)]
pub struct AllocationParams {
    /// Maximum median travel time for a demand to count as covered.
    pub deadline: i64,
    /// Number of facilities to select.
    pub nb_facilities: usize,
    /// Scale factor for the derived exclusion ceilings.
    pub del_factor: f64,
    /// Travel-time exclusion policy.
    pub tt_stat: TravelTimeStat,
    /// Fixed travel-time ceiling; when absent the ceiling is
    /// `del_factor * deadline`.
    pub travel_time: Option<f64>,
    /// Distance exclusion policy.
    pub d_stat: DistanceStat,
    /// Fixed distance ceiling, used with [`DistanceStat::Fixed`].
    pub distance: Option<f64>,
    /// Algorithm to run.
    pub method: Method,
}

impl Default for AllocationParams {
    fn default() -> Self {
        Self {
            deadline: 3600,
            nb_facilities: 1,
            del_factor: 1.0,
            tt_stat: TravelTimeStat::None,
            travel_time: None,
            d_stat: DistanceStat::None,
            distance: None,
            method: Method::LocationAllocation,
        }
    }
}

/// One selected facility.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// The selected region.
    pub geom: GeomId,
    /// Demand coverage weight at selection (or after substitution).
    pub weight: f64,
    /// Synergy weight with the facilities chosen before this one.
    pub backend_weight: f64,
    /// Sum of the region's incoming link scores.
    pub incoming_weight: f64,
    /// Selection round, 0-based.
    pub rank: usize,
    /// Demand regions this facility covers, with their weights.
    pub demands: BTreeMap<GeomId, f64>,
    /// Candidates excluded for being within the exclusion criterion.
    pub deleted_candidates: BTreeSet<GeomId>,
}

/// Flat, serializable summary of one allocation, as rendered by external
/// network layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationSite {
    pub x: f64,
    pub y: f64,
    pub weight: f64,
    pub nb_allocated: usize,
    pub nb_deleted: usize,
    pub rank: usize,
}

/// Per-round candidate evaluation.
#[derive(Debug, Clone)]
struct CandidateScore {
    geom: GeomId,
    coverage: f64,
    backend: f64,
    incoming: f64,
    demands: BTreeMap<GeomId, f64>,
}

impl CandidateScore {
    fn total(&self) -> f64 {
        self.backend + self.coverage
    }
}

/// Facility-location solver borrowing a built model and its index.
pub struct Allocator<'a> {
    stats: &'a VisitStats,
    index: &'a GeometryIndex,
}

impl<'a> Allocator<'a> {
    pub fn new(stats: &'a VisitStats, index: &'a GeometryIndex) -> Self {
        Self { stats, index }
    }

    /// Run the method selected in `params`.
    ///
    /// `PageRank` and `KMeans` are parameter-surface placeholders and return
    /// [`CovisitError::UnsupportedMethod`].
    pub fn run(
        &self,
        params: &AllocationParams,
        progress: &dyn ProgressSink,
    ) -> Result<BTreeMap<GeomId, Allocation>> {
        match params.method {
            Method::LocationAllocation => self.run_location_allocation(params, progress),
            Method::Random => {
                let mut rng = StdRng::from_entropy();
                self.run_random(params.nb_facilities, &mut rng)
            }
            Method::PageRank | Method::KMeans => Err(CovisitError::UnsupportedMethod {
                method: params.method.to_string(),
            }),
        }
    }

    /// Greedy maximum-coverage selection with exclusion and substitution.
    pub fn run_location_allocation(
        &self,
        params: &AllocationParams,
        progress: &dyn ProgressSink,
    ) -> Result<BTreeMap<GeomId, Allocation>> {
        if self.stats.is_empty() {
            return Err(CovisitError::EmptyModel);
        }

        progress.report(0.0, "Initialization");

        let (max_travel_time, max_distance) = self.exclusion_ceilings(params);
        debug!(
            "location allocation: {} facilities, deadline {}, max travel time {max_travel_time}, max distance {max_distance}",
            params.nb_facilities, params.deadline
        );

        // Candidate sites are the circle regions when any were supplied,
        // otherwise the cells; the demand universe is always the cells.
        let mut cells = BTreeSet::new();
        let mut circles = BTreeSet::new();
        for (id, _) in self.stats.regions() {
            match self.index.geometries().get(id) {
                Some(g) if g.is_cell() => {
                    cells.insert(id);
                }
                Some(g) if g.is_circle() => {
                    circles.insert(id);
                }
                _ => {}
            }
        }
        let mut candidates_to_allocate = if circles.is_empty() {
            cells.clone()
        } else {
            circles
        };
        let mut demands_to_cover = cells;

        let mut allocations: Vec<Allocation> = Vec::new();

        for round in 0..params.nb_facilities {
            if demands_to_cover.is_empty() || candidates_to_allocate.is_empty() {
                break;
            }
            progress.report(
                round as f64 / params.nb_facilities as f64,
                &format!("Allocating facility {round}"),
            );

            let chosen: Vec<GeomId> = allocations.iter().map(|a| a.geom).collect();
            let mut shortlist: Vec<CandidateScore> = Vec::new();
            for &k in &candidates_to_allocate {
                let backend = self.backend_weight(&chosen, None, k);
                let (coverage, demands) =
                    self.coverage_weight(k, &demands_to_cover, params.deadline);
                if coverage > 0.0 {
                    let incoming = self
                        .stats
                        .region(k)
                        .map(|r| r.avg_incoming_score)
                        .unwrap_or(0.0);
                    update_shortlist(
                        &mut shortlist,
                        CandidateScore {
                            geom: k,
                            coverage,
                            backend,
                            incoming,
                            demands,
                        },
                    );
                }
            }

            // Nothing covers any remaining demand: select nothing this round.
            let Some(winner) = pick_winner(shortlist) else {
                continue;
            };

            candidates_to_allocate.remove(&winner.geom);
            demands_to_cover.remove(&winner.geom);

            let deleted = self.geom_within(
                &candidates_to_allocate,
                winner.geom,
                max_distance,
                max_travel_time,
                params.d_stat,
                params.tt_stat,
            );
            for g in &deleted {
                candidates_to_allocate.remove(g);
            }
            for l in winner.demands.keys() {
                demands_to_cover.remove(l);
            }

            info!(
                "facility {round}: region {:?} coverage {:.4} backend {:.4}, {} demands covered, {} candidates excluded",
                winner.geom,
                winner.coverage,
                winner.backend,
                winner.demands.len(),
                deleted.len()
            );

            allocations.push(Allocation {
                geom: winner.geom,
                weight: winner.coverage,
                backend_weight: winner.backend,
                incoming_weight: winner.incoming,
                rank: round,
                demands: winner.demands,
                deleted_candidates: deleted,
            });

            self.substitute(
                &mut allocations,
                &mut candidates_to_allocate,
                &demands_to_cover,
                params,
                max_distance,
                max_travel_time,
            );
        }

        progress.report(1.0, "Done");
        Ok(allocations.into_iter().map(|a| (a.geom, a)).collect())
    }

    /// Uniform random baseline: `nb_facilities` distinct regions, weight 1.0,
    /// no backend weight.
    pub fn run_random<R: Rng>(
        &self,
        nb_facilities: usize,
        rng: &mut R,
    ) -> Result<BTreeMap<GeomId, Allocation>> {
        if self.stats.is_empty() {
            return Err(CovisitError::EmptyModel);
        }
        let mut pool: Vec<GeomId> = self.stats.regions().map(|(id, _)| id).collect();
        let mut result = BTreeMap::new();
        for rank in 0..nb_facilities {
            if pool.is_empty() {
                break;
            }
            let idx = rng.gen_range(0..pool.len());
            let geom = pool.swap_remove(idx);
            result.insert(
                geom,
                Allocation {
                    geom,
                    weight: 1.0,
                    backend_weight: 0.0,
                    incoming_weight: 0.0,
                    rank,
                    demands: BTreeMap::new(),
                    deleted_candidates: BTreeSet::new(),
                },
            );
        }
        Ok(result)
    }

    /// Flatten an allocation result into serializable site records, ordered
    /// by rank.
    pub fn sites(&self, allocation: &BTreeMap<GeomId, Allocation>) -> Vec<AllocationSite> {
        let mut sites: Vec<AllocationSite> = allocation
            .values()
            .filter_map(|a| {
                let (x, y) = self.index.geometries().get(a.geom)?.center();
                Some(AllocationSite {
                    x,
                    y,
                    weight: a.weight,
                    nb_allocated: a.demands.len(),
                    nb_deleted: a.deleted_candidates.len(),
                    rank: a.rank,
                })
            })
            .collect();
        sites.sort_by_key(|s| s.rank);
        sites
    }

    /// Effective exclusion ceilings for the configured policies.
    fn exclusion_ceilings(&self, params: &AllocationParams) -> (f64, f64) {
        let max_travel_time = match params.tt_stat {
            TravelTimeStat::None => 0.0,
            _ => params
                .travel_time
                .unwrap_or(params.del_factor * params.deadline as f64),
        };
        let max_distance = match params.d_stat {
            DistanceStat::None => 0.0,
            DistanceStat::Fixed => params.distance.unwrap_or(0.0),
            DistanceStat::Auto => {
                params.del_factor * self.stats.average_speed() * params.deadline as f64
            }
        };
        (max_travel_time, max_distance)
    }

    /// Synergy between candidate `k` and the chosen facilities: the link
    /// scores in both directions, counted only when the link saw more than
    /// one traversal. `skip` leaves one chosen facility out (the slot being
    /// replaced during substitution).
    fn backend_weight(&self, chosen: &[GeomId], skip: Option<GeomId>, k: GeomId) -> f64 {
        let mut weight = 0.0;
        for &c in chosen {
            if Some(c) == skip {
                continue;
            }
            if let Some(link) = self.stats.link(c, k) {
                if link.visit_count() > 1 {
                    weight += link.avg_score;
                }
            }
            if let Some(link) = self.stats.link(k, c) {
                if link.visit_count() > 1 {
                    weight += link.avg_score;
                }
            }
        }
        weight
    }

    /// Demand coverage of candidate `k`: a demand `l` is covered when the
    /// link `l → k` exists, its median travel time meets the deadline, and it
    /// saw more than one traversal; the contribution is the link's average
    /// score.
    fn coverage_weight(
        &self,
        k: GeomId,
        demands: &BTreeSet<GeomId>,
        deadline: i64,
    ) -> (f64, BTreeMap<GeomId, f64>) {
        let mut coverage = 0.0;
        let mut covered = BTreeMap::new();
        for &l in demands {
            if let Some(link) = self.stats.link(l, k) {
                if link.travel_time.median() <= deadline as f64 && link.visit_count() > 1 {
                    coverage += link.avg_score;
                    covered.insert(l, link.avg_score);
                }
            }
        }
        (coverage, covered)
    }

    /// Candidates within the exclusion criterion of `reference`.
    ///
    /// A candidate is excluded when either active test passes: centroid
    /// distance at most `max_distance`, or the candidate → reference link's
    /// chosen travel-time statistic at most `max_travel_time`. Inactive
    /// policies exclude nothing.
    fn geom_within(
        &self,
        candidates: &BTreeSet<GeomId>,
        reference: GeomId,
        max_distance: f64,
        max_travel_time: f64,
        d_stat: DistanceStat,
        tt_stat: TravelTimeStat,
    ) -> BTreeSet<GeomId> {
        let mut within = BTreeSet::new();
        if d_stat == DistanceStat::None && tt_stat == TravelTimeStat::None {
            return within;
        }
        let Some(reference_geom) = self.index.geometries().get(reference) else {
            return within;
        };
        for &g in candidates {
            if g == reference {
                continue;
            }
            let mut excluded = false;
            if d_stat != DistanceStat::None && max_distance > 0.0 {
                if let Some(geom) = self.index.geometries().get(g) {
                    excluded = geom.distance(reference_geom) <= max_distance;
                }
            }
            if !excluded && tt_stat != TravelTimeStat::None && max_travel_time > 0.0 {
                if let Some(link) = self.stats.link(g, reference) {
                    let tt = match tt_stat {
                        TravelTimeStat::Median => link.travel_time.median(),
                        TravelTimeStat::Average => link.travel_time.average(),
                        TravelTimeStat::None => f64::INFINITY,
                    };
                    excluded = tt <= max_travel_time;
                }
            }
            if excluded {
                within.insert(g);
            }
        }
        within
    }

    /// Single substitution pass over the chosen facilities, in selection
    /// order. A facility is replaced when some unchosen, non-excluded
    /// candidate scores strictly better against the uncovered demands plus
    /// the demands the facility currently covers. Only the slot's content
    /// changes; its rank is kept.
    fn substitute(
        &self,
        allocations: &mut [Allocation],
        candidates_to_allocate: &mut BTreeSet<GeomId>,
        demands_to_cover: &BTreeSet<GeomId>,
        params: &AllocationParams,
        max_distance: f64,
        max_travel_time: f64,
    ) {
        for slot in 0..allocations.len() {
            let chosen: Vec<GeomId> = allocations.iter().map(|a| a.geom).collect();
            let current = &allocations[slot];
            let current_total = current.weight + current.backend_weight;

            let mut demand_pool = demands_to_cover.clone();
            demand_pool.extend(current.demands.keys().copied());

            let mut best: Option<CandidateScore> = None;
            for &k1 in candidates_to_allocate.iter() {
                let backend = self.backend_weight(&chosen, Some(current.geom), k1);
                let (coverage, demands) =
                    self.coverage_weight(k1, &demand_pool, params.deadline);
                let total = backend + coverage;
                // Same admission rule as the shortlist: a replacement must
                // cover some demand, not win on backend synergy alone.
                if coverage > 0.0
                    && total > current_total
                    && best.as_ref().map_or(true, |b| total > b.total())
                {
                    let incoming = self
                        .stats
                        .region(k1)
                        .map(|r| r.avg_incoming_score)
                        .unwrap_or(0.0);
                    best = Some(CandidateScore {
                        geom: k1,
                        coverage,
                        backend,
                        incoming,
                        demands,
                    });
                }
            }

            if let Some(replacement) = best {
                debug!(
                    "substitution: slot {slot} {:?} -> {:?} ({:.4} -> {:.4})",
                    allocations[slot].geom,
                    replacement.geom,
                    current_total,
                    replacement.total()
                );

                let mut exclusion_pool = candidates_to_allocate.clone();
                exclusion_pool.extend(allocations[slot].deleted_candidates.iter().copied());
                let deleted = self.geom_within(
                    &exclusion_pool,
                    replacement.geom,
                    max_distance,
                    max_travel_time,
                    params.d_stat,
                    params.tt_stat,
                );

                candidates_to_allocate.remove(&replacement.geom);

                let alloc = &mut allocations[slot];
                alloc.geom = replacement.geom;
                alloc.weight = replacement.coverage;
                alloc.backend_weight = replacement.backend;
                alloc.incoming_weight = replacement.incoming;
                alloc.demands = replacement.demands;
                alloc.deleted_candidates = deleted;
            }
        }
    }
}

/// Keep the shortlist ordered by descending coverage, bounded at
/// [`SHORTLIST_SIZE`]. Once full, a new entry must strictly beat the current
/// worst; equal coverage keeps the earlier entry ahead.
fn update_shortlist(shortlist: &mut Vec<CandidateScore>, entry: CandidateScore) {
    if shortlist.len() >= SHORTLIST_SIZE {
        match shortlist.last() {
            Some(worst) if entry.coverage <= worst.coverage => return,
            _ => {}
        }
    }
    let mut idx = 0;
    while idx < shortlist.len() && shortlist[idx].coverage >= entry.coverage {
        idx += 1;
    }
    shortlist.insert(idx, entry);
    if shortlist.len() > SHORTLIST_SIZE {
        shortlist.pop();
    }
}

/// The round winner is the shortlisted candidate with the best combined
/// backend and coverage weight; ties keep the earlier entry.
fn pick_winner(shortlist: Vec<CandidateScore>) -> Option<CandidateScore> {
    let mut best: Option<CandidateScore> = None;
    for entry in shortlist {
        let better = match &best {
            Some(current) => entry.total() > current.total(),
            None => true,
        };
        if better {
            best = Some(entry);
        }
    }
    best
}

//! Synthetic mobility trace generation for tests and demos.
//!
//! Generates commuter-style traces: each entity shuttles between two hotspot
//! locations, dwelling at each end and sampling its position at a fixed
//! interval with a little planar noise. Generation is fully seeded, so the
//! same configuration always produces the same traces.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::trace::TraceStore;

/// Configuration for the commuter trace generator.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Number of mobile entities.
    pub nb_nodes: usize,
    /// Hotspot centers entities commute between.
    pub hotspots: Vec<(f64, f64)>,
    /// Dwell time at each hotspot, in time units.
    pub dwell: i64,
    /// Travel time between hotspots, in time units.
    pub travel: i64,
    /// Sampling interval of the emitted positions.
    pub sample_interval: i64,
    /// Total duration of each trace.
    pub duration: i64,
    /// Planar noise amplitude applied to every sample.
    pub noise: f64,
    /// RNG seed.
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            nb_nodes: 20,
            hotspots: vec![(0.0, 0.0), (2000.0, 0.0), (1000.0, 1500.0)],
            dwell: 600,
            travel: 300,
            sample_interval: 30,
            duration: 24 * 3600,
            noise: 5.0,
            seed: 42,
        }
    }
}

/// Generate commuter traces for the given configuration.
pub fn generate_commuters(config: &SyntheticConfig) -> TraceStore {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut traces = TraceStore::new();

    if config.hotspots.is_empty() || config.nb_nodes == 0 {
        return traces;
    }

    for n in 0..config.nb_nodes {
        let node_id = format!("node-{n:03}");

        // Pick two distinct endpoints when possible.
        let home = config.hotspots[rng.gen_range(0..config.hotspots.len())];
        let work = if config.hotspots.iter().any(|&h| h != home) {
            loop {
                let candidate = config.hotspots[rng.gen_range(0..config.hotspots.len())];
                if candidate != home {
                    break candidate;
                }
            }
        } else {
            home
        };

        let cycle = (2 * (config.dwell + config.travel)).max(1);
        let offset = rng.gen_range(0..cycle);

        let mut t = 0;
        while t <= config.duration {
            let phase = (t + offset).rem_euclid(cycle);
            let (x, y) = position_in_cycle(phase, config.dwell, config.travel, home, work);
            let nx = x + rng.gen_range(-config.noise..=config.noise);
            let ny = y + rng.gen_range(-config.noise..=config.noise);
            traces.add_sample(&node_id, t, nx, ny);
            t += config.sample_interval.max(1);
        }
    }

    traces
}

/// Position within one dwell-travel-dwell-travel cycle.
fn position_in_cycle(
    phase: i64,
    dwell: i64,
    travel: i64,
    home: (f64, f64),
    work: (f64, f64),
) -> (f64, f64) {
    if phase < dwell {
        home
    } else if phase < dwell + travel {
        lerp(home, work, (phase - dwell) as f64 / travel.max(1) as f64)
    } else if phase < 2 * dwell + travel {
        work
    } else {
        lerp(work, home, (phase - 2 * dwell - travel) as f64 / travel.max(1) as f64)
    }
}

fn lerp(a: (f64, f64), b: (f64, f64), w: f64) -> (f64, f64) {
    (a.0 + (b.0 - a.0) * w, a.1 + (b.1 - a.1) * w)
}

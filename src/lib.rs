//! # covisit
//!
//! Co-visitation statistics and facility-location allocation over mobility
//! traces.
//!
//! This library provides:
//! - A grid-bucket spatial index over named regions (circles, cells, points)
//! - Trace ingestion turning raw position timelines into per-region visits
//! - A co-visitation model: per-region and per-region-pair visit, travel-time
//!   and inter-visit statistics
//! - A greedy maximum-coverage facility allocator with a bounded candidate
//!   shortlist, exclusion radius, and substitution refinement
//! - A uniform random allocation baseline
//!
//! ## Features
//!
//! - **`parallel`** - Parallel trace ingestion with rayon (enabled by default)
//!
//! ## Quick Start
//!
//! ```rust
//! use covisit::{
//!     Allocator, AllocationParams, GeometryIndex, Geometry, NoopProgress,
//!     StatsConfig, TraceStore, VisitStats,
//! };
//!
//! // Two square regions and one entity bouncing between them.
//! let index = GeometryIndex::new(
//!     vec![
//!         Geometry::Cell { x: 0.0, y: 0.0, size: 50.0 },
//!         Geometry::Cell { x: 1000.0, y: 0.0, size: 50.0 },
//!     ],
//!     100.0,
//! );
//!
//! let mut traces = TraceStore::new();
//! for i in 0..10i64 {
//!     let x = if i % 2 == 0 { 25.0 } else { 1025.0 };
//!     traces.add_sample("walker", i * 100, x, 25.0);
//! }
//!
//! let config = StatsConfig { sampling: 100, ..Default::default() };
//! let stats = VisitStats::build(&index, &traces, &config, &NoopProgress);
//!
//! let params = AllocationParams { deadline: 150, ..Default::default() };
//! let allocation = Allocator::new(&stats, &index)
//!     .run(&params, &NoopProgress)
//!     .expect("allocation runs");
//! assert_eq!(allocation.len(), 1);
//! ```

// Unified error handling
pub mod error;
pub use error::{CovisitError, Result};

// Region geometries and the arena addressing them
pub mod geometry;
pub use geometry::{Bounds, GeomId, Geometry, GeometrySet, euclidean_distance};

// Grid-bucket spatial index and the index factories
pub mod index;
pub use index::{DEFAULT_BUCKET_SIZE, GeometryIndex, grid_over, load_circles};

// Online frequency distribution (count, mean, exact median)
pub mod distribution;
pub use distribution::Distribution;

// Trace storage and per-entity visit extraction
pub mod trace;
pub use trace::{MAX_SAMPLE_GAP, MobileNode, TraceStore, VisitMap};

// Co-visitation statistics model
pub mod stats;
pub use stats::{LinkStats, RegionStats, StatsConfig, VisitStats};

// Facility-location allocation
pub mod allocation;
pub use allocation::{
    Allocation, AllocationParams, AllocationSite, Allocator, DistanceStat, Method,
    SHORTLIST_SIZE, TravelTimeStat,
};

// Progress reporting for long-running builds
pub mod progress;
pub use progress::{LogProgress, NoopProgress, ProgressSink, ProgressTracker};

// Synthetic trace generation for tests and demos
pub mod synthetic;
pub use synthetic::{SyntheticConfig, generate_commuters};

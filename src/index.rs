//! Grid-bucket spatial index over a set of regions.
//!
//! The plane is partitioned into fixed-size square buckets; each bucket holds
//! the handles of every region whose bounding box overlaps it. Point queries
//! examine a single bucket and filter by exact containment; radius queries
//! union a small block of buckets and return a coarse superset, leaving any
//! exact filtering to the caller.

use std::collections::HashMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{CovisitError, Result};
use crate::geometry::{Bounds, Geometry, GeomId, GeometrySet};

/// Default bucket edge length.
pub const DEFAULT_BUCKET_SIZE: f64 = 100.0;

/// Spatial index resolving which regions contain or surround a point.
///
/// The index owns the [`GeometrySet`] arena for the analysis; models and
/// allocators borrow the index and address regions by handle. All internal
/// state is built eagerly in [`GeometryIndex::new`], so a built index can be
/// shared read-only across threads.
#[derive(Debug, Clone)]
pub struct GeometryIndex {
    bucket_size: f64,
    geometries: GeometrySet,
    buckets: HashMap<(i64, i64), BTreeSet<GeomId>>,
}

impl GeometryIndex {
    /// Build an index over the given regions.
    ///
    /// Each region is registered into every bucket its bounding box overlaps.
    pub fn new(geoms: Vec<Geometry>, bucket_size: f64) -> Self {
        let mut geometries = GeometrySet::new();
        let mut buckets: HashMap<(i64, i64), BTreeSet<GeomId>> = HashMap::new();

        for geom in geoms {
            let id = geometries.add(geom);
            let bounds = geom.bounds();
            let (bx0, by0) = bucket_at(bounds.min_x, bounds.min_y, bucket_size);
            let (bx1, by1) = bucket_at(bounds.max_x, bounds.max_y, bucket_size);
            for bx in bx0..=bx1 {
                for by in by0..=by1 {
                    buckets.entry((bx, by)).or_default().insert(id);
                }
            }
        }

        debug!(
            "built geometry index: {} regions in {} buckets (bucket size {})",
            geometries.len(),
            buckets.len(),
            bucket_size
        );

        Self {
            bucket_size,
            geometries,
            buckets,
        }
    }

    pub fn bucket_size(&self) -> f64 {
        self.bucket_size
    }

    pub fn geometries(&self) -> &GeometrySet {
        &self.geometries
    }

    /// Regions whose shape actually contains the point.
    ///
    /// Bucket membership is a superset filtered by exact containment. Returns
    /// an empty vector when no bucket is registered at the point.
    pub fn regions_at(&self, x: f64, y: f64) -> Vec<GeomId> {
        let bucket = bucket_at(x, y, self.bucket_size);
        match self.buckets.get(&bucket) {
            Some(ids) => ids
                .iter()
                .copied()
                .filter(|&id| {
                    self.geometries
                        .get(id)
                        .map(|g| g.contains(x, y))
                        .unwrap_or(false)
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Coarse superset of the regions within `distance` of the point.
    ///
    /// Unions the contents of every bucket within `ceil(distance /
    /// bucket_size)` bucket steps of the point's bucket. Callers needing
    /// exact distances apply their own filter on the result.
    pub fn regions_within(&self, x: f64, y: f64, distance: f64) -> BTreeSet<GeomId> {
        let mut result = BTreeSet::new();
        if distance < 0.0 {
            return result;
        }
        let (bx, by) = bucket_at(x, y, self.bucket_size);
        let reach = (distance / self.bucket_size).ceil() as i64;
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                if let Some(ids) = self.buckets.get(&(bx + dx, by + dy)) {
                    result.extend(ids.iter().copied());
                }
            }
        }
        result
    }
}

fn bucket_at(x: f64, y: f64, bucket_size: f64) -> (i64, i64) {
    (
        (x / bucket_size).floor() as i64,
        (y / bucket_size).floor() as i64,
    )
}

/// Generate a grid of square cells covering the given bounds.
///
/// This is the automatic demand universe: every trace sample falls inside at
/// least one cell of the returned grid.
pub fn grid_over(bounds: &Bounds, cell_size: f64) -> Vec<Geometry> {
    let nx = (bounds.width() / cell_size).ceil().max(1.0) as i64;
    let ny = (bounds.height() / cell_size).ceil().max(1.0) as i64;
    let mut cells = Vec::with_capacity((nx * ny) as usize);
    for i in 0..nx {
        for j in 0..ny {
            cells.push(Geometry::Cell {
                x: bounds.min_x + i as f64 * cell_size,
                y: bounds.min_y + j as f64 * cell_size,
                size: cell_size,
            });
        }
    }
    cells
}

/// Load circular candidate regions from a `x;y;radius` text file.
///
/// Empty lines and lines starting with `#` are skipped. Any other malformed
/// line fails the whole load; a partially-read file never produces a usable
/// region list.
pub fn load_circles(path: &Path) -> Result<Vec<Geometry>> {
    let content = fs::read_to_string(path).map_err(|source| CovisitError::CircleIo {
        path: path.to_path_buf(),
        source,
    })?;

    let mut circles = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(';').map(str::trim).collect();
        let parsed = match fields.as_slice() {
            [x, y, radius] => match (x.parse::<f64>(), y.parse::<f64>(), radius.parse::<f64>()) {
                (Ok(x), Ok(y), Ok(radius)) if radius > 0.0 => Some(Geometry::Circle { x, y, radius }),
                _ => None,
            },
            _ => None,
        };
        match parsed {
            Some(circle) => circles.push(circle),
            None => {
                return Err(CovisitError::CircleParse {
                    line: i + 1,
                    content: line.to_string(),
                });
            }
        }
    }
    Ok(circles)
}

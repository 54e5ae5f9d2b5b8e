//! Planar region geometries and the arena that owns them.
//!
//! Regions are closed shapes on an already-projected plane: circles, square
//! grid cells, and degenerate points. A single [`GeometrySet`] arena owns
//! every region; all other components refer to regions through the copyable
//! [`GeomId`] handle, so maps are keyed by small integers rather than by
//! shape identity.

use serde::{Deserialize, Serialize};

/// Euclidean distance between two planar points.
pub fn euclidean_distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    ((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt()
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Create bounds from two corner coordinates in any order.
    pub fn new(x1: f64, x2: f64, y1: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            max_x: x1.max(x2),
            min_y: y1.min(y2),
            max_y: y1.max(y2),
        }
    }

    /// Compute the bounding box of a set of points.
    ///
    /// Returns `None` for an empty slice.
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let mut bounds = Self::new(x0, x0, y0, y0);
        for &(x, y) in rest {
            bounds.extend(x, y);
        }
        Some(bounds)
    }

    /// Grow the bounds to include the given point.
    pub fn extend(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// A spatial region used as a demand zone or a candidate facility site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// Disc of the given radius around `(x, y)`.
    Circle { x: f64, y: f64, radius: f64 },
    /// Square cell with `(x, y)` as its lower-left corner.
    Cell { x: f64, y: f64, size: f64 },
    /// Degenerate point region.
    Point { x: f64, y: f64 },
}

impl Geometry {
    /// Exact containment test for a planar point. Boundaries are inclusive.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        match *self {
            Geometry::Circle { x, y, radius } => euclidean_distance(px, py, x, y) <= radius,
            Geometry::Cell { x, y, size } => {
                px >= x && px <= x + size && py >= y && py <= y + size
            }
            Geometry::Point { x, y } => px == x && py == y,
        }
    }

    /// Centroid of the region.
    pub fn center(&self) -> (f64, f64) {
        match *self {
            Geometry::Circle { x, y, .. } | Geometry::Point { x, y } => (x, y),
            Geometry::Cell { x, y, size } => (x + size / 2.0, y + size / 2.0),
        }
    }

    /// Axis-aligned bounding box of the region.
    pub fn bounds(&self) -> Bounds {
        match *self {
            Geometry::Circle { x, y, radius } => {
                Bounds::new(x - radius, x + radius, y - radius, y + radius)
            }
            Geometry::Cell { x, y, size } => Bounds::new(x, x + size, y, y + size),
            Geometry::Point { x, y } => Bounds::new(x, x, y, y),
        }
    }

    /// Centroid-to-centroid distance between two regions.
    pub fn distance(&self, other: &Geometry) -> f64 {
        let (x1, y1) = self.center();
        let (x2, y2) = other.center();
        euclidean_distance(x1, y1, x2, y2)
    }

    pub fn is_cell(&self) -> bool {
        matches!(self, Geometry::Cell { .. })
    }

    pub fn is_circle(&self) -> bool {
        matches!(self, Geometry::Circle { .. })
    }
}

/// Stable handle into a [`GeometrySet`].
///
/// Ordering follows insertion order, which makes every ordered container of
/// handles iterate regions in the order they were registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GeomId(u32);

impl GeomId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Arena owning every region of one analysis.
///
/// Regions are immutable once added; the arena is append-only and fully built
/// before any index, model, or allocator reads it, so sharing `&GeometrySet`
/// across threads is sound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometrySet {
    geoms: Vec<Geometry>,
}

impl GeometrySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a region and return its handle.
    pub fn add(&mut self, geom: Geometry) -> GeomId {
        let id = GeomId(self.geoms.len() as u32);
        self.geoms.push(geom);
        id
    }

    pub fn get(&self, id: GeomId) -> Option<&Geometry> {
        self.geoms.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (GeomId, &Geometry)> {
        self.geoms
            .iter()
            .enumerate()
            .map(|(i, g)| (GeomId(i as u32), g))
    }

    pub fn len(&self) -> usize {
        self.geoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geoms.is_empty()
    }
}

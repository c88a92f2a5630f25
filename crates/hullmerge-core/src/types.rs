//! Shared types for fragment merging.

use serde::{Deserialize, Serialize};

/// A vertex of the source line. Fragments copy these, so the type is
/// `Copy` and compared bitwise by the stitch checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Straight-line distance to `other`.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<Point> for geo::Coord<f64> {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<Point> for geo::Point<f64> {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// The source line. Vertex indices in a [`Range`] refer to positions in
/// this sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Vertex count.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// The vertices `range` covers, both ends included. `None` if the
    /// range runs past the last vertex.
    #[must_use]
    pub fn vertices(&self, range: Range) -> Option<&[Point]> {
        self.0.get(range.i()..=range.j())
    }
}

/// An interval `[i, j]` of source-vertex indices.
///
/// A range of size 1 spans two source vertices (a single segment).
/// Ranges order by start, then end, which is the left-to-right order
/// used for every deterministic tie-break in this crate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "[usize; 2]", into = "[usize; 2]")]
pub struct Range {
    i: usize,
    j: usize,
}

impl Range {
    /// Create a range, rejecting `i > j`.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::InvalidRange`] when `i > j`.
    pub fn new(i: usize, j: usize) -> Result<Self, MergeError> {
        if i > j {
            return Err(MergeError::InvalidRange { i, j });
        }
        Ok(Self { i, j })
    }

    /// Lower vertex index.
    #[must_use]
    pub const fn i(self) -> usize {
        self.i
    }

    /// Upper vertex index.
    #[must_use]
    pub const fn j(self) -> usize {
        self.j
    }

    /// Number of segments covered (`j - i`).
    #[must_use]
    pub const fn size(self) -> usize {
        self.j - self.i
    }

    /// Endpoints as a fixed-size array.
    #[must_use]
    pub const fn as_array(self) -> [usize; 2] {
        [self.i, self.j]
    }

    /// The boundary vertex shared with `other`, if the two are contiguous.
    ///
    /// `self` followed by `other` is checked first, so for the degenerate
    /// case where both orientations hold the high end of `self` wins.
    #[must_use]
    pub const fn shared_vertex(self, other: Self) -> Option<usize> {
        if self.j == other.i {
            Some(self.j)
        } else if self.i == other.j {
            Some(self.i)
        } else {
            None
        }
    }

    /// Whether the two ranges share exactly one boundary vertex.
    #[must_use]
    pub const fn contiguous(self, other: Self) -> bool {
        self.shared_vertex(other).is_some()
    }
}

impl TryFrom<[usize; 2]> for Range {
    type Error = MergeError;

    fn try_from([i, j]: [usize; 2]) -> Result<Self, Self::Error> {
        Self::new(i, j)
    }
}

impl From<Range> for [usize; 2] {
    fn from(r: Range) -> Self {
        r.as_array()
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.i, self.j)
    }
}

/// Which merge driver [`simplify`](crate::simplify) runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Cascaded batch passes over fixed snapshots.
    #[default]
    Batch,
    /// Sweeps over a live index until a sweep merges nothing.
    Sweep,
}

/// Configuration for the merge drivers.
///
/// All parameters have defaults matching the usual generalization run:
/// a distance threshold of 50 units, single-segment candidates, and a
/// near-zero neighbour tolerance (contiguous fragments touch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Scores at or below this value are accepted.
    pub threshold: f64,

    /// Target size for sweep candidates and for the first batch pass.
    pub fragment_size: usize,

    /// Last fragment size visited by [`merge_cascade`](crate::batch::merge_cascade).
    pub max_fragment_size: usize,

    /// Envelope expansion used for spatial neighbour queries.
    pub neighbour_tolerance: f64,

    /// Reject sweep merges whose chord crosses the chord of another
    /// fragment in the index.
    pub avoid_new_intersections: bool,

    /// Merge driver.
    pub mode: MergeMode,
}

impl MergeConfig {
    /// Default acceptance threshold.
    pub const DEFAULT_THRESHOLD: f64 = 50.0;
    /// Default candidate fragment size.
    pub const DEFAULT_FRAGMENT_SIZE: usize = 1;
    /// Default largest fragment size for cascaded batch passes.
    pub const DEFAULT_MAX_FRAGMENT_SIZE: usize = 8;
    /// Default neighbour query tolerance.
    pub const DEFAULT_NEIGHBOUR_TOLERANCE: f64 = 1.0e-5;
    /// Default merge driver.
    pub const DEFAULT_MODE: MergeMode = MergeMode::Batch;

    /// The threshold acceptance predicate: `score <= threshold`.
    #[must_use]
    pub fn accepts(&self, score: f64) -> bool {
        score <= self.threshold
    }

    /// Check the invariants the merge drivers rely on.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::InvalidConfig`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), MergeError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(MergeError::InvalidConfig(format!(
                "threshold must be finite and non-negative, got {}",
                self.threshold
            )));
        }
        if !self.neighbour_tolerance.is_finite() || self.neighbour_tolerance < 0.0 {
            return Err(MergeError::InvalidConfig(format!(
                "neighbour_tolerance must be finite and non-negative, got {}",
                self.neighbour_tolerance
            )));
        }
        if self.fragment_size == 0 {
            return Err(MergeError::InvalidConfig(
                "fragment_size must be at least 1".to_owned(),
            ));
        }
        if self.max_fragment_size < self.fragment_size {
            return Err(MergeError::InvalidConfig(format!(
                "max_fragment_size ({}) is smaller than fragment_size ({})",
                self.max_fragment_size, self.fragment_size
            )));
        }
        Ok(())
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            fragment_size: Self::DEFAULT_FRAGMENT_SIZE,
            max_fragment_size: Self::DEFAULT_MAX_FRAGMENT_SIZE,
            neighbour_tolerance: Self::DEFAULT_NEIGHBOUR_TOLERANCE,
            avoid_new_intersections: true,
            mode: Self::DEFAULT_MODE,
        }
    }
}

/// Caller-contract violations detected by the merge core.
///
/// None of these describe a rejected merge: "no merge" is `Ok(None)`.
/// An `Err` means an invariant of the inputs or of the spatial index was
/// broken and the current pass must stop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// Two ranges passed to merge or stitch do not share a boundary.
    #[error("ranges {a} and {b} are not contiguous")]
    NotContiguous {
        /// First range.
        a: Range,
        /// Second range.
        b: Range,
    },

    /// A range with `i > j`.
    #[error("invalid range: i ({i}) > j ({j})")]
    InvalidRange {
        /// Lower index as given.
        i: usize,
        /// Upper index as given.
        j: usize,
    },

    /// A fragment's coordinates do not cover its range.
    #[error("fragment {range} needs {expected} coordinates, got {actual}")]
    CoordinateCount {
        /// The fragment's range.
        range: Range,
        /// `range.size() + 1`.
        expected: usize,
        /// Number of coordinates supplied.
        actual: usize,
    },

    /// The geometry builder produced a geometry without a bounding box.
    #[error("geometry for fragment {0} has no bounding box")]
    EmptyGeometry(Range),

    /// Removal of a fragment that is not in the spatial index.
    #[error("fragment {0} is not in the spatial index")]
    MissingFragment(Range),

    /// Insertion of a range that already has a live fragment.
    #[error("fragment {0} is already in the spatial index")]
    DuplicateFragment(Range),

    /// Merge configuration is invalid.
    #[error("invalid merge configuration: {0}")]
    InvalidConfig(String),
}

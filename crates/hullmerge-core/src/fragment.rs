//! Fragments ("hulls"): immutable geometric units covering a vertex range.
//!
//! A fragment owns the coordinates of the source vertices in its range
//! plus a derived geometry produced by an injected [`GeometryBuilder`].
//! The geometry's bounding box is the fragment's R\*-tree envelope.
//! Fragments are never mutated; a merge always builds a fresh one.

use std::collections::BTreeSet;

use geo::{BoundingRect, ConvexHull, Geometry, Line, LineString};
use rstar::{AABB, RTreeObject};

use crate::types::{MergeError, Point, Polyline, Range};

/// Derives a fragment's geometry from its coordinates.
///
/// Used whenever a fragment is built, including every accepted merge, so
/// the result must be a pure function of its inputs.
pub trait GeometryBuilder {
    /// Build the geometry for `coordinates` spanning `range`.
    fn build(&self, coordinates: &[Point], range: Range) -> Geometry<f64>;
}

impl<F> GeometryBuilder for F
where
    F: Fn(&[Point], Range) -> Geometry<f64>,
{
    fn build(&self, coordinates: &[Point], range: Range) -> Geometry<f64> {
        self(coordinates, range)
    }
}

/// Convex hull of the coordinates.
///
/// One coordinate yields a point and two yield a line; three or more
/// yield the hull polygon (degenerate for collinear input).
#[must_use]
pub fn hull_geometry(coordinates: &[Point], _range: Range) -> Geometry<f64> {
    match coordinates {
        [] => Geometry::LineString(LineString::new(Vec::new())),
        [p] => Geometry::Point(geo::Point::from(*p)),
        [a, b] => Geometry::Line(Line::new(*a, *b)),
        _ => {
            let ring: LineString<f64> = coordinates.iter().map(|&p| geo::Coord::from(p)).collect();
            Geometry::Polygon(ring.convex_hull())
        }
    }
}

/// The chord from the first to the last coordinate.
#[must_use]
pub fn chord_geometry(coordinates: &[Point], range: Range) -> Geometry<f64> {
    match (coordinates.first(), coordinates.last()) {
        (Some(a), Some(b)) if coordinates.len() > 1 => Geometry::Line(Line::new(*a, *b)),
        _ => hull_geometry(coordinates, range),
    }
}

/// A contiguous piece of the source polyline.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    range: Range,
    coordinates: Vec<Point>,
    geometry: Geometry<f64>,
    envelope: AABB<[f64; 2]>,
}

impl Fragment {
    /// Build a fragment over `range` from its coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::CoordinateCount`] unless there is exactly one
    /// coordinate per vertex in `range`, and [`MergeError::EmptyGeometry`]
    /// if the builder's geometry has no bounding box.
    pub fn new<B>(coordinates: Vec<Point>, range: Range, builder: &B) -> Result<Self, MergeError>
    where
        B: GeometryBuilder + ?Sized,
    {
        let expected = range.size() + 1;
        if coordinates.len() != expected {
            return Err(MergeError::CoordinateCount {
                range,
                expected,
                actual: coordinates.len(),
            });
        }

        let geometry = builder.build(&coordinates, range);
        let rect = geometry
            .bounding_rect()
            .ok_or(MergeError::EmptyGeometry(range))?;
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        Ok(Self {
            range,
            coordinates,
            geometry,
            envelope,
        })
    }

    /// The covered vertex range.
    #[must_use]
    pub const fn range(&self) -> Range {
        self.range
    }

    /// Number of segments covered.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.range.size()
    }

    /// Coordinates of the covered source vertices, in index order.
    #[must_use]
    pub fn coordinates(&self) -> &[Point] {
        &self.coordinates
    }

    /// The derived geometry.
    #[must_use]
    pub const fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    /// Bounding box of the derived geometry.
    #[must_use]
    pub const fn envelope(&self) -> &AABB<[f64; 2]> {
        &self.envelope
    }

    /// The segment that replaces this fragment once simplified.
    ///
    /// `None` for a single-vertex fragment.
    #[must_use]
    pub fn chord(&self) -> Option<Line<f64>> {
        match self.coordinates.as_slice() {
            [first, .., last] => Some(Line::new(*first, *last)),
            _ => None,
        }
    }
}

impl RTreeObject for Fragment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Split `polyline` into contiguous fragments at the given vertex indices.
///
/// The first and last vertex are always split points; indices are
/// deduplicated and those beyond the last vertex are ignored. Polylines
/// with fewer than two points produce no fragments.
///
/// # Errors
///
/// Propagates [`Fragment::new`] failures from the geometry builder.
pub fn fragments_at_indices<B>(
    polyline: &Polyline,
    indices: &[usize],
    builder: &B,
) -> Result<Vec<Fragment>, MergeError>
where
    B: GeometryBuilder + ?Sized,
{
    if polyline.len() < 2 {
        return Ok(Vec::new());
    }
    let last = polyline.len() - 1;

    let mut splits: BTreeSet<usize> = indices.iter().copied().filter(|&i| i <= last).collect();
    splits.insert(0);
    splits.insert(last);

    let splits: Vec<usize> = splits.into_iter().collect();
    splits
        .windows(2)
        .map(|w| {
            let range = Range::new(w[0], w[1])?;
            let coordinates = polyline.vertices(range).map_or_else(Vec::new, <[Point]>::to_vec);
            Fragment::new(coordinates, range, builder)
        })
        .collect()
}

/// Assemble surviving fragments into the simplified polyline.
///
/// Fragments are ordered by range and each contributes its first vertex;
/// the final vertex of the last fragment closes the line.
///
/// # Errors
///
/// Returns [`MergeError::NotContiguous`] if two consecutive fragments do
/// not share a boundary vertex.
pub fn assemble(fragments: &[Fragment]) -> Result<Polyline, MergeError> {
    let mut ordered: Vec<&Fragment> = fragments.iter().collect();
    ordered.sort_by_key(|f| f.range());

    for pair in ordered.windows(2) {
        let (a, b) = (pair[0].range(), pair[1].range());
        if a.j() != b.i() {
            return Err(MergeError::NotContiguous { a, b });
        }
    }

    let mut points: Vec<Point> = ordered
        .iter()
        .filter_map(|f| f.coordinates().first().copied())
        .collect();
    if let Some(end) = ordered.last().and_then(|f| f.coordinates().last()) {
        points.push(*end);
    }
    Ok(Polyline::new(points))
}

//! Pairwise merging of contiguous fragments.
//!
//! [`merge_ranges`] and [`stitch`] are the primitives both merge passes
//! share; [`Merger`] bundles the injected scorer, acceptance predicate and
//! geometry builder into the threshold-gated pairwise merge.
//!
//! Calling either primitive with non-contiguous inputs is a contract
//! violation and returns [`MergeError::NotContiguous`]; a rejected merge
//! is the ordinary `Ok(None)`.

use crate::fragment::{Fragment, GeometryBuilder};
use crate::score::{Score, Scorer};
use crate::types::{MergeError, Point, Range};

/// Sorted endpoints of a candidate pair: `(minA, maxA, minB, maxB)` after
/// sorting all four, so the same pair maps to one key in either order.
pub type CacheKey = [usize; 4];

/// Memoization key for a candidate pair.
#[must_use]
pub fn cache_key(a: Range, b: Range) -> CacheKey {
    let mut key = [a.i(), a.j(), b.i(), b.j()];
    key.sort_unstable();
    key
}

fn ensure_contiguous(a: Range, b: Range) -> Result<(), MergeError> {
    if a.contiguous(b) {
        Ok(())
    } else {
        Err(MergeError::NotContiguous { a, b })
    }
}

/// Merge two contiguous ranges into the range spanning both.
///
/// # Errors
///
/// Returns [`MergeError::NotContiguous`] if `a` and `b` do not share a
/// boundary vertex.
pub fn merge_ranges(a: Range, b: Range) -> Result<Range, MergeError> {
    ensure_contiguous(a, b)?;
    // i...[a]...k...[b]...j
    Range::new(a.i().min(b.i()), a.j().max(b.j()))
}

/// Concatenate the coordinates of two contiguous fragments, emitting the
/// shared boundary vertex once.
///
/// Orientation is normalized: the fragment that comes first along the
/// source line is emitted first regardless of argument order.
///
/// # Errors
///
/// Returns [`MergeError::NotContiguous`] if the fragment ranges do not
/// share a boundary vertex.
pub fn stitch(a: &Fragment, b: &Fragment) -> Result<Vec<Point>, MergeError> {
    let (ra, rb) = (a.range(), b.range());
    ensure_contiguous(ra, rb)?;

    let (left, right) = if rb.j() == ra.i() && ra.j() != rb.i() {
        (b, a)
    } else {
        (a, b)
    };

    let head = left.coordinates();
    let mut coordinates = Vec::with_capacity(head.len() + right.coordinates().len() - 1);
    coordinates.extend_from_slice(&head[..head.len() - 1]);
    coordinates.extend_from_slice(right.coordinates());
    Ok(coordinates)
}

/// Threshold-gated pairwise merge.
///
/// Holds the three injected capabilities every merge needs: how to score
/// stitched coordinates, which scores are acceptable, and how to derive a
/// merged fragment's geometry.
#[derive(Debug, Clone)]
pub struct Merger<S, A, G> {
    scorer: S,
    accept: A,
    builder: G,
}

impl<S, A, G> Merger<S, A, G>
where
    S: Scorer,
    A: Fn(f64) -> bool,
    G: GeometryBuilder,
{
    /// Bundle a scorer, acceptance predicate and geometry builder.
    pub const fn new(scorer: S, accept: A, builder: G) -> Self {
        Self {
            scorer,
            accept,
            builder,
        }
    }

    /// Score the stitched coordinates of `a` and `b`.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::NotContiguous`] for non-contiguous fragments.
    pub fn score(&self, a: &Fragment, b: &Fragment) -> Result<Score, MergeError> {
        Ok(self.scorer.score(&stitch(a, b)?))
    }

    /// Merge `a` and `b` if the stitched score is accepted.
    ///
    /// Returns `Ok(None)` when the score is rejected. No shared state is
    /// touched.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::NotContiguous`] for non-contiguous fragments,
    /// or a [`Fragment::new`] failure from the geometry builder.
    pub fn try_merge(&self, a: &Fragment, b: &Fragment) -> Result<Option<Fragment>, MergeError> {
        let coordinates = stitch(a, b)?;
        let score = self.scorer.score(&coordinates);
        if !(self.accept)(score.value) {
            tracing::trace!(
                a = %a.range(),
                b = %b.range(),
                score = score.value,
                "merge rejected by score"
            );
            return Ok(None);
        }
        let range = merge_ranges(a.range(), b.range())?;
        Fragment::new(coordinates, range, &self.builder).map(Some)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::fragment::hull_geometry;
    use crate::score::max_offset;

    fn range(i: usize, j: usize) -> Range {
        Range::new(i, j).unwrap()
    }

    /// Fragment over `[i, j]` whose vertex `k` sits at `(k, k % 2)`.
    fn fragment(i: usize, j: usize) -> Fragment {
        #[allow(clippy::cast_precision_loss)]
        let coords = (i..=j).map(|k| Point::new(k as f64, (k % 2) as f64)).collect();
        Fragment::new(coords, range(i, j), &hull_geometry).unwrap()
    }

    #[test]
    fn merge_ranges_spans_both() {
        assert_eq!(merge_ranges(range(0, 2), range(2, 4)).unwrap(), range(0, 4));
        assert_eq!(merge_ranges(range(2, 4), range(0, 2)).unwrap(), range(0, 4));
    }

    #[test]
    fn merge_ranges_rejects_gap_and_overlap() {
        assert_eq!(
            merge_ranges(range(0, 2), range(3, 4)),
            Err(MergeError::NotContiguous {
                a: range(0, 2),
                b: range(3, 4)
            })
        );
        assert!(merge_ranges(range(0, 3), range(2, 4)).is_err());
    }

    #[test]
    fn stitch_drops_shared_vertex_once() {
        let coords = stitch(&fragment(0, 2), &fragment(2, 4)).unwrap();
        let xs: Vec<f64> = coords.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn stitch_normalizes_orientation() {
        let forward = stitch(&fragment(0, 2), &fragment(2, 4)).unwrap();
        let backward = stitch(&fragment(2, 4), &fragment(0, 2)).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn stitch_rejects_non_contiguous() {
        assert!(matches!(
            stitch(&fragment(0, 2), &fragment(3, 4)),
            Err(MergeError::NotContiguous { .. })
        ));
    }

    #[test]
    fn cache_key_is_order_independent() {
        assert_eq!(cache_key(range(0, 2), range(2, 3)), [0, 2, 2, 3]);
        assert_eq!(
            cache_key(range(2, 3), range(0, 2)),
            cache_key(range(0, 2), range(2, 3))
        );
    }

    #[test]
    fn try_merge_accepts_under_threshold() {
        let merger = Merger::new(|_: &[Point]| Score::new(40.0), |s: f64| s <= 50.0, hull_geometry);
        let merged = merger
            .try_merge(&fragment(2, 4), &fragment(0, 2))
            .unwrap()
            .unwrap();
        assert_eq!(merged.range(), range(0, 4));
        assert_eq!(merged.coordinates().len(), 5);
        assert_eq!(merged.coordinates()[0], Point::new(0.0, 0.0));
    }

    #[test]
    fn try_merge_rejection_is_not_an_error() {
        let merger = Merger::new(|_: &[Point]| Score::new(999.0), |s: f64| s <= 50.0, hull_geometry);
        assert_eq!(merger.try_merge(&fragment(0, 2), &fragment(2, 4)), Ok(None));
    }

    #[test]
    fn try_merge_contract_violation_is_an_error() {
        let merger = Merger::new(|_: &[Point]| Score::new(0.0), |_: f64| true, hull_geometry);
        assert!(merger.try_merge(&fragment(0, 2), &fragment(4, 6)).is_err());
    }

    #[test]
    fn score_uses_stitched_coordinates() {
        let merger = Merger::new(max_offset, |s: f64| s <= 0.5, hull_geometry);
        // Zigzag of amplitude 1 around the chord from (0, 0) to (2, 0).
        let score = merger.score(&fragment(0, 1), &fragment(1, 2)).unwrap();
        assert!((score.value - 1.0).abs() < 1e-10);
        assert_eq!(score.index, Some(1));
    }

    proptest! {
        #[test]
        fn merge_ranges_is_commutative(i in 0usize..50, a in 0usize..20, b in 0usize..20) {
            let (ra, rb) = (range(i, i + a), range(i + a, i + a + b));
            let ab = merge_ranges(ra, rb).unwrap();
            prop_assert_eq!(ab, merge_ranges(rb, ra).unwrap());
            prop_assert_eq!(ab.i(), i);
            prop_assert_eq!(ab.j(), i + a + b);
        }

        #[test]
        fn stitch_length_and_endpoints(i in 0usize..30, a in 1usize..10, b in 1usize..10) {
            let (fa, fb) = (fragment(i, i + a), fragment(i + a, i + a + b));
            for coords in [stitch(&fa, &fb).unwrap(), stitch(&fb, &fa).unwrap()] {
                prop_assert_eq!(
                    coords.len(),
                    fa.coordinates().len() + fb.coordinates().len() - 1
                );
                prop_assert_eq!(coords.first(), fa.coordinates().first());
                prop_assert_eq!(coords.last(), fb.coordinates().last());
            }
        }

        #[test]
        fn non_contiguous_ranges_always_fail(i in 0usize..30, a in 1usize..10, gap in 1usize..10) {
            let (ra, rb) = (range(i, i + a), range(i + a + gap, i + a + gap + 1));
            prop_assert!(merge_ranges(ra, rb).is_err());
            prop_assert!(stitch(&fragment(ra.i(), ra.j()), &fragment(rb.i(), rb.j())).is_err());
        }
    }
}

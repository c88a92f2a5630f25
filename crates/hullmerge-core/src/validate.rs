//! Global checks on candidate merges.
//!
//! A score only sees the candidate's own coordinates. A validator sees
//! the candidate together with the spatial index as it would look after
//! the merge (both consumed fragments already removed), so it can reject
//! merges that break a property of the whole line.

use geo::Intersects;

use crate::fragment::Fragment;
use crate::index::SpatialIndex;
use crate::types::Range;

/// Decides whether a candidate merged fragment may enter the index.
///
/// Implementations may query `index` but must not mutate it.
pub trait MergeValidator<I: ?Sized> {
    /// Whether `candidate` is acceptable against the rest of `index`.
    fn validate(&self, candidate: &Fragment, index: &I) -> bool;
}

impl<I, F> MergeValidator<I> for F
where
    I: ?Sized,
    F: Fn(&Fragment, &I) -> bool,
{
    fn validate(&self, candidate: &Fragment, index: &I) -> bool {
        self(candidate, index)
    }
}

/// Accepts every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<I: ?Sized> MergeValidator<I> for AcceptAll {
    fn validate(&self, _candidate: &Fragment, _index: &I) -> bool {
        true
    }
}

/// Rejects a candidate whose chord crosses the chord of another live
/// fragment, i.e. a merge that would introduce a self-intersection in
/// the simplified line.
///
/// Fragments sharing an endpoint vertex with the candidate are skipped:
/// their chords always meet the candidate's at that vertex.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChordIntersectionGuard;

const fn shares_endpoint(a: Range, b: Range) -> bool {
    a.i() == b.i() || a.i() == b.j() || a.j() == b.i() || a.j() == b.j()
}

impl<I: SpatialIndex + ?Sized> MergeValidator<I> for ChordIntersectionGuard {
    fn validate(&self, candidate: &Fragment, index: &I) -> bool {
        let Some(chord) = candidate.chord() else {
            return true;
        };
        let range = candidate.range();
        let crossing = index
            .neighbours(candidate, 0.0)
            .into_iter()
            .filter(|other| !shares_endpoint(range, other.range()))
            .filter_map(Fragment::chord)
            .find(|other| chord.intersects(other));
        if let Some(other) = crossing {
            tracing::trace!(candidate = %range, ?other, "chord crosses live fragment");
            return false;
        }
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fragment::{fragments_at_indices, hull_geometry};
    use crate::index::FragmentIndex;
    use crate::merge::stitch;
    use crate::types::{Point, Polyline};

    /// 0-1-2-3 goes up, right and down; 3-4-5 doubles back to the left
    /// across the box the first part outlines.
    fn crossing_line() -> Polyline {
        Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 4.0),
            Point::new(4.0, 4.0),
            Point::new(4.0, 2.0),
            Point::new(-2.0, 2.0),
            Point::new(-2.0, 6.0),
        ])
    }

    fn candidate(fs: &[Fragment], a: usize, b: usize) -> Fragment {
        let coords = stitch(&fs[a], &fs[b]).unwrap();
        let range = crate::merge::merge_ranges(fs[a].range(), fs[b].range()).unwrap();
        Fragment::new(coords, range, &hull_geometry).unwrap()
    }

    #[test]
    fn accept_all_accepts() {
        let index = FragmentIndex::new();
        let fs = fragments_at_indices(&crossing_line(), &[1, 2], &hull_geometry).unwrap();
        assert!(AcceptAll.validate(&fs[0], &index));
    }

    #[test]
    fn closures_are_validators() {
        let index = FragmentIndex::new();
        let fs = fragments_at_indices(&crossing_line(), &[1], &hull_geometry).unwrap();
        let reject = |_: &Fragment, _: &FragmentIndex| false;
        assert!(!reject.validate(&fs[0], &index));
    }

    #[test]
    fn guard_rejects_crossing_chord() {
        // Fragments [0,1], [1,2], [2,3], [3,5]. Merging [0,1]+[1,2] gives
        // the chord (0,0)-(4,4), which crosses [3,5]'s chord (4,2)-(-2,6)
        // at (2.8, 2.8).
        let fs = fragments_at_indices(&crossing_line(), &[1, 2, 3], &hull_geometry).unwrap();
        let mut index = FragmentIndex::from_fragments(fs.clone()).unwrap();
        index.remove(&fs[0]).unwrap();
        index.remove(&fs[1]).unwrap();
        let merged = candidate(&fs, 0, 1);
        assert!(!ChordIntersectionGuard.validate(&merged, &index));
    }

    #[test]
    fn guard_ignores_fragments_sharing_an_endpoint() {
        // [1,2]+[2,3] gives the chord (0,4)-(4,2); both remaining
        // fragments share one of its endpoint vertices.
        let fs = fragments_at_indices(&crossing_line(), &[1, 2, 3], &hull_geometry).unwrap();
        let mut index = FragmentIndex::from_fragments(fs.clone()).unwrap();
        index.remove(&fs[1]).unwrap();
        index.remove(&fs[2]).unwrap();
        let merged = candidate(&fs, 1, 2);
        assert!(ChordIntersectionGuard.validate(&merged, &index));
    }

    #[test]
    fn guard_accepts_single_vertex_candidate() {
        let index = FragmentIndex::new();
        let point = Fragment::new(
            vec![Point::new(1.0, 1.0)],
            Range::new(3, 3).unwrap(),
            &hull_geometry,
        )
        .unwrap();
        assert!(ChordIntersectionGuard.validate(&point, &index));
    }
}

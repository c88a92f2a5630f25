//! Spatial index over live fragments.
//!
//! The merge passes only rely on the [`SpatialIndex`] trait; the concrete
//! [`FragmentIndex`] is an R\*-tree keyed by fragment envelopes that also
//! tracks which ranges are live, so removing an absent fragment or
//! inserting a second fragment for the same range is reported instead of
//! silently corrupting the index.

use std::collections::HashSet;

use rstar::{AABB, Envelope, RTree, SelectionFunction};

use crate::fragment::Fragment;
use crate::types::{MergeError, Range};

/// Mutable collection of fragments supporting neighbour queries.
///
/// At most one fragment per range is live at a time. Fragment identity
/// is its value: removal matches on equality, not on address.
pub trait SpatialIndex {
    /// Add a fragment.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::DuplicateFragment`] if a fragment with the
    /// same range is already live.
    fn insert(&mut self, fragment: Fragment) -> Result<(), MergeError>;

    /// Remove a fragment, returning the stored value.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::MissingFragment`] if it is not in the index.
    fn remove(&mut self, fragment: &Fragment) -> Result<Fragment, MergeError>;

    /// Fragments whose envelope lies within `tolerance` of `fragment`'s
    /// envelope. The result is unordered and may include `fragment`
    /// itself if it is live.
    fn neighbours(&self, fragment: &Fragment, tolerance: f64) -> Vec<&Fragment>;

    /// Every live fragment, unordered.
    fn all(&self) -> Vec<&Fragment>;

    /// Number of live fragments.
    fn len(&self) -> usize;

    /// Whether the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// R\*-tree backed [`SpatialIndex`].
#[derive(Debug, Clone, Default)]
pub struct FragmentIndex {
    tree: RTree<Fragment>,
    live: HashSet<Range>,
}

impl FragmentIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load an index from a fragment collection.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::DuplicateFragment`] if two fragments share a
    /// range.
    pub fn from_fragments(fragments: Vec<Fragment>) -> Result<Self, MergeError> {
        let mut live = HashSet::with_capacity(fragments.len());
        for f in &fragments {
            if !live.insert(f.range()) {
                return Err(MergeError::DuplicateFragment(f.range()));
            }
        }
        Ok(Self {
            tree: RTree::bulk_load(fragments),
            live,
        })
    }

    /// Whether a fragment covering `range` is live.
    #[must_use]
    pub fn contains_range(&self, range: Range) -> bool {
        self.live.contains(&range)
    }

    /// Live fragments ordered by range.
    #[must_use]
    pub fn sorted(&self) -> Vec<&Fragment> {
        let mut fragments: Vec<&Fragment> = self.tree.iter().collect();
        fragments.sort_by_key(|f| f.range());
        fragments
    }

    /// Owned copies of the live fragments, ordered by range.
    #[must_use]
    pub fn to_sorted_vec(&self) -> Vec<Fragment> {
        self.sorted().into_iter().cloned().collect()
    }

    /// Fragments whose envelope intersects `envelope`.
    pub fn locate(&self, envelope: &AABB<[f64; 2]>) -> impl Iterator<Item = &Fragment> {
        self.tree.locate_with_selection_function(Intersecting(*envelope))
    }
}

/// Selects tree nodes and fragments whose envelope intersects the query.
struct Intersecting(AABB<[f64; 2]>);

impl SelectionFunction<Fragment> for Intersecting {
    fn should_unpack_parent(&self, envelope: &AABB<[f64; 2]>) -> bool {
        self.0.intersects(envelope)
    }

    fn should_unpack_leaf(&self, leaf: &Fragment) -> bool {
        self.0.intersects(leaf.envelope())
    }
}

fn expand(envelope: &AABB<[f64; 2]>, by: f64) -> AABB<[f64; 2]> {
    let [x0, y0] = envelope.lower();
    let [x1, y1] = envelope.upper();
    AABB::from_corners([x0 - by, y0 - by], [x1 + by, y1 + by])
}

impl SpatialIndex for FragmentIndex {
    fn insert(&mut self, fragment: Fragment) -> Result<(), MergeError> {
        if !self.live.insert(fragment.range()) {
            return Err(MergeError::DuplicateFragment(fragment.range()));
        }
        self.tree.insert(fragment);
        Ok(())
    }

    fn remove(&mut self, fragment: &Fragment) -> Result<Fragment, MergeError> {
        let removed = self
            .tree
            .remove(fragment)
            .ok_or(MergeError::MissingFragment(fragment.range()))?;
        self.live.remove(&removed.range());
        Ok(removed)
    }

    fn neighbours(&self, fragment: &Fragment, tolerance: f64) -> Vec<&Fragment> {
        let query = expand(fragment.envelope(), tolerance);
        self.locate(&query).collect()
    }

    fn all(&self) -> Vec<&Fragment> {
        self.tree.iter().collect()
    }

    fn len(&self) -> usize {
        self.tree.size()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fragment::{fragments_at_indices, hull_geometry};
    use crate::types::{Point, Polyline};

    /// Four unit segments along the x axis, then one far away.
    fn fragments() -> Vec<Fragment> {
        let pl = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(3.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(100.0, 100.0),
        ]);
        fragments_at_indices(&pl, &[1, 2, 3, 4], &hull_geometry).unwrap()
    }

    fn ranges(fs: &[&Fragment]) -> Vec<[usize; 2]> {
        let mut out: Vec<[usize; 2]> = fs.iter().map(|f| f.range().as_array()).collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn from_fragments_rejects_duplicate_ranges() {
        let mut fs = fragments();
        fs.push(fs[0].clone());
        assert_eq!(
            FragmentIndex::from_fragments(fs).unwrap_err(),
            MergeError::DuplicateFragment(Range::new(0, 1).unwrap())
        );
    }

    #[test]
    fn neighbours_are_touching_envelopes() {
        let fs = fragments();
        let index = FragmentIndex::from_fragments(fs.clone()).unwrap();
        let near = index.neighbours(&fs[1], 1e-5);
        assert_eq!(ranges(&near), vec![[0, 1], [1, 2], [2, 3]]);
    }

    #[test]
    fn tolerance_widens_the_query() {
        let fs = fragments();
        let index = FragmentIndex::from_fragments(fs.clone()).unwrap();
        let near = index.neighbours(&fs[0], 1.5);
        assert_eq!(ranges(&near), vec![[0, 1], [1, 2], [2, 3]]);
    }

    #[test]
    fn remove_then_insert_round_trip() {
        let fs = fragments();
        let mut index = FragmentIndex::from_fragments(fs.clone()).unwrap();
        let removed = index.remove(&fs[2]).unwrap();
        assert_eq!(removed, fs[2]);
        assert_eq!(index.len(), 4);
        assert!(!index.contains_range(fs[2].range()));
        assert!(!ranges(&index.neighbours(&fs[1], 1e-5)).contains(&[2, 3]));

        index.insert(removed).unwrap();
        assert_eq!(index.len(), 5);
        assert!(index.contains_range(fs[2].range()));
    }

    #[test]
    fn removing_absent_fragment_is_an_error() {
        let fs = fragments();
        let mut index = FragmentIndex::from_fragments(fs.clone()).unwrap();
        index.remove(&fs[0]).unwrap();
        assert_eq!(
            index.remove(&fs[0]).unwrap_err(),
            MergeError::MissingFragment(fs[0].range())
        );
    }

    #[test]
    fn duplicate_insert_is_an_error() {
        let fs = fragments();
        let mut index = FragmentIndex::from_fragments(fs.clone()).unwrap();
        assert_eq!(
            index.insert(fs[3].clone()).unwrap_err(),
            MergeError::DuplicateFragment(fs[3].range())
        );
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn sorted_orders_by_range() {
        let fs = fragments();
        let mut shuffled = fs.clone();
        shuffled.reverse();
        let index = FragmentIndex::from_fragments(shuffled).unwrap();
        let starts: Vec<usize> = index.sorted().iter().map(|f| f.range().i()).collect();
        assert_eq!(starts, vec![0, 1, 2, 3, 4]);
        assert_eq!(index.to_sorted_vec(), fs);
    }

    #[test]
    fn empty_index() {
        let index = FragmentIndex::new();
        assert!(index.is_empty());
        assert!(index.all().is_empty());
    }
}

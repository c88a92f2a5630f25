//! Protected vertices: source indices that must stay fragment boundaries.
//!
//! Typically branch points (vertex degree greater than two) or vertices
//! the caller pins. The merge core only ever asks for membership.

use std::collections::{BTreeSet, HashSet};
use std::hash::BuildHasher;

/// Read-only membership test over protected vertex indices.
pub trait VertexSet {
    /// Whether `vertex` must never become an interior vertex of a merge.
    fn contains(&self, vertex: usize) -> bool;
}

impl VertexSet for BTreeSet<usize> {
    fn contains(&self, vertex: usize) -> bool {
        Self::contains(self, &vertex)
    }
}

impl<S: BuildHasher> VertexSet for HashSet<usize, S> {
    fn contains(&self, vertex: usize) -> bool {
        Self::contains(self, &vertex)
    }
}

/// A sorted slice of indices, searched by bisection.
impl VertexSet for [usize] {
    fn contains(&self, vertex: usize) -> bool {
        self.binary_search(&vertex).is_ok()
    }
}

impl<T: VertexSet + ?Sized> VertexSet for &T {
    fn contains(&self, vertex: usize) -> bool {
        (**self).contains(vertex)
    }
}

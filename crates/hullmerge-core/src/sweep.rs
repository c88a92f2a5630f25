//! Left-to-right sweep merge over a live spatial index.
//!
//! Unlike the batch pass, the sweep mutates the index as it goes: each
//! accepted merge replaces two fragments with one before the next
//! candidate is examined, and every merge is checked by a
//! [`MergeValidator`] against the index as it would look afterwards.
//!
//! One call to [`sweep`] drains its queue exactly once. Fragments created
//! by a merge are not re-enqueued, so cascading merges need further
//! sweeps; [`sweep_until_stable`] repeats until a sweep merges nothing.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::fragment::{Fragment, GeometryBuilder};
use crate::index::SpatialIndex;
use crate::merge::{CacheKey, Merger, cache_key};
use crate::score::Scorer;
use crate::types::{MergeError, Range};
use crate::validate::MergeValidator;
use crate::vertices::VertexSet;

/// Counters describing what a sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    /// Number of sweeps run.
    pub passes: usize,
    /// Candidates that were taken out of the index and examined.
    pub visited: usize,
    /// Committed merges.
    pub merges: usize,
    /// Merges accepted by score but rejected by the validator.
    pub rejected_by_validator: usize,
    /// Pairs skipped because they were already scored this sweep.
    pub cache_hits: usize,
    /// Pairs scored.
    pub scored: usize,
}

impl SweepStats {
    pub(crate) fn absorb(&mut self, other: Self) {
        self.passes += other.passes;
        self.visited += other.visited;
        self.merges += other.merges;
        self.rejected_by_validator += other.rejected_by_validator;
        self.cache_hits += other.cache_hits;
        self.scored += other.scored;
    }
}

/// Replace `consumed` with `candidate` in `index` if `validator` accepts
/// the candidate against the index without `consumed`.
///
/// On rejection `consumed` is put back, leaving the index as it was.
/// Returns whether the candidate was committed.
///
/// # Errors
///
/// Returns [`MergeError::MissingFragment`] if `consumed` is not live, or
/// [`MergeError::DuplicateFragment`] if inserting the candidate collides
/// with a live range.
pub fn with_speculative_removal<I, M>(
    index: &mut I,
    consumed: &Fragment,
    candidate: Fragment,
    validator: &M,
) -> Result<bool, MergeError>
where
    I: SpatialIndex + ?Sized,
    M: MergeValidator<I> + ?Sized,
{
    let removed = index.remove(consumed)?;
    if validator.validate(&candidate, index) {
        index.insert(candidate)?;
        Ok(true)
    } else {
        index.insert(removed)?;
        Ok(false)
    }
}

/// The neighbours ending at `hull`'s first vertex and starting at its
/// last vertex, first in range order.
fn select_neighbours(hull: Range, mut neighbours: Vec<&Fragment>) -> (Option<Fragment>, Option<Fragment>) {
    neighbours.sort_by_key(|f| f.range());
    let prev = neighbours.iter().find(|f| f.range().j() == hull.i());
    let next = neighbours.iter().find(|f| f.range().i() == hull.j());
    (prev.map(|f| (*f).clone()), next.map(|f| (*f).clone()))
}

/// Score `hull` against `next`, then `prev` against `hull`.
fn score_neighbours<S, A, G>(
    merger: &Merger<S, A, G>,
    cache: &mut HashSet<CacheKey>,
    stats: &mut SweepStats,
    hull: &Fragment,
    prev: Option<&Fragment>,
    next: Option<&Fragment>,
) -> Result<(Option<Fragment>, Option<Fragment>), MergeError>
where
    S: Scorer,
    A: Fn(f64) -> bool,
    G: GeometryBuilder,
{
    let merge_next = match next {
        Some(next) => attempt(merger, cache, stats, hull, next)?,
        None => None,
    };
    let merge_prev = match prev {
        Some(prev) => attempt(merger, cache, stats, prev, hull)?,
        None => None,
    };
    Ok((merge_prev, merge_next))
}

/// Score the pair once per sweep.
fn attempt<S, A, G>(
    merger: &Merger<S, A, G>,
    cache: &mut HashSet<CacheKey>,
    stats: &mut SweepStats,
    a: &Fragment,
    b: &Fragment,
) -> Result<Option<Fragment>, MergeError>
where
    S: Scorer,
    A: Fn(f64) -> bool,
    G: GeometryBuilder,
{
    if !cache.insert(cache_key(a.range(), b.range())) {
        stats.cache_hits += 1;
        return Ok(None);
    }
    stats.scored += 1;
    merger.try_merge(a, b)
}

/// One left-to-right merge sweep over the fragments in `index`.
///
/// Only fragments of exactly `fragment_size` whose endpoints are both
/// unprotected are candidates. Each candidate is merged forward with the
/// fragment starting at its last vertex if the score and `validator`
/// accept it, and otherwise backward with the fragment ending at its
/// first vertex. A pair is scored at most once per sweep, so a pair
/// rejected early is not retried even if its surroundings change.
///
/// # Errors
///
/// Returns the first contract violation from the index or the merge
/// primitives. The index may then be partially swept. A candidate whose
/// merge fails to score or build is put back before the error is
/// returned, so the live fragments still cover every vertex. An error
/// from the index itself is returned as-is.
pub fn sweep<I, V, S, A, G, M>(
    index: &mut I,
    protected: &V,
    merger: &Merger<S, A, G>,
    validator: &M,
    fragment_size: usize,
    tolerance: f64,
) -> Result<SweepStats, MergeError>
where
    I: SpatialIndex + ?Sized,
    V: VertexSet + ?Sized,
    S: Scorer,
    A: Fn(f64) -> bool,
    G: GeometryBuilder,
    M: MergeValidator<I> + ?Sized,
{
    let mut snapshot: Vec<Fragment> = index.all().into_iter().cloned().collect();
    snapshot.sort_by_key(Fragment::range);
    let mut queue = VecDeque::from(snapshot);
    let mut cache: HashSet<CacheKey> = HashSet::new();
    let mut stats = SweepStats {
        passes: 1,
        ..SweepStats::default()
    };

    while let Some(hull) = queue.pop_front() {
        let hr = hull.range();
        if hr.size() != fragment_size {
            continue;
        }
        if protected.contains(hr.i()) || protected.contains(hr.j()) {
            tracing::trace!(candidate = %hr, "protected endpoint");
            continue;
        }

        let hull = index.remove(&hull)?;
        stats.visited += 1;

        let (prev, next) = select_neighbours(hr, index.neighbours(&hull, tolerance));

        let scored = score_neighbours(
            merger,
            &mut cache,
            &mut stats,
            &hull,
            prev.as_ref(),
            next.as_ref(),
        );
        let (merge_prev, merge_next) = match scored {
            Ok(merges) => merges,
            Err(e) => {
                index.insert(hull)?;
                return Err(e);
            }
        };

        let mut merged = false;
        if let (Some(next), Some(candidate)) = (&next, merge_next) {
            let range = candidate.range();
            if with_speculative_removal(index, next, candidate, validator)? {
                if queue.front().is_some_and(|f| f.range() == next.range()) {
                    queue.pop_front();
                }
                tracing::trace!(candidate = %hr, partner = %next.range(), merged = %range, "forward merge");
                merged = true;
            } else {
                tracing::trace!(candidate = %hr, merged = %range, "forward merge rejected by validator");
                stats.rejected_by_validator += 1;
            }
        }

        if !merged
            && let (Some(prev), Some(candidate)) = (&prev, merge_prev)
        {
            let range = candidate.range();
            if with_speculative_removal(index, prev, candidate, validator)? {
                tracing::trace!(candidate = %hr, partner = %prev.range(), merged = %range, "backward merge");
                merged = true;
            } else {
                tracing::trace!(candidate = %hr, merged = %range, "backward merge rejected by validator");
                stats.rejected_by_validator += 1;
            }
        }

        if merged {
            stats.merges += 1;
        } else {
            index.insert(hull)?;
        }
    }

    tracing::debug!(
        fragment_size,
        live = index.len(),
        visited = stats.visited,
        merges = stats.merges,
        rejected_by_validator = stats.rejected_by_validator,
        cache_hits = stats.cache_hits,
        "sweep complete"
    );
    Ok(stats)
}

/// Repeat [`sweep`] until a sweep commits no merge.
///
/// Each sweep starts with an empty attempt cache, so pairs rejected in
/// one sweep are scored again in the next. Returns the summed counters.
///
/// # Errors
///
/// Propagates the first error from [`sweep`].
pub fn sweep_until_stable<I, V, S, A, G, M>(
    index: &mut I,
    protected: &V,
    merger: &Merger<S, A, G>,
    validator: &M,
    fragment_size: usize,
    tolerance: f64,
) -> Result<SweepStats, MergeError>
where
    I: SpatialIndex + ?Sized,
    V: VertexSet + ?Sized,
    S: Scorer,
    A: Fn(f64) -> bool,
    G: GeometryBuilder,
    M: MergeValidator<I> + ?Sized,
{
    let mut total = SweepStats::default();
    loop {
        let pass = sweep(index, protected, merger, validator, fragment_size, tolerance)?;
        total.absorb(pass);
        if pass.merges == 0 {
            return Ok(total);
        }
    }
}

//! Batch merge pass over a fixed fragment snapshot.
//!
//! Every fragment of exactly the target size is a merge candidate; it is
//! merged with the first spatial neighbour (in range order) that is
//! contiguous across an unprotected boundary and whose stitched score is
//! accepted. Fragments of any size can be partners. The index is only
//! queried, never mutated: the pass tracks what it has consumed itself.
//!
//! [`merge_cascade`] runs one pass per fragment size, rebuilding the
//! index over the survivors in between.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::fragment::{Fragment, GeometryBuilder};
use crate::index::{FragmentIndex, SpatialIndex};
use crate::merge::Merger;
use crate::score::Scorer;
use crate::types::{MergeConfig, MergeError, Range};
use crate::vertices::VertexSet;

/// Candidates found ineligible in a pass, keyed by range.
///
/// Lets a caller tell "never tried" from "tried and rejected".
pub type Unmerged = HashMap<Range, Fragment>;

/// Result of a batch pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Surviving fragments (merged results included), ordered by range.
    pub kept: Vec<Fragment>,
    /// Fragments consumed by a merge, in the order they were consumed:
    /// partner first, then candidate.
    pub removed: Vec<Fragment>,
}

/// Whether `candidate` and `partner` meet at a boundary vertex that is
/// not protected.
fn mergeable<V: VertexSet + ?Sized>(candidate: Range, partner: Range, protected: &V) -> bool {
    (candidate.j() == partner.i() && !protected.contains(partner.i()))
        || (candidate.i() == partner.j() && !protected.contains(partner.j()))
}

/// Merge every eligible fragment of `fragment_size` with its first
/// eligible spatial neighbour.
///
/// `fragments` is the snapshot the pass iterates; `index` must cover it.
/// Candidates with no eligible neighbour are recorded in `unmerged`; a
/// candidate that does merge is removed from it.
///
/// # Errors
///
/// Propagates contract violations from stitching or building a merged
/// fragment.
pub fn merge_by_size<I, V, S, A, G>(
    fragments: &[Fragment],
    index: &I,
    protected: &V,
    unmerged: &mut Unmerged,
    fragment_size: usize,
    merger: &Merger<S, A, G>,
    tolerance: f64,
) -> Result<BatchOutcome, MergeError>
where
    I: SpatialIndex + ?Sized,
    V: VertexSet + ?Sized,
    S: Scorer,
    A: Fn(f64) -> bool,
    G: GeometryBuilder,
{
    let mut kept: BTreeMap<Range, Fragment> =
        fragments.iter().map(|f| (f.range(), f.clone())).collect();
    let mut merged_away: HashSet<Range> = HashSet::new();
    let mut removed = Vec::new();

    for hull in fragments {
        let hr = hull.range();
        if merged_away.contains(&hr) || hr.size() != fragment_size {
            continue;
        }

        let mut neighbours = index.neighbours(hull, tolerance);
        neighbours.sort_by_key(|f| f.range());

        let mut accepted = None;
        for partner in neighbours {
            let sr = partner.range();
            if merged_away.contains(&sr) || !mergeable(hr, sr, protected) {
                continue;
            }
            if let Some(merged) = merger.try_merge(hull, partner)? {
                accepted = Some((partner, merged));
                break;
            }
        }

        let Some((partner, merged)) = accepted else {
            tracing::trace!(candidate = %hr, "no eligible neighbour");
            unmerged.insert(hr, hull.clone());
            continue;
        };

        let sr = partner.range();
        tracing::trace!(candidate = %hr, partner = %sr, merged = %merged.range(), "merged");
        merged_away.insert(hr);
        merged_away.insert(sr);
        kept.remove(&hr);
        kept.remove(&sr);
        kept.insert(merged.range(), merged);
        removed.push(partner.clone());
        removed.push(hull.clone());
        unmerged.remove(&hr);
    }

    tracing::debug!(
        fragment_size,
        input = fragments.len(),
        kept = kept.len(),
        removed = removed.len(),
        unmerged = unmerged.len(),
        "batch pass complete"
    );

    Ok(BatchOutcome {
        kept: kept.into_values().collect(),
        removed,
    })
}

/// Result of [`merge_cascade`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeOutcome {
    /// Surviving fragments after the last pass, ordered by range.
    pub fragments: Vec<Fragment>,
    /// Unmerged candidates of the last pass.
    pub unmerged: Unmerged,
    /// Total number of accepted merges across all passes.
    pub merges: usize,
}

/// Run batch passes for every size from `config.fragment_size` to
/// `config.max_fragment_size`, re-indexing the survivors before each.
///
/// # Errors
///
/// Returns [`MergeError::InvalidConfig`] for an invalid `config` and
/// propagates contract violations from the passes.
pub fn merge_cascade<V, S, G>(
    fragments: Vec<Fragment>,
    protected: &V,
    config: &MergeConfig,
    scorer: S,
    builder: G,
) -> Result<CascadeOutcome, MergeError>
where
    V: VertexSet + ?Sized,
    S: Scorer,
    G: GeometryBuilder,
{
    config.validate()?;
    let merger = Merger::new(scorer, |score: f64| config.accepts(score), builder);

    let mut outcome = CascadeOutcome {
        fragments,
        ..CascadeOutcome::default()
    };
    for size in config.fragment_size..=config.max_fragment_size {
        let index = FragmentIndex::from_fragments(outcome.fragments.clone())?;
        let mut unmerged = Unmerged::new();
        let pass = merge_by_size(
            &outcome.fragments,
            &index,
            protected,
            &mut unmerged,
            size,
            &merger,
            config.neighbour_tolerance,
        )?;
        outcome.merges += pass.removed.len() / 2;
        outcome.fragments = pass.kept;
        outcome.unmerged = unmerged;
    }
    Ok(outcome)
}

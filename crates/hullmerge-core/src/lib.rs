//! hullmerge-core: Fragment merging for polyline generalization (sans-IO).
//!
//! A polyline is cut into contiguous fragments ("hulls"), each covering a
//! range of source vertices. Adjacent fragments are then merged pairwise
//! whenever the merged fragment still fits the source line, as judged by
//! a pluggable score and acceptance threshold. Vertices in a protected set
//! are never dropped, and the sweep driver can additionally reject merges
//! that would make the simplified line cross itself.
//!
//! Two drivers share the same primitives:
//!
//! - [`batch::merge_by_size`]: one pass over a fixed fragment snapshot,
//!   queried against a read-only spatial index.
//! - [`sweep::sweep`]: one left-to-right pass that mutates a live index,
//!   with speculative removal, validation and rollback.
//!
//! [`simplify`] wires both up with the reference scorer, geometry builder
//! and validator for callers that just want a simplified line.
//!
//! This crate performs no I/O. Progress is reported through `tracing`
//! events; installing a subscriber is up to the caller.

pub mod batch;
pub mod fragment;
pub mod index;
pub mod merge;
pub mod score;
pub mod sweep;
pub mod types;
pub mod validate;
pub mod vertices;

pub use fragment::{Fragment, GeometryBuilder};
pub use index::{FragmentIndex, SpatialIndex};
pub use merge::Merger;
pub use score::{Score, Scorer};
pub use sweep::SweepStats;
pub use types::{MergeConfig, MergeError, MergeMode, Point, Polyline, Range};
pub use validate::MergeValidator;
pub use vertices::VertexSet;

use validate::{AcceptAll, ChordIntersectionGuard};

/// Output of [`simplify`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimplifyResult {
    /// Number of fragments the polyline was split into.
    pub input_fragments: usize,
    /// Surviving fragments, ordered by range.
    pub fragments: Vec<Fragment>,
    /// The simplified polyline assembled from `fragments`.
    pub polyline: Polyline,
    /// Committed merges across all passes.
    pub merges: usize,
    /// Candidates left unmerged by the last batch pass, ordered. Empty in
    /// sweep mode.
    pub unmerged: Vec<Range>,
    /// Summed sweep counters. `None` in batch mode.
    pub sweep: Option<SweepStats>,
}

/// Split `polyline` at `split_at`, merge the fragments, and assemble the
/// simplified line.
///
/// Fragments are scored with [`score::max_offset`] and built with
/// [`fragment::hull_geometry`].
///
/// # Steps
///
/// 1. Validate `config`
/// 2. Split into fragments at `split_at` (first and last vertex implied)
/// 3. Merge, for every size from `fragment_size` to `max_fragment_size`:
///    - [`MergeMode::Batch`]: one [`batch::merge_by_size`] pass per size
///    - [`MergeMode::Sweep`]: [`sweep::sweep_until_stable`] per size, with
///      [`validate::ChordIntersectionGuard`] when
///      `avoid_new_intersections` is set
/// 4. Assemble the surviving fragments
///
/// # Errors
///
/// Returns [`MergeError::InvalidConfig`] for an invalid `config`, and any
/// contract violation raised while merging.
pub fn simplify<V>(
    polyline: &Polyline,
    split_at: &[usize],
    protected: &V,
    config: &MergeConfig,
) -> Result<SimplifyResult, MergeError>
where
    V: VertexSet + ?Sized,
{
    config.validate()?;

    let fragments = fragment::fragments_at_indices(polyline, split_at, &fragment::hull_geometry)?;
    let input_fragments = fragments.len();

    let (fragments, merges, unmerged, sweep_stats) = match config.mode {
        MergeMode::Batch => {
            let outcome = batch::merge_cascade(
                fragments,
                protected,
                config,
                score::max_offset,
                fragment::hull_geometry,
            )?;
            let mut unmerged: Vec<Range> = outcome.unmerged.into_keys().collect();
            unmerged.sort_unstable();
            (outcome.fragments, outcome.merges, unmerged, None)
        }
        MergeMode::Sweep => {
            let mut index = FragmentIndex::from_fragments(fragments)?;
            let merger = Merger::new(
                score::max_offset,
                |score: f64| config.accepts(score),
                fragment::hull_geometry,
            );
            let validator: &dyn MergeValidator<FragmentIndex> = if config.avoid_new_intersections {
                &ChordIntersectionGuard
            } else {
                &AcceptAll
            };

            let mut stats = SweepStats::default();
            for size in config.fragment_size..=config.max_fragment_size {
                let pass = sweep::sweep_until_stable(
                    &mut index,
                    protected,
                    &merger,
                    validator,
                    size,
                    config.neighbour_tolerance,
                )?;
                stats.absorb(pass);
            }
            (index.to_sorted_vec(), stats.merges, Vec::new(), Some(stats))
        }
    };

    let polyline = fragment::assemble(&fragments)?;
    tracing::debug!(
        mode = ?config.mode,
        input_fragments,
        output_fragments = fragments.len(),
        merges,
        "simplify complete"
    );

    Ok(SimplifyResult {
        input_fragments,
        fragments,
        polyline,
        merges,
        unmerged,
        sweep: sweep_stats,
    })
}

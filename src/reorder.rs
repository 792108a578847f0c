//! Intra-batch pass ordering.
//!
//! A batch's passes have no dependency order between them by construction
//! (the batcher only guarantees every predecessor is in an earlier batch),
//! so the order within a batch is a free policy choice. Mirrors
//! `RenderGraph::minimizeSubchannelSwitches`/`sortBatchPasses`: grouping by
//! kind (or alternating) reduces how often the recorder crosses between
//! queue-like "channels", which on some GPUs avoids a pipeline stall.

use crate::builder::PassKind;
use crate::config::ReorderStrategy;

/// Reorders `passes` (indices into the builder's pass array) in place
/// according to `strategy`. `kind_of` looks up a pass's [`PassKind`].
/// `alternate_state` carries the "which kind went last" flag across batch
/// boundaries for [`ReorderStrategy::AlternateKind`]; pass `&mut
/// Option<PassKind>` seeded with the previous batch's outcome, and read back
/// after the call.
pub(crate) fn reorder_batch(passes: &mut [usize], strategy: ReorderStrategy, kind_of: impl Fn(usize) -> PassKind, alternate_state: &mut Option<PassKind>) {
    match strategy {
        ReorderStrategy::GroupByKind => group_by_kind(passes, kind_of),
        ReorderStrategy::AlternateKind => alternate_kind(passes, kind_of, alternate_state),
    }
}

/// Stable partition: every pass of the kind seen first in the batch precedes
/// every pass of the other kind(s), preserving relative order within each
/// group.
fn group_by_kind(passes: &mut [usize], kind_of: impl Fn(usize) -> PassKind) {
    if passes.is_empty() {
        return;
    }
    let first_kind = kind_of(passes[0]);
    // `sort_by_key` is stable, so relative order within each group survives.
    passes.sort_by_key(|&p| kind_of(p) != first_kind);
}

/// Orders the batch so passes of `alternate_state`'s kind (if any) are
/// grouped last and the other kind first, then flips `alternate_state` to
/// whichever kind the batch ends on, carrying the alternation across batch
/// boundaries. Within each kind's group, relative order is preserved.
fn alternate_kind(passes: &mut [usize], kind_of: impl Fn(usize) -> PassKind, alternate_state: &mut Option<PassKind>) {
    if passes.is_empty() {
        return;
    }

    let preferred_first = match alternate_state {
        Some(last) => {
            let other = if *last == PassKind::Graphics { PassKind::Compute } else { PassKind::Graphics };
            other
        }
        None => kind_of(passes[0]),
    };

    passes.sort_by_key(|&p| kind_of(p) != preferred_first);

    *alternate_state = passes.last().map(|&p| kind_of(p));
}

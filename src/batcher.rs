//! Greedy topological batching: groups passes with no unmet dependency into
//! the same batch, maximising intra-frame parallelism while respecting every
//! predecessor edge the analyser found.

use crate::analyser::PredecessorSets;

/// One batch: the indices (into the builder's pass array, in relative
/// recording order) of the passes it contains.
#[derive(Debug, Clone)]
pub(crate) struct Batch {
    pub passes: Vec<usize>,
}

/// Partitions every pass into batches such that a pass only appears once
/// every predecessor named by the analyser is already in an earlier batch.
///
/// Mirrors `RenderGraph::initBatches`/`passHasUnmetDependencies`: repeatedly
/// scan the not-yet-scheduled passes in declaration order, greedily pull
/// every pass whose predecessors are all already scheduled into the current
/// batch, then start a new batch once a pass with an unmet dependency is
/// hit. Declaration order is preserved within a batch other than the
/// greedy skip, so the reorder stage (`reorder.rs`) has a stable base to
/// work from.
pub(crate) fn build_batches(preds: &PredecessorSets) -> Vec<Batch> {
    let pass_count = preds.pass_count();
    let mut scheduled = vec![false; pass_count];
    let mut scheduled_count = 0;
    let mut batches = Vec::new();

    while scheduled_count < pass_count {
        let mut batch = Vec::new();
        for pass in 0..pass_count {
            if scheduled[pass] {
                continue;
            }
            if has_unmet_dependency(preds, pass, &scheduled) {
                continue;
            }
            batch.push(pass);
        }

        debug_assert!(!batch.is_empty(), "cycle in pass dependencies, or a bug in the analyser");

        for &pass in &batch {
            scheduled[pass] = true;
        }
        scheduled_count += batch.len();
        log::debug!("batch {} formed with {} passes", batches.len(), batch.len());
        batches.push(Batch { passes: batch });
    }

    batches
}

fn has_unmet_dependency(preds: &PredecessorSets, pass: usize, scheduled: &[bool]) -> bool {
    preds.iter(pass).any(|predecessor| !scheduled[predecessor])
}

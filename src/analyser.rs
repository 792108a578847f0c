//! Dependency Analyser: turns each resource's per-pass dependency history
//! into a predecessor bitset per pass, via the pairwise RAW/WAR/WAW scan.

use crate::builder::RenderGraphBuilder;
use crate::device::GraphDevice;
use crate::registry::{AsEntry, BufferEntry, RtEntry};
use crate::usage::accesses_conflict;

/// `predecessors[p]` has bit `q` set iff pass `q` must complete (and any
/// barrier it requires be emitted) before pass `p` may start, because some
/// resource access pair between them conflicts (RAW, WAR or WAW).
///
/// Stored as a flat `Vec<u64>` bitset, `pass_count` words wide per pass
/// (`ceil(pass_count / 64)` words), row-major by pass index. A plain `Vec`
/// is enough at the pass counts a single frame produces; no need for a
/// dedicated bitset crate.
pub(crate) struct PredecessorSets {
    words_per_row: usize,
    bits: Vec<u64>,
    pass_count: usize,
}

impl PredecessorSets {
    pub(crate) fn new(pass_count: usize) -> Self {
        let words_per_row = pass_count.div_ceil(64).max(1);
        Self { words_per_row, bits: vec![0u64; words_per_row * pass_count], pass_count }
    }

    pub(crate) fn set(&mut self, pass: usize, predecessor: usize) {
        let row = pass * self.words_per_row;
        self.bits[row + predecessor / 64] |= 1u64 << (predecessor % 64);
    }

    #[must_use]
    pub fn is_set(&self, pass: usize, predecessor: usize) -> bool {
        let row = pass * self.words_per_row;
        (self.bits[row + predecessor / 64] >> (predecessor % 64)) & 1 != 0
    }

    /// Every predecessor index of `pass`, ascending.
    pub fn iter(&self, pass: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.pass_count).filter(move |&q| self.is_set(pass, q))
    }

    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.pass_count
    }
}

/// Scans every resource's dependency history for conflicting access pairs and
/// records the later pass as depending on the earlier one.
///
/// Mirrors `RenderGraph::initRenderPassesAndSetDeps`: for each resource, for
/// every pair `(i, j)` of passes that touch it with `i` declared before `j`
/// and overlapping sub-resources, if their usages conflict then pass `j`
/// gains pass `i` as a predecessor. Quadratic in the resource's dependent
/// pass count; render graphs keep that count small per resource so this
/// stays cheap in aggregate.
pub(crate) fn analyse_dependencies<D: GraphDevice>(builder: &RenderGraphBuilder<D>) -> PredecessorSets {
    let pass_count = builder.pass_count();
    let mut preds = PredecessorSets::new(pass_count);

    for rt in &builder.render_targets {
        scan_texture_history(rt, &mut preds);
    }
    for buf in &builder.buffers {
        scan_buffer_history(buf, &mut preds);
    }
    for as_entry in &builder.as_entries {
        scan_as_history(as_entry, &mut preds);
    }

    preds
}

fn scan_texture_history<D: GraphDevice>(rt: &RtEntry<D>, preds: &mut PredecessorSets) {
    let n = rt.dependent_passes.len();
    for i in 0..n {
        for j in (i + 1)..n {
            if !rt.dependency_subresources[i].overlaps_with(rt.dependency_subresources[j]) {
                continue;
            }
            let (a, b) = (rt.dependency_usages[i], rt.dependency_usages[j]);
            if accesses_conflict(a.is_read(), a.is_write(), b.is_read(), b.is_write()) {
                let pi = rt.dependent_passes[i].as_usize();
                let pj = rt.dependent_passes[j].as_usize();
                if pi != pj {
                    preds.set(pj, pi);
                }
            }
        }
    }
}

fn scan_buffer_history<D: GraphDevice>(buf: &BufferEntry<D>, preds: &mut PredecessorSets) {
    let n = buf.dependent_passes.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (buf.dependency_usages[i], buf.dependency_usages[j]);
            if accesses_conflict(a.is_read(), a.is_write(), b.is_read(), b.is_write()) {
                let pi = buf.dependent_passes[i].as_usize();
                let pj = buf.dependent_passes[j].as_usize();
                if pi != pj {
                    preds.set(pj, pi);
                }
            }
        }
    }
}

fn scan_as_history<D: GraphDevice>(as_entry: &AsEntry<D>, preds: &mut PredecessorSets) {
    let n = as_entry.dependent_passes.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (as_entry.dependency_usages[i], as_entry.dependency_usages[j]);
            if accesses_conflict(a.is_read(), a.is_write(), b.is_read(), b.is_write()) {
                let pi = as_entry.dependent_passes[i].as_usize();
                let pj = as_entry.dependent_passes[j].as_usize();
                if pi != pj {
                    preds.set(pj, pi);
                }
            }
        }
    }
}

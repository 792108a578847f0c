//! Graphviz `dot` export of a compiled frame, gated behind the
//! `rdg_inspector` feature. Debug tooling only: never on the hot path, and
//! never referenced by the rest of the crate when the feature is off.
//!
//! One cluster per batch (colour-coded by index), one node per pass, and a
//! barrier node between consecutive batches for every resource whose usage
//! changed going into the later batch.

use std::fmt::Write as _;

/// A palette cycled by batch index so adjacent batches are visually distinct
/// without needing as many colours as there are batches.
const BATCH_COLORS: &[&str] = &["lightblue", "lightgreen", "lightyellow", "lightpink", "lightgrey", "lightsalmon"];

/// One barrier's label, already rendered to text by the caller (which has
/// the device-specific texture/buffer identity needed to resolve a resource
/// name; this module deals only in strings).
pub(crate) struct BarrierLabel {
    pub resource_name: String,
    pub subresource: String,
    pub before: String,
    pub after: String,
}

pub(crate) struct PassNode {
    pub name: String,
    pub kind: String,
}

/// Renders the whole compiled frame as a `dot` digraph.
///
/// `batches[i]` holds the indices into `passes` for batch `i`; `barriers[i]`
/// is the set of resource transitions the barrier scheduler placed before
/// batch `i` runs (empty for batch 0, which starts from each resource's
/// initial usage with no scheduler-visible predecessor node).
pub(crate) fn render_dot(passes: &[PassNode], batches: &[Vec<usize>], barriers: &[Vec<BarrierLabel>]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph RenderGraph {{");
    let _ = writeln!(out, "  rankdir=TB;");
    let _ = writeln!(out, "  node [shape=box, style=filled];");

    for (batch_idx, batch) in batches.iter().enumerate() {
        let color = BATCH_COLORS[batch_idx % BATCH_COLORS.len()];
        let _ = writeln!(out, "  subgraph cluster_batch{batch_idx} {{");
        let _ = writeln!(out, "    label=\"batch {batch_idx}\";");
        let _ = writeln!(out, "    style=filled; color=lightgrey;");
        for &pass in batch {
            let node = &passes[pass];
            let _ = writeln!(out, "    \"pass{pass}\" [label=\"{}\\n({})\", fillcolor={color}];", node.name, node.kind);
        }
        let _ = writeln!(out, "  }}");
    }

    for (batch_idx, batch_barriers) in barriers.iter().enumerate() {
        if batch_barriers.is_empty() {
            continue;
        }
        for (barrier_idx, barrier) in batch_barriers.iter().enumerate() {
            let node_id = format!("barrier{batch_idx}_{barrier_idx}");
            let _ = writeln!(
                out,
                "  \"{node_id}\" [shape=ellipse, style=filled, fillcolor=orange, label=\"{}\\n{}\\n{} -> {}\"];",
                barrier.resource_name, barrier.subresource, barrier.before, barrier.after
            );
            if batch_idx > 0 {
                for &pred_pass in &batches[batch_idx - 1] {
                    let _ = writeln!(out, "  \"pass{pred_pass}\" -> \"{node_id}\";");
                }
            }
            for &next_pass in &batches[batch_idx] {
                let _ = writeln!(out, "  \"{node_id}\" -> \"pass{next_pass}\";");
            }
        }
    }

    let _ = writeln!(out, "}}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_cluster_per_batch_and_a_barrier_node_between_them() {
        let passes = vec![PassNode { name: "a".into(), kind: "Graphics".into() }, PassNode { name: "b".into(), kind: "Compute".into() }];
        let batches = vec![vec![0], vec![1]];
        let barriers = vec![
            Vec::new(),
            vec![BarrierLabel { resource_name: "rt0".into(), subresource: "mip0".into(), before: "FRAMEBUFFER_WRITE".into(), after: "SAMPLED_COMPUTE".into() }],
        ];

        let dot = render_dot(&passes, &batches, &barriers);
        assert!(dot.starts_with("digraph RenderGraph {"));
        assert!(dot.contains("cluster_batch0"));
        assert!(dot.contains("cluster_batch1"));
        assert!(dot.contains("rt0"));
        assert!(dot.contains("\"pass0\" -> \"barrier1_0\";"));
        assert!(dot.contains("\"barrier1_0\" -> \"pass1\";"));
    }

    #[test]
    fn empty_frame_renders_an_empty_digraph() {
        let dot = render_dot(&[], &[], &[]);
        assert_eq!(dot, "digraph RenderGraph {\n  rankdir=TB;\n  node [shape=box, style=filled];\n}\n");
    }
}

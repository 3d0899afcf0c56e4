//! PageRank centrality over the weighted reference graph.

use indexmap::IndexMap;

use crate::models::ReferenceEdge;

/// Run `iterations` rounds of weighted power iteration over `node_ids` and
/// return scores normalized so the top node is exactly 1.0.
///
/// Nodes with no outgoing weight do not redistribute their mass. Edges whose
/// endpoints are unknown are ignored.
pub fn compute_centrality(
    node_ids: &[String],
    edges: &[ReferenceEdge],
    iterations: usize,
    damping: f64,
) -> IndexMap<String, f64> {
    if node_ids.is_empty() {
        return IndexMap::new();
    }

    let index: IndexMap<&str, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let n = node_ids.len();

    let mut outgoing: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut out_weight = vec![0.0_f64; n];
    for edge in edges {
        let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
        else {
            continue;
        };
        if edge.weight <= 0.0 {
            continue;
        }
        outgoing[from].push((to, edge.weight));
        out_weight[from] += edge.weight;
    }

    let base = 1.0 / n as f64;
    let teleport = (1.0 - damping) / n as f64;
    let mut scores = vec![base; n];

    for _ in 0..iterations {
        let mut next = vec![teleport; n];
        for (source, targets) in outgoing.iter().enumerate() {
            if out_weight[source] <= 0.0 {
                continue;
            }
            let mass = damping * scores[source] / out_weight[source];
            for &(target, weight) in targets {
                next[target] += mass * weight;
            }
        }
        scores = next;
    }

    let max = scores.iter().copied().fold(0.0_f64, f64::max);
    node_ids
        .iter()
        .zip(scores)
        .map(|(id, score)| {
            let normalized = if max > 0.0 { score / max } else { 0.0 };
            (id.clone(), normalized)
        })
        .collect()
}

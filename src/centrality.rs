// 📈 Centrality - PageRank + Brandes betweenness over node indices
// Both return one value per node, indexed like the graph's accounts

use crate::graph::TransactionGraph;
use std::collections::VecDeque;

pub const PAGERANK_DAMPING: f64 = 0.85;
pub const PAGERANK_MAX_ITERATIONS: usize = 100;
const PAGERANK_TOLERANCE: f64 = 1e-6;

/// Weighted PageRank (parallel edges count as weight)
///
/// Dangling nodes spread their mass uniformly. Iteration stops once the L1
/// change drops below `n * 1e-6`, or after `PAGERANK_MAX_ITERATIONS`.
pub fn pagerank(graph: &TransactionGraph) -> Vec<f64> {
    let n = graph.node_count();
    if n == 0 {
        return Vec::new();
    }

    let nf = n as f64;
    let out_weight: Vec<f64> = (0..n).map(|v| graph.out_edges(v).len() as f64).collect();

    let mut rank = vec![1.0 / nf; n];

    for _ in 0..PAGERANK_MAX_ITERATIONS {
        let dangling: f64 = (0..n)
            .filter(|&v| out_weight[v] == 0.0)
            .map(|v| rank[v])
            .sum();

        let base = (1.0 - PAGERANK_DAMPING) / nf + PAGERANK_DAMPING * dangling / nf;
        let mut next = vec![base; n];

        for edge in graph.edges() {
            next[edge.to] += PAGERANK_DAMPING * rank[edge.from] / out_weight[edge.from];
        }

        let delta: f64 = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
        rank = next;

        if delta < nf * PAGERANK_TOLERANCE {
            break;
        }
    }

    rank
}

/// Brandes betweenness on the simple (deduplicated) directed graph
///
/// Normalized by `1 / ((n-1)(n-2))` when there are more than two nodes.
pub fn betweenness(graph: &TransactionGraph) -> Vec<f64> {
    let n = graph.node_count();
    let mut centrality = vec![0.0; n];

    let mut stack: Vec<usize> = Vec::with_capacity(n);
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0f64; n];
    let mut dist = vec![-1i64; n];
    let mut delta = vec![0.0f64; n];

    for s in 0..n {
        stack.clear();
        for p in preds.iter_mut() {
            p.clear();
        }
        sigma.fill(0.0);
        dist.fill(-1);
        delta.fill(0.0);

        sigma[s] = 1.0;
        dist[s] = 0;
        let mut queue = VecDeque::from([s]);

        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in graph.successors(v) {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        while let Some(w) = stack.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n as f64 - 1.0) * (n as f64 - 2.0));
        for c in centrality.iter_mut() {
            *c *= scale;
        }
    }

    centrality
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::txs;

    #[test]
    fn test_pagerank_sums_to_one() {
        let graph = TransactionGraph::build(&txs(&[
            ("T1", "A", "B", 10.0, "2026-02-18 10:00:00"),
            ("T2", "B", "C", 10.0, "2026-02-18 11:00:00"),
            ("T3", "C", "A", 10.0, "2026-02-18 12:00:00"),
            ("T4", "C", "D", 10.0, "2026-02-18 13:00:00"),
        ]))
        .unwrap();

        let ranks = pagerank(&graph);
        assert_eq!(ranks.len(), 4);
        let total: f64 = ranks.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pagerank_symmetric_cycle() {
        let graph = TransactionGraph::build(&txs(&[
            ("T1", "A", "B", 10.0, "2026-02-18 10:00:00"),
            ("T2", "B", "C", 10.0, "2026-02-18 11:00:00"),
            ("T3", "C", "A", 10.0, "2026-02-18 12:00:00"),
        ]))
        .unwrap();

        for rank in pagerank(&graph) {
            assert!((rank - 1.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_betweenness_path() {
        // A -> B -> C: only B sits on a shortest path
        let graph = TransactionGraph::build(&txs(&[
            ("T1", "A", "B", 10.0, "2026-02-18 10:00:00"),
            ("T2", "B", "C", 10.0, "2026-02-18 11:00:00"),
        ]))
        .unwrap();

        let scores = betweenness(&graph);
        assert_eq!(scores[0], 0.0);
        assert!((scores[1] - 0.5).abs() < 1e-9);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn test_empty_graph() {
        let graph = TransactionGraph::build(&[]).unwrap();
        assert!(pagerank(&graph).is_empty());
        assert!(betweenness(&graph).is_empty());
    }
}

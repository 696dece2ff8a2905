// 🔄 Cycle Detector - circular fund routing
// Bounded DFS inside strongly connected components only

use crate::graph::TransactionGraph;
use crate::patterns::{CycleHit, PatternHeader};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleStatistics {
    pub total_cycles: usize,
    /// `length_3` -> count
    pub cycles_by_length: BTreeMap<String, usize>,
    pub accounts_involved: usize,
    pub total_volume: f64,
    pub average_length: f64,
}

// ============================================================================
// CYCLE DETECTOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct CycleDetector {
    /// Minimum node count (default: 3)
    pub min_length: usize,

    /// Maximum node count (default: 5)
    pub max_length: usize,
}

impl CycleDetector {
    pub fn new(min_length: usize, max_length: usize) -> Self {
        CycleDetector {
            min_length,
            max_length,
        }
    }

    /// Every simple cycle with `min_length..=max_length` nodes, one per node set
    pub fn detect(&self, graph: &TransactionGraph) -> Vec<CycleHit> {
        let mut accepted: HashSet<Vec<usize>> = HashSet::new();
        let mut cycles = Vec::new();

        let components: Vec<Vec<usize>> = graph
            .strongly_connected_components()
            .into_iter()
            .filter(|c| c.len() >= self.min_length.max(2))
            .collect();

        debug!(
            qualifying_components = components.len(),
            "cycle search bounded to strongly connected components"
        );

        for component in &components {
            let members: HashSet<usize> = component.iter().copied().collect();

            for &start in component {
                // (current, path, visited)
                let mut stack: Vec<(usize, Vec<usize>, HashSet<usize>)> =
                    vec![(start, vec![start], HashSet::from([start]))];

                while let Some((current, path, visited)) = stack.pop() {
                    for &next in graph.successors(current) {
                        if !members.contains(&next) {
                            continue;
                        }

                        if next == start {
                            if path.len() >= self.min_length && path.len() <= self.max_length {
                                if let Some(hit) = self.accept(graph, &path, &mut accepted) {
                                    cycles.push(hit);
                                }
                            }
                        } else if !visited.contains(&next) && path.len() < self.max_length {
                            let mut next_path = path.clone();
                            next_path.push(next);
                            let mut next_visited = visited.clone();
                            next_visited.insert(next);
                            stack.push((next, next_path, next_visited));
                        }
                    }
                }
            }
        }

        cycles
    }

    fn accept(
        &self,
        graph: &TransactionGraph,
        path: &[usize],
        accepted: &mut HashSet<Vec<usize>>,
    ) -> Option<CycleHit> {
        let distinct: BTreeSet<usize> = path.iter().copied().collect();
        if distinct.len() != path.len() {
            return None;
        }

        let mut edges = Vec::new();
        for (i, &from) in path.iter().enumerate() {
            let to = path[(i + 1) % path.len()];
            if !graph.has_edge(from, to) {
                return None;
            }
            edges.extend(graph.edges_between(from, to));
        }

        let key: Vec<usize> = distinct.into_iter().collect();
        if !accepted.insert(key) {
            return None;
        }

        Some(CycleHit {
            header: PatternHeader::from_edges(graph, path.to_vec(), edges),
        })
    }

    pub fn statistics(cycles: &[CycleHit]) -> CycleStatistics {
        let mut stats = CycleStatistics {
            total_cycles: cycles.len(),
            ..Default::default()
        };

        let mut accounts = BTreeSet::new();
        let mut total_length = 0;

        for cycle in cycles {
            *stats
                .cycles_by_length
                .entry(format!("length_{}", cycle.length()))
                .or_insert(0) += 1;
            accounts.extend(cycle.header.nodes.iter().copied());
            stats.total_volume += cycle.header.total_amount;
            total_length += cycle.length();
        }

        stats.accounts_involved = accounts.len();
        if !cycles.is_empty() {
            stats.average_length = total_length as f64 / cycles.len() as f64;
        }

        stats
    }
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::new(3, 5)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::txs;
    use crate::transaction::Transaction;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    fn triangle() -> TransactionGraph {
        TransactionGraph::build(&txs(&[
            ("T1", "A", "B", 1000.0, "2026-02-18 10:00:00"),
            ("T2", "B", "C", 950.0, "2026-02-18 11:00:00"),
            ("T3", "C", "A", 900.0, "2026-02-18 12:00:00"),
        ]))
        .unwrap()
    }

    #[test]
    fn test_detects_three_cycle() {
        let graph = triangle();
        let cycles = CycleDetector::new(3, 3).detect(&graph);

        assert_eq!(cycles.len(), 1);
        let mut ids = cycles[0].header.account_ids(&graph);
        ids.sort();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(cycles[0].header.transaction_count, 3);
        assert_eq!(cycles[0].header.total_amount, 2850.0);
    }

    #[test]
    fn test_rotations_reported_once() {
        let cycles = CycleDetector::default().detect(&triangle());
        assert_eq!(cycles.len(), 1);
    }

    #[test]
    fn test_parallel_edges_collected() {
        let graph = TransactionGraph::build(&txs(&[
            ("T1", "A", "B", 100.0, "2026-02-18 10:00:00"),
            ("T2", "A", "B", 200.0, "2026-02-18 10:30:00"),
            ("T3", "B", "C", 300.0, "2026-02-18 11:00:00"),
            ("T4", "C", "A", 400.0, "2026-02-18 12:00:00"),
        ]))
        .unwrap();

        let cycles = CycleDetector::default().detect(&graph);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].header.transaction_count, 4);
        assert_eq!(cycles[0].header.total_amount, 1000.0);

        let (start, end) = cycles[0].header.timestamp_range.unwrap();
        assert_eq!(end - start, Duration::hours(2));
    }

    #[test]
    fn test_length_bounds() {
        // 4-cycle only
        let graph = TransactionGraph::build(&txs(&[
            ("T1", "A", "B", 10.0, "2026-02-18 10:00:00"),
            ("T2", "B", "C", 10.0, "2026-02-18 10:00:00"),
            ("T3", "C", "D", 10.0, "2026-02-18 10:00:00"),
            ("T4", "D", "A", 10.0, "2026-02-18 10:00:00"),
        ]))
        .unwrap();

        assert!(CycleDetector::new(3, 3).detect(&graph).is_empty());
        assert_eq!(CycleDetector::new(3, 4).detect(&graph).len(), 1);
        assert!(CycleDetector::new(5, 5).detect(&graph).is_empty());
    }

    #[test]
    fn test_two_node_loop_ignored_by_default() {
        let graph = TransactionGraph::build(&txs(&[
            ("T1", "A", "B", 10.0, "2026-02-18 10:00:00"),
            ("T2", "B", "A", 10.0, "2026-02-18 11:00:00"),
        ]))
        .unwrap();

        assert!(CycleDetector::default().detect(&graph).is_empty());
        assert_eq!(CycleDetector::new(2, 5).detect(&graph).len(), 1);
    }

    #[test]
    fn test_acyclic_graph() {
        let graph = TransactionGraph::build(&txs(&[
            ("T1", "A", "B", 10.0, "2026-02-18 10:00:00"),
            ("T2", "B", "C", 10.0, "2026-02-18 10:00:00"),
        ]))
        .unwrap();

        assert!(CycleDetector::default().detect(&graph).is_empty());
    }

    #[test]
    fn test_statistics() {
        let graph = triangle();
        let cycles = CycleDetector::default().detect(&graph);
        let stats = CycleDetector::statistics(&cycles);

        assert_eq!(stats.total_cycles, 1);
        assert_eq!(stats.cycles_by_length.get("length_3"), Some(&1));
        assert_eq!(stats.accounts_involved, 3);
        assert_eq!(stats.total_volume, 2850.0);
        assert_eq!(stats.average_length, 3.0);
    }

    // --- proptest ---

    fn random_graph(pairs: &[(u8, u8)]) -> TransactionGraph {
        let base = NaiveDate::from_ymd_opt(2026, 2, 18)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let transactions: Vec<Transaction> = pairs
            .iter()
            .filter(|(a, b)| a != b)
            .enumerate()
            .map(|(i, (a, b))| {
                Transaction::new(
                    format!("T{i}"),
                    format!("N{a}"),
                    format!("N{b}"),
                    100.0 + i as f64,
                    base + Duration::minutes(i as i64),
                )
            })
            .collect();

        TransactionGraph::build(&transactions).unwrap()
    }

    proptest! {
        #[test]
        fn cycles_are_closed_and_unique(pairs in prop::collection::vec((0u8..7, 0u8..7), 0..25)) {
            let graph = random_graph(&pairs);
            let cycles = CycleDetector::default().detect(&graph);

            let mut seen = HashSet::new();
            for cycle in &cycles {
                let nodes = &cycle.header.nodes;
                prop_assert!(nodes.len() >= 3 && nodes.len() <= 5);
                for i in 0..nodes.len() {
                    prop_assert!(graph.has_edge(nodes[i], nodes[(i + 1) % nodes.len()]));
                }
                let mut key = nodes.clone();
                key.sort_unstable();
                prop_assert!(seen.insert(key));
            }
        }

        #[test]
        fn relaxing_max_length_never_loses_cycles(pairs in prop::collection::vec((0u8..7, 0u8..7), 0..25)) {
            let graph = random_graph(&pairs);
            let short = CycleDetector::new(3, 3).detect(&graph);
            let long = CycleDetector::new(3, 5).detect(&graph);
            prop_assert!(short.len() <= long.len());
        }
    }
}

// ⛓️ Chain Detector - layered transfers through shell accounts
// A shell is a low-activity account whose amounts all sit close to their mean

use crate::graph::TransactionGraph;
use crate::patterns::{ChainHit, PatternHeader};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainStatistics {
    pub total_chains: usize,
    pub pure_chains: usize,
    pub mixed_chains: usize,
    /// `length_4` -> count
    pub chains_by_length: BTreeMap<String, usize>,
    pub accounts_involved: usize,
    pub shell_accounts_identified: usize,
    pub shell_accounts_used: usize,
    pub total_volume: f64,
    pub average_length: f64,
}

// ============================================================================
// CHAIN DETECTOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChainDetector {
    /// Minimum node count of a chain (default: 3)
    pub min_length: usize,

    /// Shell accounts have at most this many transactions (default: 5)
    pub max_shell_transactions: usize,

    /// Allowed relative deviation from the mean amount (default: 0.2)
    pub amount_tolerance: f64,
}

/// Per-run search state
struct ChainSearch<'a> {
    graph: &'a TransactionGraph,
    shells: Vec<bool>,
    /// Times each node was interior to an accepted chain
    interior_uses: Vec<usize>,
    chains: Vec<ChainHit>,
}

impl ChainDetector {
    /// `min_length` below 2 is raised to 2: a chain needs at least one hop
    pub fn new(min_length: usize, max_shell_transactions: usize, amount_tolerance: f64) -> Self {
        ChainDetector {
            min_length: min_length.max(2),
            max_shell_transactions,
            amount_tolerance,
        }
    }

    /// Path length cap during the search
    pub fn max_length(&self) -> usize {
        self.min_length * 3
    }

    /// Shell flag per node index
    pub fn shell_accounts(&self, graph: &TransactionGraph) -> Vec<bool> {
        (0..graph.node_count())
            .map(|v| {
                let stats = graph.stats(v);
                let degree = stats.total_degree();
                degree >= 1
                    && degree <= self.max_shell_transactions
                    && self.amounts_similar(&stats.amounts)
            })
            .collect()
    }

    fn amounts_similar(&self, amounts: &[f64]) -> bool {
        if amounts.len() < 2 {
            return true;
        }
        let mean = amounts.iter().sum::<f64>() / amounts.len() as f64;
        if mean == 0.0 {
            return false;
        }
        amounts
            .iter()
            .all(|a| (a - mean).abs() / mean <= self.amount_tolerance)
    }

    /// Chains in discovery order: origins and successors both visited
    /// in lexicographic account order
    pub fn detect(&self, graph: &TransactionGraph) -> Vec<ChainHit> {
        let mut search = ChainSearch {
            graph,
            shells: self.shell_accounts(graph),
            interior_uses: vec![0; graph.node_count()],
            chains: Vec::new(),
        };

        let mut origins: Vec<usize> = (0..graph.node_count())
            .filter(|&v| search.shells[v])
            .collect();
        origins.sort_by(|&a, &b| graph.account_id(a).cmp(graph.account_id(b)));

        for origin in origins {
            let mut path = vec![origin];
            self.extend(&mut search, &mut path);
        }

        search.chains
    }

    fn extend(&self, search: &mut ChainSearch<'_>, path: &mut Vec<usize>) {
        if path.len() >= self.min_length {
            search.try_accept(path);
        }
        if path.len() >= self.max_length() {
            return;
        }

        // Extending turns the current terminal into an interior node
        let terminal = path[path.len() - 1];
        if path.len() > 1 && !search.may_be_interior(terminal) {
            return;
        }

        let graph = search.graph;
        let mut next: Vec<usize> = graph
            .successors(terminal)
            .iter()
            .copied()
            .filter(|n| !path.contains(n))
            .collect();
        next.sort_by(|&a, &b| graph.account_id(a).cmp(graph.account_id(b)));

        for successor in next {
            path.push(successor);
            self.extend(search, path);
            path.pop();
        }
    }

    pub fn statistics(&self, graph: &TransactionGraph, chains: &[ChainHit]) -> ChainStatistics {
        let mut stats = ChainStatistics {
            total_chains: chains.len(),
            shell_accounts_identified: self.shell_accounts(graph).iter().filter(|&&s| s).count(),
            ..Default::default()
        };

        let mut accounts = BTreeSet::new();
        let mut shells_used = BTreeSet::new();
        let mut total_length = 0;

        for chain in chains {
            if chain.pure {
                stats.pure_chains += 1;
            } else {
                stats.mixed_chains += 1;
            }
            *stats
                .chains_by_length
                .entry(format!("length_{}", chain.length()))
                .or_insert(0) += 1;
            accounts.extend(chain.header.nodes.iter().copied());
            shells_used.extend(chain.shell_nodes.iter().copied());
            stats.total_volume += chain.header.total_amount;
            total_length += chain.length();
        }

        stats.accounts_involved = accounts.len();
        stats.shell_accounts_used = shells_used.len();
        if !chains.is_empty() {
            stats.average_length = total_length as f64 / chains.len() as f64;
        }

        stats
    }
}

impl Default for ChainDetector {
    fn default() -> Self {
        Self::new(3, 5, 0.2)
    }
}

impl ChainSearch<'_> {
    /// Shell, and interior to at most one accepted chain so far
    fn may_be_interior(&self, node: usize) -> bool {
        self.shells[node] && self.interior_uses[node] <= 1
    }

    fn try_accept(&mut self, path: &[usize]) {
        if path.len() < 2 {
            return;
        }
        let interior = &path[1..path.len() - 1];
        if !interior.iter().all(|&n| self.may_be_interior(n)) {
            return;
        }

        for &n in interior {
            self.interior_uses[n] += 1;
        }

        let edges: Vec<usize> = path
            .windows(2)
            .flat_map(|hop| self.graph.edges_between(hop[0], hop[1]))
            .collect();

        let shell_nodes = path.iter().copied().filter(|&n| self.shells[n]).collect();
        let pure = self.shells[path[path.len() - 1]];

        self.chains.push(ChainHit {
            header: PatternHeader::from_edges(self.graph, path.to_vec(), edges),
            shell_nodes,
            pure,
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================

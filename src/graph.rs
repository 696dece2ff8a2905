// 🕸️ Transaction Graph - directed multigraph + per-account statistics
// Built once per run from validated transactions, read-only afterwards.
//
// Nodes are accounts, indexed in order of first appearance.
// Edges are transactions, kept in input order (parallel edges allowed).

use crate::error::{DetectionError, Result};
use crate::transaction::Transaction;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};

// ============================================================================
// EDGE
// ============================================================================

/// One transaction as a graph edge
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub transaction_id: String,
    pub from: usize,
    pub to: usize,
    pub amount: f64,
    pub timestamp: NaiveDateTime,
}

// ============================================================================
// ACCOUNT STATISTICS
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AccountStats {
    pub in_degree: usize,
    pub out_degree: usize,
    pub total_sent: f64,
    pub total_received: f64,

    /// Node indices of distinct counterparties
    pub unique_senders: BTreeSet<usize>,
    pub unique_receivers: BTreeSet<usize>,

    /// Every incident amount / timestamp, in transaction order
    pub amounts: Vec<f64>,
    pub timestamps: Vec<NaiveDateTime>,

    pub first_seen: Option<NaiveDateTime>,
    pub last_seen: Option<NaiveDateTime>,

    // Derived (filled by `finalize`)
    pub avg_amount: f64,
    /// Population standard deviation
    pub std_amount: f64,
    /// `f64::INFINITY` when nothing was received but something was sent
    pub sent_received_ratio: f64,
    pub activity_span: Duration,
}

impl AccountStats {
    pub fn total_degree(&self) -> usize {
        self.in_degree + self.out_degree
    }

    pub fn unique_counterparties(&self) -> usize {
        self.unique_senders.len() + self.unique_receivers.len()
    }

    fn record(&mut self, amount: f64, timestamp: NaiveDateTime) {
        self.amounts.push(amount);
        self.timestamps.push(timestamp);

        if self.first_seen.map_or(true, |first| timestamp < first) {
            self.first_seen = Some(timestamp);
        }
        if self.last_seen.map_or(true, |last| timestamp > last) {
            self.last_seen = Some(timestamp);
        }
    }

    fn finalize(&mut self) {
        if !self.amounts.is_empty() {
            let n = self.amounts.len() as f64;
            self.avg_amount = self.amounts.iter().sum::<f64>() / n;
            self.std_amount = if self.amounts.len() > 1 {
                let variance = self
                    .amounts
                    .iter()
                    .map(|a| (a - self.avg_amount).powi(2))
                    .sum::<f64>()
                    / n;
                variance.sqrt()
            } else {
                0.0
            };
        }

        self.sent_received_ratio = if self.total_received > 0.0 {
            self.total_sent / self.total_received
        } else if self.total_sent > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        self.activity_span = match (self.first_seen, self.last_seen) {
            (Some(first), Some(last)) => last - first,
            _ => Duration::zero(),
        };
    }
}

// ============================================================================
// GRAPH METRICS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    pub strongly_connected_component_count: usize,
    pub weakly_connected_component_count: usize,
    pub average_degree: f64,
    pub max_degree: usize,
    pub total_volume: f64,
}

// ============================================================================
// TRANSACTION GRAPH
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct TransactionGraph {
    accounts: Vec<String>,
    index: HashMap<String, usize>,
    edges: Vec<Edge>,
    out_edges: Vec<Vec<usize>>,
    in_edges: Vec<Vec<usize>>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
    stats: Vec<AccountStats>,
}

impl TransactionGraph {
    /// Build the graph and finalize every account's statistics
    ///
    /// Fails on the first transaction that breaks the record contract.
    pub fn build(transactions: &[Transaction]) -> Result<Self> {
        let mut graph = TransactionGraph::default();

        for tx in transactions {
            if let Some(reason) = tx.contract_violation() {
                return Err(DetectionError::InvalidTransaction {
                    transaction_id: tx.transaction_id.clone(),
                    reason,
                });
            }
            graph.add_transaction(tx);
        }

        for stats in &mut graph.stats {
            stats.finalize();
        }

        Ok(graph)
    }

    fn node_for(&mut self, account: &str) -> usize {
        if let Some(&idx) = self.index.get(account) {
            return idx;
        }
        let idx = self.accounts.len();
        self.accounts.push(account.to_string());
        self.index.insert(account.to_string(), idx);
        self.out_edges.push(Vec::new());
        self.in_edges.push(Vec::new());
        self.successors.push(Vec::new());
        self.predecessors.push(Vec::new());
        self.stats.push(AccountStats::default());
        idx
    }

    fn add_transaction(&mut self, tx: &Transaction) {
        let from = self.node_for(&tx.sender_id);
        let to = self.node_for(&tx.receiver_id);

        let edge_idx = self.edges.len();
        self.edges.push(Edge {
            transaction_id: tx.transaction_id.clone(),
            from,
            to,
            amount: tx.amount,
            timestamp: tx.timestamp,
        });
        self.out_edges[from].push(edge_idx);
        self.in_edges[to].push(edge_idx);

        if !self.successors[from].contains(&to) {
            self.successors[from].push(to);
            self.predecessors[to].push(from);
        }

        let sender = &mut self.stats[from];
        sender.out_degree += 1;
        sender.total_sent += tx.amount;
        sender.unique_receivers.insert(to);
        sender.record(tx.amount, tx.timestamp);

        let receiver = &mut self.stats[to];
        receiver.in_degree += 1;
        receiver.total_received += tx.amount;
        receiver.unique_senders.insert(from);
        receiver.record(tx.amount, tx.timestamp);
    }

    // ========================================================================
    // LOOKUPS
    // ========================================================================

    pub fn node_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn account_id(&self, node: usize) -> &str {
        &self.accounts[node]
    }

    pub fn accounts(&self) -> &[String] {
        &self.accounts
    }

    pub fn node_index(&self, account: &str) -> Option<usize> {
        self.index.get(account).copied()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, idx: usize) -> &Edge {
        &self.edges[idx]
    }

    pub fn stats(&self, node: usize) -> &AccountStats {
        &self.stats[node]
    }

    pub fn stats_for(&self, account: &str) -> Option<&AccountStats> {
        self.node_index(account).map(|idx| &self.stats[idx])
    }

    /// Distinct successors in first-appearance order
    pub fn successors(&self, node: usize) -> &[usize] {
        &self.successors[node]
    }

    pub fn predecessors(&self, node: usize) -> &[usize] {
        &self.predecessors[node]
    }

    pub fn out_edges(&self, node: usize) -> &[usize] {
        &self.out_edges[node]
    }

    pub fn in_edges(&self, node: usize) -> &[usize] {
        &self.in_edges[node]
    }

    /// Number of parallel edges from `from` to `to`
    pub fn edge_multiplicity(&self, from: usize, to: usize) -> usize {
        self.out_edges[from]
            .iter()
            .filter(|&&e| self.edges[e].to == to)
            .count()
    }

    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.successors[from].contains(&to)
    }

    /// Indices of every parallel edge from `from` to `to`
    pub fn edges_between(&self, from: usize, to: usize) -> Vec<usize> {
        self.out_edges[from]
            .iter()
            .copied()
            .filter(|&e| self.edges[e].to == to)
            .collect()
    }

    /// Latest timestamp in the dataset
    pub fn latest_timestamp(&self) -> Option<NaiveDateTime> {
        self.edges.iter().map(|e| e.timestamp).max()
    }

    // ========================================================================
    // COMPONENTS
    // ========================================================================

    /// Strongly connected components (iterative Tarjan)
    ///
    /// Components come out in reverse topological order; nodes inside a
    /// component are sorted by index.
    pub fn strongly_connected_components(&self) -> Vec<Vec<usize>> {
        const UNVISITED: usize = usize::MAX;

        let n = self.node_count();
        let mut index_of = vec![UNVISITED; n];
        let mut lowlink = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut components = Vec::new();
        let mut next_index = 0usize;

        for root in 0..n {
            if index_of[root] != UNVISITED {
                continue;
            }

            // (node, position of next successor to examine)
            let mut call_stack: Vec<(usize, usize)> = vec![(root, 0)];
            index_of[root] = next_index;
            lowlink[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;

            while let Some(&mut (v, ref mut pos)) = call_stack.last_mut() {
                if *pos < self.successors[v].len() {
                    let w = self.successors[v][*pos];
                    *pos += 1;

                    if index_of[w] == UNVISITED {
                        index_of[w] = next_index;
                        lowlink[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        call_stack.push((w, 0));
                    } else if on_stack[w] {
                        lowlink[v] = lowlink[v].min(index_of[w]);
                    }
                    continue;
                }

                call_stack.pop();
                if let Some(&(parent, _)) = call_stack.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }

                if lowlink[v] == index_of[v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    component.sort_unstable();
                    components.push(component);
                }
            }
        }

        components
    }

    pub fn weakly_connected_component_count(&self) -> usize {
        let n = self.node_count();
        let mut seen = vec![false; n];
        let mut count = 0;

        for start in 0..n {
            if seen[start] {
                continue;
            }
            count += 1;
            seen[start] = true;
            let mut queue = VecDeque::from([start]);

            while let Some(v) = queue.pop_front() {
                for &w in self.successors[v].iter().chain(self.predecessors[v].iter()) {
                    if !seen[w] {
                        seen[w] = true;
                        queue.push_back(w);
                    }
                }
            }
        }

        count
    }

    // ========================================================================
    // METRICS
    // ========================================================================

    pub fn metrics(&self) -> GraphMetrics {
        let n = self.node_count();
        let m = self.edge_count();

        let density = if n > 1 {
            m as f64 / (n as f64 * (n as f64 - 1.0))
        } else {
            0.0
        };

        let average_degree = if n > 0 { 2.0 * m as f64 / n as f64 } else { 0.0 };
        let max_degree = self.stats.iter().map(AccountStats::total_degree).max().unwrap_or(0);

        GraphMetrics {
            node_count: n,
            edge_count: m,
            density,
            strongly_connected_component_count: self.strongly_connected_components().len(),
            weakly_connected_component_count: self.weakly_connected_component_count(),
            average_degree,
            max_degree,
            total_volume: self.edges.iter().map(|e| e.amount).sum(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

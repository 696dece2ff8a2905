// 🪭 Fan Detector - smurfing (fan-in) and dispersion (fan-out)
// Sliding time windows per central account; dense windows sharing a
// transaction are merged transitively into disjoint unions

use crate::graph::TransactionGraph;
use crate::patterns::{FanHit, PatternHeader, PatternHit};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanDirection {
    /// Many senders -> one receiver
    In,
    /// One sender -> many receivers
    Out,
}

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FanStatistics {
    pub total: usize,
    pub fan_in_count: usize,
    pub fan_out_count: usize,
    pub accounts_involved: usize,
    pub total_volume: f64,
    pub average_member_count: f64,
    pub average_span_hours: f64,
}

// ============================================================================
// FAN DETECTOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct FanDetector {
    /// Window width anchored at each transaction (default: 72h)
    pub time_window_hours: u32,

    /// Minimum transactions inside one window (default: 10)
    pub threshold: usize,
}

impl FanDetector {
    pub fn new(time_window_hours: u32, threshold: usize) -> Self {
        FanDetector {
            time_window_hours,
            threshold,
        }
    }

    /// Fan-in hits first, then fan-out
    pub fn detect(&self, graph: &TransactionGraph) -> Vec<PatternHit> {
        let mut hits: Vec<PatternHit> = self
            .detect_fan_in(graph)
            .into_iter()
            .map(PatternHit::FanIn)
            .collect();
        hits.extend(self.detect_fan_out(graph).into_iter().map(PatternHit::FanOut));
        hits
    }

    pub fn detect_fan_in(&self, graph: &TransactionGraph) -> Vec<FanHit> {
        self.detect_direction(graph, FanDirection::In)
    }

    pub fn detect_fan_out(&self, graph: &TransactionGraph) -> Vec<FanHit> {
        self.detect_direction(graph, FanDirection::Out)
    }

    fn detect_direction(&self, graph: &TransactionGraph, direction: FanDirection) -> Vec<FanHit> {
        let mut centrals: Vec<usize> = (0..graph.node_count()).collect();
        centrals.sort_by(|&a, &b| graph.account_id(a).cmp(graph.account_id(b)));

        let mut hits = Vec::new();

        for central in centrals {
            let group = match direction {
                FanDirection::In => graph.in_edges(central),
                FanDirection::Out => graph.out_edges(central),
            };
            if group.len() < self.threshold {
                continue;
            }

            // Stable: equal timestamps keep input order
            let mut sorted = group.to_vec();
            sorted.sort_by_key(|&e| graph.edge(e).timestamp);

            for (lo, hi) in self.dense_windows(graph, &sorted) {
                hits.push(self.build_hit(graph, central, direction, &sorted[lo..=hi]));
            }
        }

        hits
    }

    /// Disjoint `(first, last)` position ranges over a time-sorted group
    fn dense_windows(&self, graph: &TransactionGraph, sorted: &[usize]) -> Vec<(usize, usize)> {
        let width = Duration::hours(self.time_window_hours as i64);

        let mut dense: Vec<(usize, usize)> = Vec::new();
        for &anchor in sorted {
            let start = graph.edge(anchor).timestamp;
            let end = start + width;

            // Window holds every transaction in [start, start + width]
            let lo = sorted.partition_point(|&e| graph.edge(e).timestamp < start);
            let hi = sorted.partition_point(|&e| graph.edge(e).timestamp <= end);

            if hi - lo >= self.threshold {
                dense.push((lo, hi - 1));
            }
        }

        dense.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::new();
        for (lo, hi) in dense {
            match merged.last_mut() {
                Some(last) if lo <= last.1 => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }

        merged
    }

    fn build_hit(
        &self,
        graph: &TransactionGraph,
        central: usize,
        direction: FanDirection,
        window: &[usize],
    ) -> FanHit {
        let mut counterparties: Vec<usize> = Vec::new();
        for &e in window {
            let edge = graph.edge(e);
            let other = match direction {
                FanDirection::In => edge.from,
                FanDirection::Out => edge.to,
            };
            if !counterparties.contains(&other) {
                counterparties.push(other);
            }
        }

        let nodes: Vec<usize> = match direction {
            FanDirection::In => std::iter::once(central).chain(counterparties).collect(),
            FanDirection::Out => counterparties.into_iter().chain(std::iter::once(central)).collect(),
        };

        let header = PatternHeader::from_edges(graph, nodes, window.to_vec());
        let amounts: Vec<f64> = window.iter().map(|&e| graph.edge(e).amount).collect();
        let count = amounts.len() as f64;

        let avg_amount = header.total_amount / count;
        let std_amount = if amounts.len() > 1 {
            let variance = amounts.iter().map(|a| (a - avg_amount).powi(2)).sum::<f64>() / (count - 1.0);
            variance.sqrt()
        } else {
            0.0
        };

        let time_span_hours = header
            .timestamp_range
            .map(|(first, last)| (last - first).num_milliseconds() as f64 / 3_600_000.0)
            .unwrap_or(0.0);
        let transaction_rate_per_hour = if time_span_hours > 0.0 {
            count / time_span_hours
        } else {
            count
        };

        // Multiples of 1000 are multiples of 500
        let round = amounts.iter().filter(|&&a| a % 500.0 == 0.0).count();
        let round_amount_percentage = round as f64 / count * 100.0;

        FanHit {
            header,
            central,
            threshold: self.threshold,
            avg_amount,
            std_amount,
            time_span_hours: round2(time_span_hours),
            transaction_rate_per_hour: round2(transaction_rate_per_hour),
            round_amount_percentage: round2(round_amount_percentage),
        }
    }

    pub fn statistics(hits: &[PatternHit]) -> FanStatistics {
        let mut stats = FanStatistics::default();
        let mut accounts = BTreeSet::new();
        let mut total_members = 0;
        let mut total_span = 0.0;

        for hit in hits {
            let fan = match hit {
                PatternHit::FanIn(fan) => {
                    stats.fan_in_count += 1;
                    fan
                }
                PatternHit::FanOut(fan) => {
                    stats.fan_out_count += 1;
                    fan
                }
                _ => continue,
            };
            stats.total += 1;
            accounts.extend(fan.header.nodes.iter().copied());
            stats.total_volume += fan.header.total_amount;
            total_members += fan.header.nodes.len();
            total_span += fan.time_span_hours;
        }

        stats.accounts_involved = accounts.len();
        if stats.total > 0 {
            stats.average_member_count = total_members as f64 / stats.total as f64;
            stats.average_span_hours = total_span / stats.total as f64;
        }

        stats
    }
}

impl Default for FanDetector {
    fn default() -> Self {
        Self::new(72, 10)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// TESTS
// ============================================================================

// 🎯 Suspicion Scorer - ring base scores + behavioural account signals
// All scores live in [0, 100]

use crate::centrality::{betweenness, pagerank};
use crate::graph::{AccountStats, TransactionGraph};
use crate::rings::{Ring, RingPattern};
use crate::transaction::TIMESTAMP_FORMAT;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// WEIGHTS
// ============================================================================

pub const BASE_RING_SCORE: f64 = 50.0;

pub const VELOCITY_WEIGHT: f64 = 15.0;
pub const ROUND_AMOUNT_WEIGHT: f64 = 10.0;
pub const RATIO_WEIGHT: f64 = 8.0;
pub const TIMING_WEIGHT: f64 = 7.0;
pub const CENTRALITY_WEIGHT: f64 = 12.0;
pub const RECENCY_WEIGHT: f64 = 5.0;
pub const CONCENTRATION_WEIGHT: f64 = 8.0;
pub const VARIANCE_WEIGHT: f64 = 5.0;

/// Extra weight per additional ring an account appears in
pub const OVERLAP_STEP: f64 = 0.2;

// ============================================================================
// SCORE BOARD
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBoard {
    /// account -> final score
    pub account_scores: BTreeMap<String, f64>,

    /// ring_id -> base score
    pub ring_scores: BTreeMap<String, f64>,

    /// account -> ring that produced its best individual score
    pub best_ring: BTreeMap<String, String>,

    /// account -> number of single-pattern source rings containing it
    pub ring_counts: BTreeMap<String, usize>,
}

/// Per-account statistics plus centrality, for drill-down views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_id: String,
    pub in_degree: usize,
    pub out_degree: usize,
    pub total_sent: f64,
    pub total_received: f64,
    pub unique_senders: Vec<String>,
    pub unique_receivers: Vec<String>,
    pub avg_amount: f64,
    pub std_amount: f64,
    /// `None` when nothing was received but something was sent
    pub sent_received_ratio: Option<f64>,
    pub first_transaction: Option<String>,
    pub last_transaction: Option<String>,
    pub pagerank: f64,
    pub betweenness: f64,
}

// ============================================================================
// SUSPICION SCORER
// ============================================================================

pub struct SuspicionScorer<'a> {
    graph: &'a TransactionGraph,
    pagerank: Vec<f64>,
    betweenness: Vec<f64>,
    /// Latest timestamp in the dataset; account age is measured against it
    reference_time: Option<NaiveDateTime>,
}

impl<'a> SuspicionScorer<'a> {
    /// Computes centrality once for the whole graph
    pub fn new(graph: &'a TransactionGraph) -> Self {
        SuspicionScorer {
            graph,
            pagerank: pagerank(graph),
            betweenness: betweenness(graph),
            reference_time: graph.latest_timestamp(),
        }
    }

    pub fn score(&self, rings: &[Ring]) -> ScoreBoard {
        let mut board = ScoreBoard::default();

        for ring in rings {
            let base = self.ring_base_score(ring);
            board.ring_scores.insert(ring.ring_id.clone(), base);

            for account in &ring.member_accounts {
                let individual = self.individual_score(account, base);
                let better = board
                    .account_scores
                    .get(account)
                    .map_or(true, |&best| individual > best);
                if better {
                    board.account_scores.insert(account.clone(), individual);
                    board.best_ring.insert(account.clone(), ring.ring_id.clone());
                }
            }
        }

        for ring in rings {
            for source in &ring.sources {
                for account in &source.member_accounts {
                    *board.ring_counts.entry(account.clone()).or_insert(0) += 1;
                }
            }
        }

        for (account, score) in board.account_scores.iter_mut() {
            let count = board.ring_counts.get(account).copied().unwrap_or(1);
            *score = apply_overlap(*score, count);
        }

        board
    }

    /// 50 + family + length/threshold + size + volume, clamped
    pub fn ring_base_score(&self, ring: &Ring) -> f64 {
        let mut score = BASE_RING_SCORE + pattern_bonus(&ring.pattern_type);

        let members = ring.member_accounts.len();
        if members > 10 {
            score += 10.0;
        } else if members > 5 {
            score += 5.0;
        }

        let volume = ring.metadata.total_amount;
        if volume > 100_000.0 {
            score += 15.0;
        } else if volume > 50_000.0 {
            score += 10.0;
        } else if volume > 10_000.0 {
            score += 5.0;
        }

        score.clamp(0.0, 100.0)
    }

    /// Ring base plus weighted behavioural signals; accounts without
    /// statistics keep the ring base
    pub fn individual_score(&self, account: &str, ring_base: f64) -> f64 {
        let Some(node) = self.graph.node_index(account) else {
            return ring_base;
        };
        let stats = self.graph.stats(node);

        let score = ring_base
            + velocity_signal(stats) * VELOCITY_WEIGHT
            + round_amount_signal(stats) * ROUND_AMOUNT_WEIGHT
            + ratio_signal(stats) * RATIO_WEIGHT
            + timing_signal(stats) * TIMING_WEIGHT
            + self.centrality_signal(node) * CENTRALITY_WEIGHT
            + recency_signal(stats, self.reference_time) * RECENCY_WEIGHT
            + concentration_signal(stats) * CONCENTRATION_WEIGHT
            + variance_signal(stats) * VARIANCE_WEIGHT;

        score.clamp(0.0, 100.0)
    }

    pub fn account_summary(&self, account: &str) -> Option<AccountSummary> {
        let node = self.graph.node_index(account)?;
        let stats = self.graph.stats(node);
        let names = |nodes: &std::collections::BTreeSet<usize>| -> Vec<String> {
            let mut ids: Vec<String> = nodes
                .iter()
                .map(|&n| self.graph.account_id(n).to_string())
                .collect();
            ids.sort();
            ids
        };
        let stamp = |ts: Option<NaiveDateTime>| ts.map(|t| t.format(TIMESTAMP_FORMAT).to_string());

        Some(AccountSummary {
            account_id: account.to_string(),
            in_degree: stats.in_degree,
            out_degree: stats.out_degree,
            total_sent: stats.total_sent,
            total_received: stats.total_received,
            unique_senders: names(&stats.unique_senders),
            unique_receivers: names(&stats.unique_receivers),
            avg_amount: stats.avg_amount,
            std_amount: stats.std_amount,
            sent_received_ratio: Some(stats.sent_received_ratio).filter(|r| r.is_finite()),
            first_transaction: stamp(stats.first_seen),
            last_transaction: stamp(stats.last_seen),
            pagerank: self.pagerank.get(node).copied().unwrap_or(0.0),
            betweenness: self.betweenness.get(node).copied().unwrap_or(0.0),
        })
    }

    /// One summary per account, keyed by account id
    pub fn account_summaries(&self) -> BTreeMap<String, AccountSummary> {
        self.graph
            .accounts()
            .iter()
            .filter_map(|id| self.account_summary(id).map(|s| (id.clone(), s)))
            .collect()
    }

    pub fn centrality_signal(&self, node: usize) -> f64 {
        let pr = self.pagerank.get(node).copied().unwrap_or(0.0);
        let bc = self.betweenness.get(node).copied().unwrap_or(0.0);
        ((2.0 * pr + bc) / 3.0 * 10.0).min(1.0)
    }
}

fn pattern_bonus(pattern: &RingPattern) -> f64 {
    match *pattern {
        RingPattern::Cycle { length } => {
            30.0 + match length {
                0..=3 => 5.0,
                4 => 10.0,
                _ => 15.0,
            }
        }
        RingPattern::FanIn { threshold } | RingPattern::FanOut { threshold } => {
            25.0 + if threshold >= 20 {
                15.0
            } else if threshold >= 15 {
                10.0
            } else if threshold >= 10 {
                5.0
            } else {
                0.0
            }
        }
        RingPattern::ShellChain { length, pure } => {
            let by_length = match length {
                0..=3 => 0.0,
                4 => 10.0,
                5 => 20.0,
                _ => 25.0,
            };
            35.0 + by_length + if pure { 10.0 } else { 0.0 }
        }
        // Only a merged ring containing a cycle keeps a family bonus
        RingPattern::CycleWithFan => 30.0,
        RingPattern::FanWithChain | RingPattern::ComplexNetwork => 0.0,
    }
}

/// `score * (1 + 0.2 * (count - 1))`, clamped to 100
pub fn apply_overlap(score: f64, ring_count: usize) -> f64 {
    if ring_count > 1 {
        (score * (1.0 + OVERLAP_STEP * (ring_count - 1) as f64)).min(100.0)
    } else {
        score
    }
}

// ============================================================================
// SIGNALS (each in [0, 1])
// ============================================================================

pub fn velocity_signal(stats: &AccountStats) -> f64 {
    match stats.total_degree() {
        n if n > 100 => 1.0,
        n if n > 50 => 2.0 / 3.0,
        n if n > 20 => 1.0 / 3.0,
        _ => 0.0,
    }
}

/// Share of amounts divisible by 100 (covers 500 and 1000)
pub fn round_amount_signal(stats: &AccountStats) -> f64 {
    if stats.amounts.is_empty() {
        return 0.0;
    }
    let round = stats.amounts.iter().filter(|&&a| a % 100.0 == 0.0).count();
    let share = round as f64 / stats.amounts.len() as f64;

    if share > 0.8 {
        1.0
    } else if share > 0.6 {
        0.7
    } else if share > 0.4 {
        0.4
    } else if share > 0.2 {
        0.2
    } else {
        0.0
    }
}

/// Mules pass money through at close to 1:1
pub fn ratio_signal(stats: &AccountStats) -> f64 {
    if stats.total_sent == 0.0 || stats.total_received == 0.0 {
        return 0.0;
    }
    let ratio = stats.total_sent / stats.total_received;
    let within = |lo: f64, hi: f64| (lo..=hi).contains(&ratio);

    if within(0.9, 1.1) {
        1.0
    } else if within(0.8, 1.2) {
        0.8
    } else if within(0.7, 1.3) {
        0.5
    } else if within(0.5, 1.5) {
        0.3
    } else {
        0.0
    }
}

/// Night (23:00-05:59) and weekend concentration
pub fn timing_signal(stats: &AccountStats) -> f64 {
    let total = stats.timestamps.len();
    if total < 5 {
        return 0.3;
    }

    let night = stats
        .timestamps
        .iter()
        .filter(|ts| ts.hour() >= 23 || ts.hour() <= 5)
        .count() as f64
        / total as f64;
    let weekend = stats
        .timestamps
        .iter()
        .filter(|ts| ts.weekday().number_from_monday() >= 6)
        .count() as f64
        / total as f64;

    let mut score = 0.0;
    if night > 0.4 {
        score += 0.6;
    } else if night > 0.2 {
        score += 0.3;
    }
    if weekend > 0.3 {
        score += 0.4;
    } else if weekend > 0.15 {
        score += 0.2;
    }

    f64::min(score, 1.0)
}

/// Newer accounts score higher; age is counted in whole days
pub fn recency_signal(stats: &AccountStats, reference: Option<NaiveDateTime>) -> f64 {
    let (Some(first), Some(reference)) = (stats.first_seen, reference) else {
        return 0.5;
    };

    match (reference - first).num_days() {
        d if d < 7 => 1.0,
        d if d < 30 => 0.7,
        d if d < 90 => 0.4,
        d if d < 365 => 0.2,
        _ => 0.0,
    }
}

/// Few distinct counterparties relative to transaction count
pub fn concentration_signal(stats: &AccountStats) -> f64 {
    let total = stats.total_degree();
    if total == 0 {
        return 0.0;
    }
    let ratio = stats.unique_counterparties() as f64 / total as f64;

    if ratio < 0.2 {
        1.0
    } else if ratio < 0.4 {
        0.7
    } else if ratio < 0.6 {
        0.4
    } else if ratio < 0.8 {
        0.2
    } else {
        0.0
    }
}

/// Unusually uniform or unusually spread amounts (coefficient of variation)
pub fn variance_signal(stats: &AccountStats) -> f64 {
    if stats.amounts.len() < 3 || stats.avg_amount == 0.0 {
        return 0.0;
    }
    let cv = stats.std_amount / stats.avg_amount;

    if cv < 0.1 {
        0.8
    } else if cv > 2.0 {
        0.6
    } else if cv < 0.2 {
        0.4
    } else if cv > 1.5 {
        0.3
    } else {
        0.0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::txs;
    use crate::patterns::PatternKind;
    use crate::rings::{RingMetadata, RingSource};
    use crate::transaction::parse_timestamp;
    use std::collections::BTreeSet;

    fn ring(id: &str, pattern: RingPattern, members: &[&str], total_amount: f64) -> Ring {
        let member_accounts: Vec<String> = members.iter().map(|m| m.to_string()).collect();
        Ring {
            ring_id: id.to_string(),
            fingerprint: String::new(),
            member_accounts: member_accounts.clone(),
            pattern_type: pattern.clone(),
            detected_pattern_kinds: BTreeSet::from([PatternKind::Cycle]),
            risk_score: 0.0,
            metadata: RingMetadata {
                total_amount,
                ..Default::default()
            },
            sources: vec![RingSource {
                pattern,
                member_accounts,
                total_amount,
            }],
        }
    }

    fn triangle() -> TransactionGraph {
        TransactionGraph::build(&txs(&[
            ("T1", "A", "B", 1000.0, "2026-02-18 10:00:00"),
            ("T2", "B", "C", 1000.0, "2026-02-18 11:00:00"),
            ("T3", "C", "A", 1000.0, "2026-02-18 12:00:00"),
            ("T4", "C", "D", 250.0, "2026-02-18 13:00:00"),
        ]))
        .unwrap()
    }

    #[test]
    fn test_ring_base_scores() {
        let graph = triangle();
        let scorer = SuspicionScorer::new(&graph);

        let cycle = ring("R1", RingPattern::Cycle { length: 3 }, &["A", "B", "C"], 3000.0);
        assert_eq!(scorer.ring_base_score(&cycle), 85.0);

        let fan = ring("R2", RingPattern::FanIn { threshold: 10 }, &["A"; 11], 60_000.0);
        // 50 + 25 + 5 + size 10 + volume 10
        assert_eq!(scorer.ring_base_score(&fan), 100.0);

        let chain = ring(
            "R3",
            RingPattern::ShellChain { length: 4, pure: true },
            &["A", "B", "C", "D"],
            12_000.0,
        );
        // 50 + 35 + 10 + 10 + volume 5, clamped
        assert_eq!(scorer.ring_base_score(&chain), 100.0);

        let merged = ring("R4", RingPattern::CycleWithFan, &["A", "B"], 0.0);
        assert_eq!(scorer.ring_base_score(&merged), 80.0);

        let fan_chain = ring("R5", RingPattern::FanWithChain, &["A", "B"], 0.0);
        assert_eq!(scorer.ring_base_score(&fan_chain), 50.0);

        let network = ring("R6", RingPattern::ComplexNetwork, &["A", "B"], 0.0);
        assert_eq!(scorer.ring_base_score(&network), 50.0);
    }

    /// M takes three weekday-night deposits and forwards most of them;
    /// twenty unrelated pairs keep M's centrality below the cap
    fn pass_through_graph() -> TransactionGraph {
        let mut transactions = txs(&[
            ("T1", "S1", "M", 1000.0, "2026-02-16 01:00:00"),
            ("T2", "S1", "M", 1000.0, "2026-02-16 02:00:00"),
            ("T3", "S2", "M", 1000.0, "2026-02-17 03:00:00"),
            ("T4", "M", "R", 1100.0, "2026-02-17 14:00:00"),
            ("T5", "M", "R", 1150.0, "2026-02-18 15:00:00"),
        ]);
        let later = parse_timestamp("2026-04-01 12:00:00").unwrap();
        for i in 0..20 {
            transactions.push(crate::transaction::Transaction::new(
                format!("P{i}"),
                format!("Y{i}"),
                format!("Z{i}"),
                300.0,
                later,
            ));
        }
        TransactionGraph::build(&transactions).unwrap()
    }

    #[test]
    fn test_individual_score_weights() {
        let graph = pass_through_graph();
        let scorer = SuspicionScorer::new(&graph);
        let m = graph.node_index("M").unwrap();
        let stats = graph.stats(m);

        assert_eq!(velocity_signal(stats), 0.0);
        // 4 of 5 amounts divisible by 100
        assert_eq!(round_amount_signal(stats), 0.7);
        // sent 2250 / received 3000
        assert_eq!(ratio_signal(stats), 0.5);
        // 3 of 5 at night, none on a weekend
        assert_eq!(timing_signal(stats), 0.6);
        // 44 days before the latest transaction
        assert_eq!(recency_signal(stats, graph.latest_timestamp()), 0.4);
        // 3 counterparties over 5 transactions
        assert_eq!(concentration_signal(stats), 0.2);
        assert_eq!(variance_signal(stats), 0.8);

        let centrality = scorer.centrality_signal(m);
        assert!(centrality > 0.0 && centrality < 1.0);

        // 50 + round 0.7*10 + ratio 0.5*8 + timing 0.6*7 + centrality c*12
        //    + recency 0.4*5 + concentration 0.2*8 + variance 0.8*5
        let expected = 50.0 + 7.0 + 4.0 + 4.2 + centrality * 12.0 + 2.0 + 1.6 + 4.0;
        assert!((scorer.individual_score("M", 50.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_scores_stay_in_range() {
        let graph = triangle();
        let scorer = SuspicionScorer::new(&graph);
        let rings = vec![ring("R1", RingPattern::Cycle { length: 3 }, &["A", "B", "C"], 3000.0)];

        let board = scorer.score(&rings);
        assert_eq!(board.account_scores.len(), 3);
        for score in board.account_scores.values() {
            assert!((0.0..=100.0).contains(score));
            assert!(*score >= 85.0);
        }
        assert_eq!(board.best_ring.get("A"), Some(&"R1".to_string()));
    }

    #[test]
    fn test_account_summary() {
        let graph = triangle();
        let scorer = SuspicionScorer::new(&graph);

        let c = scorer.account_summary("C").unwrap();
        assert_eq!(c.in_degree, 1);
        assert_eq!(c.out_degree, 2);
        assert_eq!(c.total_sent, 1250.0);
        assert_eq!(c.unique_senders, vec!["B".to_string()]);
        assert_eq!(c.unique_receivers, vec!["A".to_string(), "D".to_string()]);
        assert_eq!(c.sent_received_ratio, Some(1.25));
        assert_eq!(c.first_transaction.as_deref(), Some("2026-02-18 11:00:00"));
        assert!(c.pagerank > 0.0);
        // C sits on B->A and B->D
        assert!(c.betweenness > 0.0);

        // D never sends; ratio of 0 stays a number
        assert_eq!(scorer.account_summary("D").unwrap().sent_received_ratio, Some(0.0));
        assert!(scorer.account_summary("GHOST").is_none());
        assert_eq!(scorer.account_summaries().len(), 4);
    }

    #[test]
    fn test_unknown_account_falls_back_to_base() {
        let graph = triangle();
        let scorer = SuspicionScorer::new(&graph);
        assert_eq!(scorer.individual_score("GHOST", 62.5), 62.5);
    }

    #[test]
    fn test_more_rings_never_lowers_score() {
        let graph = triangle();
        let scorer = SuspicionScorer::new(&graph);

        let one = vec![ring("R1", RingPattern::ShellChain { length: 3, pure: false }, &["C", "D"], 100.0)];
        let two = vec![
            ring("R1", RingPattern::ShellChain { length: 3, pure: false }, &["C", "D"], 100.0),
            ring("R2", RingPattern::ShellChain { length: 3, pure: false }, &["D", "B"], 100.0),
        ];

        let single = scorer.score(&one).account_scores["D"];
        let double = scorer.score(&two);
        assert_eq!(double.ring_counts["D"], 2);
        assert!(double.account_scores["D"] >= single);
    }

    #[test]
    fn test_overlap_multiplier() {
        assert_eq!(apply_overlap(50.0, 1), 50.0);
        assert_eq!(apply_overlap(50.0, 2), 60.0);
        assert_eq!(apply_overlap(90.0, 3), 100.0);
    }

    #[test]
    fn test_signals() {
        let graph = TransactionGraph::build(&txs(&[
            ("T1", "A", "B", 1000.0, "2026-02-21 01:00:00"),
            ("T2", "B", "C", 1000.0, "2026-02-21 02:00:00"),
            ("T3", "A", "B", 1000.0, "2026-02-21 03:00:00"),
            ("T4", "B", "C", 950.0, "2026-02-22 04:00:00"),
            ("T5", "A", "B", 990.0, "2026-02-22 23:30:00"),
        ]))
        .unwrap();
        let b = graph.stats_for("B").unwrap();

        assert_eq!(velocity_signal(b), 0.0);
        // 3 of 5 divisible by 100
        assert_eq!(round_amount_signal(b), 0.4);
        // sent 1950 / received 2990
        assert_eq!(ratio_signal(b), 0.3);
        // every transaction at night on a weekend
        assert_eq!(timing_signal(b), 1.0);
        // 5 transactions with 2 counterparties
        assert_eq!(concentration_signal(b), 0.4);
        assert_eq!(variance_signal(b), 0.8);

        let a = graph.stats_for("A").unwrap();
        assert_eq!(ratio_signal(a), 0.0);
        assert_eq!(timing_signal(a), 0.3);
    }

    #[test]
    fn test_recency_uses_reference_time() {
        let graph = triangle();
        let a = graph.stats_for("A").unwrap();

        assert_eq!(recency_signal(a, graph.latest_timestamp()), 1.0);
        assert_eq!(recency_signal(a, parse_timestamp("2026-03-10 00:00:00")), 0.7);
        assert_eq!(recency_signal(a, parse_timestamp("2027-06-01 00:00:00")), 0.0);
        assert_eq!(recency_signal(a, None), 0.5);
    }
}

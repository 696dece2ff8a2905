// 🧩 Pattern Hits - what the detectors hand to the ring builder
// One tagged variant per structural pattern, all sharing a common header

use crate::graph::TransactionGraph;
use crate::rings::RingPattern;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// PATTERN KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Cycle,
    FanIn,
    FanOut,
    ShellChain,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Cycle => "cycle",
            PatternKind::FanIn => "fan_in",
            PatternKind::FanOut => "fan_out",
            PatternKind::ShellChain => "shell_chain",
        }
    }

    pub fn is_fan(&self) -> bool {
        matches!(self, PatternKind::FanIn | PatternKind::FanOut)
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// COMMON HEADER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PatternHeader {
    /// Node indices in pattern order (cycle order, path order, fan members)
    pub nodes: Vec<usize>,
    /// Edge indices of every matched transaction
    pub edges: Vec<usize>,
    pub total_amount: f64,
    pub transaction_count: usize,
    /// (earliest, latest) over the matched edges
    pub timestamp_range: Option<(NaiveDateTime, NaiveDateTime)>,
}

impl PatternHeader {
    /// Aggregate amount, count and time range from the matched edges
    pub fn from_edges(graph: &TransactionGraph, nodes: Vec<usize>, edges: Vec<usize>) -> Self {
        let mut total_amount = 0.0;
        let mut timestamp_range: Option<(NaiveDateTime, NaiveDateTime)> = None;

        for &e in &edges {
            let edge = graph.edge(e);
            total_amount += edge.amount;
            timestamp_range = Some(match timestamp_range {
                Some((lo, hi)) => (lo.min(edge.timestamp), hi.max(edge.timestamp)),
                None => (edge.timestamp, edge.timestamp),
            });
        }

        PatternHeader {
            nodes,
            transaction_count: edges.len(),
            edges,
            total_amount,
            timestamp_range,
        }
    }

    pub fn account_ids(&self, graph: &TransactionGraph) -> Vec<String> {
        self.nodes
            .iter()
            .map(|&n| graph.account_id(n).to_string())
            .collect()
    }
}

// ============================================================================
// KIND-SPECIFIC PAYLOADS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CycleHit {
    pub header: PatternHeader,
}

impl CycleHit {
    pub fn length(&self) -> usize {
        self.header.nodes.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FanHit {
    pub header: PatternHeader,
    pub central: usize,
    /// Threshold the window had to meet
    pub threshold: usize,
    pub avg_amount: f64,
    /// Sample standard deviation, 0 below two transactions
    pub std_amount: f64,
    pub time_span_hours: f64,
    pub transaction_rate_per_hour: f64,
    /// Share (0-100) of amounts divisible by 500 or 1000
    pub round_amount_percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainHit {
    pub header: PatternHeader,
    /// Path nodes classified as shells
    pub shell_nodes: Vec<usize>,
    /// Terminal node is a shell too
    pub pure: bool,
}

impl ChainHit {
    pub fn length(&self) -> usize {
        self.header.nodes.len()
    }
}

// ============================================================================
// PATTERN HIT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PatternHit {
    Cycle(CycleHit),
    FanIn(FanHit),
    FanOut(FanHit),
    ShellChain(ChainHit),
}

impl PatternHit {
    pub fn header(&self) -> &PatternHeader {
        match self {
            PatternHit::Cycle(hit) => &hit.header,
            PatternHit::FanIn(hit) | PatternHit::FanOut(hit) => &hit.header,
            PatternHit::ShellChain(hit) => &hit.header,
        }
    }

    pub fn kind(&self) -> PatternKind {
        match self {
            PatternHit::Cycle(_) => PatternKind::Cycle,
            PatternHit::FanIn(_) => PatternKind::FanIn,
            PatternHit::FanOut(_) => PatternKind::FanOut,
            PatternHit::ShellChain(_) => PatternKind::ShellChain,
        }
    }

    /// e.g. `cycle_length_3`, `fan_in_threshold_10`, `pure_shell_chain_length_4`
    pub fn label(&self) -> String {
        RingPattern::from_hit(self).to_string()
    }
}

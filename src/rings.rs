// 💍 Ring Builder - pattern hits become rings, overlapping rings merge
// Merging is component-based: rings sharing any account end up together,
// transitively, so three chained overlaps give one ring

use crate::graph::TransactionGraph;
use crate::patterns::{PatternHit, PatternKind};
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

// ============================================================================
// RING PATTERN
// ============================================================================

/// Pattern type of a ring; serialized as its label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingPattern {
    Cycle { length: usize },
    FanIn { threshold: usize },
    FanOut { threshold: usize },
    ShellChain { length: usize, pure: bool },

    // Merged rings
    CycleWithFan,
    FanWithChain,
    ComplexNetwork,
}

impl RingPattern {
    pub fn from_hit(hit: &PatternHit) -> Self {
        match hit {
            PatternHit::Cycle(cycle) => RingPattern::Cycle {
                length: cycle.length(),
            },
            PatternHit::FanIn(fan) => RingPattern::FanIn {
                threshold: fan.threshold,
            },
            PatternHit::FanOut(fan) => RingPattern::FanOut {
                threshold: fan.threshold,
            },
            PatternHit::ShellChain(chain) => RingPattern::ShellChain {
                length: chain.length(),
                pure: chain.pure,
            },
        }
    }

    /// Priority: any cycle, then any fan, else a chain-only network
    pub fn for_merged(kinds: &BTreeSet<PatternKind>) -> Self {
        if kinds.contains(&PatternKind::Cycle) {
            RingPattern::CycleWithFan
        } else if kinds.iter().any(PatternKind::is_fan) {
            RingPattern::FanWithChain
        } else {
            RingPattern::ComplexNetwork
        }
    }

    pub fn is_merged(&self) -> bool {
        matches!(
            self,
            RingPattern::CycleWithFan | RingPattern::FanWithChain | RingPattern::ComplexNetwork
        )
    }
}

impl fmt::Display for RingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingPattern::Cycle { length } => write!(f, "cycle_length_{length}"),
            RingPattern::FanIn { threshold } => write!(f, "fan_in_threshold_{threshold}"),
            RingPattern::FanOut { threshold } => write!(f, "fan_out_threshold_{threshold}"),
            RingPattern::ShellChain { length, pure } => write!(
                f,
                "{}_shell_chain_length_{length}",
                if *pure { "pure" } else { "mixed" }
            ),
            RingPattern::CycleWithFan => f.write_str("cycle_with_fan"),
            RingPattern::FanWithChain => f.write_str("fan_with_chain"),
            RingPattern::ComplexNetwork => f.write_str("complex_network"),
        }
    }
}

impl Serialize for RingPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// RING
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RingMetadata {
    /// Over distinct transactions; a transfer shared by two patterns counts once
    pub total_amount: f64,
    pub transaction_count: usize,
    pub first_transaction: Option<NaiveDateTime>,
    pub last_transaction: Option<NaiveDateTime>,

    /// Graph edge indices behind the figures above
    #[serde(skip)]
    pub edges: BTreeSet<usize>,
}

impl RingMetadata {
    pub fn from_edges(graph: &TransactionGraph, edges: BTreeSet<usize>) -> Self {
        let mut metadata = RingMetadata {
            transaction_count: edges.len(),
            ..Default::default()
        };

        for &idx in &edges {
            let edge = graph.edge(idx);
            metadata.total_amount += edge.amount;
            metadata.first_transaction = min_opt(metadata.first_transaction, Some(edge.timestamp));
            metadata.last_transaction = max_opt(metadata.last_transaction, Some(edge.timestamp));
        }

        metadata.edges = edges;
        metadata
    }
}

/// A single-pattern ring as it was before merging
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingSource {
    pub pattern: RingPattern,
    pub member_accounts: Vec<String>,
    pub total_amount: f64,
}

impl RingSource {
    pub fn contains(&self, account: &str) -> bool {
        self.member_accounts.iter().any(|m| m == account)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ring {
    /// `RING_001`, assigned in output order
    pub ring_id: String,

    /// SHA-256 of pattern label + sorted members; stable across runs
    pub fingerprint: String,

    /// Deduplicated, in pattern order
    pub member_accounts: Vec<String>,

    pub pattern_type: RingPattern,
    pub detected_pattern_kinds: BTreeSet<PatternKind>,

    /// Filled in by the scorer
    pub risk_score: f64,

    pub metadata: RingMetadata,
    pub sources: Vec<RingSource>,
}

impl Ring {
    pub fn contains(&self, account: &str) -> bool {
        self.member_accounts.iter().any(|m| m == account)
    }

    pub fn is_merged(&self) -> bool {
        self.sources.len() > 1
    }
}

/// Hex SHA-256 of `label|a,b,c` with members sorted
pub fn ring_fingerprint(pattern: &RingPattern, members: &[String]) -> String {
    let mut sorted: Vec<&str> = members.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}", pattern, sorted.join(",")));
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// RING BUILDER
// ============================================================================

pub struct RingBuilder {
    /// Merge rings that share accounts (default: true)
    pub merge_overlapping: bool,

    /// Last id handed out by this builder
    counter: usize,
}

impl RingBuilder {
    pub fn new() -> Self {
        RingBuilder {
            merge_overlapping: true,
            counter: 0,
        }
    }

    pub fn with_merging(merge_overlapping: bool) -> Self {
        RingBuilder {
            merge_overlapping,
            ..Self::new()
        }
    }

    fn next_id(&mut self) -> String {
        self.counter += 1;
        format!("RING_{:03}", self.counter)
    }

    /// Hits are expected cycles first, then fans, then chains
    pub fn build(&mut self, graph: &TransactionGraph, hits: &[PatternHit]) -> Vec<Ring> {
        let singles: Vec<Ring> = hits.iter().map(|hit| single_ring(graph, hit)).collect();

        let groups = if self.merge_overlapping {
            overlap_components(&singles)
        } else {
            (0..singles.len()).map(|i| vec![i]).collect()
        };

        groups
            .into_iter()
            .map(|group| {
                let mut ring = if group.len() == 1 {
                    singles[group[0]].clone()
                } else {
                    merge_rings(graph, group.iter().map(|&i| &singles[i]))
                };
                ring.ring_id = self.next_id();
                ring
            })
            .collect()
    }
}

impl Default for RingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn single_ring(graph: &TransactionGraph, hit: &PatternHit) -> Ring {
    let header = hit.header();
    let pattern = RingPattern::from_hit(hit);

    let mut member_accounts: Vec<String> = Vec::new();
    for id in header.account_ids(graph) {
        if !member_accounts.contains(&id) {
            member_accounts.push(id);
        }
    }

    Ring {
        ring_id: String::new(),
        fingerprint: ring_fingerprint(&pattern, &member_accounts),
        detected_pattern_kinds: BTreeSet::from([hit.kind()]),
        risk_score: 0.0,
        metadata: RingMetadata::from_edges(graph, header.edges.iter().copied().collect()),
        sources: vec![RingSource {
            pattern: pattern.clone(),
            member_accounts: member_accounts.clone(),
            total_amount: header.total_amount,
        }],
        member_accounts,
        pattern_type: pattern,
    }
}

/// Connected components of the "shares an account" relation,
/// ordered by their first ring; ring indices ascending inside each
fn overlap_components(rings: &[Ring]) -> Vec<Vec<usize>> {
    let mut by_account: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, ring) in rings.iter().enumerate() {
        for account in &ring.member_accounts {
            by_account.entry(account.as_str()).or_default().push(i);
        }
    }

    let mut seen = vec![false; rings.len()];
    let mut components = Vec::new();

    for start in 0..rings.len() {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut component = vec![start];
        let mut queue = VecDeque::from([start]);

        while let Some(i) = queue.pop_front() {
            for account in &rings[i].member_accounts {
                for &j in &by_account[account.as_str()] {
                    if !seen[j] {
                        seen[j] = true;
                        component.push(j);
                        queue.push_back(j);
                    }
                }
            }
        }

        component.sort_unstable();
        components.push(component);
    }

    components
}

fn merge_rings<'a>(graph: &TransactionGraph, rings: impl Iterator<Item = &'a Ring>) -> Ring {
    let mut member_accounts: Vec<String> = Vec::new();
    let mut kinds = BTreeSet::new();
    let mut edges = BTreeSet::new();
    let mut sources = Vec::new();

    for ring in rings {
        for account in &ring.member_accounts {
            if !member_accounts.contains(account) {
                member_accounts.push(account.clone());
            }
        }
        kinds.extend(ring.detected_pattern_kinds.iter().copied());
        edges.extend(ring.metadata.edges.iter().copied());
        sources.extend(ring.sources.iter().cloned());
    }

    let pattern = RingPattern::for_merged(&kinds);
    Ring {
        ring_id: String::new(),
        fingerprint: ring_fingerprint(&pattern, &member_accounts),
        member_accounts,
        pattern_type: pattern,
        detected_pattern_kinds: kinds,
        risk_score: 0.0,
        metadata: RingMetadata::from_edges(graph, edges),
        sources,
    }
}

fn min_opt(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}

fn max_opt(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    }
}

// ============================================================================
// TESTS
// ============================================================================

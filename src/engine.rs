// 🚦 Detection Engine - one pipeline per dataset
// graph -> {cycles, fans, chains} -> rings -> scores
//
// The graph is fully built (statistics finalized) before any detector runs;
// the detectors only borrow it.

use crate::config::DetectionConfig;
use crate::detectors::{ChainDetector, CycleDetector, DetectionStatistics, FanDetector};
use crate::error::{DetectionError, Result};
use crate::graph::{GraphMetrics, TransactionGraph};
use crate::patterns::{ChainHit, CycleHit, PatternHit};
use crate::rings::{Ring, RingBuilder};
use crate::scoring::{AccountSummary, SuspicionScorer};
use crate::transaction::Transaction;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

// ============================================================================
// OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountScore {
    pub account_id: String,
    /// 0-100, two decimals
    pub suspicion_score: f64,
    /// Ring that produced the best individual score
    pub ring_id: String,
    /// Single-pattern rings containing the account
    pub ring_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionOutcome {
    pub run_id: String,

    /// Highest score first, ties by account id
    pub account_scores: Vec<AccountScore>,

    pub rings: Vec<Ring>,

    /// Statistics and centrality for every account in the graph
    pub account_summaries: BTreeMap<String, AccountSummary>,

    pub graph_metrics: GraphMetrics,
    pub statistics: DetectionStatistics,

    /// Seconds
    pub processing_time: f64,
}

impl DetectionOutcome {
    fn empty(run_id: String, graph: &TransactionGraph) -> Self {
        DetectionOutcome {
            run_id,
            account_scores: Vec::new(),
            rings: Vec::new(),
            account_summaries: BTreeMap::new(),
            graph_metrics: graph.metrics(),
            statistics: DetectionStatistics::default(),
            processing_time: 0.0,
        }
    }

    pub fn score_for(&self, account: &str) -> Option<f64> {
        self.account_scores
            .iter()
            .find(|s| s.account_id == account)
            .map(|s| s.suspicion_score)
    }

    pub fn ring(&self, ring_id: &str) -> Option<&Ring> {
        self.rings.iter().find(|r| r.ring_id == ring_id)
    }

    pub fn account_summary(&self, account: &str) -> Option<&AccountSummary> {
        self.account_summaries.get(account)
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct Engine {
    config: DetectionConfig,
    last_outcome: Option<DetectionOutcome>,
}

impl Engine {
    pub fn new(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Engine {
            config,
            last_outcome: None,
        })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Outcome of the most recent successful run
    pub fn last_outcome(&self) -> Option<&DetectionOutcome> {
        self.last_outcome.as_ref()
    }

    /// Discard all run state
    pub fn reset(&mut self) {
        self.last_outcome = None;
    }

    /// Run the full pipeline over one dataset
    ///
    /// Fails only on a transaction that breaks the record contract, or when
    /// the time budget runs out between stages.
    pub fn process(&mut self, transactions: &[Transaction]) -> Result<DetectionOutcome> {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!(%run_id, transactions = transactions.len(), "detection run started");

        let graph = TransactionGraph::build(transactions)?;
        info!(
            accounts = graph.node_count(),
            edges = graph.edge_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "graph built"
        );
        self.check_budget(started, "graph")?;

        if graph.is_empty() {
            let outcome = DetectionOutcome::empty(run_id, &graph);
            self.last_outcome = Some(outcome.clone());
            return Ok(outcome);
        }

        let cycle_detector = self.config.cycle_detector();
        let fan_detector = self.config.fan_detector();
        let chain_detector = self.config.chain_detector();

        let (cycles, fans, chains) =
            self.run_detectors(&graph, &cycle_detector, &fan_detector, &chain_detector);

        let statistics = DetectionStatistics {
            cycles: CycleDetector::statistics(&cycles),
            fans: FanDetector::statistics(&fans),
            chains: chain_detector.statistics(&graph, &chains),
        };
        info!(
            cycles = cycles.len(),
            fans = fans.len(),
            chains = chains.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "patterns detected"
        );
        self.check_budget(started, "detection")?;

        let mut hits: Vec<PatternHit> = Vec::with_capacity(cycles.len() + fans.len() + chains.len());
        hits.extend(cycles.into_iter().map(PatternHit::Cycle));
        hits.extend(fans);
        hits.extend(chains.into_iter().map(PatternHit::ShellChain));

        let mut rings = RingBuilder::with_merging(self.config.merge_overlapping_rings).build(&graph, &hits);
        info!(
            hits = hits.len(),
            rings = rings.len(),
            merged = rings.iter().filter(|r| r.is_merged()).count(),
            "rings built"
        );
        self.check_budget(started, "rings")?;

        let scorer = SuspicionScorer::new(&graph);
        let board = scorer.score(&rings);
        let account_summaries = scorer.account_summaries();

        for ring in &mut rings {
            let base = board.ring_scores.get(&ring.ring_id).copied().unwrap_or(0.0);
            ring.risk_score = round2(base);
        }

        let mut account_scores: Vec<AccountScore> = board
            .account_scores
            .iter()
            .map(|(account, &score)| AccountScore {
                account_id: account.clone(),
                suspicion_score: round2(score),
                ring_id: board.best_ring.get(account).cloned().unwrap_or_default(),
                ring_count: board.ring_counts.get(account).copied().unwrap_or(0),
            })
            .collect();
        account_scores.sort_by(|a, b| {
            b.suspicion_score
                .total_cmp(&a.suspicion_score)
                .then_with(|| a.account_id.cmp(&b.account_id))
        });

        let outcome = DetectionOutcome {
            run_id,
            account_scores,
            rings,
            account_summaries,
            graph_metrics: graph.metrics(),
            statistics,
            processing_time: started.elapsed().as_secs_f64(),
        };

        info!(
            scored_accounts = outcome.account_scores.len(),
            rings = outcome.rings.len(),
            seconds = outcome.processing_time,
            "detection run finished"
        );

        self.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }

    fn run_detectors(
        &self,
        graph: &TransactionGraph,
        cycle_detector: &CycleDetector,
        fan_detector: &FanDetector,
        chain_detector: &ChainDetector,
    ) -> (Vec<CycleHit>, Vec<PatternHit>, Vec<ChainHit>) {
        if self.config.parallel {
            debug!("running detectors on the rayon pool");
            let (cycles, (fans, chains)) = rayon::join(
                || cycle_detector.detect(graph),
                || rayon::join(|| fan_detector.detect(graph), || chain_detector.detect(graph)),
            );
            (cycles, fans, chains)
        } else {
            debug!("running detectors sequentially");
            (
                cycle_detector.detect(graph),
                fan_detector.detect(graph),
                chain_detector.detect(graph),
            )
        }
    }

    fn check_budget(&self, started: Instant, stage: &'static str) -> Result<()> {
        match self.config.time_budget_secs {
            Some(budget) if started.elapsed().as_secs_f64() > budget => {
                Err(DetectionError::DeadlineExceeded { stage })
            }
            _ => Ok(()),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine {
            config: DetectionConfig::default(),
            last_outcome: None,
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// TESTS
// ============================================================================

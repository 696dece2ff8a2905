// Mule Detector - Core Library
// Exposes the detection pipeline for the CLI, the API server, and tests

pub mod centrality;
pub mod config;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod patterns;
pub mod report;
pub mod rings;
pub mod sample;
pub mod scoring;
pub mod transaction;

// Re-export commonly used types
pub use config::DetectionConfig;
pub use detectors::{
    ChainDetector, ChainStatistics, CycleDetector, CycleStatistics, DetectionStatistics,
    FanDetector, FanDirection, FanStatistics,
};
pub use engine::{AccountScore, DetectionOutcome, Engine};
pub use error::{DetectionError, Result};
pub use graph::{AccountStats, Edge, GraphMetrics, TransactionGraph};
pub use ingest::{load_csv, read_csv, IngestOutcome, IngestSummary, RejectedRow};
pub use patterns::{ChainHit, CycleHit, FanHit, PatternHeader, PatternHit, PatternKind};
pub use report::{DetectionReport, FraudRing, ReportSummary, SuspiciousAccount};
pub use rings::{Ring, RingBuilder, RingPattern};
pub use scoring::{AccountSummary, ScoreBoard, SuspicionScorer};
pub use transaction::{parse_timestamp, Transaction};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

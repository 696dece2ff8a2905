// Structural Detectors
//
// Each detector borrows the finished graph read-only and owns its own
// working state, so the three can run side by side.

pub mod chain;
pub mod cycle;
pub mod fan;

pub use chain::{ChainDetector, ChainStatistics};
pub use cycle::{CycleDetector, CycleStatistics};
pub use fan::{FanDetector, FanDirection, FanStatistics};

use serde::{Deserialize, Serialize};

/// Per-detector summaries for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionStatistics {
    pub cycles: CycleStatistics,
    pub fans: FanStatistics,
    pub chains: ChainStatistics,
}

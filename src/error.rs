// ⚠️ Error types for the detection core
// I/O-facing code (ingest, config files, reports) uses anyhow instead

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// A transaction reached graph construction while breaking the record contract
    #[error("invalid transaction {transaction_id}: {reason}")]
    InvalidTransaction {
        transaction_id: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The run exceeded its time budget; checked between stages only
    #[error("time budget exceeded after stage `{stage}`")]
    DeadlineExceeded { stage: &'static str },
}

pub type Result<T> = std::result::Result<T, DetectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DetectionError::InvalidTransaction {
            transaction_id: "TX1".to_string(),
            reason: "amount must be positive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid transaction TX1: amount must be positive"
        );

        let err = DetectionError::DeadlineExceeded { stage: "detection" };
        assert_eq!(err.to_string(), "time budget exceeded after stage `detection`");
    }
}

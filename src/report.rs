// 📄 Detection Report - outcome -> the published JSON shape
// suspicious_accounts + fraud_rings + summary

use crate::engine::{round2, DetectionOutcome};
use crate::transaction::Transaction;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Accounts above this score count as flagged
pub const FLAG_THRESHOLD: f64 = 50.0;

const ACCOUNT_FIELDS: [&str; 4] = ["account_id", "suspicion_score", "detected_patterns", "ring_id"];
const RING_FIELDS: [&str; 4] = ["ring_id", "member_accounts", "pattern_type", "risk_score"];
const SUMMARY_FIELDS: [&str; 4] = [
    "total_accounts_analyzed",
    "suspicious_accounts_flagged",
    "fraud_rings_detected",
    "processing_time_seconds",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousAccount {
    pub account_id: String,
    pub suspicion_score: f64,
    pub detected_patterns: Vec<String>,
    pub ring_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudRing {
    pub ring_id: String,
    pub member_accounts: Vec<String>,
    pub pattern_type: String,
    pub risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_accounts_analyzed: usize,
    pub suspicious_accounts_flagged: usize,
    pub fraud_rings_detected: usize,
    pub processing_time_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub suspicious_accounts: Vec<SuspiciousAccount>,
    pub fraud_rings: Vec<FraudRing>,
    pub summary: ReportSummary,
}

impl DetectionReport {
    pub fn build(outcome: &DetectionOutcome, transactions: &[Transaction]) -> Self {
        // account_scores is already sorted by score desc, then id
        let suspicious_accounts: Vec<SuspiciousAccount> = outcome
            .account_scores
            .iter()
            .map(|score| SuspiciousAccount {
                account_id: score.account_id.clone(),
                suspicion_score: score.suspicion_score,
                detected_patterns: detected_patterns(outcome, &score.account_id, &score.ring_id),
                ring_id: score.ring_id.clone(),
            })
            .collect();

        let fraud_rings = outcome
            .rings
            .iter()
            .map(|ring| FraudRing {
                ring_id: ring.ring_id.clone(),
                member_accounts: ring.member_accounts.clone(),
                pattern_type: ring.pattern_type.to_string(),
                risk_score: ring.risk_score,
            })
            .collect();

        let accounts: HashSet<&str> = transactions
            .iter()
            .flat_map(|t| [t.sender_id.as_str(), t.receiver_id.as_str()])
            .collect();

        let summary = ReportSummary {
            total_accounts_analyzed: accounts.len(),
            suspicious_accounts_flagged: suspicious_accounts
                .iter()
                .filter(|a| a.suspicion_score > FLAG_THRESHOLD)
                .count(),
            fraud_rings_detected: outcome.rings.len(),
            processing_time_seconds: round2(outcome.processing_time),
        };

        DetectionReport {
            suspicious_accounts,
            fraud_rings,
            summary,
        }
    }

    /// Shape check for a report in JSON form; empty when valid
    ///
    /// Missing top-level sections are reported alone. Otherwise at most one
    /// message per section names the first entry with a missing field.
    pub fn validate(output: &Value) -> Vec<String> {
        let mut errors: Vec<String> = ["suspicious_accounts", "fraud_rings", "summary"]
            .iter()
            .filter(|field| output.get(**field).is_none())
            .map(|field| format!("Missing required field: {field}"))
            .collect();
        if !errors.is_empty() {
            return errors;
        }

        let sections = [
            ("suspicious_accounts", &ACCOUNT_FIELDS),
            ("fraud_rings", &RING_FIELDS),
        ];
        for (section, fields) in sections {
            match output[section].as_array() {
                Some(entries) => {
                    let bad = entries
                        .iter()
                        .position(|entry| fields.iter().any(|f| entry.get(*f).is_none()));
                    if let Some(idx) = bad {
                        errors.push(format!("Invalid {section} entry structure at index {idx}"));
                    }
                }
                None => errors.push(format!("{section} must be an array")),
            }
        }

        let summary = &output["summary"];
        if !summary.is_object() || SUMMARY_FIELDS.iter().any(|f| summary.get(*f).is_none()) {
            errors.push("Invalid summary structure".to_string());
        }

        errors
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize detection report")
    }

    pub fn write_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = self.to_json_string()?;
        fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write report file: {:?}", path.as_ref()))
    }
}

/// Labels of the patterns in `ring_id` that actually contain the account
fn detected_patterns(outcome: &DetectionOutcome, account: &str, ring_id: &str) -> Vec<String> {
    let Some(ring) = outcome.ring(ring_id) else {
        return Vec::new();
    };

    let mut labels: Vec<String> = Vec::new();
    for source in ring.sources.iter().filter(|s| s.contains(account)) {
        let label = source.pattern.to_string();
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    if labels.is_empty() {
        labels.push(ring.pattern_type.to_string());
    }
    labels
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::sample::{sample_transactions, LEGITIMATE_ACCOUNTS};

    fn sample_report() -> DetectionReport {
        let transactions = sample_transactions();
        let outcome = Engine::default().process(&transactions).unwrap();
        DetectionReport::build(&outcome, &transactions)
    }

    #[test]
    fn test_sample_report_shape() {
        let report = sample_report();

        assert_eq!(report.summary.total_accounts_analyzed, 22);
        assert_eq!(report.summary.fraud_rings_detected, report.fraud_rings.len());
        assert!(report.summary.suspicious_accounts_flagged > 0);

        for account in &report.suspicious_accounts {
            assert!(!account.detected_patterns.is_empty());
            assert!(report.fraud_rings.iter().any(|r| r.ring_id == account.ring_id));
        }
        for legit in LEGITIMATE_ACCOUNTS {
            assert!(report.suspicious_accounts.iter().all(|a| a.account_id != legit));
        }
    }

    #[test]
    fn test_accounts_sorted_by_score() {
        let report = sample_report();
        for pair in report.suspicious_accounts.windows(2) {
            assert!(pair[0].suspicion_score >= pair[1].suspicion_score);
        }
    }

    #[test]
    fn test_fan_member_lists_fan_pattern() {
        let report = sample_report();
        let target = report
            .suspicious_accounts
            .iter()
            .find(|a| a.account_id == "TARGET")
            .unwrap();
        assert_eq!(target.detected_patterns, vec!["fan_in_threshold_10".to_string()]);
    }

    #[test]
    fn test_json_output() {
        let report = sample_report();
        let json = report.to_json_string().unwrap();
        assert!(json.contains("\"suspicious_accounts\""));
        assert!(json.contains("\"processing_time_seconds\""));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.write_json_file(&path).unwrap();

        let back: DetectionReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.fraud_rings, report.fraud_rings);
    }

    #[test]
    fn test_processing_time_two_decimals() {
        let mut outcome = Engine::default().process(&[]).unwrap();
        outcome.processing_time = 1.23456;

        let report = DetectionReport::build(&outcome, &[]);
        assert_eq!(report.summary.processing_time_seconds, 1.23);
    }

    #[test]
    fn test_validate_accepts_built_report() {
        let report = sample_report();
        let value = serde_json::to_value(&report).unwrap();
        assert!(DetectionReport::validate(&value).is_empty());
    }

    #[test]
    fn test_validate_reports_shape_errors() {
        let missing = serde_json::json!({ "fraud_rings": [] });
        assert_eq!(
            DetectionReport::validate(&missing),
            vec![
                "Missing required field: suspicious_accounts".to_string(),
                "Missing required field: summary".to_string(),
            ]
        );

        let broken = serde_json::json!({
            "suspicious_accounts": [
                { "account_id": "A", "suspicion_score": 80.0, "detected_patterns": [], "ring_id": "RING_001" },
                { "account_id": "B", "suspicion_score": 70.0 }
            ],
            "fraud_rings": "none",
            "summary": { "total_accounts_analyzed": 2 }
        });
        assert_eq!(
            DetectionReport::validate(&broken),
            vec![
                "Invalid suspicious_accounts entry structure at index 1".to_string(),
                "fraud_rings must be an array".to_string(),
                "Invalid summary structure".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_outcome_report() {
        let outcome = Engine::default().process(&[]).unwrap();
        let report = DetectionReport::build(&outcome, &[]);

        assert!(report.suspicious_accounts.is_empty());
        assert_eq!(report.summary.total_accounts_analyzed, 0);
        assert_eq!(report.summary.suspicious_accounts_flagged, 0);
    }
}

// End-to-end: CSV on disk -> ingest -> engine -> report

use mule_detector::sample::LEGITIMATE_ACCOUNTS;
use mule_detector::{load_csv, DetectionConfig, DetectionReport, Engine, PatternKind, RingPattern};
use std::io::Write;
use tempfile::NamedTempFile;

const MIXED_CSV: &str = "\
transaction_id,sender_id,receiver_id,amount,timestamp
CYC1,A1,B1,5000,2026-02-18 10:00:00
CYC2,B1,C1,4800,2026-02-18 11:00:00
CYC3,C1,A1,4700,2026-02-18 12:00:00
FIN1,X1,TARGET,1000,2026-02-18 10:00:00
FIN2,X2,TARGET,2000,2026-02-18 11:00:00
FIN3,X3,TARGET,1500,2026-02-18 12:00:00
FIN4,X4,TARGET,3000,2026-02-18 13:00:00
FIN5,X5,TARGET,2500,2026-02-18 14:00:00
FIN6,X6,TARGET,1800,2026-02-18 15:00:00
FIN7,X7,TARGET,2200,2026-02-18 16:00:00
FIN8,X8,TARGET,2700,2026-02-18 17:00:00
FIN9,X9,TARGET,1900,2026-02-18 18:00:00
FIN10,X10,TARGET,2100,2026-02-18 19:00:00
LEG1,MERCHANT,CUST1,50,2026-02-18 09:00:00
LEG2,MERCHANT,CUST2,75,2026-02-18 09:05:00
LEG3,MERCHANT,CUST3,100,2026-02-18 09:10:00
BAD1,MERCHANT,MERCHANT,10,2026-02-18 09:15:00
BAD2,CUST1,CUST2,-1,2026-02-18 09:20:00
LEG1,CUST3,CUST1,20,2026-02-18 09:25:00
";

fn write_csv(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_csv_to_report() {
    let file = write_csv(MIXED_CSV);
    let ingested = load_csv(file.path()).unwrap();

    assert_eq!(ingested.transactions.len(), 16);
    assert_eq!(ingested.rejected.len(), 3);

    let mut engine = Engine::default();
    let outcome = engine.process(&ingested.transactions).unwrap();
    let report = DetectionReport::build(&outcome, &ingested.transactions);

    assert_eq!(report.summary.total_accounts_analyzed, 18);
    assert_eq!(report.summary.fraud_rings_detected, 2);

    let flagged: Vec<&str> = report
        .suspicious_accounts
        .iter()
        .map(|a| a.account_id.as_str())
        .collect();
    for account in ["A1", "B1", "C1", "TARGET", "X1", "X10"] {
        assert!(flagged.contains(&account), "{account} should be flagged");
    }
    for legit in LEGITIMATE_ACCOUNTS {
        assert!(!flagged.contains(&legit), "{legit} should not be flagged");
    }

    // the cycle's accounts are also low-activity shells, so its chains merge in
    assert!(report.fraud_rings.iter().any(|r| r.pattern_type == "cycle_with_fan"));
    assert!(report.fraud_rings.iter().any(|r| r.pattern_type == "fan_in_threshold_10"));
}

#[test]
fn test_ring_ids_stable_across_engines() {
    let file = write_csv(MIXED_CSV);
    let ingested = load_csv(file.path()).unwrap();

    let first = Engine::default().process(&ingested.transactions).unwrap();
    let second = Engine::new(DetectionConfig {
        parallel: false,
        ..Default::default()
    })
    .unwrap()
    .process(&ingested.transactions)
    .unwrap();

    let ids = |rings: &[mule_detector::Ring]| -> Vec<(String, String)> {
        rings
            .iter()
            .map(|r| (r.ring_id.clone(), r.fingerprint.clone()))
            .collect()
    };
    assert_eq!(ids(&first.rings), ids(&second.rings));
}

#[test]
fn test_config_file_changes_detection() {
    let file = write_csv(MIXED_CSV);
    let ingested = load_csv(file.path()).unwrap();

    let mut config_file = NamedTempFile::new().unwrap();
    write!(config_file, r#"{{"fan_threshold": 11}}"#).unwrap();
    let config = DetectionConfig::from_file(config_file.path()).unwrap();

    let outcome = Engine::new(config).unwrap().process(&ingested.transactions).unwrap();

    assert_eq!(outcome.rings.len(), 1);
    assert_eq!(outcome.rings[0].pattern_type, RingPattern::CycleWithFan);
    assert!(outcome.rings[0].detected_pattern_kinds.contains(&PatternKind::Cycle));
    assert!(outcome.score_for("TARGET").is_none());
}

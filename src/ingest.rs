// 📥 CSV Ingestion - transactions file -> validated records
// Bad rows are rejected one by one; only a missing header fails the file

use crate::transaction::{parse_timestamp, timestamp_serde, Transaction};
use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

pub const REQUIRED_COLUMNS: [&str; 5] = [
    "transaction_id",
    "sender_id",
    "receiver_id",
    "amount",
    "timestamp",
];

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    /// 1-based line in the file, header included
    pub line: usize,
    pub transaction_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(with = "timestamp_serde")]
    pub start: NaiveDateTime,
    #[serde(with = "timestamp_serde")]
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub total_transactions: usize,
    pub unique_senders: usize,
    pub unique_receivers: usize,
    pub unique_accounts: usize,
    pub total_amount: f64,
    pub avg_amount: f64,
    pub max_amount: f64,
    pub min_amount: f64,
    pub date_range: Option<DateRange>,
}

impl IngestSummary {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        if transactions.is_empty() {
            return IngestSummary::default();
        }

        let senders: HashSet<&str> = transactions.iter().map(|t| t.sender_id.as_str()).collect();
        let receivers: HashSet<&str> = transactions.iter().map(|t| t.receiver_id.as_str()).collect();
        let total_amount: f64 = transactions.iter().map(|t| t.amount).sum();

        let start = transactions.iter().map(|t| t.timestamp).min();
        let end = transactions.iter().map(|t| t.timestamp).max();

        IngestSummary {
            total_transactions: transactions.len(),
            unique_senders: senders.len(),
            unique_receivers: receivers.len(),
            unique_accounts: senders.union(&receivers).count(),
            total_amount,
            avg_amount: total_amount / transactions.len() as f64,
            max_amount: transactions.iter().map(|t| t.amount).fold(f64::MIN, f64::max),
            min_amount: transactions.iter().map(|t| t.amount).fold(f64::MAX, f64::min),
            date_range: start.zip(end).map(|(start, end)| DateRange { start, end }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub transactions: Vec<Transaction>,
    pub rejected: Vec<RejectedRow>,
    pub summary: IngestSummary,
}

// ============================================================================
// LOADING
// ============================================================================

pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<IngestOutcome> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    read_csv(file).with_context(|| format!("Failed to load transactions from {}", path.display()))
}

pub fn read_csv<R: Read>(reader: R) -> Result<IngestOutcome> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let columns = locate_columns(&headers)?;

    let mut transactions = Vec::new();
    let mut rejected = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(line, error = %e, "unreadable CSV row skipped");
                rejected.push(RejectedRow {
                    line,
                    transaction_id: None,
                    reason: format!("unreadable row: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &columns) {
            Ok(tx) => {
                if !seen_ids.insert(tx.transaction_id.clone()) {
                    warn!(line, transaction_id = %tx.transaction_id, "duplicate transaction id skipped");
                    rejected.push(RejectedRow {
                        line,
                        transaction_id: Some(tx.transaction_id),
                        reason: "duplicate transaction_id".to_string(),
                    });
                    continue;
                }
                transactions.push(tx);
            }
            Err(reason) => {
                let transaction_id = record
                    .get(columns[0])
                    .filter(|id| !id.is_empty())
                    .map(str::to_string);
                warn!(line, ?transaction_id, %reason, "CSV row rejected");
                rejected.push(RejectedRow {
                    line,
                    transaction_id,
                    reason,
                });
            }
        }
    }

    let summary = IngestSummary::from_transactions(&transactions);
    info!(
        accepted = transactions.len(),
        rejected = rejected.len(),
        accounts = summary.unique_accounts,
        "CSV ingested"
    );

    Ok(IngestOutcome {
        transactions,
        rejected,
        summary,
    })
}

/// Column index of every required field, in `REQUIRED_COLUMNS` order
fn locate_columns(headers: &StringRecord) -> Result<[usize; 5]> {
    let mut columns = [0usize; 5];
    let mut missing = Vec::new();

    for (slot, name) in REQUIRED_COLUMNS.iter().enumerate() {
        match headers.iter().position(|h| h.eq_ignore_ascii_case(name)) {
            Some(idx) => columns[slot] = idx,
            None => missing.push(*name),
        }
    }

    if !missing.is_empty() {
        bail!("Missing required columns: {}", missing.join(", "));
    }
    Ok(columns)
}

fn parse_row(record: &StringRecord, columns: &[usize; 5]) -> std::result::Result<Transaction, String> {
    let field = |slot: usize| -> std::result::Result<&str, String> {
        match record.get(columns[slot]) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(format!("missing {}", REQUIRED_COLUMNS[slot])),
        }
    };

    let transaction_id = field(0)?;
    let sender_id = field(1)?;
    let receiver_id = field(2)?;
    let raw_amount = field(3)?;
    let raw_timestamp = field(4)?;

    let amount: f64 = raw_amount
        .parse()
        .map_err(|_| format!("amount is not a number: {raw_amount}"))?;
    let timestamp = parse_timestamp(raw_timestamp)
        .ok_or_else(|| format!("unparseable timestamp: {raw_timestamp}"))?;

    let tx = Transaction::new(transaction_id, sender_id, receiver_id, amount, timestamp);
    match tx.contract_violation() {
        Some(reason) => Err(reason),
        None => Ok(tx),
    }
}

// ============================================================================
// TESTS
// ============================================================================

// 💸 Transaction - the single record type the engine consumes
// Core fields only; ingestion is responsible for producing valid records

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Canonical textual form used for timestamps in reports and templates
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Transaction - one transfer between two accounts
///
/// Invariants (checked again when the graph is built):
/// - `amount > 0`
/// - `sender_id != receiver_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: f64,
    #[serde(with = "timestamp_serde")]
    pub timestamp: NaiveDateTime,
}

impl Transaction {
    pub fn new(
        transaction_id: impl Into<String>,
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        amount: f64,
        timestamp: NaiveDateTime,
    ) -> Self {
        Transaction {
            transaction_id: transaction_id.into(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            amount,
            timestamp,
        }
    }

    /// Contract check shared by ingestion and graph construction.
    /// Returns the reason the record is invalid, if any.
    pub fn contract_violation(&self) -> Option<String> {
        if !self.amount.is_finite() {
            return Some(format!("amount {} is not a finite number", self.amount));
        }
        if self.amount <= 0.0 {
            return Some(format!("amount {} must be positive", self.amount));
        }
        if self.sender_id == self.receiver_id {
            return Some(format!("self-transaction on account {}", self.sender_id));
        }
        None
    }
}

/// Parse a timestamp in any of the accepted textual forms
///
/// Supported:
/// - `2026-02-18 10:00:00` (and `T` separator, optional fractional seconds)
/// - `2026-02-18 10:00`
/// - `2026-02-18` (midnight)
/// - RFC 3339 with offset (converted to UTC, offset dropped)
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    const DATETIME_FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub(crate) mod timestamp_serde {
    use super::{parse_timestamp, TIMESTAMP_FORMAT};
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("unparseable timestamp: {raw}")))
    }
}

// ============================================================================
// TESTS
// ============================================================================

// 🧪 Sample Data - a small dataset with one of each known pattern
// Plus the CSV template handed out to users

use crate::transaction::{parse_timestamp, Transaction};

/// Header plus a few example rows
pub const TEMPLATE_CSV: &str = "\
transaction_id,sender_id,receiver_id,amount,timestamp
TXN001,ACC_A,ACC_B,5000,2026-02-18 10:00:00
TXN002,ACC_B,ACC_C,4800,2026-02-18 11:00:00
TXN003,ACC_C,ACC_A,4700,2026-02-18 12:00:00
TXN004,ACC_D,ACC_E,10000,2026-02-18 13:00:00
TXN005,ACC_E,ACC_F,9500,2026-02-18 14:00:00
";

const SAMPLE_ROWS: &[(&str, &str, &str, f64, &str)] = &[
    // Cycle of length 3
    ("CYC1", "A1", "B1", 5000.0, "2026-02-18 10:00:00"),
    ("CYC2", "B1", "C1", 4800.0, "2026-02-18 11:00:00"),
    ("CYC3", "C1", "A1", 4700.0, "2026-02-18 12:00:00"),
    // Fan-in (smurfing)
    ("FIN1", "X1", "TARGET", 1000.0, "2026-02-18 10:00:00"),
    ("FIN2", "X2", "TARGET", 2000.0, "2026-02-18 11:00:00"),
    ("FIN3", "X3", "TARGET", 1500.0, "2026-02-18 12:00:00"),
    ("FIN4", "X4", "TARGET", 3000.0, "2026-02-18 13:00:00"),
    ("FIN5", "X5", "TARGET", 2500.0, "2026-02-18 14:00:00"),
    ("FIN6", "X6", "TARGET", 1800.0, "2026-02-18 15:00:00"),
    ("FIN7", "X7", "TARGET", 2200.0, "2026-02-18 16:00:00"),
    ("FIN8", "X8", "TARGET", 2700.0, "2026-02-18 17:00:00"),
    ("FIN9", "X9", "TARGET", 1900.0, "2026-02-18 18:00:00"),
    ("FIN10", "X10", "TARGET", 2100.0, "2026-02-18 19:00:00"),
    // Shell chain
    ("CHN1", "S1", "S2", 5000.0, "2026-02-18 10:00:00"),
    ("CHN2", "S2", "S3", 4900.0, "2026-02-18 11:00:00"),
    ("CHN3", "S3", "S4", 4800.0, "2026-02-18 12:00:00"),
    // Legitimate payouts
    ("LEG1", "MERCHANT", "CUST1", 50.0, "2026-02-18 09:00:00"),
    ("LEG2", "MERCHANT", "CUST2", 75.0, "2026-02-18 09:05:00"),
    ("LEG3", "MERCHANT", "CUST3", 100.0, "2026-02-18 09:10:00"),
];

/// Accounts that take part in no pattern
pub const LEGITIMATE_ACCOUNTS: [&str; 4] = ["MERCHANT", "CUST1", "CUST2", "CUST3"];

pub fn sample_transactions() -> Vec<Transaction> {
    SAMPLE_ROWS
        .iter()
        .filter_map(|&(id, from, to, amount, ts)| {
            parse_timestamp(ts).map(|ts| Transaction::new(id, from, to, amount, ts))
        })
        .collect()
}

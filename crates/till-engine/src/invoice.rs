//! # Invoice Numbering
//!
//! Human-readable, date-scoped invoice identifiers: `YYYYMMDD-NNNN`.
//!
//! The sequence number comes from the ledger's atomic per-day counter
//! ([`crate::SaleLedger::next_invoice_sequence`]); this module only formats
//! and parses. Deriving the sequence by counting existing rows would hand
//! two concurrent creations the same number, so the counter is the single
//! source of the `NNNN` part.

use chrono::{DateTime, Utc};

/// Minimum digit width of the sequence part.
pub const SEQUENCE_WIDTH: usize = 4;

/// Formats the date prefix for a point in time: `YYYYMMDD` (UTC).
pub fn date_prefix(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d").to_string()
}

/// Formats a full invoice number from a date prefix and sequence value.
///
/// The sequence is left-zero-padded to [`SEQUENCE_WIDTH`]; values beyond
/// 9999 widen rather than wrap, so numbers stay unique on very busy days.
///
/// ```rust
/// use till_engine::invoice::invoice_number;
///
/// assert_eq!(invoice_number("20260807", 1), "20260807-0001");
/// assert_eq!(invoice_number("20260807", 412), "20260807-0412");
/// ```
pub fn invoice_number(date_prefix: &str, sequence: i64) -> String {
    format!("{}-{:0width$}", date_prefix, sequence, width = SEQUENCE_WIDTH)
}

/// Splits an invoice number into its date prefix and sequence value.
///
/// Returns `None` for strings that do not follow the `YYYYMMDD-NNNN` shape.
pub fn parse(invoice_number: &str) -> Option<(&str, i64)> {
    let (prefix, seq) = invoice_number.split_once('-')?;
    if prefix.len() != 8 || !prefix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((prefix, seq.parse().ok()?))
}

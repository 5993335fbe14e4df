//! Shared primitive types used across the engine.

/// Primary key of a loan row.
pub type LoanId = i64;

/// Primary key of any ledger row (pricing history, risk assessment, SFDR report).
pub type RecordId = i64;

/// Identifier of the user who triggered a recalculation, when known.
pub type UserId = i64;

/// Correlation id stamped on every engine command and its event-log entry.
pub type RequestId = String;

/// Round to two decimals the way every persisted score is rounded.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to four decimals (rates in result payloads).
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

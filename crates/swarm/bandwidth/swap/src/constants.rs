//! Default values for SWAP settlement.

/// Handshake attempts before a peer's beneficiary is considered unavailable.
pub const DEFAULT_HANDSHAKE_ATTEMPTS: u32 = 5;

/// Timeout for a single handshake attempt, in seconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Timeout for delivering one cheque, in seconds.
pub const DEFAULT_CHEQUE_TIMEOUT_SECS: u64 = 30;

/// Upper bound for a whole emission (handshake, issue, send), in seconds.
pub const DEFAULT_EMIT_TIMEOUT_SECS: u64 = 60;

/// How long cheque history records are kept, in days.
pub const DEFAULT_HISTORY_RETENTION_DAYS: u64 = 180;

pub(crate) const SECONDS_PER_DAY: u64 = 86_400;

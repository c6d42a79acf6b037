//! SWAP settlement configuration.

use std::time::Duration;

use crate::constants::*;

/// Timeouts and limits used by [`Swap`](crate::Swap).
#[auto_impl::auto_impl(&, Arc)]
pub trait SwapConfig: Send + Sync {
    fn handshake_attempts(&self) -> u32;

    fn handshake_timeout(&self) -> Duration;

    fn cheque_timeout(&self) -> Duration;

    fn emit_timeout(&self) -> Duration;

    /// Retention window for sent and received cheque history.
    fn history_retention(&self) -> Duration;
}

/// Default SWAP configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSwapConfig;

impl SwapConfig for DefaultSwapConfig {
    fn handshake_attempts(&self) -> u32 {
        DEFAULT_HANDSHAKE_ATTEMPTS
    }

    fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS)
    }

    fn cheque_timeout(&self) -> Duration {
        Duration::from_secs(DEFAULT_CHEQUE_TIMEOUT_SECS)
    }

    fn emit_timeout(&self) -> Duration {
        Duration::from_secs(DEFAULT_EMIT_TIMEOUT_SECS)
    }

    fn history_retention(&self) -> Duration {
        Duration::from_secs(DEFAULT_HISTORY_RETENTION_DAYS * SECONDS_PER_DAY)
    }
}

/// Resolved settings, copied out of a [`SwapConfig`] once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SwapSettings {
    pub(crate) handshake_attempts: u32,
    pub(crate) handshake_timeout: Duration,
    pub(crate) cheque_timeout: Duration,
    pub(crate) emit_timeout: Duration,
}

impl SwapSettings {
    pub(crate) fn from_config(config: &impl SwapConfig) -> Self {
        Self {
            handshake_attempts: config.handshake_attempts().max(1),
            handshake_timeout: config.handshake_timeout(),
            cheque_timeout: config.cheque_timeout(),
            emit_timeout: config.emit_timeout(),
        }
    }
}

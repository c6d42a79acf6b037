//! CLI arguments for SWAP settlement configuration.

use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::{config::SwapConfig, constants::*};

/// SWAP settlement CLI arguments.
#[derive(Debug, Args, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "SWAP Settlement")]
#[serde(default)]
pub struct SwapArgs {
    /// Handshake attempts before giving up on a peer
    #[arg(long = "swap.handshake-attempts", default_value_t = DEFAULT_HANDSHAKE_ATTEMPTS)]
    pub handshake_attempts: u32,

    /// Timeout for one handshake attempt, in seconds
    #[arg(long = "swap.handshake-timeout", default_value_t = DEFAULT_HANDSHAKE_TIMEOUT_SECS)]
    pub handshake_timeout_secs: u64,

    /// Timeout for delivering a cheque, in seconds
    #[arg(long = "swap.cheque-timeout", default_value_t = DEFAULT_CHEQUE_TIMEOUT_SECS)]
    pub cheque_timeout_secs: u64,

    /// Overall timeout for emitting a cheque, in seconds
    #[arg(long = "swap.emit-timeout", default_value_t = DEFAULT_EMIT_TIMEOUT_SECS)]
    pub emit_timeout_secs: u64,

    /// Days of cheque history to keep
    #[arg(long = "swap.history-retention-days", default_value_t = DEFAULT_HISTORY_RETENTION_DAYS)]
    pub history_retention_days: u64,
}

impl Default for SwapArgs {
    fn default() -> Self {
        Self {
            handshake_attempts: DEFAULT_HANDSHAKE_ATTEMPTS,
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            cheque_timeout_secs: DEFAULT_CHEQUE_TIMEOUT_SECS,
            emit_timeout_secs: DEFAULT_EMIT_TIMEOUT_SECS,
            history_retention_days: DEFAULT_HISTORY_RETENTION_DAYS,
        }
    }
}

impl SwapArgs {
    /// Validate argument combinations.
    pub fn validate(&self) -> Result<(), String> {
        if self.handshake_attempts == 0 {
            return Err("swap.handshake-attempts must be at least 1".to_string());
        }
        if self.handshake_timeout_secs == 0
            || self.cheque_timeout_secs == 0
            || self.emit_timeout_secs == 0
        {
            return Err("swap timeouts must be non-zero".to_string());
        }
        if self.emit_timeout_secs < self.cheque_timeout_secs {
            return Err(
                "swap.emit-timeout must not be shorter than swap.cheque-timeout".to_string(),
            );
        }
        if self.history_retention_days == 0 {
            return Err("swap.history-retention-days must be at least 1".to_string());
        }
        Ok(())
    }
}

impl SwapConfig for SwapArgs {
    fn handshake_attempts(&self) -> u32 {
        self.handshake_attempts
    }

    fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    fn cheque_timeout(&self) -> Duration {
        Duration::from_secs(self.cheque_timeout_secs)
    }

    fn emit_timeout(&self) -> Duration {
        Duration::from_secs(self.emit_timeout_secs)
    }

    fn history_retention(&self) -> Duration {
        Duration::from_secs(self.history_retention_days.saturating_mul(SECONDS_PER_DAY))
    }
}

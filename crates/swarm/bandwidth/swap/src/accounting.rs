//! Notification sink towards bandwidth accounting.

use alloy_primitives::U256;
use vertex_swarm_net_swap::{OverlayAddress, SettlementHeaders};

#[derive(Debug, thiserror::Error)]
#[error("accounting: {0}")]
pub struct AccountingError(pub String);

/// Receives settlement results. Amounts are in accounting units for
/// received payments and token base units for sent ones.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait SwapAccounting: Send + Sync {
    fn notify_payment_received(
        &self,
        peer: OverlayAddress,
        amount: U256,
    ) -> Result<(), AccountingError>;

    fn notify_payment_sent(&self, peer: OverlayAddress, amount: U256);
}

/// Converts a token increment into accounting units: `(amount - deduction) / exchange_rate`.
///
/// A zero exchange rate leaves the amount undivided.
pub fn to_accounting_units(amount: U256, rates: &SettlementHeaders) -> U256 {
    let net = amount.saturating_sub(rates.deduction);
    if rates.exchange_rate.is_zero() {
        net
    } else {
        net / rates.exchange_rate
    }
}

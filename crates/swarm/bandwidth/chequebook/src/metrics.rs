//! Chequebook and cheque store metrics.

use metrics::Counter;

/// Settlement counters shared by the issuing and receiving sides.
#[derive(Clone, Debug)]
pub(crate) struct ChequebookMetrics {
    /// Cheques committed after successful delivery
    pub(crate) cheques_issued_total: Counter,
    /// Reservations released without a commit
    pub(crate) reservations_released_total: Counter,
    /// Cheques accepted by the cheque store
    pub(crate) cheques_received_total: Counter,
    /// Cashout transactions submitted
    pub(crate) cashouts_total: Counter,
    /// Deposit transactions submitted
    pub(crate) deposits_total: Counter,
    /// Withdrawal transactions submitted
    pub(crate) withdrawals_total: Counter,
}

impl Default for ChequebookMetrics {
    fn default() -> Self {
        Self {
            cheques_issued_total: metrics::counter!("swap.chequebook.cheques_issued_total"),
            reservations_released_total: metrics::counter!(
                "swap.chequebook.reservations_released_total"
            ),
            cheques_received_total: metrics::counter!("swap.chequestore.cheques_received_total"),
            cashouts_total: metrics::counter!("swap.cashout.cashouts_total"),
            deposits_total: metrics::counter!("swap.chequebook.deposits_total"),
            withdrawals_total: metrics::counter!("swap.chequebook.withdrawals_total"),
        }
    }
}

impl ChequebookMetrics {
    /// Counts a rejected cheque under its reason label.
    pub(crate) fn inc_rejected(&self, reason: &'static str) {
        metrics::counter!("swap.chequestore.cheques_rejected_total", "reason" => reason)
            .increment(1);
    }
}

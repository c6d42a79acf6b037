use metrics::Counter;

/// Counters for the SWAP protocol.
#[derive(Clone)]
pub(crate) struct SwapMetrics {
    pub(crate) cheques_sent_total: Counter,
    pub(crate) cheques_send_failed_total: Counter,
    pub(crate) cheques_received_total: Counter,
    pub(crate) cheques_refused_total: Counter,
    pub(crate) handshake_retries_total: Counter,
    pub(crate) handshakes_served_total: Counter,
}

impl Default for SwapMetrics {
    fn default() -> Self {
        Self {
            cheques_sent_total: metrics::counter!("swap.cheques_sent_total"),
            cheques_send_failed_total: metrics::counter!("swap.cheques_send_failed_total"),
            cheques_received_total: metrics::counter!("swap.cheques_received_total"),
            cheques_refused_total: metrics::counter!("swap.cheques_refused_total"),
            handshake_retries_total: metrics::counter!("swap.handshake_retries_total"),
            handshakes_served_total: metrics::counter!("swap.handshakes_served_total"),
        }
    }
}

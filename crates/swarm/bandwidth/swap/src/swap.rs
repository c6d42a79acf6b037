//! The SWAP protocol: handshakes, cheque emission and inbound cheques.

use std::{sync::Arc, time::Duration};

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};
use vertex_storage::SharedStateStore;
use vertex_swarm_bandwidth_chequebook::{ChequeStore, Chequebook};
use vertex_swarm_net_swap::{
    HANDSHAKE_PROTOCOL, InboundHandler, OverlayAddress, PeerTransport, SWAP_PROTOCOL,
    TransportError, decode_cheque_request, decode_handshake, decode_headers,
    encode_cheque_request, encode_handshake, encode_headers,
};

use crate::{
    accounting::{SwapAccounting, to_accounting_units},
    address_book::AddressBook,
    config::{SwapConfig, SwapSettings},
    error::SwapError,
    metrics::SwapMetrics,
    oracle::PriceOracle,
};

/// Progress of an outbound cheque, reported when emission fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum EmitState {
    Handshaking,
    Issuing,
    Sending,
    Done,
}

/// Collaborators a [`Swap`] is wired to.
///
/// The chequebook and cheque store are taken by value so the configured
/// history retention applies to both.
pub struct SwapParts {
    /// Address peers make our cheques out to.
    pub beneficiary: Address,
    pub chequebook: Chequebook,
    pub cheque_store: ChequeStore,
    pub store: SharedStateStore,
    pub transport: Arc<dyn PeerTransport>,
    pub oracle: Arc<dyn PriceOracle>,
    pub accounting: Arc<dyn SwapAccounting>,
}

/// One node's side of the SWAP protocol.
pub struct Swap {
    beneficiary: Address,
    chequebook: Arc<Chequebook>,
    cheque_store: Arc<ChequeStore>,
    address_book: AddressBook,
    transport: Arc<dyn PeerTransport>,
    oracle: Arc<dyn PriceOracle>,
    accounting: Arc<dyn SwapAccounting>,
    settings: SwapSettings,
    metrics: SwapMetrics,
}

async fn with_timeout<T, E>(
    duration: Duration,
    what: &'static str,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, SwapError>
where
    SwapError: From<E>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result.map_err(SwapError::from),
        Err(_) => Err(SwapError::Timeout(what)),
    }
}

impl Swap {
    pub fn new(config: &impl SwapConfig, parts: SwapParts) -> Self {
        let retention = config.history_retention();
        Self {
            beneficiary: parts.beneficiary,
            chequebook: Arc::new(parts.chequebook.with_history_retention(retention)),
            cheque_store: Arc::new(parts.cheque_store.with_history_retention(retention)),
            address_book: AddressBook::new(parts.store),
            transport: parts.transport,
            oracle: parts.oracle,
            accounting: parts.accounting,
            settings: SwapSettings::from_config(config),
            metrics: SwapMetrics::default(),
        }
    }

    pub const fn beneficiary(&self) -> Address {
        self.beneficiary
    }

    pub const fn address_book(&self) -> &AddressBook {
        &self.address_book
    }

    pub const fn chequebook(&self) -> &Arc<Chequebook> {
        &self.chequebook
    }

    /// Shared with the cashout service, which redeems what this store accepts.
    pub const fn cheque_store(&self) -> &Arc<ChequeStore> {
        &self.cheque_store
    }

    /// Returns the beneficiary of `peer`, asking the peer if it is not yet known.
    pub async fn handshake(&self, peer: OverlayAddress) -> Result<Address, SwapError> {
        if let Some(beneficiary) = self.address_book.beneficiary(peer)? {
            return Ok(beneficiary);
        }

        let attempts = self.settings.handshake_attempts;
        let mut reason = String::new();
        for attempt in 1..=attempts {
            let response = with_timeout(
                self.settings.handshake_timeout,
                "handshake",
                self.transport.request(peer, HANDSHAKE_PROTOCOL, Bytes::new()),
            )
            .await
            .and_then(|bytes| decode_handshake(&bytes).map_err(SwapError::from));

            match response {
                Ok(beneficiary) => {
                    self.address_book.put_beneficiary(peer, beneficiary)?;
                    debug!(%peer, %beneficiary, attempt, "Handshake complete");
                    return Ok(beneficiary);
                }
                Err(e) => {
                    debug!(%peer, attempt, error = %e, "Handshake attempt failed");
                    reason = e.to_string();
                    if attempt < attempts {
                        self.metrics.handshake_retries_total.increment(1);
                    }
                }
            }
        }

        warn!(%peer, attempts, %reason, "Peer beneficiary unavailable");
        Err(SwapError::BeneficiaryUnavailable { peer, reason })
    }

    /// Pays `peer` a cheque worth `amount` more than the last one.
    ///
    /// Nothing is persisted unless the peer accepts the cheque. Returns the
    /// amount sent.
    pub async fn emit_cheque(&self, peer: OverlayAddress, amount: U256) -> Result<U256, SwapError> {
        let mut state = EmitState::Handshaking;
        let result = match tokio::time::timeout(
            self.settings.emit_timeout,
            self.emit(peer, amount, &mut state),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SwapError::Timeout("cheque emission")),
        };

        match &result {
            Ok(_) => {
                self.metrics.cheques_sent_total.increment(1);
                self.accounting.notify_payment_sent(peer, amount);
            }
            Err(e) => {
                self.metrics.cheques_send_failed_total.increment(1);
                warn!(%peer, %amount, %state, error = %e, "Cheque emission failed");
            }
        }
        result
    }

    async fn emit(
        &self,
        peer: OverlayAddress,
        amount: U256,
        state: &mut EmitState,
    ) -> Result<U256, SwapError> {
        let beneficiary = self.handshake(peer).await?;

        *state = EmitState::Issuing;
        let reservation = self.chequebook.reserve(beneficiary, amount).await?;
        let rates = self.oracle.current_rates().await?;
        let payload = encode_cheque_request(reservation.cheque(), &rates)?;

        *state = EmitState::Sending;
        let response = match with_timeout(
            self.settings.cheque_timeout,
            "cheque delivery",
            self.transport.request(peer, SWAP_PROTOCOL, payload),
        )
        .await
        {
            Ok(response) => response,
            Err(e) => {
                reservation.release();
                return Err(e);
            }
        };

        let cumulative_payout = reservation.cheque().cumulative_payout();
        let available = reservation.commit().await?;
        *state = EmitState::Done;

        match decode_headers(&response) {
            Ok(peer_rates) if peer_rates.exchange_rate != rates.exchange_rate => {
                warn!(
                    %peer,
                    ours = %rates.exchange_rate,
                    theirs = %peer_rates.exchange_rate,
                    "Peer advertises a different exchange rate"
                );
            }
            Ok(_) => {}
            Err(e) => debug!(%peer, error = %e, "Unreadable settlement headers in response"),
        }

        info!(%peer, %beneficiary, %amount, %cumulative_payout, %available, "Cheque sent");
        Ok(amount)
    }

    /// Answers a handshake with our beneficiary.
    pub fn handle_handshake(&self, peer: OverlayAddress) -> Result<Bytes, SwapError> {
        self.metrics.handshakes_served_total.increment(1);
        debug!(%peer, "Serving handshake");
        Ok(encode_handshake(self.beneficiary)?)
    }

    /// Verifies and stores a cheque from `peer`, answering with our rates.
    pub async fn handle_cheque(
        &self,
        peer: OverlayAddress,
        payload: &[u8],
    ) -> Result<Bytes, SwapError> {
        let result = self.receive(peer, payload).await;
        match &result {
            Ok(_) => self.metrics.cheques_received_total.increment(1),
            Err(e) => {
                self.metrics.cheques_refused_total.increment(1);
                warn!(%peer, error = %e, "Refused cheque");
            }
        }
        result
    }

    async fn receive(&self, peer: OverlayAddress, payload: &[u8]) -> Result<Bytes, SwapError> {
        let (cheque, peer_rates) = decode_cheque_request(payload)?;
        let chequebook = cheque.cheque.chequebook;

        match self.address_book.chequebook(peer)? {
            Some(expected) if expected != chequebook => {
                return Err(SwapError::WrongChequebook {
                    peer,
                    expected,
                    actual: chequebook,
                });
            }
            Some(_) => {}
            None => {
                if let Some(owner) = self.address_book.chequebook_peer(chequebook)?
                    && owner != peer
                {
                    return Err(SwapError::ForeignChequebook {
                        peer,
                        chequebook,
                        owner,
                    });
                }
            }
        }

        let rates = self.oracle.current_rates().await?;
        if peer_rates != rates {
            debug!(
                %peer,
                theirs = %peer_rates.exchange_rate,
                ours = %rates.exchange_rate,
                "Peer rates differ, using ours"
            );
        }

        let amount = self
            .cheque_store
            .receive_cheque(&cheque, rates.min_amount())
            .await?;
        self.address_book.put_chequebook(peer, chequebook)?;

        let units = to_accounting_units(amount, &rates);
        self.accounting.notify_payment_received(peer, units)?;
        debug!(%peer, %chequebook, %amount, %units, "Cheque received");

        Ok(encode_headers(&rates)?)
    }
}

#[async_trait]
impl InboundHandler for Swap {
    async fn handle_request(
        &self,
        peer: OverlayAddress,
        protocol: &str,
        payload: Bytes,
    ) -> Result<Bytes, TransportError> {
        let result = match protocol {
            HANDSHAKE_PROTOCOL => self.handle_handshake(peer),
            SWAP_PROTOCOL => self.handle_cheque(peer, &payload).await,
            other => Err(SwapError::UnknownProtocol(other.to_string())),
        };
        result.map_err(|e| TransportError::Remote(e.to_string()))
    }
}

//! Cloneable handle for interacting with the swap service.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use vertex_swarm_net_swap::{InboundHandler, OverlayAddress, TransportError};

use crate::{error::SwapError, service::SwapCommand};

/// Cloneable handle for requesting cheque settlements from the service.
#[derive(Clone)]
pub struct SwapHandle {
    command_tx: mpsc::UnboundedSender<SwapCommand>,
}

impl SwapHandle {
    /// Create a new handle from a command sender.
    pub fn new(command_tx: mpsc::UnboundedSender<SwapCommand>) -> Self {
        Self { command_tx }
    }

    /// Pay `peer` a cheque for `amount`. Returns the amount sent.
    pub async fn emit_cheque(&self, peer: OverlayAddress, amount: U256) -> Result<U256, SwapError> {
        let (tx, rx) = oneshot::channel();

        self.command_tx
            .send(SwapCommand::EmitCheque {
                peer,
                amount,
                response_tx: tx,
            })
            .map_err(|_| SwapError::ServiceStopped)?;

        rx.await.map_err(|_| SwapError::ServiceStopped)?
    }

    pub async fn handshake(&self, peer: OverlayAddress) -> Result<Address, SwapError> {
        let (tx, rx) = oneshot::channel();

        self.command_tx
            .send(SwapCommand::Handshake {
                peer,
                response_tx: tx,
            })
            .map_err(|_| SwapError::ServiceStopped)?;

        rx.await.map_err(|_| SwapError::ServiceStopped)?
    }
}

#[async_trait]
impl InboundHandler for SwapHandle {
    async fn handle_request(
        &self,
        peer: OverlayAddress,
        protocol: &str,
        payload: Bytes,
    ) -> Result<Bytes, TransportError> {
        let stopped = || TransportError::Remote(SwapError::ServiceStopped.to_string());
        let (tx, rx) = oneshot::channel();

        self.command_tx
            .send(SwapCommand::Inbound {
                peer,
                protocol: protocol.to_string(),
                payload,
                response_tx: tx,
            })
            .map_err(|_| stopped())?;

        rx.await.map_err(|_| stopped())?
    }
}

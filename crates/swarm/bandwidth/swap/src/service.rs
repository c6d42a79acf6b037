//! Swap service actor.
//!
//! This module implements the Handle+Service actor pattern for swap settlement.
//! The service runs in its own tokio task, receives commands from
//! [`SwapHandle`](crate::SwapHandle)s and serves each one in a separate task
//! so a slow peer does not hold up the others.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use bytes::Bytes;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinSet,
};
use tracing::{debug, warn};
use vertex_swarm_net_swap::{InboundHandler, OverlayAddress, TransportError};

use crate::{error::SwapError, swap::Swap};

/// Commands from the handle to the service.
pub enum SwapCommand {
    /// Pay a peer.
    EmitCheque {
        peer: OverlayAddress,
        amount: U256,
        response_tx: oneshot::Sender<Result<U256, SwapError>>,
    },
    /// Resolve a peer's beneficiary.
    Handshake {
        peer: OverlayAddress,
        response_tx: oneshot::Sender<Result<Address, SwapError>>,
    },
    /// A request opened by a remote peer.
    Inbound {
        peer: OverlayAddress,
        protocol: String,
        payload: Bytes,
        response_tx: oneshot::Sender<Result<Bytes, TransportError>>,
    },
}

/// The swap service runs in its own tokio task.
pub struct SwapService {
    /// Receive commands from handles.
    command_rx: mpsc::UnboundedReceiver<SwapCommand>,
    swap: Arc<Swap>,
    tasks: JoinSet<()>,
}

impl SwapService {
    pub fn new(command_rx: mpsc::UnboundedReceiver<SwapCommand>, swap: Arc<Swap>) -> Self {
        Self {
            command_rx,
            swap,
            tasks: JoinSet::new(),
        }
    }

    /// Run the service event loop until every handle is dropped and all
    /// in-flight commands have finished.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    self.handle_command(cmd);
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Swap task failed");
                    }
                }
                else => {
                    debug!("Swap service shutting down");
                    break;
                }
            }
        }
    }

    /// Convert self into a spawnable future.
    pub async fn into_task(self) {
        self.run().await;
    }

    fn handle_command(&mut self, cmd: SwapCommand) {
        let swap = self.swap.clone();
        match cmd {
            SwapCommand::EmitCheque {
                peer,
                amount,
                response_tx,
            } => {
                self.tasks.spawn(async move {
                    let _ = response_tx.send(swap.emit_cheque(peer, amount).await);
                });
            }
            SwapCommand::Handshake { peer, response_tx } => {
                self.tasks.spawn(async move {
                    let _ = response_tx.send(swap.handshake(peer).await);
                });
            }
            SwapCommand::Inbound {
                peer,
                protocol,
                payload,
                response_tx,
            } => {
                self.tasks.spawn(async move {
                    let result = swap.handle_request(peer, &protocol, payload).await;
                    let _ = response_tx.send(result);
                });
            }
        }
    }
}

//! In-memory peer network.
//!
//! Every node registers an [`InboundHandler`] under its overlay address and
//! talks to the others through a [`MemoryTransport`]. Faults are injected per
//! destination peer.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use vertex_swarm_net_swap::{InboundHandler, OverlayAddress, PeerTransport, TransportError};

#[derive(Default)]
struct Faults {
    /// Remaining requests to fail with a stream error.
    fail: usize,
    /// Delay before the handler sees the request.
    delay: Option<Duration>,
}

/// Shared routing table. Cloning shares the table.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    handlers: Arc<RwLock<HashMap<OverlayAddress, Arc<dyn InboundHandler>>>>,
    faults: Arc<Mutex<HashMap<OverlayAddress, Faults>>>,
    requests: Arc<Mutex<HashMap<(OverlayAddress, &'static str), usize>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes requests for `peer` to `handler`.
    pub fn register(&self, peer: OverlayAddress, handler: Arc<dyn InboundHandler>) {
        self.handlers.write().insert(peer, handler);
    }

    pub fn disconnect(&self, peer: OverlayAddress) {
        self.handlers.write().remove(&peer);
    }

    /// Transport used by the node at `local`.
    pub fn transport(&self, local: OverlayAddress) -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport {
            network: self.clone(),
            local,
        })
    }

    /// Fails the next `count` requests addressed to `peer`.
    pub fn fail_next(&self, peer: OverlayAddress, count: usize) {
        self.faults.lock().entry(peer).or_default().fail = count;
    }

    /// Holds every request to `peer` for `delay` before delivering it.
    pub fn set_delay(&self, peer: OverlayAddress, delay: Duration) {
        self.faults.lock().entry(peer).or_default().delay = Some(delay);
    }

    /// Requests sent to `peer` on `protocol`, including failed ones.
    pub fn request_count(&self, peer: OverlayAddress, protocol: &'static str) -> usize {
        self.requests
            .lock()
            .get(&(peer, protocol))
            .copied()
            .unwrap_or_default()
    }
}

/// [`PeerTransport`] bound to one local overlay address.
pub struct MemoryTransport {
    network: MemoryNetwork,
    local: OverlayAddress,
}

#[async_trait]
impl PeerTransport for MemoryTransport {
    async fn request(
        &self,
        peer: OverlayAddress,
        protocol: &'static str,
        payload: Bytes,
    ) -> Result<Bytes, TransportError> {
        *self
            .network
            .requests
            .lock()
            .entry((peer, protocol))
            .or_default() += 1;

        let delay = {
            let mut faults = self.network.faults.lock();
            let fault = faults.entry(peer).or_default();
            if fault.fail > 0 {
                fault.fail -= 1;
                return Err(TransportError::Stream("injected failure".into()));
            }
            fault.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let handler = self
            .network
            .handlers
            .read()
            .get(&peer)
            .cloned()
            .ok_or(TransportError::NotConnected(peer))?;
        handler.handle_request(self.local, protocol, payload).await
    }
}

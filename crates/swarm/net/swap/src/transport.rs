//! Request/response seam between the SWAP service and the peer network.

use alloy_primitives::B256;
use async_trait::async_trait;
use bytes::Bytes;

/// 32-byte overlay address identifying a peer.
pub type OverlayAddress = B256;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("peer {0} not connected")]
    NotConnected(OverlayAddress),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("remote rejected request: {0}")]
    Remote(String),
}

/// Opens a stream to `peer` on `protocol`, writes `payload` and returns the
/// peer's complete response.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn request(
        &self,
        peer: OverlayAddress,
        protocol: &'static str,
        payload: Bytes,
    ) -> Result<Bytes, TransportError>;
}

/// Serves requests opened by a remote peer's [`PeerTransport`].
#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// Returns the response body, or an error that resets the stream.
    async fn handle_request(
        &self,
        peer: OverlayAddress,
        protocol: &str,
        payload: Bytes,
    ) -> Result<Bytes, TransportError>;
}

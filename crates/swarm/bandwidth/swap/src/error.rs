//! SWAP settlement errors.

use alloy_primitives::Address;
use vertex_storage::DatabaseError;
use vertex_swarm_bandwidth_chequebook::{ChequeStoreError, ChequebookError};
use vertex_swarm_net_swap::{OverlayAddress, SwapCodecError, TransportError};

use crate::{accounting::AccountingError, oracle::OracleError};

/// Errors that can occur during swap operations.
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    /// Service has stopped.
    #[error("swap service stopped")]
    ServiceStopped,

    /// The peer never told us where to send cheques.
    #[error("beneficiary of peer {peer} unavailable: {reason}")]
    BeneficiaryUnavailable { peer: OverlayAddress, reason: String },

    /// The peer paid from a chequebook other than the one on record.
    #[error("peer {peer} sent a cheque from {actual}, expected {expected}")]
    WrongChequebook {
        peer: OverlayAddress,
        expected: Address,
        actual: Address,
    },

    /// The chequebook is already on record for a different peer.
    #[error("peer {peer} sent a cheque from {chequebook}, which belongs to {owner}")]
    ForeignChequebook {
        peer: OverlayAddress,
        chequebook: Address,
        owner: OverlayAddress,
    },

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("unknown protocol {0}")]
    UnknownProtocol(String),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("codec: {0}")]
    Codec(#[from] SwapCodecError),

    #[error(transparent)]
    Chequebook(#[from] ChequebookError),

    #[error(transparent)]
    ChequeStore(#[from] ChequeStoreError),

    #[error("store: {0}")]
    Store(#[from] DatabaseError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Accounting(#[from] AccountingError),
}

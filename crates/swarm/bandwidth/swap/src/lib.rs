//! SWAP - Chequebook-based settlement.
//!
//! When accounting decides a peer must be paid, SWAP sends it a cheque:
//!
//! 1. Resolve the peer's beneficiary with a handshake (cached in the [`AddressBook`])
//! 2. Reserve funds in the [`Chequebook`] and sign the next cheque
//! 3. Send the cheque together with our settlement headers
//! 4. Commit on success, release the reservation on any failure
//!
//! The receiving side verifies the cheque through its [`ChequeStore`],
//! converts the increment into accounting units and notifies accounting.
//!
//! # Actor Pattern
//!
//! This crate implements the Handle+Service actor pattern:
//! - [`SwapService`] runs in its own tokio task and processes commands
//! - [`SwapHandle`] is cheap-to-clone and used to send commands
//!
//! Use [`create_swap_actor`] to create the service and handle pair.
//!
//! [`Chequebook`]: vertex_swarm_bandwidth_chequebook::Chequebook
//! [`ChequeStore`]: vertex_swarm_bandwidth_chequebook::ChequeStore

pub mod accounting;
pub mod address_book;
pub mod args;
pub mod config;
pub mod constants;
pub mod error;
pub mod handle;
pub mod oracle;
pub mod service;
pub mod swap;

mod metrics;

use std::sync::Arc;

use tokio::sync::mpsc;

pub use accounting::{AccountingError, SwapAccounting, to_accounting_units};
pub use address_book::AddressBook;
pub use args::SwapArgs;
pub use config::{DefaultSwapConfig, SwapConfig};
pub use error::SwapError;
pub use handle::SwapHandle;
pub use oracle::{FixedPriceOracle, OracleError, PriceOracle};
pub use service::{SwapCommand, SwapService};
pub use swap::{Swap, SwapParts};

/// Create a swap actor (service and handle pair).
///
/// The service should be spawned as a background task. The handle doubles as
/// the [`InboundHandler`](vertex_swarm_net_swap::InboundHandler) the network
/// layer routes SWAP streams to.
pub fn create_swap_actor(swap: Arc<Swap>) -> (SwapService, SwapHandle) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let service = SwapService::new(command_rx, swap);
    let handle = SwapHandle::new(command_tx);

    (service, handle)
}

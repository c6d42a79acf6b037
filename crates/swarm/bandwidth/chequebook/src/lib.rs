//! Chequebook-based settlement for SWAP.
//!
//! This crate holds both sides of a cheque:
//!
//! - [`Chequebook`] - the issuer side. Reserves funds, signs cheques and
//!   persists the last cheque per beneficiary once it has been delivered.
//! - [`ChequeStore`] - the beneficiary side. Verifies incoming cheques against
//!   local and on-chain state and keeps the latest one per chequebook.
//! - [`CashoutService`] - redeems received cheques on-chain and reconciles the
//!   outcome from the transaction receipt.
//!
//! # EIP-712 Signing
//!
//! Cheques use EIP-712 typed data signing with the domain:
//! - Name: "Chequebook"
//! - Version: "1.0"
//! - ChainId: the settlement chain
//!
//! The struct depends on the token, see [`AssetTable`]:
//! ```text
//! Cheque(address chequebook,address beneficiary,uint256 cumulativePayout)
//! MultiTokenCheque(address token,address chequebook,address beneficiary,uint256 cumulativePayout)
//! ```
//!
//! # Issuing a Cheque
//!
//! ```ignore
//! let reservation = chequebook.reserve(beneficiary, amount).await?;
//! match transport.send(reservation.cheque().clone()).await {
//!     Ok(()) => { reservation.commit().await?; }
//!     Err(_) => reservation.release(),
//! }
//! ```
//!
//! # Wire Format
//!
//! Cheques are serialized as JSON for transmission over the SWAP protocol,
//! matching Bee's format for interoperability.

pub mod asset;
pub mod cashout;
pub mod chain;
pub mod cheque;
pub mod chequebook;
pub mod contract;
pub mod error;
pub mod history;
pub mod signer;
pub mod store;

mod keys;
mod metrics;

pub use asset::{AssetTable, ChequeSchema};
pub use cashout::{CashoutAction, CashoutOutcome, CashoutService, CashoutStatus, LastCashout};
pub use chain::{ChainBackend, ChainError, TxHash, TxInfo, TxReceipt, TxRequest};
pub use cheque::{Cheque, ChequeDomain, DOMAIN_NAME, DOMAIN_VERSION, SignedCheque};
pub use chequebook::{Chequebook, Reservation};
pub use contract::{
    CashChequeResult, ChequebookContract, ChequebookFactory, Erc20, FactoryVerifier,
};
pub use error::{CashoutError, ChequeError, ChequeStoreError, ChequebookError};
pub use history::{
    ChequeHistory, ChequeRecord, Clock, DEFAULT_HISTORY_RETENTION, DailyStats, Direction,
    IndexRange, SystemClock,
};
pub use signer::{ChequeSigner, LocalChequeSigner};
pub use store::ChequeStore;

// Re-export commonly used types
pub use alloy_primitives::{Address, Bytes, U256};

//! Error types for cheque issuance, verification and cashout.

use alloy_primitives::{Address, U256};
use vertex_storage::DatabaseError;

use crate::chain::{ChainError, TxHash};

/// Errors that can occur during cheque operations.
#[derive(Debug, thiserror::Error)]
pub enum ChequeError {
    /// Failed to recover signer from signature.
    #[error("failed to recover signer: {0}")]
    SignatureRecovery(String),

    /// Cheque was signed by unexpected address.
    #[error("invalid signer: expected {expected}, got {actual}")]
    InvalidSigner { expected: Address, actual: Address },

    /// The signing backend refused or failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Cheque serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors from the issuing side.
#[derive(Debug, thiserror::Error)]
pub enum ChequebookError {
    /// The owner or the chequebook cannot cover a deposit or withdrawal.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Not enough unreserved balance to issue the cheque.
    #[error("out of funds: requested {requested}, available {available}")]
    OutOfFunds { requested: U256, available: U256 },

    /// Cheques must carry a positive increment.
    #[error("cheque amount must be positive")]
    ZeroAmount,

    /// No cheque was issued to this beneficiary yet.
    #[error("no cheque")]
    NoCheque,

    /// Delivering the cheque failed; nothing was persisted.
    #[error("sending cheque failed: {0}")]
    SendFailed(String),

    /// The transaction was mined but reverted.
    #[error("transaction {0} reverted")]
    TransactionReverted(TxHash),

    #[error(transparent)]
    Cheque(#[from] ChequeError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// Reasons an incoming cheque is rejected.
///
/// Each verification step has its own variant; the snake case variant name is
/// used as the `reason` label on the rejection counter.
#[derive(Debug, thiserror::Error, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ChequeStoreError {
    #[error("wrong beneficiary: expected {expected}, got {actual}")]
    WrongBeneficiary { expected: Address, actual: Address },

    #[error("cheque cumulative payout not increasing")]
    ChequeNotIncreasing,

    #[error("cheque value too low: {amount} < {min_amount}")]
    ChequeValueTooLow { amount: U256, min_amount: U256 },

    /// The signature does not belong to the chequebook issuer.
    #[error("invalid cheque")]
    ChequeInvalid,

    /// The chequebook balance cannot cover the cheque.
    #[error("bouncing cheque")]
    BouncingCheque,

    /// The chequebook was not deployed by a trusted factory.
    #[error("unknown chequebook {0}")]
    UnknownChequebook(Address),

    #[error("no cheque")]
    NoCheque,

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// Errors from cashing cheques.
#[derive(Debug, thiserror::Error)]
pub enum CashoutError {
    /// Nothing was received from this chequebook in this token.
    #[error("no cheque")]
    NoCheque,

    /// The receipt carried no `ChequeCashed` event.
    #[error("no cashout event in receipt of {0}")]
    MissingCashoutEvent(TxHash),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

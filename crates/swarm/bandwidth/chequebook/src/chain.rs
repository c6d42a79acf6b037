//! The chain backend seam.
//!
//! Everything that talks to the settlement chain goes through
//! [`ChainBackend`]: read-only contract calls, transaction submission and
//! receipt lookups. A node wires in its RPC client; tests use a simulated
//! chain.

use alloy_primitives::{Address, B256, Bytes, Log, U256};
use async_trait::async_trait;

pub type TxHash = B256;

/// A transaction to be signed and broadcast by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// `None` lets the backend pick.
    pub gas_price: Option<U256>,
    /// `None` lets the backend estimate.
    pub gas_limit: Option<u64>,
    /// Short label for logs.
    pub description: &'static str,
}

impl TxRequest {
    /// A zero-value contract call.
    pub fn call(to: Address, data: impl Into<Bytes>, description: &'static str) -> Self {
        Self {
            to,
            data: data.into(),
            value: U256::ZERO,
            gas_price: None,
            gas_limit: None,
            description,
        }
    }

    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }
}

/// A mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// `false` when the transaction reverted.
    pub success: bool,
    pub logs: Vec<Log>,
}

/// Transaction lookup result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxInfo {
    pub hash: TxHash,
    /// Still in the mempool.
    pub pending: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Unknown transaction or receipt not yet available.
    #[error("not found")]
    NotFound,

    #[error("rpc error: {0}")]
    Rpc(String),

    /// The call returned data that does not match the ABI.
    #[error("abi decode error: {0}")]
    Decode(String),
}

/// Access to the settlement chain.
#[async_trait]
pub trait ChainBackend: Send + Sync {
    /// Executes a read-only call and returns the raw return data.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;

    /// Signs and broadcasts a transaction from the node's account.
    async fn send_transaction(&self, request: TxRequest) -> Result<TxHash, ChainError>;

    /// Blocks until the transaction is mined.
    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt, ChainError>;

    /// Native coin balance of `address`.
    async fn balance_at(&self, address: Address) -> Result<U256, ChainError>;

    /// Returns [`ChainError::NotFound`] for unknown transactions.
    async fn transaction_by_hash(&self, hash: TxHash) -> Result<TxInfo, ChainError>;

    /// Returns [`ChainError::NotFound`] while the transaction is pending.
    async fn transaction_receipt(&self, hash: TxHash) -> Result<TxReceipt, ChainError>;

    async fn suggest_gas_price(&self) -> Result<U256, ChainError>;
}

/// Fills in the suggested gas price when unset, then broadcasts.
pub async fn submit(
    backend: &dyn ChainBackend,
    mut request: TxRequest,
) -> Result<TxHash, ChainError> {
    if request.gas_price.is_none() {
        request.gas_price = Some(backend.suggest_gas_price().await?);
    }
    let description = request.description;
    let to = request.to;
    let hash = backend.send_transaction(request).await?;
    tracing::debug!(%to, %hash, description, "Submitted transaction");
    Ok(hash)
}

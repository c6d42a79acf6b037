//! Contract bindings for the chequebook, its factory and ERC-20 tokens.
//!
//! Native-token operations use the original chequebook functions; other
//! tokens use the `*Of` variants taking the token as first argument. The
//! choice is made once per call through [`AssetTable::schema`].

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolEvent, SolType, SolValue, sol};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    asset::{AssetTable, ChequeSchema},
    chain::{ChainBackend, ChainError, TxReceipt},
    cheque::SignedCheque,
};

sol! {
    /// Chequebook contract holding the issuer's funds.
    interface IChequebook {
        function issuer() external view returns (address);
        function totalbalance() external view returns (uint256);
        function totalbalanceOf(address token) external view returns (uint256);
        function paidOut(address beneficiary) external view returns (uint256);
        function paidOutOf(address token, address beneficiary) external view returns (uint256);
        function totalPaidOut() external view returns (uint256);
        function totalPaidOutOf(address token) external view returns (uint256);
        function cashChequeBeneficiary(
            address recipient,
            uint256 cumulativePayout,
            bytes issuerSig
        ) external;
        function cashChequeBeneficiaryOf(
            address token,
            address recipient,
            uint256 cumulativePayout,
            bytes issuerSig
        ) external;
        function withdraw(uint256 amount) external;
        function withdrawOf(address token, uint256 amount) external;

        event ChequeCashed(
            address indexed beneficiary,
            address indexed recipient,
            address indexed caller,
            uint256 totalPayout,
            uint256 cumulativePayout,
            uint256 callerPayout
        );
        event ChequeBounced();
    }

    /// Minimal ERC-20 surface used for deposits.
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    /// Factory recording every chequebook it deployed.
    interface IChequebookFactory {
        function deployedContracts(address chequebook) external view returns (bool);
    }
}

fn decode_return<T>(data: &[u8]) -> Result<T, ChainError>
where
    T: SolValue + From<<<T as SolValue>::SolType as SolType>::RustType>,
{
    T::abi_decode(data).map_err(|e| ChainError::Decode(e.to_string()))
}

/// Typed access to one chequebook contract.
#[derive(Clone)]
pub struct ChequebookContract {
    address: Address,
    assets: AssetTable,
    backend: Arc<dyn ChainBackend>,
}

impl ChequebookContract {
    pub fn new(address: Address, assets: AssetTable, backend: Arc<dyn ChainBackend>) -> Self {
        Self {
            address,
            assets,
            backend,
        }
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    async fn read<T>(&self, data: Vec<u8>) -> Result<T, ChainError>
    where
        T: SolValue + From<<<T as SolValue>::SolType as SolType>::RustType>,
    {
        let output = self.backend.call(self.address, data.into()).await?;
        decode_return(&output)
    }

    /// The address whose signatures this chequebook honours.
    pub async fn issuer(&self) -> Result<Address, ChainError> {
        self.read(IChequebook::issuerCall {}.abi_encode()).await
    }

    /// Token balance held by the chequebook.
    pub async fn total_balance(&self, token: Address) -> Result<U256, ChainError> {
        let data = match self.assets.schema(token) {
            ChequeSchema::Native => IChequebook::totalbalanceCall {}.abi_encode(),
            ChequeSchema::MultiToken => IChequebook::totalbalanceOfCall { token }.abi_encode(),
        };
        self.read(data).await
    }

    /// Amount already cashed by `beneficiary`.
    pub async fn paid_out(&self, token: Address, beneficiary: Address) -> Result<U256, ChainError> {
        let data = match self.assets.schema(token) {
            ChequeSchema::Native => IChequebook::paidOutCall { beneficiary }.abi_encode(),
            ChequeSchema::MultiToken => {
                IChequebook::paidOutOfCall { token, beneficiary }.abi_encode()
            }
        };
        self.read(data).await
    }

    /// Amount cashed across all beneficiaries.
    pub async fn total_paid_out(&self, token: Address) -> Result<U256, ChainError> {
        let data = match self.assets.schema(token) {
            ChequeSchema::Native => IChequebook::totalPaidOutCall {}.abi_encode(),
            ChequeSchema::MultiToken => IChequebook::totalPaidOutOfCall { token }.abi_encode(),
        };
        self.read(data).await
    }

    /// Calldata cashing `cheque` as its beneficiary, paying out to `recipient`.
    pub fn cash_cheque_calldata(&self, cheque: &SignedCheque, recipient: Address) -> Bytes {
        let cumulative_payout = cheque.cheque.cumulative_payout;
        let issuer_sig = cheque.signature.clone();
        match self.assets.schema(cheque.cheque.token) {
            ChequeSchema::Native => IChequebook::cashChequeBeneficiaryCall {
                recipient,
                cumulativePayout: cumulative_payout,
                issuerSig: issuer_sig,
            }
            .abi_encode(),
            ChequeSchema::MultiToken => IChequebook::cashChequeBeneficiaryOfCall {
                token: cheque.cheque.token,
                recipient,
                cumulativePayout: cumulative_payout,
                issuerSig: issuer_sig,
            }
            .abi_encode(),
        }
        .into()
    }

    pub fn withdraw_calldata(&self, token: Address, amount: U256) -> Bytes {
        match self.assets.schema(token) {
            ChequeSchema::Native => IChequebook::withdrawCall { amount }.abi_encode(),
            ChequeSchema::MultiToken => IChequebook::withdrawOfCall { token, amount }.abi_encode(),
        }
        .into()
    }
}

/// Typed access to an ERC-20 token.
#[derive(Clone)]
pub struct Erc20 {
    address: Address,
    backend: Arc<dyn ChainBackend>,
}

impl Erc20 {
    pub fn new(address: Address, backend: Arc<dyn ChainBackend>) -> Self {
        Self { address, backend }
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    pub async fn balance_of(&self, account: Address) -> Result<U256, ChainError> {
        let data = IERC20::balanceOfCall { account }.abi_encode();
        let output = self.backend.call(self.address, data.into()).await?;
        decode_return(&output)
    }

    pub fn transfer_calldata(to: Address, amount: U256) -> Bytes {
        IERC20::transferCall { to, amount }.abi_encode().into()
    }
}

/// Decides whether a chequebook is trusted before its first cheque is accepted.
#[async_trait]
pub trait FactoryVerifier: Send + Sync {
    /// `true` if `chequebook` was deployed by a known factory.
    async fn is_deployed(&self, chequebook: Address) -> Result<bool, ChainError>;
}

/// [`FactoryVerifier`] asking the factory contract on-chain.
#[derive(Clone)]
pub struct ChequebookFactory {
    address: Address,
    backend: Arc<dyn ChainBackend>,
}

impl ChequebookFactory {
    pub fn new(address: Address, backend: Arc<dyn ChainBackend>) -> Self {
        Self { address, backend }
    }
}

#[async_trait]
impl FactoryVerifier for ChequebookFactory {
    async fn is_deployed(&self, chequebook: Address) -> Result<bool, ChainError> {
        let data = IChequebookFactory::deployedContractsCall { chequebook }.abi_encode();
        let output = self.backend.call(self.address, data.into()).await?;
        decode_return(&output)
    }
}

/// Outcome of a mined cashout, read from the chequebook's events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashChequeResult {
    pub beneficiary: Address,
    pub recipient: Address,
    pub caller: Address,
    /// Amount transferred by this transaction.
    pub total_payout: U256,
    pub cumulative_payout: U256,
    pub caller_payout: U256,
    /// The chequebook could not cover the full amount.
    pub bounced: bool,
}

impl CashChequeResult {
    /// Extracts the `ChequeCashed` event emitted by `chequebook`, if any.
    pub fn from_receipt(
        chequebook: Address,
        receipt: &TxReceipt,
    ) -> Result<Option<Self>, ChainError> {
        let mut cashed = None;
        let mut bounced = false;

        for log in receipt.logs.iter().filter(|log| log.address == chequebook) {
            match log.data.topics().first() {
                Some(topic) if *topic == IChequebook::ChequeCashed::SIGNATURE_HASH => {
                    let event = IChequebook::ChequeCashed::decode_log_data(&log.data)
                        .map_err(|e| ChainError::Decode(e.to_string()))?;
                    cashed = Some(event);
                }
                Some(topic) if *topic == IChequebook::ChequeBounced::SIGNATURE_HASH => {
                    bounced = true;
                }
                _ => {}
            }
        }

        Ok(cashed.map(|event| Self {
            beneficiary: event.beneficiary,
            recipient: event.recipient,
            caller: event.caller,
            total_payout: event.totalPayout,
            cumulative_payout: event.cumulativePayout,
            caller_payout: event.callerPayout,
            bounced,
        }))
    }
}

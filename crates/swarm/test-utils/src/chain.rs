//! In-process chain with chequebook, factory and ERC-20 semantics.
//!
//! [`SimulatedChain`] keeps the whole world state behind one lock and hands
//! out [`ChainClient`]s, each sending transactions from a fixed account.
//! Transactions are mined immediately unless auto-mining is switched off, in
//! which case they stay pending until [`SimulatedChain::mine`].

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use alloy_primitives::{Address, B256, Bytes, Log, U256, keccak256};
use alloy_sol_types::{SolEvent, SolInterface, SolValue};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;
use vertex_swarm_bandwidth_chequebook::{
    AssetTable, ChainBackend, ChainError, Cheque, ChequeDomain, ChequebookFactory, FactoryVerifier,
    SignedCheque, TxHash, TxInfo, TxReceipt, TxRequest,
    contract::{IChequebook, IChequebookFactory, IERC20},
};

/// Chain id used by [`SimulatedChain::default`].
pub const TEST_CHAIN_ID: u64 = 100;

/// Gas price returned by every client.
pub const TEST_GAS_PRICE: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy)]
struct ChequebookAccount {
    issuer: Address,
}

#[derive(Debug, Clone)]
struct PendingTx {
    hash: TxHash,
    sender: Address,
    request: TxRequest,
}

#[derive(Debug, Default)]
struct WorldState {
    block_number: u64,
    nonce: u64,
    auto_mine: bool,
    revert_next: usize,
    next_contract: u64,
    native: HashMap<Address, U256>,
    /// ERC-20 balances keyed by (token, holder).
    tokens: HashMap<(Address, Address), U256>,
    chequebooks: HashMap<Address, ChequebookAccount>,
    deployed: HashSet<Address>,
    /// Keyed by (chequebook, token, beneficiary).
    paid_out: HashMap<(Address, Address, Address), U256>,
    /// Keyed by (chequebook, token).
    total_paid_out: HashMap<(Address, Address), U256>,
    known: HashSet<TxHash>,
    pending: Vec<PendingTx>,
    receipts: HashMap<TxHash, TxReceipt>,
}

impl WorldState {
    fn token_balance(&self, token: Address, holder: Address) -> U256 {
        self.tokens.get(&(token, holder)).copied().unwrap_or_default()
    }

    fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256) -> bool {
        let from_balance = self.token_balance(token, from);
        if from_balance < amount {
            return false;
        }
        self.tokens.insert((token, from), from_balance - amount);
        *self.tokens.entry((token, to)).or_default() += amount;
        true
    }

    fn paid_out(&self, chequebook: Address, token: Address, beneficiary: Address) -> U256 {
        self.paid_out
            .get(&(chequebook, token, beneficiary))
            .copied()
            .unwrap_or_default()
    }
}

/// Shared simulated chain. Cloning shares the state.
#[derive(Clone)]
pub struct SimulatedChain {
    state: Arc<Mutex<WorldState>>,
    mined: Arc<Notify>,
    domain: ChequeDomain,
    factory: Address,
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::new(TEST_CHAIN_ID, Address::repeat_byte(0xb2))
    }
}

impl SimulatedChain {
    pub fn new(chain_id: u64, native_token: Address) -> Self {
        let state = WorldState {
            auto_mine: true,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            mined: Arc::new(Notify::new()),
            domain: ChequeDomain::new(chain_id, AssetTable::new(native_token)),
            factory: Address::repeat_byte(0xfa),
        }
    }

    /// EIP-712 domain cheques on this chain are signed under.
    pub fn domain(&self) -> ChequeDomain {
        self.domain.clone()
    }

    pub fn native_token(&self) -> Address {
        self.domain.assets().native_token()
    }

    pub const fn factory(&self) -> Address {
        self.factory
    }

    /// A client sending transactions as `sender`.
    pub fn client(&self, sender: Address) -> Arc<ChainClient> {
        Arc::new(ChainClient {
            chain: self.clone(),
            sender,
        })
    }

    /// Factory verifier backed by this chain's factory contract.
    pub fn factory_verifier(&self) -> Arc<dyn FactoryVerifier> {
        Arc::new(ChequebookFactory::new(self.factory, self.client(Address::ZERO)))
    }

    /// Deploys a chequebook owned by `issuer` through the factory.
    pub fn deploy_chequebook(&self, issuer: Address) -> Address {
        let address = self.deploy_unregistered_chequebook(issuer);
        self.state.lock().deployed.insert(address);
        address
    }

    /// Deploys a chequebook the factory does not know about.
    pub fn deploy_unregistered_chequebook(&self, issuer: Address) -> Address {
        let mut state = self.state.lock();
        state.next_contract += 1;
        let address = Address::from_word(keccak256(state.next_contract.to_be_bytes()));
        state.chequebooks.insert(address, ChequebookAccount { issuer });
        address
    }

    /// Credits `amount` of `token` to `holder`.
    pub fn mint(&self, token: Address, holder: Address, amount: U256) {
        *self.state.lock().tokens.entry((token, holder)).or_default() += amount;
    }

    /// Sets the native coin balance of `holder`.
    pub fn set_native_balance(&self, holder: Address, amount: U256) {
        self.state.lock().native.insert(holder, amount);
    }

    pub fn token_balance(&self, token: Address, holder: Address) -> U256 {
        self.state.lock().token_balance(token, holder)
    }

    pub fn paid_out(&self, chequebook: Address, token: Address, beneficiary: Address) -> U256 {
        self.state.lock().paid_out(chequebook, token, beneficiary)
    }

    /// Controls whether transactions are mined as soon as they are sent.
    pub fn set_auto_mine(&self, auto_mine: bool) {
        self.state.lock().auto_mine = auto_mine;
    }

    /// Makes the next mined transaction revert without touching state.
    pub fn revert_next(&self) {
        self.state.lock().revert_next += 1;
    }

    /// Mines every pending transaction in one block.
    pub fn mine(&self) -> Vec<TxHash> {
        let hashes = {
            let mut state = self.state.lock();
            state.block_number += 1;
            let pending = std::mem::take(&mut state.pending);
            pending
                .into_iter()
                .map(|tx| {
                    let hash = tx.hash;
                    self.execute(&mut state, tx);
                    hash
                })
                .collect()
        };
        self.mined.notify_waiters();
        hashes
    }

    fn send(&self, sender: Address, request: TxRequest) -> TxHash {
        let (hash, auto_mine) = {
            let mut state = self.state.lock();
            state.nonce += 1;
            let mut preimage = sender.to_vec();
            preimage.extend_from_slice(&state.nonce.to_be_bytes());
            let hash = keccak256(preimage);
            state.known.insert(hash);
            state.pending.push(PendingTx {
                hash,
                sender,
                request,
            });
            (hash, state.auto_mine)
        };
        if auto_mine {
            self.mine();
        }
        hash
    }

    fn execute(&self, state: &mut WorldState, tx: PendingTx) {
        let mut logs = Vec::new();
        let success = if state.revert_next > 0 {
            state.revert_next -= 1;
            false
        } else if state.chequebooks.contains_key(&tx.request.to) {
            self.execute_chequebook(state, &tx, &mut logs)
        } else {
            match IERC20::IERC20Calls::abi_decode(&tx.request.data) {
                Ok(IERC20::IERC20Calls::transfer(call)) => {
                    state.transfer(tx.request.to, tx.sender, call.to, call.amount)
                }
                _ => false,
            }
        };

        debug!(hash = %tx.hash, description = tx.request.description, success, "Mined transaction");
        state.receipts.insert(
            tx.hash,
            TxReceipt {
                tx_hash: tx.hash,
                block_number: state.block_number,
                success,
                logs,
            },
        );
    }

    fn execute_chequebook(
        &self,
        state: &mut WorldState,
        tx: &PendingTx,
        logs: &mut Vec<Log>,
    ) -> bool {
        let chequebook = tx.request.to;
        let native = self.native_token();
        let Some(account) = state.chequebooks.get(&chequebook).copied() else {
            return false;
        };

        use IChequebook::IChequebookCalls as Calls;
        match Calls::abi_decode(&tx.request.data) {
            Ok(Calls::cashChequeBeneficiary(call)) => self.cash(
                state,
                logs,
                CashRequest {
                    chequebook,
                    issuer: account.issuer,
                    token: native,
                    beneficiary: tx.sender,
                    recipient: call.recipient,
                    cumulative_payout: call.cumulativePayout,
                    signature: call.issuerSig,
                },
            ),
            Ok(Calls::cashChequeBeneficiaryOf(call)) => self.cash(
                state,
                logs,
                CashRequest {
                    chequebook,
                    issuer: account.issuer,
                    token: call.token,
                    beneficiary: tx.sender,
                    recipient: call.recipient,
                    cumulative_payout: call.cumulativePayout,
                    signature: call.issuerSig,
                },
            ),
            Ok(Calls::withdraw(call)) => {
                tx.sender == account.issuer
                    && state.transfer(native, chequebook, account.issuer, call.amount)
            }
            Ok(Calls::withdrawOf(call)) => {
                tx.sender == account.issuer
                    && state.transfer(call.token, chequebook, account.issuer, call.amount)
            }
            _ => false,
        }
    }

    /// Pays out up to the chequebook's balance; a shortfall bounces.
    fn cash(&self, state: &mut WorldState, logs: &mut Vec<Log>, req: CashRequest) -> bool {
        let cheque = SignedCheque::new(
            Cheque::new(req.token, req.chequebook, req.beneficiary, req.cumulative_payout),
            req.signature,
        );
        match cheque.recover_signer(&self.domain) {
            Ok(signer) if signer == req.issuer => {}
            _ => return false,
        }

        let paid = state.paid_out(req.chequebook, req.token, req.beneficiary);
        if req.cumulative_payout <= paid {
            return false;
        }
        let requested = req.cumulative_payout - paid;
        let balance = state.token_balance(req.token, req.chequebook);
        let total_payout = requested.min(balance);

        state.transfer(req.token, req.chequebook, req.recipient, total_payout);
        state
            .paid_out
            .insert((req.chequebook, req.token, req.beneficiary), paid + total_payout);
        *state
            .total_paid_out
            .entry((req.chequebook, req.token))
            .or_default() += total_payout;

        logs.push(Log {
            address: req.chequebook,
            data: IChequebook::ChequeCashed {
                beneficiary: req.beneficiary,
                recipient: req.recipient,
                caller: req.beneficiary,
                totalPayout: total_payout,
                cumulativePayout: req.cumulative_payout,
                callerPayout: U256::ZERO,
            }
            .encode_log_data(),
        });
        if total_payout != requested {
            logs.push(Log {
                address: req.chequebook,
                data: IChequebook::ChequeBounced {}.encode_log_data(),
            });
        }
        true
    }

    fn call(&self, to: Address, data: &[u8]) -> Result<Bytes, ChainError> {
        let state = self.state.lock();
        let native = self.native_token();

        if to == self.factory {
            return match IChequebookFactory::IChequebookFactoryCalls::abi_decode(data) {
                Ok(IChequebookFactory::IChequebookFactoryCalls::deployedContracts(call)) => {
                    Ok(state.deployed.contains(&call.chequebook).abi_encode().into())
                }
                Err(e) => Err(ChainError::Rpc(format!("execution reverted: {e}"))),
            };
        }

        if let Some(account) = state.chequebooks.get(&to) {
            use IChequebook::IChequebookCalls as Calls;
            let output = match Calls::abi_decode(data) {
                Ok(Calls::issuer(_)) => account.issuer.abi_encode(),
                Ok(Calls::totalbalance(_)) => state.token_balance(native, to).abi_encode(),
                Ok(Calls::totalbalanceOf(call)) => {
                    state.token_balance(call.token, to).abi_encode()
                }
                Ok(Calls::paidOut(call)) => {
                    state.paid_out(to, native, call.beneficiary).abi_encode()
                }
                Ok(Calls::paidOutOf(call)) => {
                    state.paid_out(to, call.token, call.beneficiary).abi_encode()
                }
                Ok(Calls::totalPaidOut(_)) => state
                    .total_paid_out
                    .get(&(to, native))
                    .copied()
                    .unwrap_or_default()
                    .abi_encode(),
                Ok(Calls::totalPaidOutOf(call)) => state
                    .total_paid_out
                    .get(&(to, call.token))
                    .copied()
                    .unwrap_or_default()
                    .abi_encode(),
                Ok(_) => return Err(ChainError::Rpc("not a view function".into())),
                Err(e) => return Err(ChainError::Rpc(format!("execution reverted: {e}"))),
            };
            return Ok(output.into());
        }

        match IERC20::IERC20Calls::abi_decode(data) {
            Ok(IERC20::IERC20Calls::balanceOf(call)) => {
                Ok(state.token_balance(to, call.account).abi_encode().into())
            }
            Ok(_) => Err(ChainError::Rpc("not a view function".into())),
            Err(e) => Err(ChainError::Rpc(format!("execution reverted: {e}"))),
        }
    }
}

struct CashRequest {
    chequebook: Address,
    issuer: Address,
    token: Address,
    beneficiary: Address,
    recipient: Address,
    cumulative_payout: U256,
    signature: Bytes,
}

/// [`ChainBackend`] sending transactions from one account.
pub struct ChainClient {
    chain: SimulatedChain,
    sender: Address,
}

impl ChainClient {
    pub const fn sender(&self) -> Address {
        self.sender
    }
}

#[async_trait]
impl ChainBackend for ChainClient {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        self.chain.call(to, &data)
    }

    async fn send_transaction(&self, request: TxRequest) -> Result<TxHash, ChainError> {
        Ok(self.chain.send(self.sender, request))
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt, ChainError> {
        loop {
            let mined = self.chain.mined.notified();
            {
                let state = self.chain.state.lock();
                if let Some(receipt) = state.receipts.get(&hash) {
                    return Ok(receipt.clone());
                }
                if !state.known.contains(&hash) {
                    return Err(ChainError::NotFound);
                }
            }
            mined.await;
        }
    }

    async fn balance_at(&self, address: Address) -> Result<U256, ChainError> {
        Ok(self
            .chain
            .state
            .lock()
            .native
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn transaction_by_hash(&self, hash: TxHash) -> Result<TxInfo, ChainError> {
        let state = self.chain.state.lock();
        if !state.known.contains(&hash) {
            return Err(ChainError::NotFound);
        }
        Ok(TxInfo {
            hash,
            pending: !state.receipts.contains_key(&hash),
        })
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<TxReceipt, ChainError> {
        self.chain
            .state
            .lock()
            .receipts
            .get(&hash)
            .cloned()
            .ok_or(ChainError::NotFound)
    }

    async fn suggest_gas_price(&self) -> Result<U256, ChainError> {
        Ok(U256::from(TEST_GAS_PRICE))
    }
}

/// Hash no transaction on the simulated chain will ever have.
pub fn unknown_tx_hash() -> TxHash {
    B256::repeat_byte(0xee)
}

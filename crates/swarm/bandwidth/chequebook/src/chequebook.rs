//! Issuer side of a chequebook.
//!
//! The chequebook tracks how much of its on-chain balance is already promised
//! to beneficiaries. Issuing is two-phase: [`Chequebook::reserve`] sets funds
//! aside and signs the next cheque, then the caller delivers it and either
//! [`Reservation::commit`]s (persisting the cheque and totals) or
//! [`Reservation::release`]s. Dropping a reservation releases it.
//!
//! ```text
//! available = total_balance + total_paid_out - total_issued
//! ```

use std::{collections::HashMap, future::Future, sync::Arc};

use alloy_primitives::{Address, U256};
use dashmap::DashMap;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use vertex_storage::{SharedStateStore, StateStoreExt};

use crate::{
    ChequebookError,
    chain::{self, ChainBackend, TxHash, TxRequest},
    cheque::{Cheque, ChequeDomain, SignedCheque},
    contract::{ChequebookContract, Erc20},
    history::{ChequeHistory, ChequeRecord, Clock, Direction, SystemClock},
    keys,
    metrics::ChequebookMetrics,
    signer::ChequeSigner,
};

/// A chequebook issuing cheques in a single token.
pub struct Chequebook {
    address: Address,
    token: Address,
    contract: ChequebookContract,
    erc20: Erc20,
    backend: Arc<dyn ChainBackend>,
    signer: Arc<dyn ChequeSigner>,
    domain: ChequeDomain,
    store: SharedStateStore,
    history: ChequeHistory,
    clock: Arc<dyn Clock>,
    /// Serialises balance checks against reservation and commit bookkeeping.
    reserve_lock: AsyncMutex<()>,
    reserved: parking_lot::Mutex<U256>,
    /// Held by a live reservation so cheques to one beneficiary never share a base.
    beneficiary_locks: DashMap<Address, Arc<AsyncMutex<()>>>,
    metrics: ChequebookMetrics,
}

impl Chequebook {
    pub fn new(
        address: Address,
        token: Address,
        backend: Arc<dyn ChainBackend>,
        signer: Arc<dyn ChequeSigner>,
        domain: ChequeDomain,
        store: SharedStateStore,
    ) -> Self {
        let assets = *domain.assets();
        Self {
            address,
            token,
            contract: ChequebookContract::new(address, assets, backend.clone()),
            erc20: Erc20::new(token, backend.clone()),
            backend,
            signer,
            domain,
            history: ChequeHistory::new(store.clone(), Direction::Sent),
            store,
            clock: Arc::new(SystemClock),
            reserve_lock: AsyncMutex::new(()),
            reserved: parking_lot::Mutex::new(U256::ZERO),
            beneficiary_locks: DashMap::new(),
            metrics: ChequebookMetrics::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_history_retention(mut self, retention: std::time::Duration) -> Self {
        self.history =
            ChequeHistory::new(self.store.clone(), Direction::Sent).with_retention(retention);
        self
    }

    /// Chequebook contract address.
    pub const fn address(&self) -> Address {
        self.address
    }

    pub const fn token(&self) -> Address {
        self.token
    }

    /// Address the contract expects cheques to be signed by.
    pub fn issuer(&self) -> Address {
        self.signer.address()
    }

    /// Sent cheque history.
    pub const fn history(&self) -> &ChequeHistory {
        &self.history
    }

    /// Funds currently held by live reservations.
    pub fn reserved(&self) -> U256 {
        *self.reserved.lock()
    }

    /// On-chain token balance of the chequebook.
    pub async fn total_balance(&self) -> Result<U256, ChequebookError> {
        Ok(self.contract.total_balance(self.token).await?)
    }

    /// Balance not yet promised to anyone, ignoring live reservations.
    ///
    /// Saturates at zero if more was issued than the chain knows about.
    pub async fn available_balance(&self) -> Result<U256, ChequebookError> {
        let funded = self.funded().await?;
        Ok(funded.saturating_sub(self.total_issued()?))
    }

    /// Everything ever paid into the chequebook: balance plus paid out.
    ///
    /// Cashing a cheque moves funds from one term to the other, so only
    /// deposits and withdrawals change it.
    async fn funded(&self) -> Result<U256, ChequebookError> {
        let balance = self.contract.total_balance(self.token).await?;
        let paid_out = self.contract.total_paid_out(self.token).await?;
        Ok(balance.saturating_add(paid_out))
    }

    /// Sum of all committed cheque increments.
    pub fn total_issued(&self) -> Result<U256, ChequebookError> {
        Ok(self
            .store
            .get_optional(&keys::total_issued(self.token))?
            .unwrap_or(U256::ZERO))
    }

    /// Number of committed cheques.
    pub fn total_issued_count(&self) -> Result<u64, ChequebookError> {
        Ok(self
            .store
            .get_optional(&keys::total_issued_count(self.token))?
            .unwrap_or_default())
    }

    fn beneficiary_lock(&self, beneficiary: Address) -> Arc<AsyncMutex<()>> {
        self.beneficiary_locks
            .entry(beneficiary)
            .or_default()
            .value()
            .clone()
    }

    /// Reserves `amount` for `beneficiary` and signs the next cheque.
    ///
    /// Fails with [`ChequebookError::OutOfFunds`] if the unreserved balance
    /// cannot cover `amount`. Waits while another reservation for the same
    /// beneficiary is live.
    pub async fn reserve(
        &self,
        beneficiary: Address,
        amount: U256,
    ) -> Result<Reservation<'_>, ChequebookError> {
        if amount.is_zero() {
            return Err(ChequebookError::ZeroAmount);
        }

        let beneficiary_guard = self.beneficiary_lock(beneficiary).lock_owned().await;

        let funded = {
            let _guard = self.reserve_lock.lock().await;
            let funded = self.funded().await?;
            let available = funded.saturating_sub(self.total_issued()?);
            let mut reserved = self.reserved.lock();
            let free = available.saturating_sub(*reserved);
            if amount > free {
                debug!(%beneficiary, %amount, %free, "Insufficient unreserved balance");
                return Err(ChequebookError::OutOfFunds {
                    requested: amount,
                    available: free,
                });
            }
            *reserved += amount;
            funded
        };

        // From here on every exit path unreserves.
        let funds = ReservedFunds {
            reserved: &self.reserved,
            amount,
            released: false,
        };

        let base = match self.last_cheque(beneficiary) {
            Ok(last) => last.cumulative_payout(),
            Err(ChequebookError::NoCheque) => U256::ZERO,
            Err(e) => return Err(e),
        };
        let cheque = Cheque::new(
            self.token,
            self.address,
            beneficiary,
            base.saturating_add(amount),
        );
        let cheque = self.signer.sign(cheque, &self.domain)?;

        debug!(
            %beneficiary,
            %amount,
            cumulative_payout = %cheque.cumulative_payout(),
            "Reserved funds for cheque"
        );

        Ok(Reservation {
            chequebook: self,
            cheque,
            amount,
            funded,
            funds,
            _beneficiary_guard: beneficiary_guard,
        })
    }

    /// Reserves, hands the cheque to `send`, then commits or releases.
    ///
    /// Returns the available balance after the cheque.
    pub async fn issue<F, Fut, E>(
        &self,
        beneficiary: Address,
        amount: U256,
        send: F,
    ) -> Result<U256, ChequebookError>
    where
        F: FnOnce(SignedCheque) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        let reservation = self.reserve(beneficiary, amount).await?;
        if let Err(e) = send(reservation.cheque().clone()).await {
            warn!(%beneficiary, %amount, error = %e, "Sending cheque failed");
            reservation.release();
            return Err(ChequebookError::SendFailed(e.to_string()));
        }
        reservation.commit().await
    }

    /// The last cheque committed to `beneficiary`.
    pub fn last_cheque(&self, beneficiary: Address) -> Result<SignedCheque, ChequebookError> {
        self.store
            .get_optional(&keys::last_issued_cheque(self.token, beneficiary))?
            .ok_or(ChequebookError::NoCheque)
    }

    /// Last committed cheque per beneficiary.
    pub fn last_cheques(&self) -> Result<HashMap<Address, SignedCheque>, ChequebookError> {
        let mut cheques = HashMap::new();
        self.store.iterate_values::<SignedCheque, _>(
            &keys::last_issued_cheque_prefix(self.token),
            |_, cheque| {
                cheques.insert(cheque.cheque.beneficiary, cheque);
                Ok(true)
            },
        )?;
        Ok(cheques)
    }

    /// Transfers `amount` tokens from the issuer's account into the chequebook.
    pub async fn deposit(&self, amount: U256) -> Result<TxHash, ChequebookError> {
        let owner_balance = self.erc20.balance_of(self.issuer()).await?;
        if owner_balance < amount {
            return Err(ChequebookError::InsufficientFunds);
        }

        let request = TxRequest::call(
            self.token,
            Erc20::transfer_calldata(self.address, amount),
            "chequebook deposit",
        );
        let hash = chain::submit(&*self.backend, request).await?;
        self.metrics.deposits_total.increment(1);
        info!(chequebook = %self.address, %amount, %hash, "Deposit submitted");
        Ok(hash)
    }

    /// Waits for a deposit to be mined. A reverted deposit is an error.
    pub async fn wait_for_deposit(&self, hash: TxHash) -> Result<(), ChequebookError> {
        let receipt = self.backend.wait_for_receipt(hash).await?;
        if !receipt.success {
            return Err(ChequebookError::TransactionReverted(hash));
        }
        Ok(())
    }

    /// Withdraws `amount` of unpromised funds back to the issuer.
    pub async fn withdraw(&self, amount: U256) -> Result<TxHash, ChequebookError> {
        let _guard = self.reserve_lock.lock().await;

        let balance = self.contract.total_balance(self.token).await?;
        if balance < amount {
            return Err(ChequebookError::InsufficientFunds);
        }
        let available = self.available_balance().await?;
        if available.saturating_sub(self.reserved()) < amount {
            return Err(ChequebookError::InsufficientFunds);
        }

        let request = TxRequest::call(
            self.address,
            self.contract.withdraw_calldata(self.token, amount),
            "chequebook withdrawal",
        );
        let hash = chain::submit(&*self.backend, request).await?;
        self.metrics.withdrawals_total.increment(1);
        info!(chequebook = %self.address, %amount, %hash, "Withdrawal submitted");
        Ok(hash)
    }
}

/// Funds set aside for one cheque; returned to the pool on drop.
struct ReservedFunds<'a> {
    reserved: &'a parking_lot::Mutex<U256>,
    amount: U256,
    released: bool,
}

impl ReservedFunds<'_> {
    fn release(&mut self) {
        if !self.released {
            let mut reserved = self.reserved.lock();
            *reserved = reserved.saturating_sub(self.amount);
            self.released = true;
        }
    }
}

impl Drop for ReservedFunds<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// A signed cheque whose funds are set aside but not yet committed.
#[must_use = "dropping a reservation releases it"]
pub struct Reservation<'a> {
    chequebook: &'a Chequebook,
    cheque: SignedCheque,
    amount: U256,
    /// Balance plus paid out when the funds were reserved.
    funded: U256,
    funds: ReservedFunds<'a>,
    _beneficiary_guard: OwnedMutexGuard<()>,
}

impl std::fmt::Debug for Reservation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("cheque", &self.cheque)
            .field("amount", &self.amount)
            .field("funded", &self.funded)
            .finish_non_exhaustive()
    }
}

impl Reservation<'_> {
    /// The cheque to deliver.
    pub const fn cheque(&self) -> &SignedCheque {
        &self.cheque
    }

    /// Increment over the previous cheque.
    pub const fn amount(&self) -> U256 {
        self.amount
    }

    pub const fn beneficiary(&self) -> Address {
        self.cheque.cheque.beneficiary
    }

    /// Persists the delivered cheque and returns the available balance after it.
    ///
    /// The balance after excludes funds still held by other live reservations.
    /// Totals are written before the cheque itself, so an interrupted commit
    /// can only understate what is available.
    pub async fn commit(self) -> Result<U256, ChequebookError> {
        let Reservation {
            chequebook,
            cheque,
            amount,
            funded,
            mut funds,
            _beneficiary_guard,
        } = self;
        let beneficiary = cheque.cheque.beneficiary;
        let token = chequebook.token;

        let available_after = {
            let _guard = chequebook.reserve_lock.lock().await;

            let total_issued = chequebook.total_issued()?.saturating_add(amount);
            let count = chequebook.total_issued_count()? + 1;
            chequebook.store.put(&keys::total_issued(token), &total_issued)?;
            chequebook.store.put(&keys::total_issued_count(token), &count)?;
            chequebook
                .store
                .put(&keys::last_issued_cheque(token, beneficiary), &cheque)?;
            funds.release();

            funded
                .saturating_sub(total_issued)
                .saturating_sub(chequebook.reserved())
        };

        let record = ChequeRecord {
            token: chequebook.token,
            chequebook: chequebook.address,
            beneficiary,
            amount,
            cumulative_payout: cheque.cumulative_payout(),
            timestamp: chequebook.clock.now(),
        };
        if let Err(e) = chequebook
            .history
            .append(beneficiary, &record, record.timestamp)
        {
            warn!(%beneficiary, error = %e, "Failed to record sent cheque");
        }

        chequebook.metrics.cheques_issued_total.increment(1);
        debug!(
            %beneficiary,
            %amount,
            cumulative_payout = %cheque.cumulative_payout(),
            %available_after,
            "Committed cheque"
        );
        Ok(available_after)
    }

    /// Gives the reserved funds back without persisting anything.
    pub fn release(self) {
        self.chequebook.metrics.reservations_released_total.increment(1);
        debug!(beneficiary = %self.beneficiary(), amount = %self.amount, "Released reservation");
    }
}

//! Beneficiary side: verification and storage of received cheques.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use chrono::NaiveDate;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};
use vertex_storage::{DatabaseError, SharedStateStore, StateStoreExt};

use crate::{
    ChequeStoreError,
    chain::ChainBackend,
    cheque::{ChequeDomain, SignedCheque},
    contract::{ChequebookContract, FactoryVerifier},
    history::{ChequeHistory, ChequeRecord, Clock, DailyStats, Direction, IndexRange, SystemClock},
    keys,
    metrics::ChequebookMetrics,
};

/// Verifies incoming cheques and keeps the latest one per chequebook and token.
pub struct ChequeStore {
    store: SharedStateStore,
    backend: Arc<dyn ChainBackend>,
    factory: Arc<dyn FactoryVerifier>,
    domain: ChequeDomain,
    beneficiary: Address,
    history: ChequeHistory,
    clock: Arc<dyn Clock>,
    /// Held across read-last, verify and persist.
    lock: AsyncMutex<()>,
    metrics: ChequebookMetrics,
}

impl ChequeStore {
    pub fn new(
        store: SharedStateStore,
        backend: Arc<dyn ChainBackend>,
        factory: Arc<dyn FactoryVerifier>,
        domain: ChequeDomain,
        beneficiary: Address,
    ) -> Self {
        Self {
            history: ChequeHistory::new(store.clone(), Direction::Received),
            store,
            backend,
            factory,
            domain,
            beneficiary,
            clock: Arc::new(SystemClock),
            lock: AsyncMutex::new(()),
            metrics: ChequebookMetrics::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_history_retention(mut self, retention: std::time::Duration) -> Self {
        self.history =
            ChequeHistory::new(self.store.clone(), Direction::Received).with_retention(retention);
        self
    }

    /// The address cheques must be made out to.
    pub const fn beneficiary(&self) -> Address {
        self.beneficiary
    }

    pub const fn domain(&self) -> &ChequeDomain {
        &self.domain
    }

    /// Backend cheques are verified against and cashed through.
    pub(crate) fn backend(&self) -> Arc<dyn ChainBackend> {
        self.backend.clone()
    }

    /// Verifies and stores `cheque`, returning its increment over the last one.
    ///
    /// The increment must be at least `min_amount`.
    pub async fn receive_cheque(
        &self,
        cheque: &SignedCheque,
        min_amount: U256,
    ) -> Result<U256, ChequeStoreError> {
        match self.verify_and_store(cheque, min_amount).await {
            Ok(amount) => {
                self.metrics.cheques_received_total.increment(1);
                debug!(
                    chequebook = %cheque.cheque.chequebook,
                    token = %cheque.cheque.token,
                    %amount,
                    cumulative_payout = %cheque.cumulative_payout(),
                    "Accepted cheque"
                );
                Ok(amount)
            }
            Err(e) => {
                self.metrics.inc_rejected((&e).into());
                warn!(
                    chequebook = %cheque.cheque.chequebook,
                    cumulative_payout = %cheque.cumulative_payout(),
                    error = %e,
                    "Rejected cheque"
                );
                Err(e)
            }
        }
    }

    async fn verify_and_store(
        &self,
        signed: &SignedCheque,
        min_amount: U256,
    ) -> Result<U256, ChequeStoreError> {
        let cheque = &signed.cheque;
        if cheque.beneficiary != self.beneficiary {
            return Err(ChequeStoreError::WrongBeneficiary {
                expected: self.beneficiary,
                actual: cheque.beneficiary,
            });
        }

        let _guard = self.lock.lock().await;

        let last_key = keys::last_received_cheque(cheque.chequebook, cheque.token);
        let last = self.store.get_optional::<SignedCheque>(&last_key)?;

        if last.is_none() && !self.factory.is_deployed(cheque.chequebook).await? {
            return Err(ChequeStoreError::UnknownChequebook(cheque.chequebook));
        }

        let last_payout = last
            .as_ref()
            .map(SignedCheque::cumulative_payout)
            .unwrap_or(U256::ZERO);
        if cheque.cumulative_payout <= last_payout {
            return Err(ChequeStoreError::ChequeNotIncreasing);
        }
        let amount = cheque.cumulative_payout - last_payout;

        if amount < min_amount {
            return Err(ChequeStoreError::ChequeValueTooLow { amount, min_amount });
        }

        let contract =
            ChequebookContract::new(cheque.chequebook, *self.domain.assets(), self.backend.clone());

        let issuer = contract.issuer().await?;
        let signer = signed
            .recover_signer(&self.domain)
            .map_err(|_| ChequeStoreError::ChequeInvalid)?;
        if signer != issuer {
            return Err(ChequeStoreError::ChequeInvalid);
        }

        let balance = contract.total_balance(cheque.token).await?;
        let paid_out = contract.paid_out(cheque.token, self.beneficiary).await?;
        if balance < cheque.cumulative_payout.saturating_sub(paid_out) {
            return Err(ChequeStoreError::BouncingCheque);
        }
        if cheque.cumulative_payout <= paid_out {
            return Err(ChequeStoreError::ChequeNotIncreasing);
        }

        // Accepted from here on; the bookkeeping below is best effort.
        self.store.put(&last_key, signed)?;

        let record = ChequeRecord {
            token: cheque.token,
            chequebook: cheque.chequebook,
            beneficiary: cheque.beneficiary,
            amount,
            cumulative_payout: cheque.cumulative_payout,
            timestamp: self.clock.now(),
        };
        if let Err(e) = self
            .history
            .append(cheque.chequebook, &record, record.timestamp)
        {
            warn!(
                chequebook = %cheque.chequebook,
                error = %e,
                "Failed to record received cheque"
            );
        }
        if let Err(e) = self.bump_uncashed(cheque.chequebook, cheque.token) {
            warn!(
                chequebook = %cheque.chequebook,
                error = %e,
                "Failed to count uncashed cheque"
            );
        }

        Ok(amount)
    }

    fn bump_uncashed(&self, chequebook: Address, token: Address) -> Result<(), DatabaseError> {
        let key = keys::uncashed_count(chequebook, token);
        let uncashed = self.store.get_optional::<u64>(&key)?.unwrap_or_default();
        self.store.put(&key, &(uncashed + 1))
    }

    /// The latest accepted cheque from `chequebook` in `token`.
    pub fn last_received_cheque(
        &self,
        chequebook: Address,
        token: Address,
    ) -> Result<SignedCheque, ChequeStoreError> {
        self.store
            .get_optional(&keys::last_received_cheque(chequebook, token))?
            .ok_or(ChequeStoreError::NoCheque)
    }

    /// The latest accepted cheque for every chequebook and token.
    pub fn last_received_cheques(&self) -> Result<Vec<SignedCheque>, ChequeStoreError> {
        let mut cheques = Vec::new();
        self.store.iterate_values::<SignedCheque, _>(
            keys::LAST_RECEIVED_CHEQUE_PREFIX,
            |_, cheque| {
                cheques.push(cheque);
                Ok(true)
            },
        )?;
        Ok(cheques)
    }

    /// Cheques accepted since the last cashout.
    pub fn uncashed_count(
        &self,
        chequebook: Address,
        token: Address,
    ) -> Result<u64, DatabaseError> {
        Ok(self
            .store
            .get_optional(&keys::uncashed_count(chequebook, token))?
            .unwrap_or_default())
    }

    pub(crate) fn reset_uncashed_count(
        &self,
        chequebook: Address,
        token: Address,
    ) -> Result<(), DatabaseError> {
        self.store.put(&keys::uncashed_count(chequebook, token), &0u64)
    }

    /// Received cheques from `chequebook`, oldest first.
    pub fn records(&self, chequebook: Address) -> Result<Vec<ChequeRecord>, DatabaseError> {
        self.history.records(chequebook)
    }

    pub fn index_range(&self, chequebook: Address) -> Result<IndexRange, DatabaseError> {
        self.history.index_range(chequebook)
    }

    pub fn daily_stats(
        &self,
        date: NaiveDate,
        token: Address,
    ) -> Result<Option<DailyStats>, DatabaseError> {
        self.history.daily_stats(date, token)
    }

    pub fn all_daily_stats(&self) -> Result<Vec<DailyStats>, DatabaseError> {
        self.history.all_daily_stats()
    }

    /// Received cheque history.
    pub const fn history(&self) -> &ChequeHistory {
        &self.history
    }
}

//! Cashing received cheques on-chain.
//!
//! Only the latest cheque per chequebook and token matters: it carries the
//! cumulative payout, so cashing it collects everything received so far. The
//! submitted transaction is remembered as a [`CashoutAction`] and its outcome
//! is reconciled lazily by [`CashoutService::cashout_status`].

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::info;
use vertex_storage::{SharedStateStore, StateStoreExt};

use crate::{
    CashoutError, ChequeStoreError,
    chain::{self, ChainBackend, ChainError, TxHash, TxRequest},
    cheque::SignedCheque,
    contract::{CashChequeResult, ChequebookContract},
    keys,
    metrics::ChequebookMetrics,
    store::ChequeStore,
};

/// The last cashout submitted for a chequebook and token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashoutAction {
    pub tx_hash: TxHash,
    /// The cheque that was submitted.
    pub cheque: SignedCheque,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CashoutOutcome {
    /// Not mined yet, or unknown to the node.
    Pending,
    Reverted,
    Confirmed(CashChequeResult),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastCashout {
    pub tx_hash: TxHash,
    pub cheque: SignedCheque,
    pub outcome: CashoutOutcome,
}

/// Cashout state for one chequebook and token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashoutStatus {
    pub last: Option<LastCashout>,
    /// Received but not yet collected.
    pub uncashed_amount: U256,
}

/// Submits cashout transactions and reconciles their outcome.
pub struct CashoutService {
    store: SharedStateStore,
    cheque_store: Arc<ChequeStore>,
    backend: Arc<dyn ChainBackend>,
    metrics: ChequebookMetrics,
}

impl CashoutService {
    pub fn new(store: SharedStateStore, cheque_store: Arc<ChequeStore>) -> Self {
        Self {
            store,
            backend: cheque_store.backend(),
            cheque_store,
            metrics: ChequebookMetrics::default(),
        }
    }

    fn contract(&self, chequebook: Address) -> ChequebookContract {
        ChequebookContract::new(
            chequebook,
            *self.cheque_store.domain().assets(),
            self.backend.clone(),
        )
    }

    fn last_cheque(
        &self,
        chequebook: Address,
        token: Address,
    ) -> Result<SignedCheque, CashoutError> {
        self.cheque_store
            .last_received_cheque(chequebook, token)
            .map_err(|e| match e {
                ChequeStoreError::Store(e) => CashoutError::Store(e),
                ChequeStoreError::Chain(e) => CashoutError::Chain(e),
                _ => CashoutError::NoCheque,
            })
    }

    /// Submits the latest cheque from `chequebook` for cashing, paying `recipient`.
    pub async fn cash_cheque(
        &self,
        chequebook: Address,
        token: Address,
        recipient: Address,
    ) -> Result<TxHash, CashoutError> {
        let cheque = self.last_cheque(chequebook, token)?;
        let data = self.contract(chequebook).cash_cheque_calldata(&cheque, recipient);

        let request = TxRequest::call(chequebook, data, "cheque cashout");
        let tx_hash = chain::submit(&*self.backend, request).await?;

        let cumulative_payout = cheque.cumulative_payout();
        self.store.put(
            &keys::cashout_action(chequebook, token),
            &CashoutAction { tx_hash, cheque },
        )?;
        self.cheque_store.reset_uncashed_count(chequebook, token)?;

        self.metrics.cashouts_total.increment(1);
        info!(%chequebook, %token, %recipient, %cumulative_payout, %tx_hash, "Cashout submitted");
        Ok(tx_hash)
    }

    pub fn has_cashout_action(
        &self,
        chequebook: Address,
        token: Address,
    ) -> Result<bool, CashoutError> {
        Ok(self
            .store
            .get_optional::<CashoutAction>(&keys::cashout_action(chequebook, token))?
            .is_some())
    }

    /// Reconciles the last cashout with the chain.
    pub async fn cashout_status(
        &self,
        chequebook: Address,
        token: Address,
    ) -> Result<CashoutStatus, CashoutError> {
        let cheque = self.last_cheque(chequebook, token)?;
        let current = cheque.cumulative_payout();

        let Some(action) = self
            .store
            .get_optional::<CashoutAction>(&keys::cashout_action(chequebook, token))?
        else {
            return Ok(CashoutStatus {
                last: None,
                uncashed_amount: current,
            });
        };
        let tx_hash = action.tx_hash;

        let pending = match self.backend.transaction_by_hash(tx_hash).await {
            Ok(info) => info.pending,
            Err(ChainError::NotFound) => true,
            Err(e) => return Err(e.into()),
        };
        let receipt = if pending {
            None
        } else {
            match self.backend.transaction_receipt(tx_hash).await {
                Ok(receipt) => Some(receipt),
                Err(ChainError::NotFound) => None,
                Err(e) => return Err(e.into()),
            }
        };

        let (outcome, uncashed_amount) = match receipt {
            None => (
                CashoutOutcome::Pending,
                current.saturating_sub(action.cheque.cumulative_payout()),
            ),
            Some(receipt) if !receipt.success => {
                let paid_out = self
                    .contract(chequebook)
                    .paid_out(token, action.cheque.cheque.beneficiary)
                    .await?;
                (CashoutOutcome::Reverted, current.saturating_sub(paid_out))
            }
            Some(receipt) => {
                let result = CashChequeResult::from_receipt(chequebook, &receipt)?
                    .ok_or(CashoutError::MissingCashoutEvent(tx_hash))?;
                let uncashed = current.saturating_sub(result.cumulative_payout);
                (CashoutOutcome::Confirmed(result), uncashed)
            }
        };

        Ok(CashoutStatus {
            last: Some(LastCashout {
                tx_hash,
                cheque: action.cheque,
                outcome,
            }),
            uncashed_amount,
        })
    }
}

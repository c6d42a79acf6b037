//! Ready-wired issuer and beneficiary nodes on a [`SimulatedChain`].

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use alloy_signer_local::PrivateKeySigner;
use vertex_storage::{MemoryStateStore, SharedStateStore};
use vertex_swarm_bandwidth_chequebook::{
    CashoutService, ChainBackend, ChequeSigner, ChequeStore, Chequebook, LocalChequeSigner,
};

use crate::{SimulatedChain, clock::ManualClock};

/// A node that pays: a funded chequebook owned by a fresh key.
pub struct IssuerFixture {
    pub key: PrivateKeySigner,
    pub signer: Arc<dyn ChequeSigner>,
    pub chequebook_address: Address,
    pub chequebook: Arc<Chequebook>,
    pub store: SharedStateStore,
    pub backend: Arc<dyn ChainBackend>,
    pub clock: Arc<ManualClock>,
}

impl IssuerFixture {
    /// Deploys a chequebook holding `balance` of the native token.
    pub fn new(chain: &SimulatedChain, balance: U256) -> Self {
        Self::with_store(chain, balance, Arc::new(MemoryStateStore::new()))
    }

    pub fn with_store(chain: &SimulatedChain, balance: U256, store: SharedStateStore) -> Self {
        let key = PrivateKeySigner::random();
        let issuer = key.address();
        let chequebook_address = chain.deploy_chequebook(issuer);
        chain.mint(chain.native_token(), chequebook_address, balance);

        let signer: Arc<dyn ChequeSigner> = Arc::new(LocalChequeSigner::new(key.clone()));
        let backend: Arc<dyn ChainBackend> = chain.client(issuer);
        let clock = Arc::new(ManualClock::default());
        let chequebook = Chequebook::new(
            chequebook_address,
            chain.native_token(),
            backend.clone(),
            signer.clone(),
            chain.domain(),
            store.clone(),
        )
        .with_clock(clock.clone());

        Self {
            key,
            signer,
            chequebook_address,
            chequebook: Arc::new(chequebook),
            store,
            backend,
            clock,
        }
    }

    /// A separately owned [`Chequebook`] over the same contract, store and
    /// clock, for callers that take ownership. Use it instead of
    /// [`chequebook`](Self::chequebook), not alongside it.
    pub fn open_chequebook(&self, chain: &SimulatedChain) -> Chequebook {
        Chequebook::new(
            self.chequebook_address,
            chain.native_token(),
            self.backend.clone(),
            self.signer.clone(),
            chain.domain(),
            self.store.clone(),
        )
        .with_clock(self.clock.clone())
    }

    pub fn issuer(&self) -> Address {
        self.key.address()
    }
}

/// A node that gets paid: cheque store and cashout service for a fresh key.
pub struct BeneficiaryFixture {
    pub key: PrivateKeySigner,
    pub cheque_store: Arc<ChequeStore>,
    pub cashout: CashoutService,
    pub store: SharedStateStore,
    pub clock: Arc<ManualClock>,
}

impl BeneficiaryFixture {
    pub fn new(chain: &SimulatedChain) -> Self {
        Self::with_store(chain, Arc::new(MemoryStateStore::new()))
    }

    pub fn with_store(chain: &SimulatedChain, store: SharedStateStore) -> Self {
        Self::with_key(chain, PrivateKeySigner::random(), store)
    }

    /// Rebuilds a beneficiary for an existing key, e.g. after losing its store.
    pub fn with_key(
        chain: &SimulatedChain,
        key: PrivateKeySigner,
        store: SharedStateStore,
    ) -> Self {
        let beneficiary = key.address();
        let clock = Arc::new(ManualClock::default());
        let cheque_store = Arc::new(
            ChequeStore::new(
                store.clone(),
                chain.client(beneficiary),
                chain.factory_verifier(),
                chain.domain(),
                beneficiary,
            )
            .with_clock(clock.clone()),
        );
        let cashout = CashoutService::new(store.clone(), cheque_store.clone());

        Self {
            key,
            cheque_store,
            cashout,
            store,
            clock,
        }
    }

    /// A separately owned [`ChequeStore`] over the same store and clock.
    pub fn open_cheque_store(&self, chain: &SimulatedChain) -> ChequeStore {
        let beneficiary = self.beneficiary();
        ChequeStore::new(
            self.store.clone(),
            chain.client(beneficiary),
            chain.factory_verifier(),
            chain.domain(),
            beneficiary,
        )
        .with_clock(self.clock.clone())
    }

    pub fn beneficiary(&self) -> Address {
        self.key.address()
    }
}

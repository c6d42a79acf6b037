use std::{sync::Arc, time::Duration};

use alloy_signer_local::PrivateKeySigner;
use assert_matches::assert_matches;
use chrono::NaiveDate;
use proptest::prelude::*;
use vertex_storage::{MemoryStateStore, SharedStateStore};
use vertex_swarm_bandwidth_chequebook::{
    Address, Cheque, ChequeSigner, ChequeStoreError, IndexRange, LocalChequeSigner, SignedCheque,
    U256,
};
use vertex_swarm_test_utils::{
    BeneficiaryFixture, FaultyStateStore, IssuerFixture, SimulatedChain,
};

fn u(value: u64) -> U256 {
    U256::from(value)
}

fn sign(
    chain: &SimulatedChain,
    signer: &dyn ChequeSigner,
    token: Address,
    chequebook: Address,
    beneficiary: Address,
    cumulative_payout: u64,
) -> SignedCheque {
    signer
        .sign(
            Cheque::new(token, chequebook, beneficiary, u(cumulative_payout)),
            &chain.domain(),
        )
        .unwrap()
}

struct Setup {
    chain: SimulatedChain,
    issuer: IssuerFixture,
    receiver: BeneficiaryFixture,
}

impl Setup {
    fn new(balance: u64) -> Self {
        let chain = SimulatedChain::default();
        let issuer = IssuerFixture::new(&chain, u(balance));
        let receiver = BeneficiaryFixture::new(&chain);
        Self {
            chain,
            issuer,
            receiver,
        }
    }

    fn cheque(&self, cumulative_payout: u64) -> SignedCheque {
        sign(
            &self.chain,
            &*self.issuer.signer,
            self.chain.native_token(),
            self.issuer.chequebook_address,
            self.receiver.beneficiary(),
            cumulative_payout,
        )
    }

    async fn receive(&self, cumulative_payout: u64) -> Result<U256, ChequeStoreError> {
        self.receiver
            .cheque_store
            .receive_cheque(&self.cheque(cumulative_payout), U256::ZERO)
            .await
    }
}

#[tokio::test]
async fn accepts_increasing_cheques() {
    let setup = Setup::new(1000);

    assert_eq!(setup.receive(400).await.unwrap(), u(400));
    assert_eq!(setup.receive(700).await.unwrap(), u(300));
    assert_matches!(
        setup.receive(650).await,
        Err(ChequeStoreError::ChequeNotIncreasing)
    );
    assert_matches!(
        setup.receive(700).await,
        Err(ChequeStoreError::ChequeNotIncreasing)
    );

    let cheques = setup.receiver.cheque_store.last_received_cheques().unwrap();
    assert_eq!(cheques.len(), 1);
    assert_eq!(cheques[0].cumulative_payout(), u(700));
}

#[tokio::test]
async fn rejects_wrong_beneficiary() {
    let setup = Setup::new(1000);
    let other = Address::repeat_byte(0x99);
    let cheque = sign(
        &setup.chain,
        &*setup.issuer.signer,
        setup.chain.native_token(),
        setup.issuer.chequebook_address,
        other,
        100,
    );

    assert_matches!(
        setup.receiver.cheque_store.receive_cheque(&cheque, U256::ZERO).await,
        Err(ChequeStoreError::WrongBeneficiary { expected, actual })
            if expected == setup.receiver.beneficiary() && actual == other
    );
}

#[tokio::test]
async fn rejects_unknown_chequebook() {
    let setup = Setup::new(1000);
    let rogue = setup
        .chain
        .deploy_unregistered_chequebook(setup.issuer.issuer());
    setup
        .chain
        .mint(setup.chain.native_token(), rogue, u(1000));
    let cheque = sign(
        &setup.chain,
        &*setup.issuer.signer,
        setup.chain.native_token(),
        rogue,
        setup.receiver.beneficiary(),
        100,
    );

    assert_matches!(
        setup.receiver.cheque_store.receive_cheque(&cheque, U256::ZERO).await,
        Err(ChequeStoreError::UnknownChequebook(address)) if address == rogue
    );
}

#[tokio::test]
async fn rejects_value_below_minimum() {
    let setup = Setup::new(1000);
    assert_matches!(
        setup
            .receiver
            .cheque_store
            .receive_cheque(&setup.cheque(400), u(500))
            .await,
        Err(ChequeStoreError::ChequeValueTooLow { amount, min_amount })
            if amount == u(400) && min_amount == u(500)
    );
    assert_matches!(
        setup.receiver.cheque_store.last_received_cheque(
            setup.issuer.chequebook_address,
            setup.chain.native_token()
        ),
        Err(ChequeStoreError::NoCheque)
    );
}

#[tokio::test]
async fn rejects_foreign_signature() {
    let setup = Setup::new(1000);
    let impostor = LocalChequeSigner::new(PrivateKeySigner::random());
    let cheque = sign(
        &setup.chain,
        &impostor,
        setup.chain.native_token(),
        setup.issuer.chequebook_address,
        setup.receiver.beneficiary(),
        100,
    );

    assert_matches!(
        setup.receiver.cheque_store.receive_cheque(&cheque, U256::ZERO).await,
        Err(ChequeStoreError::ChequeInvalid)
    );
}

#[tokio::test]
async fn rejects_bouncing_cheque() {
    let setup = Setup::new(100);
    assert_matches!(setup.receive(200).await, Err(ChequeStoreError::BouncingCheque));
    // Exactly covered is fine.
    assert_eq!(setup.receive(100).await.unwrap(), u(100));
}

#[tokio::test]
async fn rejects_cheque_already_paid_out() {
    let setup = Setup::new(1000);
    setup.receive(300).await.unwrap();
    setup
        .receiver
        .cashout
        .cash_cheque(
            setup.issuer.chequebook_address,
            setup.chain.native_token(),
            setup.receiver.beneficiary(),
        )
        .await
        .unwrap();

    // Same key, fresh store: the local history is gone but the chain remembers.
    let restored = BeneficiaryFixture::with_key(
        &setup.chain,
        setup.receiver.key.clone(),
        Arc::new(MemoryStateStore::new()),
    );
    assert_matches!(
        restored
            .cheque_store
            .receive_cheque(&setup.cheque(300), U256::ZERO)
            .await,
        Err(ChequeStoreError::ChequeNotIncreasing)
    );
    assert_eq!(
        restored
            .cheque_store
            .receive_cheque(&setup.cheque(350), U256::ZERO)
            .await
            .unwrap(),
        u(350)
    );
}

#[tokio::test]
async fn multi_token_cheques_tracked_separately() {
    let setup = Setup::new(1000);
    let token = Address::repeat_byte(0x7e);
    setup
        .chain
        .mint(token, setup.issuer.chequebook_address, u(50));

    setup.receive(400).await.unwrap();
    let cheque = sign(
        &setup.chain,
        &*setup.issuer.signer,
        token,
        setup.issuer.chequebook_address,
        setup.receiver.beneficiary(),
        40,
    );
    assert_eq!(
        setup
            .receiver
            .cheque_store
            .receive_cheque(&cheque, U256::ZERO)
            .await
            .unwrap(),
        u(40)
    );

    let store = &setup.receiver.cheque_store;
    let chequebook = setup.issuer.chequebook_address;
    assert_eq!(
        store
            .last_received_cheque(chequebook, token)
            .unwrap()
            .cumulative_payout(),
        u(40)
    );
    assert_eq!(
        store
            .last_received_cheque(chequebook, setup.chain.native_token())
            .unwrap()
            .cumulative_payout(),
        u(400)
    );
    assert_eq!(store.last_received_cheques().unwrap().len(), 2);

    // Above the token balance of the chequebook.
    let cheque = sign(
        &setup.chain,
        &*setup.issuer.signer,
        token,
        chequebook,
        setup.receiver.beneficiary(),
        100,
    );
    assert_matches!(
        store.receive_cheque(&cheque, U256::ZERO).await,
        Err(ChequeStoreError::BouncingCheque)
    );
}

#[tokio::test]
async fn history_stats_and_uncashed_count() {
    let setup = Setup::new(1000);
    let chequebook = setup.issuer.chequebook_address;
    let token = setup.chain.native_token();
    let store = &setup.receiver.cheque_store;

    setup.receive(100).await.unwrap();
    setup.receive(250).await.unwrap();
    setup.receiver.clock.advance(Duration::from_secs(86_400));
    setup.receive(300).await.unwrap();

    let amounts: Vec<_> = store
        .records(chequebook)
        .unwrap()
        .iter()
        .map(|r| r.amount)
        .collect();
    assert_eq!(amounts, vec![u(100), u(150), u(50)]);
    assert_eq!(
        store.index_range(chequebook).unwrap(),
        IndexRange {
            min_index: 0,
            max_index: 3
        }
    );
    assert_eq!(store.uncashed_count(chequebook, token).unwrap(), 3);

    let day_one = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let stats = store.daily_stats(day_one, token).unwrap().unwrap();
    assert_eq!(stats.amount, u(250));
    assert_eq!(stats.count, 2);
    assert_eq!(store.all_daily_stats().unwrap().len(), 2);

    setup
        .receiver
        .cashout
        .cash_cheque(chequebook, token, setup.receiver.beneficiary())
        .await
        .unwrap();
    assert_eq!(store.uncashed_count(chequebook, token).unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicates_accepted_once() {
    let setup = Setup::new(1000);
    let cheque = setup.cheque(100);

    let tasks = (0..8).map(|_| {
        let store = setup.receiver.cheque_store.clone();
        let cheque = cheque.clone();
        tokio::spawn(async move { store.receive_cheque(&cheque, U256::ZERO).await })
    });
    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(result, Err(ChequeStoreError::ChequeNotIncreasing));
    }

    let chequebook = setup.issuer.chequebook_address;
    let store = &setup.receiver.cheque_store;
    assert_eq!(store.records(chequebook).unwrap().len(), 1);
    assert_eq!(
        store
            .uncashed_count(chequebook, setup.chain.native_token())
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn bookkeeping_failure_keeps_accepted_cheque() {
    let chain = SimulatedChain::default();
    let issuer = IssuerFixture::new(&chain, u(1000));
    let faulty = Arc::new(FaultyStateStore::new());
    let shared: SharedStateStore = faulty.clone();
    let receiver = BeneficiaryFixture::with_store(&chain, shared);
    let setup = Setup {
        chain,
        issuer,
        receiver,
    };
    let chequebook = setup.issuer.chequebook_address;
    let token = setup.chain.native_token();
    let store = &setup.receiver.cheque_store;

    faulty.fail_puts("swap_history_");
    faulty.fail_puts("swap_stats_");
    faulty.fail_puts("swap_chequestore_uncashed_count_");
    assert_eq!(setup.receive(100).await.unwrap(), u(100));
    assert_eq!(
        store.last_received_cheque(chequebook, token).unwrap().cumulative_payout(),
        u(100)
    );
    assert!(store.records(chequebook).unwrap().is_empty());

    faulty.heal();
    assert_eq!(setup.receive(250).await.unwrap(), u(150));
    assert_eq!(store.uncashed_count(chequebook, token).unwrap(), 1);
}

#[tokio::test]
async fn old_records_pruned_on_append() {
    let setup = Setup::new(1000);
    let chequebook = setup.issuer.chequebook_address;
    let store = &setup.receiver.cheque_store;

    setup.receive(100).await.unwrap();
    setup.receive(200).await.unwrap();
    setup
        .receiver
        .clock
        .advance(Duration::from_secs(181 * 86_400));
    setup.receive(300).await.unwrap();

    let records = store.records(chequebook).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].cumulative_payout, u(300));
    assert_eq!(
        store.index_range(chequebook).unwrap(),
        IndexRange {
            min_index: 2,
            max_index: 3
        }
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn accepted_payouts_strictly_increase(payouts in prop::collection::vec(1u64..500, 1..12)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let setup = Setup::new(10_000);
            let mut highest = 0u64;
            for payout in payouts {
                let result = setup.receive(payout).await;
                if payout > highest {
                    prop_assert_eq!(result.unwrap(), u(payout - highest));
                    highest = payout;
                } else {
                    prop_assert!(matches!(result, Err(ChequeStoreError::ChequeNotIncreasing)));
                }
            }
            let last = setup
                .receiver
                .cheque_store
                .last_received_cheque(setup.issuer.chequebook_address, setup.chain.native_token())
                .unwrap();
            prop_assert_eq!(last.cumulative_payout(), u(highest));
            Ok(())
        })?;
    }
}

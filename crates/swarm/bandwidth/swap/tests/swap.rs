use std::{sync::Arc, time::Duration};

use assert_matches::assert_matches;
use bytes::Bytes;
use parking_lot::Mutex;
use vertex_storage::SharedStateStore;
use vertex_storage_redb::RedbStateStore;
use vertex_swarm_bandwidth_chequebook::{ChequeStoreError, ChequebookError, U256};
use vertex_swarm_bandwidth_swap::{
    AccountingError, DefaultSwapConfig, FixedPriceOracle, Swap, SwapAccounting, SwapConfig,
    SwapError, SwapParts, create_swap_actor,
};
use vertex_swarm_net_swap::{
    HANDSHAKE_PROTOCOL, InboundHandler, OverlayAddress, SWAP_PROTOCOL, SettlementHeaders,
    TransportError, encode_cheque_request,
};
use vertex_swarm_test_utils::{
    BeneficiaryFixture, IssuerFixture, MemoryNetwork, SimulatedChain, init_tracing,
};

fn u(value: u64) -> U256 {
    U256::from(value)
}

#[derive(Default)]
struct RecordingAccounting {
    received: Mutex<Vec<(OverlayAddress, U256)>>,
    sent: Mutex<Vec<(OverlayAddress, U256)>>,
}

impl SwapAccounting for RecordingAccounting {
    fn notify_payment_received(
        &self,
        peer: OverlayAddress,
        amount: U256,
    ) -> Result<(), AccountingError> {
        self.received.lock().push((peer, amount));
        Ok(())
    }

    fn notify_payment_sent(&self, peer: OverlayAddress, amount: U256) {
        self.sent.lock().push((peer, amount));
    }
}

struct TestConfig {
    cheque_timeout: Duration,
    history_retention: Duration,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            cheque_timeout: DefaultSwapConfig.cheque_timeout(),
            history_retention: DefaultSwapConfig.history_retention(),
        }
    }
}

impl SwapConfig for TestConfig {
    fn handshake_attempts(&self) -> u32 {
        2
    }

    fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    fn cheque_timeout(&self) -> Duration {
        self.cheque_timeout
    }

    fn emit_timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    fn history_retention(&self) -> Duration {
        self.history_retention
    }
}

/// One node: pays from its own chequebook and receives into its own store.
struct Node {
    overlay: OverlayAddress,
    issuer: IssuerFixture,
    receiver: BeneficiaryFixture,
    accounting: Arc<RecordingAccounting>,
    swap: Arc<Swap>,
}

struct NodeBuilder<'a> {
    chain: &'a SimulatedChain,
    network: &'a MemoryNetwork,
    overlay: OverlayAddress,
    balance: u64,
    rates: SettlementHeaders,
    config: Arc<dyn SwapConfig>,
    receiver_store: Option<SharedStateStore>,
    register: bool,
}

impl<'a> NodeBuilder<'a> {
    fn new(chain: &'a SimulatedChain, network: &'a MemoryNetwork, id: u8) -> Self {
        Self {
            chain,
            network,
            overlay: OverlayAddress::repeat_byte(id),
            balance: 10_000,
            rates: SettlementHeaders::new(u(10), U256::ZERO),
            config: Arc::new(DefaultSwapConfig),
            receiver_store: None,
            register: true,
        }
    }

    fn rates(mut self, exchange_rate: u64, deduction: u64) -> Self {
        self.rates = SettlementHeaders::new(u(exchange_rate), u(deduction));
        self
    }

    fn config(mut self, config: impl SwapConfig + 'static) -> Self {
        self.config = Arc::new(config);
        self
    }

    fn receiver_store(mut self, store: SharedStateStore) -> Self {
        self.receiver_store = Some(store);
        self
    }

    fn unregistered(mut self) -> Self {
        self.register = false;
        self
    }

    fn build(self) -> Node {
        let issuer = IssuerFixture::new(self.chain, u(self.balance));
        let receiver = match self.receiver_store {
            Some(store) => BeneficiaryFixture::with_store(self.chain, store),
            None => BeneficiaryFixture::new(self.chain),
        };
        let accounting = Arc::new(RecordingAccounting::default());
        let swap = Arc::new(Swap::new(
            &self.config,
            SwapParts {
                beneficiary: receiver.beneficiary(),
                chequebook: issuer.open_chequebook(self.chain),
                cheque_store: receiver.open_cheque_store(self.chain),
                store: issuer.store.clone(),
                transport: self.network.transport(self.overlay),
                oracle: Arc::new(FixedPriceOracle::new(
                    self.rates.exchange_rate,
                    self.rates.deduction,
                )),
                accounting: accounting.clone(),
            },
        ));
        if self.register {
            self.network.register(self.overlay, swap.clone());
        }
        Node {
            overlay: self.overlay,
            issuer,
            receiver,
            accounting,
            swap,
        }
    }
}

impl Node {
    fn received_from(&self, payer: &Node) -> U256 {
        self.swap
            .cheque_store()
            .last_received_cheque(
                payer.issuer.chequebook_address,
                payer.swap.chequebook().token(),
            )
            .map(|cheque| cheque.cumulative_payout())
            .unwrap_or_default()
    }

    fn issued_to(&self, payee: &Node) -> Result<U256, ChequebookError> {
        self.swap
            .chequebook()
            .last_cheque(payee.receiver.beneficiary())
            .map(|cheque| cheque.cumulative_payout())
    }
}

#[tokio::test]
async fn cheques_settle_between_peers() {
    init_tracing();
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let alice = NodeBuilder::new(&chain, &network, 0x0a).build();
    let bob = NodeBuilder::new(&chain, &network, 0x0b).build();

    assert_eq!(alice.swap.emit_cheque(bob.overlay, u(500)).await.unwrap(), u(500));
    assert_eq!(alice.swap.emit_cheque(bob.overlay, u(300)).await.unwrap(), u(300));

    assert_eq!(alice.issued_to(&bob).unwrap(), u(800));
    assert_eq!(bob.received_from(&alice), u(800));
    assert_eq!(alice.swap.chequebook().reserved(), U256::ZERO);

    assert_eq!(
        *alice.accounting.sent.lock(),
        vec![(bob.overlay, u(500)), (bob.overlay, u(300))]
    );
    // 500 / 10 and 300 / 10
    assert_eq!(
        *bob.accounting.received.lock(),
        vec![(alice.overlay, u(50)), (alice.overlay, u(30))]
    );

    assert_eq!(
        bob.swap.address_book().chequebook(alice.overlay).unwrap(),
        Some(alice.issuer.chequebook_address)
    );
    assert_eq!(
        bob.swap
            .address_book()
            .chequebook_peer(alice.issuer.chequebook_address)
            .unwrap(),
        Some(alice.overlay)
    );
}

#[tokio::test]
async fn deduction_is_subtracted_before_conversion() {
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let alice = NodeBuilder::new(&chain, &network, 0x0a).rates(10, 100).build();
    let bob = NodeBuilder::new(&chain, &network, 0x0b).rates(10, 100).build();

    alice.swap.emit_cheque(bob.overlay, u(1_100)).await.unwrap();

    assert_eq!(*bob.accounting.received.lock(), vec![(alice.overlay, u(100))]);
}

#[tokio::test]
async fn handshake_result_is_cached() {
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let alice = NodeBuilder::new(&chain, &network, 0x0a).build();
    let bob = NodeBuilder::new(&chain, &network, 0x0b).build();

    assert_eq!(
        alice.swap.handshake(bob.overlay).await.unwrap(),
        bob.receiver.beneficiary()
    );
    alice.swap.emit_cheque(bob.overlay, u(100)).await.unwrap();
    alice.swap.emit_cheque(bob.overlay, u(100)).await.unwrap();

    assert_eq!(network.request_count(bob.overlay, HANDSHAKE_PROTOCOL), 1);
    assert_eq!(network.request_count(bob.overlay, SWAP_PROTOCOL), 2);
    assert_eq!(
        alice
            .swap
            .address_book()
            .beneficiary_peer(bob.receiver.beneficiary())
            .unwrap(),
        Some(bob.overlay)
    );
}

#[tokio::test]
async fn handshake_retries_transient_failures() {
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let alice = NodeBuilder::new(&chain, &network, 0x0a).build();
    let bob = NodeBuilder::new(&chain, &network, 0x0b).build();

    network.fail_next(bob.overlay, 4);
    alice.swap.emit_cheque(bob.overlay, u(100)).await.unwrap();

    assert_eq!(network.request_count(bob.overlay, HANDSHAKE_PROTOCOL), 5);
    assert_eq!(bob.received_from(&alice), u(100));
}

#[tokio::test]
async fn unreachable_beneficiary_issues_nothing() {
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let alice = NodeBuilder::new(&chain, &network, 0x0a).build();
    let bob = NodeBuilder::new(&chain, &network, 0x0b).build();

    network.fail_next(bob.overlay, 5);
    assert_matches!(
        alice.swap.emit_cheque(bob.overlay, u(100)).await,
        Err(SwapError::BeneficiaryUnavailable { peer, .. }) if peer == bob.overlay
    );

    assert_eq!(network.request_count(bob.overlay, HANDSHAKE_PROTOCOL), 5);
    assert_eq!(network.request_count(bob.overlay, SWAP_PROTOCOL), 0);
    assert_matches!(alice.issued_to(&bob), Err(ChequebookError::NoCheque));
    assert_eq!(alice.swap.chequebook().reserved(), U256::ZERO);
    assert!(alice.accounting.sent.lock().is_empty());
}

#[tokio::test]
async fn rejected_cheque_leaves_no_trace() {
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let alice = NodeBuilder::new(&chain, &network, 0x0a).build();
    let bob = NodeBuilder::new(&chain, &network, 0x0b).rates(10, 1_000).build();

    // Bob wants at least 1_010 per cheque.
    assert_matches!(
        alice.swap.emit_cheque(bob.overlay, u(500)).await,
        Err(SwapError::Transport(TransportError::Remote(_)))
    );
    assert_matches!(alice.issued_to(&bob), Err(ChequebookError::NoCheque));
    assert_eq!(alice.swap.chequebook().reserved(), U256::ZERO);
    assert!(alice.accounting.sent.lock().is_empty());
    assert!(bob.accounting.received.lock().is_empty());

    // The next cheque starts from the last committed one, not the refused one.
    alice.swap.emit_cheque(bob.overlay, u(2_000)).await.unwrap();
    assert_eq!(alice.issued_to(&bob).unwrap(), u(2_000));
    assert_eq!(*bob.accounting.received.lock(), vec![(alice.overlay, u(100))]);
}

#[tokio::test]
async fn disconnected_peer_releases_reservation() {
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let alice = NodeBuilder::new(&chain, &network, 0x0a).build();
    let bob = NodeBuilder::new(&chain, &network, 0x0b).build();

    alice.swap.emit_cheque(bob.overlay, u(400)).await.unwrap();
    network.disconnect(bob.overlay);

    assert_matches!(
        alice.swap.emit_cheque(bob.overlay, u(100)).await,
        Err(SwapError::Transport(TransportError::NotConnected(peer))) if peer == bob.overlay
    );
    assert_eq!(alice.issued_to(&bob).unwrap(), u(400));
    assert_eq!(alice.swap.chequebook().reserved(), U256::ZERO);
    assert_eq!(alice.accounting.sent.lock().len(), 1);
}

#[tokio::test]
async fn insufficient_funds_is_reported() {
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let alice = NodeBuilder::new(&chain, &network, 0x0a).build();
    let bob = NodeBuilder::new(&chain, &network, 0x0b).build();

    assert_matches!(
        alice.swap.emit_cheque(bob.overlay, u(10_001)).await,
        Err(SwapError::Chequebook(ChequebookError::OutOfFunds { .. }))
    );
    assert_eq!(network.request_count(bob.overlay, SWAP_PROTOCOL), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_peer_times_out() {
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let alice = NodeBuilder::new(&chain, &network, 0x0a)
        .config(TestConfig {
            cheque_timeout: Duration::from_secs(1),
            ..Default::default()
        })
        .build();
    let bob = NodeBuilder::new(&chain, &network, 0x0b).build();

    alice.swap.handshake(bob.overlay).await.unwrap();
    network.set_delay(bob.overlay, Duration::from_secs(5));

    assert_matches!(
        alice.swap.emit_cheque(bob.overlay, u(100)).await,
        Err(SwapError::Timeout(_))
    );
    assert_matches!(alice.issued_to(&bob), Err(ChequebookError::NoCheque));
    assert_eq!(alice.swap.chequebook().reserved(), U256::ZERO);
    assert!(bob.swap.cheque_store().last_received_cheques().unwrap().is_empty());
}

#[tokio::test]
async fn history_retention_applies_to_both_sides() {
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let one_day = || TestConfig {
        history_retention: Duration::from_secs(86_400),
        ..Default::default()
    };
    let alice = NodeBuilder::new(&chain, &network, 0x0a).config(one_day()).build();
    let bob = NodeBuilder::new(&chain, &network, 0x0b).config(one_day()).build();

    alice.swap.emit_cheque(bob.overlay, u(100)).await.unwrap();
    alice.issuer.clock.advance(Duration::from_secs(2 * 86_400));
    bob.receiver.clock.advance(Duration::from_secs(2 * 86_400));
    alice.swap.emit_cheque(bob.overlay, u(100)).await.unwrap();

    let sent = alice
        .swap
        .chequebook()
        .history()
        .records(bob.receiver.beneficiary())
        .unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].cumulative_payout, u(200));

    let received = bob
        .swap
        .cheque_store()
        .records(alice.issuer.chequebook_address)
        .unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].cumulative_payout, u(200));
}

#[tokio::test]
async fn cheque_from_other_chequebook_is_refused() {
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let alice = NodeBuilder::new(&chain, &network, 0x0a).build();
    let bob = NodeBuilder::new(&chain, &network, 0x0b).build();
    alice.swap.emit_cheque(bob.overlay, u(100)).await.unwrap();

    let rates = SettlementHeaders::new(u(10), U256::ZERO);

    // Alice pays from a second chequebook.
    let other = IssuerFixture::new(&chain, u(1_000));
    let reservation = other
        .chequebook
        .reserve(bob.receiver.beneficiary(), u(100))
        .await
        .unwrap();
    let payload = encode_cheque_request(reservation.cheque(), &rates).unwrap();
    reservation.release();
    assert_matches!(
        bob.swap.handle_cheque(alice.overlay, &payload).await,
        Err(SwapError::WrongChequebook { expected, actual, .. })
            if expected == alice.issuer.chequebook_address && actual == other.chequebook_address
    );

    // Carol replays Alice's chequebook.
    let carol = OverlayAddress::repeat_byte(0x0c);
    let reservation = alice
        .swap
        .chequebook()
        .reserve(bob.receiver.beneficiary(), u(100))
        .await
        .unwrap();
    let payload = encode_cheque_request(reservation.cheque(), &rates).unwrap();
    reservation.release();
    assert_matches!(
        bob.swap.handle_cheque(carol, &payload).await,
        Err(SwapError::ForeignChequebook { owner, .. }) if owner == alice.overlay
    );

    assert_eq!(bob.received_from(&alice), u(100));
    assert_eq!(bob.accounting.received.lock().len(), 1);
}

#[tokio::test]
async fn stale_cheque_is_refused() {
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let alice = NodeBuilder::new(&chain, &network, 0x0a).build();
    let bob = NodeBuilder::new(&chain, &network, 0x0b).build();

    let rates = SettlementHeaders::new(u(10), U256::ZERO);
    let reservation = alice
        .swap
        .chequebook()
        .reserve(bob.receiver.beneficiary(), u(100))
        .await
        .unwrap();
    let payload = encode_cheque_request(reservation.cheque(), &rates).unwrap();
    reservation.release();

    bob.swap.handle_cheque(alice.overlay, &payload).await.unwrap();
    assert_matches!(
        bob.swap.handle_cheque(alice.overlay, &payload).await,
        Err(SwapError::ChequeStore(ChequeStoreError::ChequeNotIncreasing))
    );
}

#[tokio::test]
async fn unknown_protocol_is_refused() {
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let bob = NodeBuilder::new(&chain, &network, 0x0b).unregistered().build();

    assert_matches!(
        bob.swap
            .handle_request(
                OverlayAddress::repeat_byte(0x0a),
                "/swarm/swap/9.9.9/nope",
                Bytes::new()
            )
            .await,
        Err(TransportError::Remote(_))
    );
}

#[tokio::test]
async fn actor_serves_commands_and_streams() {
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let alice = NodeBuilder::new(&chain, &network, 0x0a).unregistered().build();
    let bob = NodeBuilder::new(&chain, &network, 0x0b).unregistered().build();

    let (alice_service, alice_handle) = create_swap_actor(alice.swap.clone());
    let (bob_service, bob_handle) = create_swap_actor(bob.swap.clone());
    let alice_task = tokio::spawn(alice_service.into_task());
    tokio::spawn(bob_service.into_task());
    network.register(alice.overlay, Arc::new(alice_handle.clone()));
    network.register(bob.overlay, Arc::new(bob_handle));

    assert_eq!(
        alice_handle.handshake(bob.overlay).await.unwrap(),
        bob.receiver.beneficiary()
    );

    let payments = (0..4).map(|_| {
        let handle = alice_handle.clone();
        async move { handle.emit_cheque(bob.overlay, u(25)).await }
    });
    for result in futures::future::join_all(payments).await {
        assert_eq!(result.unwrap(), u(25));
    }
    assert_eq!(alice.issued_to(&bob).unwrap(), u(100));
    assert_eq!(bob.received_from(&alice), u(100));

    network.disconnect(alice.overlay);
    drop(alice_handle);
    alice_task.await.unwrap();
}

#[tokio::test]
async fn received_cheques_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bob.redb");
    let chain = SimulatedChain::default();
    let network = MemoryNetwork::new();
    let alice = NodeBuilder::new(&chain, &network, 0x0a).build();

    let bob_key = {
        let store: SharedStateStore = Arc::new(RedbStateStore::open(&path).unwrap());
        let bob = NodeBuilder::new(&chain, &network, 0x0b)
            .receiver_store(store)
            .build();
        alice.swap.emit_cheque(bob.overlay, u(700)).await.unwrap();
        network.disconnect(bob.overlay);
        bob.receiver.key.clone()
    };

    let store: SharedStateStore = Arc::new(RedbStateStore::open(&path).unwrap());
    let restarted = BeneficiaryFixture::with_key(&chain, bob_key, store);
    let cheque = restarted
        .cheque_store
        .last_received_cheque(alice.issuer.chequebook_address, chain.native_token())
        .unwrap();
    assert_eq!(cheque.cumulative_payout(), u(700));
    assert_eq!(cheque.cheque.beneficiary, restarted.beneficiary());
    assert_eq!(
        restarted
            .cheque_store
            .uncashed_count(alice.issuer.chequebook_address, chain.native_token())
            .unwrap(),
        1
    );
}

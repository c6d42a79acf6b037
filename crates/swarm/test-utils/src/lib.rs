//! Test utilities for the settlement crates.
//!
//! - [`SimulatedChain`] / [`ChainClient`] - an in-process chain implementing
//!   the chequebook, factory and ERC-20 contracts behind [`ChainBackend`].
//! - [`MemoryNetwork`] / [`MemoryTransport`] - peer-to-peer request routing
//!   with fault injection.
//! - [`ManualClock`] - deterministic time for history and pruning.
//! - [`FaultyStateStore`] - a state store with write failure injection.
//! - [`IssuerFixture`] / [`BeneficiaryFixture`] - wired-up nodes.
//!
//! [`ChainBackend`]: vertex_swarm_bandwidth_chequebook::ChainBackend

mod chain;
mod clock;
mod fixtures;
mod network;
mod store;

pub use chain::{ChainClient, SimulatedChain, TEST_CHAIN_ID, TEST_GAS_PRICE, unknown_tx_hash};
pub use clock::{ManualClock, TEST_EPOCH};
pub use fixtures::{BeneficiaryFixture, IssuerFixture};
pub use network::{MemoryNetwork, MemoryTransport};
pub use store::FaultyStateStore;

/// Installs a test-writer tracing subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

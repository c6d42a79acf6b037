//! Persistent peer ↔ beneficiary and peer ↔ chequebook mappings.

use alloy_primitives::Address;
use vertex_storage::{DatabaseError, SharedStateStore, StateStoreExt};
use vertex_swarm_net_swap::OverlayAddress;

fn peer_beneficiary_key(peer: OverlayAddress) -> String {
    format!("swap_peer_beneficiary_{peer}")
}

fn beneficiary_peer_key(beneficiary: Address) -> String {
    format!("swap_beneficiary_peer_{beneficiary}")
}

fn peer_chequebook_key(peer: OverlayAddress) -> String {
    format!("swap_peer_chequebook_{peer}")
}

fn chequebook_peer_key(chequebook: Address) -> String {
    format!("swap_chequebook_peer_{chequebook}")
}

/// Who gets paid where, and who pays from where.
#[derive(Clone)]
pub struct AddressBook {
    store: SharedStateStore,
}

impl AddressBook {
    pub fn new(store: SharedStateStore) -> Self {
        Self { store }
    }

    /// Address cheques to `peer` are made out to.
    pub fn beneficiary(&self, peer: OverlayAddress) -> Result<Option<Address>, DatabaseError> {
        self.store.get_optional(&peer_beneficiary_key(peer))
    }

    pub fn beneficiary_peer(
        &self,
        beneficiary: Address,
    ) -> Result<Option<OverlayAddress>, DatabaseError> {
        self.store.get_optional(&beneficiary_peer_key(beneficiary))
    }

    /// Records both directions. Rewriting the same pair is a no-op.
    pub fn put_beneficiary(
        &self,
        peer: OverlayAddress,
        beneficiary: Address,
    ) -> Result<(), DatabaseError> {
        self.store.put(&peer_beneficiary_key(peer), &beneficiary)?;
        self.store.put(&beneficiary_peer_key(beneficiary), &peer)
    }

    /// Chequebook `peer` pays us from.
    pub fn chequebook(&self, peer: OverlayAddress) -> Result<Option<Address>, DatabaseError> {
        self.store.get_optional(&peer_chequebook_key(peer))
    }

    pub fn chequebook_peer(
        &self,
        chequebook: Address,
    ) -> Result<Option<OverlayAddress>, DatabaseError> {
        self.store.get_optional(&chequebook_peer_key(chequebook))
    }

    pub fn put_chequebook(
        &self,
        peer: OverlayAddress,
        chequebook: Address,
    ) -> Result<(), DatabaseError> {
        self.store.put(&peer_chequebook_key(peer), &chequebook)?;
        self.store.put(&chequebook_peer_key(chequebook), &peer)
    }
}

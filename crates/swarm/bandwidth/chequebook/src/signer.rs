//! Cheque signing.

use alloy_primitives::Address;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;

use crate::{
    ChequeError,
    cheque::{Cheque, ChequeDomain, SignedCheque},
};

/// Signs cheques on behalf of a chequebook issuer.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait ChequeSigner: Send + Sync {
    /// The issuer address recovered from every signature this signer makes.
    fn address(&self) -> Address;

    fn sign(&self, cheque: Cheque, domain: &ChequeDomain) -> Result<SignedCheque, ChequeError>;
}

/// [`ChequeSigner`] backed by any synchronous alloy signer.
#[derive(Debug, Clone)]
pub struct LocalChequeSigner<S = PrivateKeySigner> {
    signer: S,
    address: Address,
}

impl LocalChequeSigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        Self { signer, address }
    }
}

impl<S> LocalChequeSigner<S> {
    /// Wraps a signer whose address is known up front (hardware wallets, keystores).
    pub const fn with_address(signer: S, address: Address) -> Self {
        Self { signer, address }
    }
}

impl From<PrivateKeySigner> for LocalChequeSigner {
    fn from(signer: PrivateKeySigner) -> Self {
        Self::new(signer)
    }
}

impl<S: SignerSync + Send + Sync> ChequeSigner for LocalChequeSigner<S> {
    fn address(&self) -> Address {
        self.address
    }

    fn sign(&self, cheque: Cheque, domain: &ChequeDomain) -> Result<SignedCheque, ChequeError> {
        let hash = domain.signing_hash(&cheque);
        let signature = self
            .signer
            .sign_hash_sync(&hash)
            .map_err(|e| ChequeError::Signing(e.to_string()))?;
        Ok(SignedCheque::from_signature(cheque, signature))
    }
}

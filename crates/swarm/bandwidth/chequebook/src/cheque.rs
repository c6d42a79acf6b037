//! Cheque types for SWAP settlement.
//!
//! A cheque is a signed commitment to pay a certain cumulative amount of a
//! token from a chequebook contract to a beneficiary. Cheques are exchanged
//! off-chain and can be cashed on-chain at any time. Each new cheque to the
//! same beneficiary replaces the previous one with a higher cumulative payout.

use alloy_primitives::{Address, B256, Bytes, Signature, U256};
use alloy_sol_types::{Eip712Domain, SolStruct, eip712_domain};
use serde::{Deserialize, Serialize};

use crate::{
    ChequeError,
    asset::{AssetTable, ChequeSchema},
};

/// EIP-712 domain name for chequebook signing.
pub const DOMAIN_NAME: &str = "Chequebook";

/// EIP-712 domain version for chequebook signing.
pub const DOMAIN_VERSION: &str = "1.0";

/// r[32] + s[32] + v[1].
pub const SIGNATURE_LENGTH: usize = 65;

#[allow(unreachable_pub)]
mod typed {
    alloy_sol_types::sol! {
        struct Cheque {
            address chequebook;
            address beneficiary;
            uint256 cumulativePayout;
        }

        struct MultiTokenCheque {
            address token;
            address chequebook;
            address beneficiary;
            uint256 cumulativePayout;
        }
    }
}

/// An unsigned cheque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cheque {
    pub token: Address,
    pub chequebook: Address,
    pub beneficiary: Address,
    pub cumulative_payout: U256,
}

impl Cheque {
    pub const fn new(
        token: Address,
        chequebook: Address,
        beneficiary: Address,
        cumulative_payout: U256,
    ) -> Self {
        Self {
            token,
            chequebook,
            beneficiary,
            cumulative_payout,
        }
    }
}

/// Signing context: chain id plus the asset table selecting the struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChequeDomain {
    chain_id: u64,
    assets: AssetTable,
}

impl ChequeDomain {
    pub const fn new(chain_id: u64, assets: AssetTable) -> Self {
        Self { chain_id, assets }
    }

    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub const fn assets(&self) -> &AssetTable {
        &self.assets
    }

    /// The EIP-712 domain shared by both cheque structs.
    pub fn eip712_domain(&self) -> Eip712Domain {
        eip712_domain! {
            name: DOMAIN_NAME,
            version: DOMAIN_VERSION,
            chain_id: self.chain_id,
        }
    }

    /// The digest a chequebook issuer signs for `cheque`.
    pub fn signing_hash(&self, cheque: &Cheque) -> B256 {
        let domain = self.eip712_domain();
        match self.assets.schema(cheque.token) {
            ChequeSchema::Native => typed::Cheque {
                chequebook: cheque.chequebook,
                beneficiary: cheque.beneficiary,
                cumulativePayout: cheque.cumulative_payout,
            }
            .eip712_signing_hash(&domain),
            ChequeSchema::MultiToken => typed::MultiTokenCheque {
                token: cheque.token,
                chequebook: cheque.chequebook,
                beneficiary: cheque.beneficiary,
                cumulativePayout: cheque.cumulative_payout,
            }
            .eip712_signing_hash(&domain),
        }
    }
}

/// A signed cheque ready for transmission or cashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCheque {
    /// The unsigned cheque data.
    pub cheque: Cheque,
    /// ECDSA signature over the EIP-712 digest.
    pub signature: Bytes,
}

impl SignedCheque {
    /// Create a new signed cheque.
    pub const fn new(cheque: Cheque, signature: Bytes) -> Self {
        Self { cheque, signature }
    }

    /// Create a signed cheque from a cheque and signature.
    pub fn from_signature(cheque: Cheque, sig: Signature) -> Self {
        Self {
            cheque,
            signature: Bytes::copy_from_slice(&sig.as_bytes()),
        }
    }

    pub const fn cumulative_payout(&self) -> U256 {
        self.cheque.cumulative_payout
    }

    fn parse_signature(&self) -> Result<Signature, ChequeError> {
        if self.signature.len() != SIGNATURE_LENGTH {
            return Err(ChequeError::SignatureRecovery(format!(
                "invalid signature length: expected {SIGNATURE_LENGTH}, got {}",
                self.signature.len()
            )));
        }

        Signature::try_from(self.signature.as_ref())
            .map_err(|e| ChequeError::SignatureRecovery(format!("invalid signature: {e}")))
    }

    /// Recover the signer address from the signature.
    pub fn recover_signer(&self, domain: &ChequeDomain) -> Result<Address, ChequeError> {
        let sig = self.parse_signature()?;
        let hash = domain.signing_hash(&self.cheque);

        sig.recover_address_from_prehash(&hash)
            .map_err(|e| ChequeError::SignatureRecovery(format!("recovery failed: {e}")))
    }

    /// Verify that this cheque was signed by the expected owner.
    pub fn verify(&self, owner: Address, domain: &ChequeDomain) -> Result<(), ChequeError> {
        let signer = self.recover_signer(domain)?;
        if signer != owner {
            return Err(ChequeError::InvalidSigner {
                expected: owner,
                actual: signer,
            });
        }
        Ok(())
    }

    /// Serialize to the flat JSON object carried by the SWAP protocol.
    pub fn to_json(&self) -> Result<Vec<u8>, ChequeError> {
        let wire = WireCheque {
            token: self.cheque.token,
            chequebook: self.cheque.chequebook,
            beneficiary: self.cheque.beneficiary,
            cumulative_payout: self.cheque.cumulative_payout,
            signature: self.signature.clone(),
        };
        serde_json::to_vec(&wire).map_err(|e| ChequeError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Self, ChequeError> {
        let wire: WireCheque =
            serde_json::from_slice(data).map_err(|e| ChequeError::Serialization(e.to_string()))?;
        Ok(Self {
            cheque: Cheque::new(
                wire.token,
                wire.chequebook,
                wire.beneficiary,
                wire.cumulative_payout,
            ),
            signature: wire.signature,
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCheque {
    token: Address,
    chequebook: Address,
    beneficiary: Address,
    cumulative_payout: U256,
    signature: Bytes,
}

//! Token to cheque schema mapping.
//!
//! A chequebook holds its native token plus any number of other ERC-20
//! tokens. Native cheques use the original `Cheque` struct and contract
//! functions; everything else goes through the `MultiTokenCheque` struct and
//! the `*Of(token, ...)` contract functions.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Which EIP-712 struct and contract functions a token settles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChequeSchema {
    Native,
    MultiToken,
}

/// Lookup from token address to [`ChequeSchema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTable {
    native_token: Address,
}

impl AssetTable {
    pub const fn new(native_token: Address) -> Self {
        Self { native_token }
    }

    pub const fn native_token(&self) -> Address {
        self.native_token
    }

    pub fn is_native(&self, token: Address) -> bool {
        token == self.native_token
    }

    pub fn schema(&self, token: Address) -> ChequeSchema {
        if self.is_native(token) {
            ChequeSchema::Native
        } else {
            ChequeSchema::MultiToken
        }
    }
}

//! SWAP protocol headers for exchange rate negotiation.
//!
//! SWAP uses the "headler" pattern where exchange rates are negotiated via headers
//! alongside the actual cheque transfer.

use std::collections::BTreeMap;

use alloy_primitives::U256;
use bytes::Bytes;
use vertex_net_codec::{decode_u256_be, encode_u256_be};

/// Header name for exchange rate (price per accounting unit in token base units).
pub const HEADER_EXCHANGE_RATE: &str = "exchange";

/// Header name for deduction (amount to deduct from payment).
pub const HEADER_DEDUCTION: &str = "deduction";

/// Settlement headers exchanged during SWAP protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementHeaders {
    /// Exchange rate (price per accounting unit).
    pub exchange_rate: U256,
    /// Deduction amount.
    pub deduction: U256,
}

impl SettlementHeaders {
    /// Create new settlement headers.
    pub const fn new(exchange_rate: U256, deduction: U256) -> Self {
        Self {
            exchange_rate,
            deduction,
        }
    }

    /// Create headers with only exchange rate (zero deduction).
    pub const fn with_rate(exchange_rate: U256) -> Self {
        Self {
            exchange_rate,
            deduction: U256::ZERO,
        }
    }

    /// Parse settlement headers from a header map.
    ///
    /// The exchange rate is mandatory, a missing deduction means zero.
    pub fn from_headers(headers: &BTreeMap<String, Bytes>) -> Option<Self> {
        let exchange_rate = headers
            .get(HEADER_EXCHANGE_RATE)
            .and_then(|b| decode_u256_be(b))?;

        let deduction = match headers.get(HEADER_DEDUCTION) {
            Some(b) => decode_u256_be(b)?,
            None => U256::ZERO,
        };

        Some(Self {
            exchange_rate,
            deduction,
        })
    }

    /// Convert to a header map for transmission.
    pub fn to_headers(&self) -> BTreeMap<String, Bytes> {
        let mut headers = BTreeMap::new();

        headers.insert(
            HEADER_EXCHANGE_RATE.to_string(),
            Bytes::from(encode_u256_be(self.exchange_rate)),
        );

        if !self.deduction.is_zero() {
            headers.insert(
                HEADER_DEDUCTION.to_string(),
                Bytes::from(encode_u256_be(self.deduction)),
            );
        }

        headers
    }

    /// Smallest cheque increment worth accepting under these rates.
    pub fn min_amount(&self) -> U256 {
        self.exchange_rate.saturating_add(self.deduction)
    }
}

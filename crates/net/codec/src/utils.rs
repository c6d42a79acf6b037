//! Encoding helpers for values that cross the wire.

use alloy_primitives::U256;

/// Big-endian bytes of `value` with leading zeros trimmed.
///
/// Zero encodes as an empty vector, the same as Go's `big.Int.Bytes()`.
#[inline]
pub fn encode_u256_be(value: U256) -> Vec<u8> {
    let bytes = value.to_be_bytes::<32>();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes.get(start..).map(<[u8]>::to_vec).unwrap_or_default()
}

/// Inverse of [`encode_u256_be`]. Returns `None` for inputs wider than 32 bytes.
#[inline]
pub fn decode_u256_be(bytes: &[u8]) -> Option<U256> {
    match bytes.len() {
        0 => Some(U256::ZERO),
        1..=32 => Some(U256::from_be_slice(bytes)),
        _ => None,
    }
}

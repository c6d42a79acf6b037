//! Codecs for SWAP protocol messages.
//!
//! Provides separate typed codecs:
//! - `HeadersCodec` - settlement headers exchanged in both directions
//! - `EmitChequeCodec` - the signed cheque
//! - `HandshakeCodec` - the responder's beneficiary address
//!
//! Cheques are serialized as JSON, matching Bee's format for interoperability.

use std::collections::BTreeMap;

use alloy_primitives::Address;
use bytes::{Bytes, BytesMut};
use vertex_net_codec::{Codec, ProtoMessage, ProtocolCodecError, read_frame, write_frame};
use vertex_swarm_bandwidth_chequebook::{ChequeError, SignedCheque};

use crate::headers::SettlementHeaders;

/// Largest frame accepted on any SWAP stream.
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Domain-specific errors for SWAP protocol.
#[derive(Debug, thiserror::Error)]
pub enum SwapWireError {
    #[error("cheque encoding: {0}")]
    Cheque(#[from] ChequeError),
}

/// Error type for swap codec operations.
pub type SwapCodecError = ProtocolCodecError<SwapWireError>;

/// Raw header map, sorted by key on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: BTreeMap<String, Bytes>,
}

impl Headers {
    pub fn new(entries: BTreeMap<String, Bytes>) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Bytes> {
        self.entries.get(key)
    }

    pub fn into_inner(self) -> BTreeMap<String, Bytes> {
        self.entries
    }
}

impl From<&SettlementHeaders> for Headers {
    fn from(headers: &SettlementHeaders) -> Self {
        Self::new(headers.to_headers())
    }
}

impl ProtoMessage for Headers {
    type Proto = crate::proto::headers::Headers;
    type DecodeError = SwapCodecError;

    fn into_proto(self) -> Self::Proto {
        crate::proto::headers::Headers {
            headers: self
                .entries
                .into_iter()
                .map(|(key, value)| crate::proto::headers::Header {
                    key,
                    value: value.to_vec(),
                })
                .collect(),
        }
    }

    fn from_proto(proto: Self::Proto) -> Result<Self, Self::DecodeError> {
        let entries = proto
            .headers
            .into_iter()
            .map(|h| (h.key, Bytes::from(h.value)))
            .collect();
        Ok(Self { entries })
    }
}

pub type HeadersCodec = Codec<Headers, SwapCodecError>;

/// A signed cheque together with its JSON encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitCheque {
    cheque: SignedCheque,
    encoded: Vec<u8>,
}

impl EmitCheque {
    pub fn new(cheque: SignedCheque) -> Result<Self, SwapCodecError> {
        let encoded = cheque
            .to_json()
            .map_err(|e| SwapCodecError::domain(e.into()))?;
        Ok(Self { cheque, encoded })
    }

    pub fn cheque(&self) -> &SignedCheque {
        &self.cheque
    }

    pub fn into_cheque(self) -> SignedCheque {
        self.cheque
    }
}

impl ProtoMessage for EmitCheque {
    type Proto = crate::proto::swap::EmitCheque;
    type DecodeError = SwapCodecError;

    fn into_proto(self) -> Self::Proto {
        crate::proto::swap::EmitCheque {
            cheque: self.encoded,
        }
    }

    fn from_proto(proto: Self::Proto) -> Result<Self, Self::DecodeError> {
        let cheque = SignedCheque::from_json(&proto.cheque)
            .map_err(|e| SwapCodecError::domain(e.into()))?;
        Ok(Self {
            cheque,
            encoded: proto.cheque,
        })
    }
}

pub type EmitChequeCodec = Codec<EmitCheque, SwapCodecError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub beneficiary: Address,
}

impl Handshake {
    pub fn new(beneficiary: Address) -> Self {
        Self { beneficiary }
    }
}

impl ProtoMessage for Handshake {
    type Proto = crate::proto::swap::Handshake;
    type DecodeError = SwapCodecError;

    fn into_proto(self) -> Self::Proto {
        crate::proto::swap::Handshake {
            beneficiary: self.beneficiary.as_slice().to_vec(),
        }
    }

    fn from_proto(proto: Self::Proto) -> Result<Self, Self::DecodeError> {
        if proto.beneficiary.len() != 20 {
            return Err(SwapCodecError::protocol(format!(
                "invalid beneficiary length: expected 20, got {}",
                proto.beneficiary.len()
            )));
        }
        let beneficiary = Address::from_slice(&proto.beneficiary);
        Ok(Self { beneficiary })
    }
}

pub type HandshakeCodec = Codec<Handshake, SwapCodecError>;

/// Builds the body of a cheque request: our headers frame, then the cheque frame.
pub fn encode_cheque_request(
    cheque: &SignedCheque,
    headers: &SettlementHeaders,
) -> Result<Bytes, SwapCodecError> {
    let mut buf = BytesMut::new();
    write_frame::<_, SwapCodecError>(Headers::from(headers), MAX_MESSAGE_SIZE, &mut buf)?;
    write_frame::<_, SwapCodecError>(EmitCheque::new(cheque.clone())?, MAX_MESSAGE_SIZE, &mut buf)?;
    Ok(buf.freeze())
}

/// Parses a cheque request produced by [`encode_cheque_request`].
pub fn decode_cheque_request(
    payload: &[u8],
) -> Result<(SignedCheque, SettlementHeaders), SwapCodecError> {
    let mut buf = BytesMut::from(payload);
    let headers = decode_settlement(read_frame::<Headers, SwapCodecError>(
        &mut buf,
        MAX_MESSAGE_SIZE,
    )?)?;
    let emit: EmitCheque = read_frame::<_, SwapCodecError>(&mut buf, MAX_MESSAGE_SIZE)?;
    if !buf.is_empty() {
        return Err(SwapCodecError::protocol(format!(
            "{} trailing bytes after cheque",
            buf.len()
        )));
    }
    Ok((emit.into_cheque(), headers))
}

/// Encodes a standalone headers frame (the cheque response).
pub fn encode_headers(headers: &SettlementHeaders) -> Result<Bytes, SwapCodecError> {
    let mut buf = BytesMut::new();
    write_frame::<_, SwapCodecError>(Headers::from(headers), MAX_MESSAGE_SIZE, &mut buf)?;
    Ok(buf.freeze())
}

pub fn decode_headers(payload: &[u8]) -> Result<SettlementHeaders, SwapCodecError> {
    let mut buf = BytesMut::from(payload);
    decode_settlement(read_frame::<Headers, SwapCodecError>(
        &mut buf,
        MAX_MESSAGE_SIZE,
    )?)
}

pub fn encode_handshake(beneficiary: Address) -> Result<Bytes, SwapCodecError> {
    let mut buf = BytesMut::new();
    write_frame::<_, SwapCodecError>(Handshake::new(beneficiary), MAX_MESSAGE_SIZE, &mut buf)?;
    Ok(buf.freeze())
}

pub fn decode_handshake(payload: &[u8]) -> Result<Address, SwapCodecError> {
    let mut buf = BytesMut::from(payload);
    let handshake: Handshake = read_frame::<_, SwapCodecError>(&mut buf, MAX_MESSAGE_SIZE)?;
    Ok(handshake.beneficiary)
}

fn decode_settlement(headers: Headers) -> Result<SettlementHeaders, SwapCodecError> {
    SettlementHeaders::from_headers(&headers.into_inner())
        .ok_or_else(|| SwapCodecError::protocol("missing or malformed exchange rate header"))
}

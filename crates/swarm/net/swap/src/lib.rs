//! SWAP protocol for Swarm bandwidth accounting with cheque settlement.
//!
//! This crate provides the wire protocol for exchanging signed cheques between
//! peers. It is **pure protocol plumbing** - it does NOT make business decisions
//! about settlements or cheque validation.
//!
//! # Protocols
//!
//! - `/swarm/swap/1.0.0/handshake` - empty request, the response carries the
//!   responder's beneficiary address (`Handshake`).
//! - `/swarm/swap/1.0.0/swap` - the request is a `Headers` frame with the
//!   initiator's `exchange` and `deduction` followed by an `EmitCheque` frame;
//!   the response is the responder's own `Headers` frame.
//!
//! Every frame is a varint length-prefixed protobuf message. The cheque inside
//! `EmitCheque` is JSON, matching Bee's format for interoperability.
//!
//! # Business Logic (NOT in this crate)
//!
//! - Cheque validation (signature, amount, cumulative payout)
//! - Balance updates
//! - Exchange rate determination
//! - On-chain cashing decisions

mod codec;
mod headers;
mod transport;

pub use codec::{
    EmitCheque, EmitChequeCodec, Handshake, HandshakeCodec, Headers, HeadersCodec,
    MAX_MESSAGE_SIZE, SwapCodecError, SwapWireError, decode_cheque_request, decode_handshake,
    decode_headers, encode_cheque_request, encode_handshake, encode_headers,
};
pub use headers::{HEADER_DEDUCTION, HEADER_EXCHANGE_RATE, SettlementHeaders};
pub use transport::{InboundHandler, OverlayAddress, PeerTransport, TransportError};

// Re-export SignedCheque for convenience
pub use vertex_swarm_bandwidth_chequebook::SignedCheque;

#[allow(unreachable_pub)]
mod proto;

/// Protocol name for the beneficiary handshake.
pub const HANDSHAKE_PROTOCOL: &str = "/swarm/swap/1.0.0/handshake";

/// Protocol name for cheque delivery.
pub const SWAP_PROTOCOL: &str = "/swarm/swap/1.0.0/swap";

//! Length-delimited protobuf framing shared by the settlement protocols.
//!
//! A protocol crate describes each wire message once through [`ProtoMessage`]
//! (domain type to generated protobuf type and back) and gets a framed
//! [`Codec`] for free. Request/response transports that exchange whole byte
//! buffers instead of streams use [`write_frame`] and [`read_frame`].

use std::{convert::Infallible, io, marker::PhantomData};

use asynchronous_codec::{Decoder, Encoder};
use bytes::BytesMut;

pub mod utils;

pub use utils::{decode_u256_be, encode_u256_be};

/// A domain message with a protobuf wire representation.
pub trait ProtoMessage: Sized {
    /// Generated protobuf type carried on the wire.
    type Proto: quick_protobuf::MessageWrite + for<'a> quick_protobuf::MessageRead<'a>;
    /// Error returned when the wire form does not describe a valid message.
    type DecodeError;

    fn into_proto(self) -> Self::Proto;

    fn from_proto(proto: Self::Proto) -> Result<Self, Self::DecodeError>;
}

/// Errors produced while framing or parsing protocol messages.
///
/// `E` carries protocol specific failures, such as a payload that is valid
/// protobuf but an invalid domain value.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolCodecError<E = Infallible>
where
    E: std::error::Error,
{
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("protobuf error: {0}")]
    Protobuf(#[from] quick_protobuf_codec::Error),
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error(transparent)]
    Domain(E),
}

impl<E: std::error::Error> ProtocolCodecError<E> {
    /// Wraps a protocol specific error.
    pub fn domain(error: E) -> Self {
        Self::Domain(error)
    }

    /// A malformed but decodable message.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

/// Framed codec for a single [`ProtoMessage`] type.
pub struct Codec<M: ProtoMessage, E> {
    inner: quick_protobuf_codec::Codec<M::Proto>,
    _marker: PhantomData<fn() -> (M, E)>,
}

impl<M: ProtoMessage, E> Codec<M, E> {
    /// Creates a codec rejecting frames larger than `max_message_size` bytes.
    pub fn new(max_message_size: usize) -> Self {
        Self {
            inner: quick_protobuf_codec::Codec::new(max_message_size),
            _marker: PhantomData,
        }
    }
}

impl<M, E> Encoder for Codec<M, E>
where
    M: ProtoMessage,
    E: From<quick_protobuf_codec::Error> + From<io::Error>,
{
    type Item<'a> = M;
    type Error = E;

    fn encode(&mut self, item: Self::Item<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.inner.encode(item.into_proto(), dst).map_err(E::from)
    }
}

impl<M, E> Decoder for Codec<M, E>
where
    M: ProtoMessage,
    E: From<M::DecodeError> + From<quick_protobuf_codec::Error> + From<io::Error>,
{
    type Item = M;
    type Error = E;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(proto) => M::from_proto(proto).map(Some).map_err(E::from),
            None => Ok(None),
        }
    }
}

/// Appends `message` to `dst` as one length-delimited frame.
pub fn write_frame<M, E>(message: M, max_message_size: usize, dst: &mut BytesMut) -> Result<(), E>
where
    M: ProtoMessage,
    E: From<quick_protobuf_codec::Error> + From<io::Error>,
{
    Codec::<M, E>::new(max_message_size).encode(message, dst)
}

/// Takes the next complete frame off the front of `src`.
///
/// A buffer ending mid-frame is an [`io::ErrorKind::UnexpectedEof`] error.
pub fn read_frame<M, E>(src: &mut BytesMut, max_message_size: usize) -> Result<M, E>
where
    M: ProtoMessage,
    E: From<M::DecodeError> + From<quick_protobuf_codec::Error> + From<io::Error>,
{
    Codec::<M, E>::new(max_message_size)
        .decode(src)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "truncated frame").into())
}

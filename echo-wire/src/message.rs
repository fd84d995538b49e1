use crate::constants::ECHO_MAGIC;

/// Enum representing the kind of an echo protocol frame.
///
/// Carried on the wire as a `u32` inside [`CallHeader`] so both codecs encode
/// it identically.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum MessageKind {
    /// Unary echo request.
    Echo = 1,
    /// Reply to a unary echo request.
    EchoAck = 2,
    /// Request for a server-paced stream of chunks.
    Pull = 3,
    /// One chunk of a pull stream.
    PullChunk = 4,
    /// End-of-stream marker for a pull stream.
    PullEnd = 5,
    /// Opens a client-paced push stream.
    PushOpen = 6,
    /// Acknowledges a push stream open.
    PushOpenAck = 7,
    /// One chunk of a push stream.
    PushChunk = 8,
    /// Acknowledges all push bytes received so far.
    PushAck = 9,
    /// Closes a push stream.
    PushClose = 10,
}

impl MessageKind {
    /// Converts a `u32` value to a `MessageKind` if possible.
    ///
    /// Returns `Some(MessageKind)` if the value matches a known kind,
    /// or `None` otherwise.
    const fn from_u32(value: u32) -> Option<Self> {
        match value {
            _ if value == Self::Echo as u32 => Some(Self::Echo),
            _ if value == Self::EchoAck as u32 => Some(Self::EchoAck),
            _ if value == Self::Pull as u32 => Some(Self::Pull),
            _ if value == Self::PullChunk as u32 => Some(Self::PullChunk),
            _ if value == Self::PullEnd as u32 => Some(Self::PullEnd),
            _ if value == Self::PushOpen as u32 => Some(Self::PushOpen),
            _ if value == Self::PushOpenAck as u32 => Some(Self::PushOpenAck),
            _ if value == Self::PushChunk as u32 => Some(Self::PushChunk),
            _ if value == Self::PushAck as u32 => Some(Self::PushAck),
            _ if value == Self::PushClose as u32 => Some(Self::PushClose),
            _ => None,
        }
    }
}

impl From<MessageKind> for u32 {
    /// Converts a `MessageKind` to its corresponding `u32` representation.
    #[inline]
    fn from(val: MessageKind) -> Self {
        val as Self
    }
}

impl TryFrom<u32> for MessageKind {
    type Error = ();

    /// Attempts to convert a `u32` to a `MessageKind`.
    ///
    /// Returns `Ok(MessageKind)` if the value matches a known kind,
    /// or `Err(())` otherwise.
    #[inline]
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_u32(value).ok_or(())
    }
}

/// Header serialization codec, tagged per frame in the preamble.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Codec {
    /// rkyv-archived header; the only codec that carries stream kinds.
    Rkyv = 1,
    /// JSON header for the legacy unary protocol.
    Json = 2,
}

impl Codec {
    const fn from_u8(value: u8) -> Option<Self> {
        match value {
            _ if value == Self::Rkyv as u8 => Some(Self::Rkyv),
            _ if value == Self::Json as u8 => Some(Self::Json),
            _ => None,
        }
    }
}

impl From<Codec> for u8 {
    #[inline]
    fn from(val: Codec) -> Self {
        val as Self
    }
}

impl TryFrom<u8> for Codec {
    type Error = ();

    #[inline]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(())
    }
}

/// Structure representing the header of one echo frame.
///
/// Serializable with `rkyv` for the framed protocol and with `serde` for the
/// JSON protocol; the two encodings never mix within one connection.
#[derive(
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Debug,
)]
#[rkyv(derive(Debug))]
pub struct CallHeader {
    /// Magic number for frame validation.
    pub magic: u32,
    /// Correlation id matching replies (and stream frames) to their call.
    pub seq: u64,
    /// Frame kind as a `u32` (see [`MessageKind`]).
    pub kind: u32,
    /// Request payload when it rides in the header body rather than as an
    /// attachment; echoed back verbatim in the reply.
    pub body: Vec<u8>,
    /// On a push chunk, asks the server to acknowledge bytes received.
    pub want_ack: bool,
    /// Chunk granularity for a pull stream, in bytes.
    pub chunk_size: u32,
    /// Pull: total bytes requested. Push ack: total bytes received so far.
    pub total_size: u64,
}

impl CallHeader {
    /// Constructs a header for the given call with empty payload fields.
    #[must_use]
    pub const fn new(seq: u64, kind: MessageKind) -> Self {
        Self {
            magic: ECHO_MAGIC,
            seq,
            kind: kind as u32,
            body: Vec::new(),
            want_ack: false,
            chunk_size: 0,
            total_size: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_kind_u32_roundtrip() {
        for kind in [
            MessageKind::Echo,
            MessageKind::EchoAck,
            MessageKind::Pull,
            MessageKind::PullChunk,
            MessageKind::PullEnd,
            MessageKind::PushOpen,
            MessageKind::PushOpenAck,
            MessageKind::PushChunk,
            MessageKind::PushAck,
            MessageKind::PushClose,
        ] {
            let raw: u32 = kind.into();
            assert_eq!(MessageKind::try_from(raw), Ok(kind));
        }
        assert_eq!(MessageKind::try_from(0), Err(()));
        assert_eq!(MessageKind::try_from(11), Err(()));
    }

    #[test]
    fn codec_u8_roundtrip() {
        assert_eq!(Codec::try_from(u8::from(Codec::Rkyv)), Ok(Codec::Rkyv));
        assert_eq!(Codec::try_from(u8::from(Codec::Json)), Ok(Codec::Json));
        assert_eq!(Codec::try_from(0), Err(()));
        assert_eq!(Codec::try_from(3), Err(()));
    }

    #[test]
    fn new_header_carries_magic() {
        let header = CallHeader::new(7, MessageKind::Echo);
        assert_eq!(header.magic, ECHO_MAGIC);
        assert_eq!(header.seq, 7);
        assert_eq!(MessageKind::try_from(header.kind), Ok(MessageKind::Echo));
        assert!(header.body.is_empty());
    }
}

//! Frame codec for the echo protocol.
//!
//! Every frame starts with a fixed 16-byte preamble:
//!
//! ```text
//! [magic: u32 BE][codec: u8][reserved: 3B][header_len: u32 BE][attachment_len: u32 BE]
//! ```
//!
//! followed by the encoded [`CallHeader`] and then the raw attachment bytes.
//! The attachment is never copied into the header, so bulk payloads ride the
//! wire without re-serialization.

use std::io::{self, Read, Write};

use rkyv::rancor::Error as RkyvError;
use rkyv::util::AlignedVec;
use thiserror::Error;

use crate::constants::{ECHO_MAGIC, MAX_ATTACHMENT_LEN, MAX_HEADER_LEN};
use crate::message::{ArchivedCallHeader, CallHeader, Codec};

/// Size of the fixed frame preamble in bytes.
pub const PREAMBLE_LEN: usize = 16;

/// Errors produced while encoding or decoding frames.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("bad frame magic: {0:#010x}")]
    BadMagic(u32),

    #[error("unknown codec tag: {0}")]
    UnknownCodec(u8),

    #[error("header length {0} exceeds cap {MAX_HEADER_LEN}")]
    HeaderTooLarge(u32),

    #[error("attachment length {0} exceeds cap {MAX_ATTACHMENT_LEN}")]
    AttachmentTooLarge(u32),

    #[error("header encode failed: {0}")]
    Encode(String),

    #[error("header decode failed: {0}")]
    Decode(String),
}

/// One decoded frame: its header, attachment bytes, and the codec it arrived
/// in (so a responder can reply in kind).
#[derive(Debug)]
pub struct Frame {
    pub header: CallHeader,
    pub attachment: Vec<u8>,
    pub codec: Codec,
}

impl Frame {
    /// Total payload bytes carried by this frame, body plus attachment.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.header.body.len() + self.attachment.len()
    }
}

fn encode_header(codec: Codec, header: &CallHeader) -> Result<Vec<u8>, WireError> {
    match codec {
        Codec::Rkyv => rkyv::to_bytes::<RkyvError>(header)
            .map(|bytes| bytes.to_vec())
            .map_err(|e| WireError::Encode(e.to_string())),
        Codec::Json => serde_json::to_vec(header).map_err(|e| WireError::Encode(e.to_string())),
    }
}

fn decode_header(codec: Codec, bytes: &[u8]) -> Result<CallHeader, WireError> {
    match codec {
        Codec::Rkyv => {
            let archived = rkyv::access::<ArchivedCallHeader, RkyvError>(bytes)
                .map_err(|e| WireError::Decode(e.to_string()))?;
            rkyv::deserialize::<CallHeader, RkyvError>(archived)
                .map_err(|e| WireError::Decode(e.to_string()))
        }
        Codec::Json => serde_json::from_slice(bytes).map_err(|e| WireError::Decode(e.to_string())),
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Writes one frame. The three writes happen back to back, so callers that
/// share a writer must serialize whole-frame writes externally.
pub fn write_frame<W: Write>(
    writer: &mut W,
    codec: Codec,
    header: &CallHeader,
    attachment: &[u8],
) -> Result<(), WireError> {
    let header_bytes = encode_header(codec, header)?;
    if header_bytes.len() > MAX_HEADER_LEN as usize {
        return Err(WireError::HeaderTooLarge(header_bytes.len() as u32));
    }
    if attachment.len() > MAX_ATTACHMENT_LEN as usize {
        return Err(WireError::AttachmentTooLarge(attachment.len() as u32));
    }

    let mut preamble = [0u8; PREAMBLE_LEN];
    preamble[0..4].copy_from_slice(&ECHO_MAGIC.to_be_bytes());
    preamble[4] = codec.into();
    preamble[8..12].copy_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    preamble[12..16].copy_from_slice(&(attachment.len() as u32).to_be_bytes());

    writer.write_all(&preamble)?;
    writer.write_all(&header_bytes)?;
    writer.write_all(attachment)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame, validating the magic and the length caps before
/// allocating buffers.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame, WireError> {
    let mut preamble = [0u8; PREAMBLE_LEN];
    reader.read_exact(&mut preamble)?;

    let magic = be_u32(&preamble[0..4]);
    if magic != ECHO_MAGIC {
        return Err(WireError::BadMagic(magic));
    }
    let codec = Codec::try_from(preamble[4]).map_err(|()| WireError::UnknownCodec(preamble[4]))?;
    let header_len = be_u32(&preamble[8..12]);
    let attachment_len = be_u32(&preamble[12..16]);
    if header_len > MAX_HEADER_LEN {
        return Err(WireError::HeaderTooLarge(header_len));
    }
    if attachment_len > MAX_ATTACHMENT_LEN {
        return Err(WireError::AttachmentTooLarge(attachment_len));
    }

    // rkyv access requires an aligned buffer, so headers land in an
    // AlignedVec regardless of codec.
    let mut header_buf: AlignedVec = AlignedVec::new();
    header_buf.resize(header_len as usize, 0);
    reader.read_exact(header_buf.as_mut_slice())?;
    let header = decode_header(codec, header_buf.as_slice())?;

    let mut attachment = vec![0u8; attachment_len as usize];
    reader.read_exact(&mut attachment)?;

    Ok(Frame {
        header,
        attachment,
        codec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    fn roundtrip(codec: Codec, header: CallHeader, attachment: &[u8]) -> Frame {
        let mut buf = Vec::new();
        write_frame(&mut buf, codec, &header, attachment).expect("write");
        let mut cursor = io::Cursor::new(buf);
        read_frame(&mut cursor).expect("read")
    }

    #[test]
    fn rkyv_frame_roundtrip() {
        let mut header = CallHeader::new(42, MessageKind::Echo);
        header.body = vec![1, 2, 3, 4, 5];
        let frame = roundtrip(Codec::Rkyv, header, b"attach");

        assert_eq!(frame.codec, Codec::Rkyv);
        assert_eq!(frame.header.seq, 42);
        assert_eq!(MessageKind::try_from(frame.header.kind), Ok(MessageKind::Echo));
        assert_eq!(frame.header.body, vec![1, 2, 3, 4, 5]);
        assert_eq!(frame.attachment, b"attach");
        assert_eq!(frame.payload_len(), 11);
    }

    #[test]
    fn json_frame_roundtrip() {
        let mut header = CallHeader::new(7, MessageKind::Pull);
        header.chunk_size = 1024;
        header.total_size = 1 << 20;
        let frame = roundtrip(Codec::Json, header, &[]);

        assert_eq!(frame.codec, Codec::Json);
        assert_eq!(frame.header.chunk_size, 1024);
        assert_eq!(frame.header.total_size, 1 << 20);
        assert!(frame.attachment.is_empty());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = Vec::new();
        write_frame(&mut buf, Codec::Rkyv, &CallHeader::new(1, MessageKind::Echo), &[])
            .expect("write");
        buf[0] ^= 0xff;
        let mut cursor = io::Cursor::new(buf);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(WireError::BadMagic(_))
        ));
    }

    #[test]
    fn rejects_unknown_codec() {
        let mut buf = Vec::new();
        write_frame(&mut buf, Codec::Rkyv, &CallHeader::new(1, MessageKind::Echo), &[])
            .expect("write");
        buf[4] = 0x7f;
        let mut cursor = io::Cursor::new(buf);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(WireError::UnknownCodec(0x7f))
        ));
    }

    #[test]
    fn rejects_oversized_header_length() {
        let mut buf = Vec::new();
        write_frame(&mut buf, Codec::Rkyv, &CallHeader::new(1, MessageKind::Echo), &[])
            .expect("write");
        buf[8..12].copy_from_slice(&u32::MAX.to_be_bytes());
        let mut cursor = io::Cursor::new(buf);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(WireError::HeaderTooLarge(_))
        ));
    }

    #[test]
    fn truncated_frame_is_io_error() {
        let mut buf = Vec::new();
        let mut header = CallHeader::new(3, MessageKind::Echo);
        header.body = vec![9; 64];
        write_frame(&mut buf, Codec::Rkyv, &header, b"xyz").expect("write");
        buf.truncate(buf.len() - 2);
        let mut cursor = io::Cursor::new(buf);
        assert!(matches!(read_frame(&mut cursor), Err(WireError::Io(_))));
    }
}

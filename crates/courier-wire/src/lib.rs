// Wire shapes and framing for receipt messages.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

// "CRW1" in ASCII.
pub const MAGIC: u32 = 0x43525731;
pub const VERSION: u16 = 1;

// Receipt batches are small; a frame claiming more than this is corrupt
// or hostile and is rejected before any allocation.
pub const MAX_PAYLOAD_LEN: usize = 1024 * 1024;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not a courier frame")]
    InvalidMagic,
    #[error("frame version {0} is not supported")]
    UnsupportedVersion(u16),
    #[error("payload of {0} bytes exceeds the frame limit")]
    FrameTooLarge(usize),
    #[error("truncated frame")]
    Incomplete,
    #[error("message could not be serialized")]
    Serialize(#[source] serde_json::Error),
    #[error("message could not be deserialized")]
    Deserialize(#[source] serde_json::Error),
}

/// A single read event: the sender of the message that was read and the
/// message timestamp identifying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub sender_id: String,
    pub timestamp: u64,
}

impl ReadReceipt {
    pub fn new(sender_id: impl Into<String>, timestamp: u64) -> Self {
        Self {
            sender_id: sender_id.into(),
            timestamp,
        }
    }
}

/// Envelope metadata for an inbound protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptType {
    Read,
    Delivery,
}

/// Decoded inbound receipt payload from a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptMessage {
    pub receipt_type: ReceiptType,
    pub timestamps: Vec<u64>,
}

/// Parsed frame header.
///
/// On the wire a header is ten big-endian bytes: the magic, the protocol
/// version, and the payload length. The magic is fixed and checked on
/// decode rather than carried around in parsed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u16,
    pub length: u32,
}

impl FrameHeader {
    pub const LEN: usize = 10;

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(MAGIC);
        buf.put_u16(self.version);
        buf.put_u32(self.length);
    }

    /// Consumes the header bytes from the front of `buf`.
    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        if buf.remaining() < Self::LEN {
            return Err(Error::Incomplete);
        }
        if buf.get_u32() != MAGIC {
            return Err(Error::InvalidMagic);
        }
        let version = buf.get_u16();
        if version != VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let length = buf.get_u32();
        Ok(Self { version, length })
    }
}

/// A framed payload: header plus opaque bytes.
///
/// ```
/// use bytes::Bytes;
/// use courier_wire::Frame;
///
/// let frame = Frame::new(Bytes::from_static(b"{}")).expect("frame");
/// let decoded = Frame::decode(frame.encode()).expect("decode");
/// assert_eq!(decoded.payload, Bytes::from_static(b"{}"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(payload: Bytes) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::FrameTooLarge(payload.len()));
        }
        Ok(Self {
            header: FrameHeader {
                version: VERSION,
                length: payload.len() as u32,
            },
            payload,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FrameHeader::LEN + self.payload.len());
        self.header.encode(&mut buf);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    pub fn decode(mut input: Bytes) -> Result<Self> {
        let header = FrameHeader::decode(&mut input)?;
        let length = header.length as usize;
        // Check the declared length against the cap before trusting it.
        if length > MAX_PAYLOAD_LEN {
            return Err(Error::FrameTooLarge(length));
        }
        if input.remaining() < length {
            return Err(Error::Incomplete);
        }
        let payload = input.split_to(length);
        Ok(Self { header, payload })
    }
}

/// Outbound receipt messages encoded in framed payloads.
///
/// ```
/// use courier_wire::{Message, ReadReceipt};
///
/// let message = Message::LinkedDeviceReadReceipts {
///     receipts: vec![ReadReceipt::new("alice", 100)],
/// };
/// let frame = message.encode().expect("encode");
/// let decoded = Message::decode(frame).expect("decode");
/// assert_eq!(message, decoded);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    // Sync message keeping the user's other devices up to date.
    LinkedDeviceReadReceipts { receipts: Vec<ReadReceipt> },
    // Batched receipt to one original sender; one message per sender.
    SenderReadReceipts { timestamps: Vec<u64> },
}

impl Message {
    pub fn encode(&self) -> Result<Frame> {
        let payload = serde_json::to_vec(self).map_err(Error::Serialize)?;
        Frame::new(Bytes::from(payload))
    }

    pub fn decode(frame: Frame) -> Result<Self> {
        serde_json::from_slice(&frame.payload).map_err(Error::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        let frame = Frame::new(Bytes::from_static(b"payload")).expect("frame");
        let decoded = Frame::decode(frame.encode()).expect("decode");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn frame_rejects_bad_magic() {
        let mut encoded = BytesMut::from(
            Frame::new(Bytes::from_static(b"x"))
                .expect("frame")
                .encode()
                .as_ref(),
        );
        encoded[0] = 0xFF;
        let err = Frame::decode(encoded.freeze()).expect_err("magic");
        assert!(matches!(err, Error::InvalidMagic));
    }

    #[test]
    fn frame_rejects_truncated_input() {
        let encoded = Frame::new(Bytes::from_static(b"payload"))
            .expect("frame")
            .encode();
        let truncated = encoded.slice(0..encoded.len() - 1);
        let err = Frame::decode(truncated).expect_err("truncated");
        assert!(matches!(err, Error::Incomplete));
    }

    #[test]
    fn frame_rejects_unknown_version() {
        let mut encoded = BytesMut::from(
            Frame::new(Bytes::from_static(b"x"))
                .expect("frame")
                .encode()
                .as_ref(),
        );
        // Version lives right after the 4-byte magic.
        encoded[4] = 0;
        encoded[5] = 9;
        let err = Frame::decode(encoded.freeze()).expect_err("version");
        assert!(matches!(err, Error::UnsupportedVersion(9)));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let payload = Bytes::from(vec![0u8; MAX_PAYLOAD_LEN + 1]);
        let err = Frame::new(payload).expect_err("too large");
        assert!(matches!(err, Error::FrameTooLarge(_)));
    }

    #[test]
    fn declared_length_beyond_cap_is_rejected() {
        // A header claiming u32::MAX bytes must fail the cap check, not
        // read as merely incomplete.
        let mut buf = BytesMut::with_capacity(FrameHeader::LEN);
        buf.put_u32(MAGIC);
        buf.put_u16(VERSION);
        buf.put_u32(u32::MAX);
        let err = Frame::decode(buf.freeze()).expect_err("beyond cap");
        assert!(matches!(err, Error::FrameTooLarge(_)));
    }

    #[test]
    fn sender_receipts_round_trip() {
        let message = Message::SenderReadReceipts {
            timestamps: vec![10, 20, 20, 30],
        };
        let frame = message.encode().expect("encode");
        assert_eq!(Message::decode(frame).expect("decode"), message);
    }

    #[test]
    fn receipt_message_deserializes_snake_case_type() {
        let decoded: ReceiptMessage =
            serde_json::from_str(r#"{"receipt_type":"read","timestamps":[1,2]}"#)
                .expect("deserialize");
        assert_eq!(decoded.receipt_type, ReceiptType::Read);
        assert_eq!(decoded.timestamps, vec![1, 2]);
    }
}

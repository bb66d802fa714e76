use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Frame header: big-endian payload length (2 bytes).
pub const HEADER_SIZE: usize = 2;

/// Largest payload a frame can carry, in bytes.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// One framed text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// UTF-16LE encoded text, at most [`MAX_PAYLOAD`] bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame carrying `text`, truncated to the maximum payload.
    pub fn from_text(text: &str) -> Self {
        Self {
            payload: encode_text(text),
        }
    }

    /// Decode the payload back into text.
    pub fn text(&self) -> String {
        decode_text(&self.payload)
    }
}

/// Encode text as UTF-16LE, keeping at most [`MAX_PAYLOAD`] bytes.
pub fn encode_text(text: &str) -> Bytes {
    let mut out = BytesMut::with_capacity((text.len() * 2).min(MAX_PAYLOAD + 1));
    for unit in text.encode_utf16() {
        if out.len() >= MAX_PAYLOAD {
            break;
        }
        out.put_u16_le(unit);
    }
    out.truncate(MAX_PAYLOAD);
    out.freeze()
}

/// Decode a UTF-16LE payload.
///
/// Unpaired surrogates and a dangling odd byte (left by truncation) decode
/// to U+FFFD.
pub fn decode_text(payload: &[u8]) -> String {
    let chunks = payload.chunks_exact(2);
    let dangling = !chunks.remainder().is_empty();
    let units = chunks.map(|pair| u16::from_le_bytes([pair[0], pair[1]]));

    let mut text: String = char::decode_utf16(units)
        .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    if dangling {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

/// Encode a payload into the wire format.
///
/// Payload bytes past [`MAX_PAYLOAD`] are dropped. Returns the number of
/// bytes appended to `dst` (header included).
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬──────────────────────┐
/// │ Length high  │ Length low   │ Payload              │
/// │ (1B)         │ (1B)         │ (Length bytes)       │
/// └──────────────┴──────────────┴──────────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> usize {
    let len = payload.len().min(MAX_PAYLOAD);
    dst.reserve(HEADER_SIZE + len);
    dst.put_u16(len as u16);
    dst.put_slice(&payload[..len]);
    HEADER_SIZE + len
}

/// Decode a frame from a buffer.
///
/// Returns `None` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Option<Frame> {
    if src.len() < HEADER_SIZE {
        return None;
    }

    let payload_len = usize::from(u16::from_be_bytes([src[0], src[1]]));
    if src.len() < HEADER_SIZE + payload_len {
        return None;
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    Some(Frame { payload })
}

/// Stream options for blocking frame I/O.
#[derive(Debug, Clone, Default)]
pub struct FrameConfig {
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_big_endian_length() {
        let mut buf = BytesMut::new();
        let payload = vec![7u8; 0x0102];
        let written = encode_frame(&payload, &mut buf);

        assert_eq!(written, HEADER_SIZE + 0x0102);
        assert_eq!(&buf[..2], &[0x01, 0x02]);
    }

    #[test]
    fn text_is_utf16_little_endian() {
        assert_eq!(encode_text("Ab").as_ref(), &[0x41, 0x00, 0x62, 0x00]);
        assert_eq!(encode_text("€").as_ref(), &[0xAC, 0x20]);
    }

    #[test]
    fn text_roundtrip_including_astral_chars() {
        for text in ["", "echo", "Grüße, 世界", "emoji 🦀 and 𝄞"] {
            let frame = Frame::from_text(text);
            assert_eq!(frame.text(), text);
        }
    }

    #[test]
    fn long_text_is_truncated_to_max_payload() {
        let text = "a".repeat(40_000);
        let payload = encode_text(&text);
        assert_eq!(payload.len(), MAX_PAYLOAD);

        let full: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert_eq!(payload.as_ref(), &full[..MAX_PAYLOAD]);

        let decoded = decode_text(&payload);
        assert!(decoded.starts_with(&"a".repeat(32_767)));
        assert!(decoded.ends_with(char::REPLACEMENT_CHARACTER));
    }

    #[test]
    fn text_at_exact_limit_is_not_truncated() {
        // 32,767 units = 65,534 bytes, the largest even payload.
        let text = "z".repeat(32_767);
        assert_eq!(Frame::from_text(&text).text(), text);
    }

    #[test]
    fn split_surrogate_decodes_to_replacement() {
        let crab: Vec<u8> = "🦀".encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert_eq!(decode_text(&crab[..2]), "\u{FFFD}");
    }

    #[test]
    fn decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x00][..]);
        assert!(decode_frame(&mut buf).is_none());
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello", &mut buf);
        buf.truncate(HEADER_SIZE + 2);

        assert!(decode_frame(&mut buf).is_none());
    }

    #[test]
    fn decode_consumes_exactly_one_frame() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf);
        encode_frame(b"second", &mut buf);

        let f1 = decode_frame(&mut buf).unwrap();
        assert_eq!(f1.payload.as_ref(), b"first");
        let f2 = decode_frame(&mut buf).unwrap();
        assert_eq!(f2.payload.as_ref(), b"second");
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_payload() {
        let mut buf = BytesMut::new();
        assert_eq!(encode_frame(b"", &mut buf), HEADER_SIZE);

        let frame = decode_frame(&mut buf).unwrap();
        assert!(frame.payload.is_empty());
    }
}

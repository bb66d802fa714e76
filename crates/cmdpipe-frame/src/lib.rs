//! Length-prefixed text framing for cmdpipe.
//!
//! Every message carries exactly one text payload:
//! - A 2-byte big-endian payload length
//! - The payload: the text encoded as UTF-16LE, at most 65,535 bytes
//!
//! Text longer than the maximum is truncated on write, never rejected.
//! Readers always get complete frames.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_io;

pub use codec::{
    decode_frame, decode_text, encode_frame, encode_text, Frame, FrameConfig, HEADER_SIZE,
    MAX_PAYLOAD,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_io::{AsyncFrameReader, AsyncFrameWriter};

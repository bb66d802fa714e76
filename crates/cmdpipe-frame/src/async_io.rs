//! Async frame I/O with optional cancellation.
//!
//! The plain `read_*`/`write_*` methods run to completion once started.
//! The `*_cancellable` variants give up as soon as the token fires, while
//! waiting for the header or the payload alike; the stream is then left
//! mid-frame and must be dropped by the caller.

use std::io::ErrorKind;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::codec::{encode_frame, encode_text, Frame, HEADER_SIZE, MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Reads complete frames from any `AsyncRead` stream.
pub struct AsyncFrameReader<T> {
    inner: T,
}

impl<T: AsyncRead + Unpin> AsyncFrameReader<T> {
    /// Create a new async frame reader.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Read exactly one frame.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        read_exact(&mut self.inner, &mut header).await?;
        let len = usize::from(u16::from_be_bytes(header));
        trace!(len, "read frame header");

        let mut payload = BytesMut::zeroed(len);
        read_exact(&mut self.inner, &mut payload).await?;
        Ok(Frame {
            payload: payload.freeze(),
        })
    }

    /// Read one frame and decode its text.
    pub async fn read_text(&mut self) -> Result<String> {
        self.read_frame().await.map(|frame| frame.text())
    }

    /// Read one frame unless `cancel` fires first.
    pub async fn read_frame_cancellable(&mut self, cancel: &CancellationToken) -> Result<Frame> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FrameError::Cancelled),
            frame = self.read_frame() => frame,
        }
    }

    /// Read one frame's text unless `cancel` fires first.
    pub async fn read_text_cancellable(&mut self, cancel: &CancellationToken) -> Result<String> {
        self.read_frame_cancellable(cancel)
            .await
            .map(|frame| frame.text())
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

async fn read_exact<T: AsyncRead + Unpin>(inner: &mut T, buf: &mut [u8]) -> Result<()> {
    match inner.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Err(FrameError::ConnectionClosed),
        Err(err) => Err(FrameError::Io(err)),
    }
}

/// Writes complete frames to any `AsyncWrite` stream.
pub struct AsyncFrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: AsyncWrite + Unpin> AsyncFrameWriter<T> {
    /// Create a new async frame writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(HEADER_SIZE + MAX_PAYLOAD),
        }
    }

    /// Encode `text` as one frame, write it and flush.
    ///
    /// Returns the number of bytes written, header included.
    pub async fn write_text(&mut self, text: &str) -> Result<usize> {
        self.send(encode_text(text)).await
    }

    /// Write a complete frame and flush.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<usize> {
        self.send(frame.payload.clone()).await
    }

    /// Write `text` as one frame unless `cancel` fires first.
    pub async fn write_text_cancellable(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let payload = encode_text(text);
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FrameError::Cancelled),
            written = self.send(payload) => written,
        }
    }

    async fn send(&mut self, payload: Bytes) -> Result<usize> {
        self.buf.clear();
        let total = encode_frame(&payload, &mut self.buf);
        self.inner.write_all(&self.buf).await.map_err(write_error)?;
        self.inner.flush().await.map_err(write_error)?;
        trace!(total, "wrote frame");
        Ok(total)
    }

    /// Flush pending bytes and close the write direction of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await.map_err(write_error)
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn write_error(err: std::io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::WriteZero | ErrorKind::BrokenPipe => FrameError::ConnectionClosed,
        _ => FrameError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::duplex;

    use super::*;

    #[tokio::test]
    async fn roundtrip_over_duplex() {
        let (client, server) = duplex(1024);
        let mut writer = AsyncFrameWriter::new(client);
        let mut reader = AsyncFrameReader::new(server);

        let written = writer.write_text("thread").await.unwrap();
        assert_eq!(written, HEADER_SIZE + 12);
        assert_eq!(reader.read_text().await.unwrap(), "thread");
    }

    #[tokio::test]
    async fn roundtrip_large_text_through_small_pipe() {
        let (client, server) = duplex(64);
        let text = "ß".repeat(20_000);
        let expected = text.clone();

        let send = tokio::spawn(async move {
            let mut writer = AsyncFrameWriter::new(client);
            writer.write_text(&text).await.unwrap()
        });
        let mut reader = AsyncFrameReader::new(server);
        assert_eq!(reader.read_text().await.unwrap(), expected);
        assert_eq!(send.await.unwrap(), HEADER_SIZE + 40_000);
    }

    #[tokio::test]
    async fn truncated_text_is_observed_by_reader() {
        let (client, server) = duplex(MAX_PAYLOAD + HEADER_SIZE);
        let mut writer = AsyncFrameWriter::new(client);
        let mut reader = AsyncFrameReader::new(server);

        let written = writer.write_text(&"q".repeat(33_000)).await.unwrap();
        assert_eq!(written, HEADER_SIZE + MAX_PAYLOAD);

        let frame = reader.read_frame().await.unwrap();
        assert_eq!(frame.payload.len(), MAX_PAYLOAD);
        assert!(frame.text().starts_with(&"q".repeat(32_767)));
    }

    #[tokio::test]
    async fn eof_mid_payload_is_connection_closed() {
        let (mut client, server) = duplex(64);
        client.write_all(&[0x00, 0x08, b'a', 0x00]).await.unwrap();
        drop(client);

        let mut reader = AsyncFrameReader::new(server);
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test]
    async fn cancellation_while_waiting_for_header() {
        let (_client, server) = duplex(64);
        let mut reader = AsyncFrameReader::new(server);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = reader.read_text_cancellable(&cancel).await.unwrap_err();
        assert!(matches!(err, FrameError::Cancelled));
    }

    #[tokio::test]
    async fn cancellation_while_waiting_for_payload() {
        let (mut client, server) = duplex(64);
        client.write_all(&[0x00, 0x04, b'h', 0x00]).await.unwrap();

        let mut reader = AsyncFrameReader::new(server);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = reader.read_frame_cancellable(&cancel).await.unwrap_err();
        assert!(matches!(err, FrameError::Cancelled));
    }

    #[tokio::test]
    async fn cancelled_token_does_not_write() {
        let (client, _server) = duplex(64);
        let mut writer = AsyncFrameWriter::new(client);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = writer
            .write_text_cancellable("late", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::Cancelled));
    }

    #[tokio::test]
    async fn shutdown_signals_end_of_stream() {
        let (client, server) = duplex(64);
        let mut writer = AsyncFrameWriter::new(client);
        writer.write_text("done").await.unwrap();
        writer.shutdown().await.unwrap();

        let mut reader = AsyncFrameReader::new(server);
        assert_eq!(reader.read_text().await.unwrap(), "done");
        assert!(matches!(
            reader.read_frame().await.unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }
}

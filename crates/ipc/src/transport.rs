//! Length-prefixed frame transport over any byte stream
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │ 4 bytes      │ N bytes                      │
//! │ length (BE)  │ frame body                   │
//! └──────────────┴──────────────────────────────┘
//! ```
//!
//! A body that fails to decode is consumed whole, so the stream stays in
//! sync and the next frame can still be read.

use std::io::ErrorKind;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use stride_protocol::{Frame, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE, ProtocolError, read_length_prefix};

use crate::error::{IpcError, Result};

/// Reads frames from a byte stream
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(8 * 1024),
        }
    }

    /// Read the next frame
    ///
    /// Returns `Ok(None)` when the peer closed the stream between frames.
    /// A malformed body yields `IpcError::Decode` and leaves the stream
    /// positioned at the next frame. An oversized length prefix cannot be
    /// skipped safely and is also reported as `Decode`; callers should
    /// treat it as fatal.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
        match self.inner.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(IpcError::Io(e)),
        }

        let len = read_length_prefix(&len_buf).unwrap_or(0) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(IpcError::Decode(ProtocolError::too_large(len)));
        }

        self.buf.clear();
        self.buf.resize(len, 0);
        self.inner.read_exact(&mut self.buf).await?;

        let body = self.buf.split().freeze();
        Frame::decode(body).map(Some).map_err(IpcError::Decode)
    }
}

/// Writes frames to a byte stream
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Encode and write one frame
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let encoded = frame.encode()?;
        self.write_encoded(&encoded).await
    }

    /// Write an already encoded frame (length prefix included)
    pub async fn write_encoded(&mut self, encoded: &Bytes) -> Result<()> {
        self.inner.write_all(encoded).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Close the write half so the peer reads end of stream
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;

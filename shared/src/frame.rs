//! Length-prefixed framing for JSON messages over a byte stream
//!
//! Every frame is a big-endian `u16` payload length followed by the payload.
//! The reader keeps partially received frames in an internal buffer, so
//! `read_frame` can be raced against a timer without losing data.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const HEADER_LEN: usize = std::mem::size_of::<u16>();

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Frame of {0} bytes exceeds the limit of {1} bytes")]
    FrameLength(usize, usize),
    #[error("Connection reset by peer")]
    ConnectionReset,
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct FrameReader<R> {
    stream: R,
    buffer: BytesMut,
    max_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(stream: R, max_len: usize) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(256),
            max_len,
        }
    }

    /// Reads the next frame payload.
    ///
    /// Returns `Ok(None)` when the peer closed the stream between frames.
    pub async fn read_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                } else {
                    // Closed halfway through a frame
                    return Err(FrameError::ConnectionReset);
                }
            }
        }
    }

    fn parse_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        let len = u16::from_be_bytes([self.buffer[0], self.buffer[1]]) as usize;
        if len > self.max_len {
            return Err(FrameError::FrameLength(len, self.max_len));
        }
        if self.buffer.len() < HEADER_LEN + len {
            self.buffer.reserve(HEADER_LEN + len - self.buffer.len());
            return Ok(None);
        }

        self.buffer.advance(HEADER_LEN);
        Ok(Some(self.buffer.split_to(len).freeze()))
    }
}

pub struct FrameWriter<W> {
    stream: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(stream: W) -> Self {
        Self { stream }
    }

    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), FrameError> {
        if payload.len() > u16::MAX as usize {
            return Err(FrameError::FrameLength(payload.len(), u16::MAX as usize));
        }

        let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        frame.extend_from_slice(payload);

        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), FrameError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

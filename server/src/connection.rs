//! Outbound half of a client connection, shared between the session's own
//! handler and whichever task is broadcasting

use crate::error::SessionError;
use shared::FrameWriter;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio::time::timeout;

pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Cheap to clone; every clone refers to the same connection.
///
/// Writes go through a per-connection lock so a ping from the session's own
/// handler and a broadcast from another handler never interleave frames.
#[derive(Clone)]
pub struct SessionHandle {
    writer: Arc<Mutex<FrameWriter<BoxedWriter>>>,
    closed: Arc<Notify>,
}

impl SessionHandle {
    pub fn new<W>(stream: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: Arc::new(Mutex::new(FrameWriter::new(Box::new(stream) as BoxedWriter))),
            closed: Arc::new(Notify::new()),
        }
    }

    /// Sends one frame. The limit covers waiting for the writer lock as well
    /// as the write itself.
    pub async fn send(&self, payload: &[u8], limit: Duration) -> Result<(), SessionError> {
        let write = async {
            let mut writer = self.writer.lock().await;
            writer.write_frame(payload).await
        };

        match timeout(limit, write).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SessionError::SendTimeout),
        }
    }

    /// Takes the writer for exclusive use. Every other `send` on this
    /// connection waits until the returned guard is dropped.
    pub async fn lock(&self) -> LockedWriter<'_> {
        LockedWriter {
            guard: self.writer.lock().await,
        }
    }

    /// Asks the session's handler to stop.
    pub fn close(&self) {
        self.closed.notify_one();
    }

    /// Resolves once `close` has been called, even if it was called earlier.
    pub async fn closed(&self) {
        self.closed.notified().await;
    }

    /// Shuts down the write direction of the connection.
    pub async fn shutdown(&self, limit: Duration) {
        let shutdown = async {
            let mut writer = self.writer.lock().await;
            writer.shutdown().await
        };
        let _ = timeout(limit, shutdown).await;
    }
}

pub struct LockedWriter<'a> {
    guard: MutexGuard<'a, FrameWriter<BoxedWriter>>,
}

impl LockedWriter<'_> {
    pub async fn send(&mut self, payload: &[u8], limit: Duration) -> Result<(), SessionError> {
        match timeout(limit, self.guard.write_frame(payload)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SessionError::SendTimeout),
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}

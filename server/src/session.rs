//! Per-connection session handler
//!
//! Each accepted connection runs one [`ClientSession`] on its own task:
//! - Registration and the welcome message
//! - Position updates, collision and the broadcast that follows
//! - Keepalive pings when the peer goes quiet
//! - Deregistration when the session ends, however it ends

use crate::broadcast::Broadcaster;
use crate::connection::SessionHandle;
use crate::error::SessionError;
use crate::registry::Registry;
use log::{debug, info, warn};
use shared::{FrameReader, PositionUpdate, ServerMessage, SessionId, MAX_CLIENT_FRAME};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;

/// Everything a session needs from the server, shared by all sessions
#[derive(Clone)]
pub struct SessionContext {
    pub registry: Registry,
    pub broadcaster: Broadcaster,
    pub recv_timeout: Duration,
    pub send_timeout: Duration,
}

/// Why a session left the active state
#[derive(Debug)]
pub enum CloseReason {
    /// The peer closed its end of the connection
    PeerClosed,
    /// A broadcast to this session failed and it was pruned
    Pruned,
    /// The server is shutting down
    Shutdown,
    Error(SessionError),
}

/// Takes a freshly accepted socket and serves it until the session ends.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    ctx: SessionContext,
    shutdown: watch::Receiver<bool>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
    }
    let (read_half, write_half) = stream.into_split();

    let reason = match ClientSession::start(read_half, write_half, ctx).await {
        Ok(session) => {
            info!("Session {} opened for {}", session.id, addr);
            session.run(shutdown).await
        }
        Err(reason) => reason,
    };
    info!("Connection from {} closed: {:?}", addr, reason);
}

pub struct ClientSession<R> {
    id: SessionId,
    reader: FrameReader<R>,
    handle: SessionHandle,
    ctx: SessionContext,
    closed: bool,
}

impl<R: AsyncRead + Unpin> ClientSession<R> {
    /// Registers the session and sends the welcome message.
    ///
    /// If the welcome cannot be delivered the session is deregistered again
    /// and the failure returned.
    pub async fn start<W>(reader: R, writer: W, ctx: SessionContext) -> Result<Self, CloseReason>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let handle = SessionHandle::new(writer);

        // Broadcasts can reach the session as soon as it is registered, so
        // the writer stays locked until the welcome has been written.
        let welcome_handle = handle.clone();
        let mut first_frame = welcome_handle.lock().await;
        let welcome = ctx.registry.register(handle.clone()).await;

        let session = Self {
            id: welcome.player_id,
            reader: FrameReader::new(reader, MAX_CLIENT_FRAME),
            handle,
            ctx,
            closed: false,
        };

        let sent = match ServerMessage::Welcome(welcome).to_json() {
            Ok(payload) => first_frame.send(&payload, session.ctx.send_timeout).await,
            Err(e) => Err(SessionError::from(e)),
        };
        drop(first_frame);

        match sent {
            Ok(()) => Ok(session),
            Err(e) => {
                warn!("Failed to welcome session {}: {}", session.id, e);
                let reason = CloseReason::Error(e);
                session.close(&reason).await;
                Err(reason)
            }
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Takes ownership of self so cleanup runs exactly once when the loop ends.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) -> CloseReason {
        let reason = self.run_active(shutdown).await;
        self.close(&reason).await;
        reason
    }

    async fn run_active(&mut self, mut shutdown: watch::Receiver<bool>) -> CloseReason {
        if *shutdown.borrow() {
            return CloseReason::Shutdown;
        }

        loop {
            let received = tokio::select! {
                _ = shutdown.changed() => return CloseReason::Shutdown,
                _ = self.handle.closed() => return CloseReason::Pruned,
                received = timeout(self.ctx.recv_timeout, self.reader.read_frame()) => received,
            };

            match received {
                Ok(Ok(Some(frame))) => match self.handle_message(&frame).await {
                    Ok(()) => {}
                    Err(e) if e.is_fatal() => return CloseReason::Error(e),
                    Err(e) => warn!("Session {}: {}", self.id, e),
                },
                Ok(Ok(None)) => return CloseReason::PeerClosed,
                Ok(Err(e)) => return CloseReason::Error(e.into()),
                Err(_) => {
                    debug!("Session {} idle, sending ping", self.id);
                    if let Err(e) = self.send_ping().await {
                        return CloseReason::Error(e);
                    }
                }
            }
        }
    }

    /// Applies one position update and broadcasts the resulting world.
    async fn handle_message(&mut self, frame: &[u8]) -> Result<(), SessionError> {
        let update = PositionUpdate::from_json(frame)?;
        let position = update.clamped();

        let Some(collected) = self.ctx.registry.apply_move(self.id, position).await else {
            // Pruned by a broadcast; the close signal is already pending.
            return Ok(());
        };

        if !collected.is_empty() {
            info!(
                "Session {} collected {} item(s) at ({}, {})",
                self.id,
                collected.len(),
                position.x,
                position.y
            );
        }

        let snapshot = self.ctx.registry.snapshot().await;
        self.ctx.broadcaster.broadcast(snapshot).await;
        Ok(())
    }

    async fn send_ping(&self) -> Result<(), SessionError> {
        let payload = ServerMessage::ping().to_json()?;
        self.send(&payload).await
    }

    async fn send(&self, payload: &[u8]) -> Result<(), SessionError> {
        self.handle.send(payload, self.ctx.send_timeout).await
    }

    async fn close(mut self, reason: &CloseReason) {
        self.closed = true;
        self.ctx.registry.remove(self.id).await;
        self.handle.shutdown(self.ctx.send_timeout).await;
        debug!("Session {} cleaned up ({:?})", self.id, reason);
    }
}

impl<R> Drop for ClientSession<R> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        // Only reached if the task was cancelled or panicked before `close`.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let registry = self.ctx.registry.clone();
            let id = self.id;
            runtime.spawn(async move {
                registry.remove(id).await;
            });
        }
    }
}

//! Server network layer: the TCP acceptor and session task supervision

use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::registry::Registry;
use crate::session::{self, SessionContext};
use log::{error, info};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Main server owning the listening socket and the shared world
pub struct Server {
    listener: TcpListener,
    registry: Registry,
    ctx: SessionContext,
}

impl Server {
    /// Binds to `config.addr` with a freshly seeded world.
    pub async fn bind(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new(config.item_count, config.seed);
        Self::bind_with_registry(config, registry).await
    }

    /// Binds to `config.addr` serving an existing world.
    pub async fn bind_with_registry(
        config: ServerConfig,
        registry: Registry,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&config.addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let ctx = SessionContext {
            registry: registry.clone(),
            broadcaster: Broadcaster::new(registry.clone(), config.send_timeout),
            recv_timeout: config.recv_timeout,
            send_timeout: config.send_timeout,
        };

        Ok(Server {
            listener,
            registry,
            ctx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Accepts connections until `shutdown` flips to true, then waits for
    /// every session task to finish its cleanup.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut sessions = JoinSet::new();

        info!("Server started successfully");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                },

                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            info!("Client connecting from {}", addr);
                            sessions.spawn(session::handle_connection(
                                stream,
                                addr,
                                self.ctx.clone(),
                                shutdown.clone(),
                            ));
                        }
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                // Reap finished sessions so the set does not grow without bound.
                Some(finished) = sessions.join_next() => {
                    if let Err(e) = finished {
                        error!("Session task failed: {}", e);
                    }
                },
            }
        }

        info!(
            "Server shutting down, closing {} session(s)",
            self.registry.len().await
        );
        while let Some(finished) = sessions.join_next().await {
            if let Err(e) = finished {
                error!("Session task failed: {}", e);
            }
        }
        info!("Server stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            seed: Some(1),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = Server::bind(test_config()).await.unwrap();
        let addr = server.local_addr().unwrap();

        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
        assert_eq!(server.registry().snapshot().await.items.len(), 10);
    }

    #[tokio::test]
    async fn test_bind_invalid_address() {
        let config = ServerConfig {
            addr: "not an address".to_string(),
            ..ServerConfig::default()
        };
        assert!(Server::bind(config).await.is_err());
    }

    #[tokio::test]
    async fn test_accept_and_shutdown() {
        let server = Server::bind(test_config()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let registry = server.registry();
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(server.run(rx));

        let _client = tokio::net::TcpStream::connect(addr).await.unwrap();
        for _ in 0..100 {
            if registry.len().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(registry.len().await, 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("server should stop after shutdown")
            .unwrap();
        assert!(registry.is_empty().await);
    }
}

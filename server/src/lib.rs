//! # Ball Collector Server Library
//!
//! This library provides the authoritative server for a small real-time
//! multiplayer game. Players walk around a 800×600 world collecting balls;
//! the server owns the positions, the balls and the scores, and pushes the
//! whole world to every client whenever someone moves.
//!
//! ## Core Responsibilities
//!
//! ### Session Management
//! Handles the complete lifecycle of client connections including:
//! - Registration with a sequential session id and a random spawn point
//! - Position updates, clamped to the world before they are stored
//! - Keepalive pings for quiet peers
//! - Deregistration on disconnect, error, failed broadcast or shutdown
//!
//! ### Collection
//! Every accepted move is tested against the ball pool. Each overlapping ball
//! is worth one point and is immediately respawned somewhere else, so the
//! pool size never changes.
//!
//! ### State Broadcasting
//! After each move the current world is sent to every session. Peers that
//! cannot take the update within the send timeout are dropped on the spot.
//!
//! ## Architecture Design
//!
//! ### Task Per Connection
//! The acceptor spawns one task per client. All tasks share a single
//! [`registry::Registry`]; a move, its collisions and its score change are one
//! critical section, so snapshots are always consistent. Broadcasts copy the
//! recipient list out of the registry and send without holding the lock.
//!
//! ### TCP With Length-Prefixed JSON
//! Messages are JSON documents framed with a two-byte length prefix. Client
//! frames are capped at 1024 bytes.
//!
//! ## Module Organization
//!
//! - `config`: runtime settings
//! - `connection`: the shared write half of a client connection
//! - `registry`: sessions, items and snapshots behind one lock
//! - `items`: ball pool, spawning and collision
//! - `broadcast`: snapshot fan-out and pruning
//! - `session`: the per-connection state machine
//! - `network`: the acceptor and shutdown handling
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!
//!     let (shutdown_tx, shutdown_rx) = watch::channel(false);
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         let _ = shutdown_tx.send(true);
//!     });
//!
//!     server.run(shutdown_rx).await;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod error;
pub mod items;
pub mod network;
pub mod registry;
pub mod session;

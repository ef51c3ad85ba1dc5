//! Fan-out of world snapshots to every connected session

use crate::registry::{Registry, WorldSnapshot};
use log::{debug, error, warn};
use shared::{ServerMessage, SessionId};
use std::time::Duration;

#[derive(Clone)]
pub struct Broadcaster {
    registry: Registry,
    send_timeout: Duration,
}

impl Broadcaster {
    pub fn new(registry: Registry, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
        }
    }

    /// Sends `snapshot` to every registered session.
    ///
    /// Recipients are copied out of the registry first and the lock is
    /// released before any I/O. A session whose send fails or times out is
    /// removed at once and its handler is told to close. Returns the ids that
    /// were pruned.
    pub async fn broadcast(&self, snapshot: WorldSnapshot) -> Vec<SessionId> {
        let payload = match ServerMessage::State(snapshot.into()).to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize world state: {}", e);
                return Vec::new();
            }
        };

        let recipients = self.registry.recipients().await;
        debug!(
            "Broadcasting {} bytes to {} sessions",
            payload.len(),
            recipients.len()
        );

        let mut pruned = Vec::new();
        for (id, handle) in recipients {
            if let Err(e) = handle.send(&payload, self.send_timeout).await {
                warn!("Dropping session {} after failed broadcast: {}", id, e);
                self.registry.remove(id).await;
                handle.close();
                pruned.push(id);
            }
        }

        pruned
    }
}

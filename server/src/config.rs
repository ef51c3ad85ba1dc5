use shared::DEFAULT_ITEM_COUNT;
use std::time::Duration;

/// Runtime settings for a server instance
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the acceptor binds to, e.g. `127.0.0.1:5555`
    pub addr: String,
    /// How long a session waits for data before probing the peer with a ping
    pub recv_timeout: Duration,
    /// Upper bound on any single send to a peer
    pub send_timeout: Duration,
    /// Number of collectible items in the world
    pub item_count: usize,
    /// Fixed RNG seed; `None` seeds from OS entropy
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5555".to_string(),
            recv_timeout: Duration::from_secs(1),
            send_timeout: Duration::from_secs(1),
            item_count: DEFAULT_ITEM_COUNT,
            seed: None,
        }
    }
}

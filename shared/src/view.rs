//! Client-side model of the world as last reported by the server

use crate::{Item, Position, ServerMessage, SessionId, StateUpdate, Welcome};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Everything a renderer needs to draw one frame.
#[derive(Debug, Clone)]
pub struct ClientView {
    pub player_id: Option<SessionId>,
    pub position: Position,
    pub players: BTreeMap<SessionId, Position>,
    pub items: Vec<Item>,
    pub scores: BTreeMap<SessionId, u32>,
    pub status: ConnectionStatus,
}

impl Default for ClientView {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientView {
    pub fn new() -> Self {
        Self {
            player_id: None,
            position: Position::new(400, 300),
            players: BTreeMap::new(),
            items: Vec::new(),
            scores: BTreeMap::new(),
            status: ConnectionStatus::Disconnected,
        }
    }

    /// Applies a message from the server. Keepalive probes leave the view untouched.
    pub fn apply(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Welcome(welcome) => self.apply_welcome(welcome),
            ServerMessage::State(state) => self.apply_state(state),
            ServerMessage::Ping(_) => {}
        }
    }

    fn apply_welcome(&mut self, welcome: Welcome) {
        self.player_id = Some(welcome.player_id);
        self.position = welcome.position;
        self.items = welcome.balls;
        self.players.clear();
        self.scores.clear();
        self.status = ConnectionStatus::Connected;
    }

    fn apply_state(&mut self, state: StateUpdate) {
        self.players = state.players;
        self.items = state.balls;
        self.scores = state.scores;
    }

    pub fn disconnect(&mut self) {
        self.status = ConnectionStatus::Disconnected;
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Score of the local player, zero until the server reports one.
    pub fn own_score(&self) -> u32 {
        self.player_id
            .and_then(|id| self.scores.get(&id).copied())
            .unwrap_or(0)
    }

    /// Every player except the local one.
    pub fn other_players(&self) -> impl Iterator<Item = (&SessionId, &Position)> {
        let own = self.player_id;
        self.players.iter().filter(move |(id, _)| Some(**id) != own)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn welcome(id: SessionId) -> ServerMessage {
        ServerMessage::Welcome(Welcome {
            player_id: id,
            position: Position::new(100, 100),
            balls: vec![Item {
                x: 200,
                y: 200,
                color: [0, 128, 255],
            }],
        })
    }

    #[test]
    fn test_view_starts_disconnected() {
        let view = ClientView::new();
        assert!(!view.is_connected());
        assert_eq!(view.player_id, None);
        assert_eq!(view.own_score(), 0);
    }

    #[test]
    fn test_welcome_connects() {
        let mut view = ClientView::new();
        view.apply(welcome(4));

        assert!(view.is_connected());
        assert_eq!(view.player_id, Some(4));
        assert_eq!(view.position, Position::new(100, 100));
        assert_eq!(view.items.len(), 1);
    }

    #[test]
    fn test_state_replaces_world() {
        let mut view = ClientView::new();
        view.apply(welcome(0));

        let mut state = StateUpdate::default();
        state.players.insert(0, Position::new(10, 10));
        state.players.insert(1, Position::new(20, 20));
        state.scores.insert(0, 3);
        state.scores.insert(1, 1);
        view.apply(ServerMessage::State(state));

        assert!(view.items.is_empty());
        assert_eq!(view.own_score(), 3);
        let others: Vec<_> = view.other_players().map(|(id, _)| *id).collect();
        assert_eq!(others, vec![1]);
    }

    #[test]
    fn test_ping_is_ignored() {
        let mut view = ClientView::new();
        view.apply(welcome(2));
        let items_before = view.items.clone();

        view.apply(ServerMessage::ping());

        assert_eq!(view.items, items_before);
        assert_eq!(view.player_id, Some(2));
        assert!(view.is_connected());
    }

    #[test]
    fn test_disconnect_keeps_last_world() {
        let mut view = ClientView::new();
        view.apply(welcome(1));
        view.disconnect();

        assert!(!view.is_connected());
        assert_eq!(view.items.len(), 1);
    }
}

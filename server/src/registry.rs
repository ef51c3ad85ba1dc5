//! Shared world state: connected sessions and the item pool
//!
//! Everything that more than one session task can touch lives behind a
//! single lock in [`Registry`]:
//! - Session ids, positions and scores
//! - The collectible item pool
//! - The RNG used for spawning
//!
//! A move, the collisions it causes and the resulting score change all happen
//! inside one critical section, so a [`WorldSnapshot`] never sees half of a
//! collection event.

use crate::connection::SessionHandle;
use crate::items::{random_spawn, Collected, ItemPool};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{Item, Position, Rect, SessionId, StateUpdate, Welcome};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Server-side state of one connected client
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub position: Position,
    pub score: u32,
    pub handle: SessionHandle,
}

/// Consistent copy of the world taken under the registry lock
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorldSnapshot {
    pub players: BTreeMap<SessionId, Position>,
    pub scores: BTreeMap<SessionId, u32>,
    pub items: Vec<Item>,
}

impl From<WorldSnapshot> for StateUpdate {
    fn from(snapshot: WorldSnapshot) -> Self {
        StateUpdate {
            players: snapshot.players,
            balls: snapshot.items,
            scores: snapshot.scores,
        }
    }
}

struct World {
    sessions: BTreeMap<SessionId, Session>,
    items: ItemPool,
    next_id: SessionId,
    rng: StdRng,
}

impl World {
    fn update_position(&mut self, id: SessionId, position: Position) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.position = position;
                true
            }
            None => false,
        }
    }

    fn record_score(&mut self, id: SessionId, delta: u32) -> Option<u32> {
        let session = self.sessions.get_mut(&id)?;
        session.score = session.score.saturating_add(delta);
        Some(session.score)
    }

    fn collect(&mut self, position: Position) -> Vec<Collected> {
        self.items.try_collect(Rect::player(position), &mut self.rng)
    }

    fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            players: self
                .sessions
                .values()
                .map(|session| (session.id, session.position))
                .collect(),
            scores: self
                .sessions
                .values()
                .map(|session| (session.id, session.score))
                .collect(),
            items: self.items.items().to_vec(),
        }
    }
}

/// Handle to the shared world; clones refer to the same state
#[derive(Clone)]
pub struct Registry {
    world: Arc<Mutex<World>>,
}

impl Registry {
    /// Creates a registry with `item_count` randomly placed items.
    pub fn new(item_count: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let items = ItemPool::new(item_count, &mut rng);
        Self::from_parts(items, rng)
    }

    /// Creates a registry with a known item layout.
    pub fn with_items(items: Vec<Item>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::from_parts(ItemPool::from_items(items), rng)
    }

    fn from_parts(items: ItemPool, rng: StdRng) -> Self {
        if items.is_empty() {
            warn!("Starting with no items, nothing can be collected");
        }
        Self {
            world: Arc::new(Mutex::new(World {
                sessions: BTreeMap::new(),
                items,
                next_id: 0,
                rng,
            })),
        }
    }

    /// Adds a session at a random spawn point with a score of zero.
    ///
    /// Returns everything the client needs to start: its id, its position
    /// and the current items.
    pub async fn register(&self, handle: SessionHandle) -> Welcome {
        let mut world = self.world.lock().await;

        let id = world.next_id;
        world.next_id += 1;
        let position = random_spawn(&mut world.rng);

        world.sessions.insert(
            id,
            Session {
                id,
                position,
                score: 0,
                handle,
            },
        );
        info!(
            "Session {} registered at ({}, {}), {} connected",
            id,
            position.x,
            position.y,
            world.sessions.len()
        );

        Welcome {
            player_id: id,
            position,
            balls: world.items.items().to_vec(),
        }
    }

    /// Stores a new position. Unknown ids are ignored; returns whether the
    /// session was present.
    pub async fn update_position(&self, id: SessionId, position: Position) -> bool {
        self.world.lock().await.update_position(id, position)
    }

    /// Adds to a session's score and returns the new total.
    pub async fn record_score(&self, id: SessionId, delta: u32) -> Option<u32> {
        self.world.lock().await.record_score(id, delta)
    }

    /// Moves a session and collects whatever items it now overlaps, crediting
    /// one point per item. All of it happens under one lock acquisition.
    ///
    /// Returns `None` if the session is no longer registered, in which case
    /// nothing is collected.
    pub async fn apply_move(&self, id: SessionId, position: Position) -> Option<Vec<Collected>> {
        let mut world = self.world.lock().await;

        if !world.update_position(id, position) {
            debug!("Ignoring move for unregistered session {}", id);
            return None;
        }

        let collected = world.collect(position);
        if !collected.is_empty() {
            world.record_score(id, collected.len() as u32);
        }
        Some(collected)
    }

    /// Removes a session and returns its connection handle. Removing an
    /// unknown or already removed id is a no-op.
    pub async fn remove(&self, id: SessionId) -> Option<SessionHandle> {
        let mut world = self.world.lock().await;
        let session = world.sessions.remove(&id)?;
        info!(
            "Session {} removed with score {}, {} connected",
            id,
            session.score,
            world.sessions.len()
        );
        Some(session.handle)
    }

    pub async fn snapshot(&self) -> WorldSnapshot {
        self.world.lock().await.snapshot()
    }

    /// Copies out every session's connection handle, so sending can happen
    /// without holding the registry lock.
    pub async fn recipients(&self) -> Vec<(SessionId, SessionHandle)> {
        self.world
            .lock()
            .await
            .sessions
            .values()
            .map(|session| (session.id, session.handle.clone()))
            .collect()
    }

    pub async fn contains(&self, id: SessionId) -> bool {
        self.world.lock().await.sessions.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.world.lock().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.world.lock().await.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{MAX_X, MAX_Y, SPAWN_MAX_X, SPAWN_MAX_Y, SPAWN_MIN_X, SPAWN_MIN_Y};

    fn test_handle() -> SessionHandle {
        SessionHandle::new(tokio::io::sink())
    }

    fn item_at(x: i32, y: i32) -> Item {
        Item {
            x,
            y,
            color: [200, 100, 0],
        }
    }

    #[tokio::test]
    async fn test_registry_creation() {
        let registry = Registry::new(10, Some(1));
        assert!(registry.is_empty().await);
        assert_eq!(registry.snapshot().await.items.len(), 10);
    }

    #[tokio::test]
    async fn test_register_assigns_sequential_ids() {
        let registry = Registry::new(10, Some(1));

        let first = registry.register(test_handle()).await;
        let second = registry.register(test_handle()).await;

        assert_eq!(first.player_id, 0);
        assert_eq!(second.player_id, 1);
        assert_eq!(registry.len().await, 2);
        assert_eq!(first.balls.len(), 10);
    }

    #[tokio::test]
    async fn test_ids_are_not_reused() {
        let registry = Registry::new(10, Some(1));

        let first = registry.register(test_handle()).await;
        registry.remove(first.player_id).await;
        let second = registry.register(test_handle()).await;

        assert_eq!(second.player_id, 1);
    }

    #[tokio::test]
    async fn test_register_spawns_in_area_with_zero_score() {
        let registry = Registry::new(10, Some(2));

        for _ in 0..50 {
            let welcome = registry.register(test_handle()).await;
            assert!((SPAWN_MIN_X..=SPAWN_MAX_X).contains(&welcome.position.x));
            assert!((SPAWN_MIN_Y..=SPAWN_MAX_Y).contains(&welcome.position.y));
            assert!(welcome.position.in_bounds());
        }

        let snapshot = registry.snapshot().await;
        assert!(snapshot.scores.values().all(|score| *score == 0));
    }

    #[tokio::test]
    async fn test_update_position() {
        let registry = Registry::with_items(vec![], Some(3));
        let id = registry.register(test_handle()).await.player_id;

        assert!(registry.update_position(id, Position::new(10, 20)).await);
        assert_eq!(
            registry.snapshot().await.players.get(&id),
            Some(&Position::new(10, 20))
        );
    }

    #[tokio::test]
    async fn test_update_position_of_removed_session_is_ignored() {
        let registry = Registry::with_items(vec![], Some(3));
        let id = registry.register(test_handle()).await.player_id;
        registry.remove(id).await;

        assert!(!registry.update_position(id, Position::new(10, 20)).await);
        assert!(registry.snapshot().await.players.is_empty());
    }

    #[tokio::test]
    async fn test_record_score() {
        let registry = Registry::with_items(vec![], Some(3));
        let id = registry.register(test_handle()).await.player_id;

        assert_eq!(registry.record_score(id, 1).await, Some(1));
        assert_eq!(registry.record_score(id, 2).await, Some(3));
        assert_eq!(registry.record_score(99, 1).await, None);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = Registry::with_items(vec![], Some(4));
        let a = registry.register(test_handle()).await.player_id;
        let b = registry.register(test_handle()).await.player_id;

        assert!(registry.remove(a).await.is_some());
        assert!(registry.remove(a).await.is_none());

        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(b).await);
        assert!(!registry.contains(a).await);
    }

    #[tokio::test]
    async fn test_apply_move_collects_item() {
        let registry = Registry::with_items(vec![item_at(105, 105), item_at(600, 500)], Some(5));
        let id = registry.register(test_handle()).await.player_id;

        let collected = registry.apply_move(id, Position::new(100, 100)).await.unwrap();

        assert_eq!(collected.len(), 1);
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.scores.get(&id), Some(&1));
        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(snapshot.items[0], collected[0].item);
        assert_eq!(snapshot.players.get(&id), Some(&Position::new(100, 100)));
    }

    #[tokio::test]
    async fn test_apply_move_multiple_items_scores_each() {
        let registry = Registry::with_items(
            vec![item_at(100, 100), item_at(120, 110), item_at(700, 500)],
            Some(6),
        );
        let id = registry.register(test_handle()).await.player_id;

        let collected = registry.apply_move(id, Position::new(100, 100)).await.unwrap();

        assert_eq!(collected.len(), 2);
        assert_eq!(registry.snapshot().await.scores.get(&id), Some(&2));
    }

    #[tokio::test]
    async fn test_apply_move_for_unknown_session() {
        let registry = Registry::with_items(vec![item_at(100, 100)], Some(7));

        assert!(registry.apply_move(42, Position::new(100, 100)).await.is_none());
        assert_eq!(registry.snapshot().await.items, vec![item_at(100, 100)]);
    }

    #[tokio::test]
    async fn test_scores_never_decrease() {
        let registry = Registry::new(10, Some(8));
        let id = registry.register(test_handle()).await.player_id;

        let mut last = 0;
        for x in (0..=MAX_X).step_by(10) {
            for y in (0..=MAX_Y).step_by(40) {
                let collected = registry.apply_move(id, Position::new(x, y)).await.unwrap();
                let score = *registry.snapshot().await.scores.get(&id).unwrap();
                assert_eq!(score, last + collected.len() as u32);
                last = score;
            }
        }
        assert!(last > 0);
        assert_eq!(registry.snapshot().await.items.len(), 10);
    }

    #[tokio::test]
    async fn test_snapshot_into_state_update() {
        let registry = Registry::with_items(vec![item_at(300, 300)], Some(9));
        let id = registry.register(test_handle()).await.player_id;
        registry.update_position(id, Position::new(5, 6)).await;

        let state: StateUpdate = registry.snapshot().await.into();

        assert_eq!(state.players.get(&id), Some(&Position::new(5, 6)));
        assert_eq!(state.scores.get(&id), Some(&0));
        assert_eq!(state.balls, vec![item_at(300, 300)]);
    }

    #[tokio::test]
    async fn test_recipients_match_sessions() {
        let registry = Registry::new(10, Some(10));
        let a = registry.register(test_handle()).await.player_id;
        let b = registry.register(test_handle()).await.player_id;

        let ids: Vec<SessionId> = registry.recipients().await.into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[tokio::test]
    async fn test_concurrent_moves_keep_invariants() {
        let registry = Registry::new(10, Some(11));
        let mut ids = Vec::new();
        for _ in 0..8 {
            ids.push(registry.register(test_handle()).await.player_id);
        }

        let mut tasks = tokio::task::JoinSet::new();
        for id in ids.clone() {
            let registry = registry.clone();
            tasks.spawn(async move {
                let mut total = 0;
                for step in 0..200 {
                    let pos = Position::clamped((step * 7 + id as i64 * 90) % 800, (step * 3) % 600);
                    total += registry.apply_move(id, pos).await.unwrap().len() as u32;
                }
                (id, total)
            });
        }

        let mut collected_by = BTreeMap::new();
        while let Some(result) = tasks.join_next().await {
            let (id, total) = result.unwrap();
            collected_by.insert(id, total);
        }

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.items.len(), 10);
        assert_eq!(snapshot.scores, collected_by);
        assert!(snapshot.players.values().all(|p| p.in_bounds()));
    }
}

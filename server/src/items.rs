//! Collectible items and player/item collision
//!
//! The pool has a fixed size for the lifetime of the server. Collecting an
//! item replaces it in place with a freshly spawned one, so indices stay
//! stable and the count never changes.

use rand::Rng;
use shared::{Item, Position, Rect, SPAWN_MAX_X, SPAWN_MAX_Y, SPAWN_MIN_X, SPAWN_MIN_Y};

/// One item picked up by a player, and what replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collected {
    pub index: usize,
    pub item: Item,
}

/// Uniformly random point inside the spawn area.
pub fn random_spawn<R: Rng + ?Sized>(rng: &mut R) -> Position {
    Position::new(
        rng.gen_range(SPAWN_MIN_X..=SPAWN_MAX_X),
        rng.gen_range(SPAWN_MIN_Y..=SPAWN_MAX_Y),
    )
}

pub fn random_item<R: Rng + ?Sized>(rng: &mut R) -> Item {
    let pos = random_spawn(rng);
    Item {
        x: pos.x,
        y: pos.y,
        color: rng.gen(),
    }
}

#[derive(Debug, Clone)]
pub struct ItemPool {
    items: Vec<Item>,
}

impl ItemPool {
    pub fn new<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Self {
        Self {
            items: (0..count).map(|_| random_item(rng)).collect(),
        }
    }

    pub fn from_items(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Collects every item overlapping `player` and respawns each one.
    ///
    /// Each overlapping item counts once, including items stacked on the
    /// same spot. Replacements are not tested against `player` in the same
    /// call.
    pub fn try_collect<R: Rng + ?Sized>(&mut self, player: Rect, rng: &mut R) -> Vec<Collected> {
        let mut collected = Vec::new();

        for (index, item) in self.items.iter_mut().enumerate() {
            if player.overlaps(&Rect::item(item)) {
                *item = random_item(rng);
                collected.push(Collected { index, item: *item });
            }
        }

        collected
    }
}

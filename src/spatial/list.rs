//! Flat list backend.
//!
//! No partitioning: insertion order is iteration and draw order, and every
//! query answers with the full population.

use crate::components::entity::EntityId;
use crate::components::geometry::Vec2;

#[derive(Debug, Clone, Default)]
pub struct ListBackend {
    items: Vec<(EntityId, Vec2)>,
}

impl ListBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: EntityId, pos: Vec2) {
        self.items.push((id, pos));
    }

    /// O(n) removal preserving the order of the remaining items.
    pub fn remove(&mut self, id: EntityId) -> bool {
        match self.items.iter().position(|(e, _)| *e == id) {
            Some(i) => {
                self.items.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn retain(&mut self, mut keep: impl FnMut(EntityId) -> bool) {
        self.items.retain(|(id, _)| keep(*id));
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, Vec2)> + '_ {
        self.items.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

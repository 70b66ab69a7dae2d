//! Spatial indexing backends for scene groups.
//!
//! A [`SpatialBackend`] stores the children of one scene group keyed by their
//! position at insertion time and answers rectangle range queries. Three
//! interchangeable strategies are provided:
//!
//! - [`list`] – flat insertion-ordered list; every query returns everything
//! - [`grid`] – uniform cells; queries visit only overlapping cells
//! - [`quadtree`] – recursive 4-way subdivision with handle-based removal
//!
//! All backends share one contract: `query_range(rect)` on Grid and Quadtree
//! returns exactly the entities whose indexed position lies in `rect`, which
//! equals filtering the List backend's full answer by `rect.contains`.
//!
//! Positions are snapshots. Moving an entity does not re-index it; call
//! [`SpatialBackend::rebuild`] (through
//! [`Scene::reindex`](crate::scene::Scene::reindex)) once per tick when
//! entities in a Grid or Quadtree group move.

pub mod grid;
pub mod list;
pub mod quadtree;

use crate::components::entity::EntityId;
use crate::components::geometry::{Rect, Vec2};

use self::grid::{CellKey, GridBackend};
use self::list::ListBackend;
use self::quadtree::{QuadHandle, QuadtreeBackend};

/// Which strategy a backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    List,
    Grid,
    Quadtree,
}

/// Where a backend filed an entity, returned by [`SpatialBackend::insert`]
/// and required by [`SpatialBackend::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSlot {
    List,
    Grid(CellKey),
    Quad(QuadHandle),
}

/// Tagged union over the three indexing strategies.
#[derive(Debug, Clone)]
pub enum SpatialBackend {
    List(ListBackend),
    Grid(GridBackend),
    Quadtree(QuadtreeBackend),
}

impl Default for SpatialBackend {
    fn default() -> Self {
        SpatialBackend::list()
    }
}

impl SpatialBackend {
    pub fn list() -> Self {
        SpatialBackend::List(ListBackend::new())
    }

    pub fn grid(cell_size: f32) -> Self {
        SpatialBackend::Grid(GridBackend::new(cell_size))
    }

    /// Quadtree over `bounds` with default capacity and depth limits.
    pub fn quadtree(bounds: Rect) -> Self {
        SpatialBackend::Quadtree(QuadtreeBackend::new(
            bounds,
            QuadtreeBackend::DEFAULT_CAPACITY,
            QuadtreeBackend::DEFAULT_MAX_DEPTH,
        ))
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            SpatialBackend::List(_) => BackendKind::List,
            SpatialBackend::Grid(_) => BackendKind::Grid,
            SpatialBackend::Quadtree(_) => BackendKind::Quadtree,
        }
    }

    /// Index `id` at `pos`.
    pub fn insert(&mut self, id: EntityId, pos: Vec2) -> BackendSlot {
        match self {
            SpatialBackend::List(b) => {
                b.insert(id, pos);
                BackendSlot::List
            }
            SpatialBackend::Grid(b) => BackendSlot::Grid(b.insert(id, pos)),
            SpatialBackend::Quadtree(b) => BackendSlot::Quad(b.insert(id, pos)),
        }
    }

    /// Remove `id`, filed under `slot`. A slot from another backend kind is ignored.
    pub fn remove(&mut self, id: EntityId, slot: BackendSlot) -> bool {
        match (self, slot) {
            (SpatialBackend::List(b), BackendSlot::List) => b.remove(id),
            (SpatialBackend::Grid(b), BackendSlot::Grid(cell)) => b.remove(id, cell),
            (SpatialBackend::Quadtree(b), BackendSlot::Quad(h)) => b.remove(h),
            _ => false,
        }
    }

    /// Range query. The List backend ignores `rect` and returns everything.
    pub fn query_range(&self, rect: &Rect) -> Vec<EntityId> {
        match self {
            SpatialBackend::List(b) => b.iter().map(|(id, _)| id).collect(),
            SpatialBackend::Grid(b) => b.query(rect),
            SpatialBackend::Quadtree(b) => b.query(rect),
        }
    }

    /// Every stored entity, in the backend's iteration order.
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids = Vec::with_capacity(self.len());
        self.extend_ids(&mut ids);
        ids
    }

    /// Append every stored entity to `out`, in [`ids`](Self::ids) order.
    pub fn extend_ids(&self, out: &mut Vec<EntityId>) {
        match self {
            SpatialBackend::List(b) => out.extend(b.iter().map(|(id, _)| id)),
            SpatialBackend::Grid(b) => out.extend(b.iter().map(|(id, _)| id)),
            SpatialBackend::Quadtree(b) => out.extend(b.iter().map(|(id, _)| id)),
        }
    }

    /// Every stored entity with its indexed position.
    pub fn entries(&self) -> Vec<(EntityId, Vec2)> {
        match self {
            SpatialBackend::List(b) => b.iter().collect(),
            SpatialBackend::Grid(b) => b.iter().collect(),
            SpatialBackend::Quadtree(b) => b.iter().collect(),
        }
    }

    /// Drop every entity for which `keep` returns `false`.
    /// Survivors keep their relative order and their slots.
    pub fn retain(&mut self, keep: impl FnMut(EntityId) -> bool) {
        match self {
            SpatialBackend::List(b) => b.retain(keep),
            SpatialBackend::Grid(b) => b.retain(keep),
            SpatialBackend::Quadtree(b) => b.retain(keep),
        }
    }

    /// Re-index from scratch with fresh positions, in the given order.
    /// Returns the new slot of each item, index-aligned with `items`.
    pub fn rebuild(&mut self, items: &[(EntityId, Vec2)]) -> Vec<BackendSlot> {
        self.clear();
        items.iter().map(|(id, pos)| self.insert(*id, *pos)).collect()
    }

    pub fn len(&self) -> usize {
        match self {
            SpatialBackend::List(b) => b.len(),
            SpatialBackend::Grid(b) => b.len(),
            SpatialBackend::Quadtree(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        match self {
            SpatialBackend::List(b) => b.clear(),
            SpatialBackend::Grid(b) => b.clear(),
            SpatialBackend::Quadtree(b) => b.clear(),
        }
    }
}

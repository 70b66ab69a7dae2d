//! Uniform grid backend.
//!
//! Entities are bucketed into square cells of `cell_size` world units by
//! their position at insertion time. Cells are kept in a `BTreeMap` keyed by
//! `(row, column)` so iteration is row-major and deterministic, and a query
//! only walks the rows its rectangle spans.
//!
//! Moving an entity does not move it between cells. Callers that move
//! entities must re-bucket explicitly (see
//! [`Scene::reindex`](crate::scene::Scene::reindex)); until then queries
//! answer from the stale insertion positions.

use std::collections::BTreeMap;

use crate::components::entity::EntityId;
use crate::components::geometry::{Rect, Vec2};

/// `(row, column)` of a grid cell.
pub type CellKey = (i32, i32);

#[derive(Debug, Clone)]
pub struct GridBackend {
    cell_size: f32,
    cells: BTreeMap<CellKey, Vec<(EntityId, Vec2)>>,
    len: usize,
}

impl GridBackend {
    /// Create an empty grid. Non-positive or non-finite sizes fall back to 1.
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        GridBackend {
            cell_size,
            cells: BTreeMap::new(),
            len: 0,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Cell containing `p`. Float-to-int casts saturate, so infinite
    /// coordinates land in the outermost rows and columns.
    pub fn cell_of(&self, p: Vec2) -> CellKey {
        (
            (p.y / self.cell_size).floor() as i32,
            (p.x / self.cell_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, id: EntityId, pos: Vec2) -> CellKey {
        let key = self.cell_of(pos);
        self.cells.entry(key).or_default().push((id, pos));
        self.len += 1;
        key
    }

    /// Remove `id` from the cell it was bucketed into.
    pub fn remove(&mut self, id: EntityId, cell: CellKey) -> bool {
        let Some(bucket) = self.cells.get_mut(&cell) else {
            return false;
        };
        let Some(i) = bucket.iter().position(|(e, _)| *e == id) else {
            return false;
        };
        bucket.remove(i);
        if bucket.is_empty() {
            self.cells.remove(&cell);
        }
        self.len -= 1;
        true
    }

    pub fn retain(&mut self, mut keep: impl FnMut(EntityId) -> bool) {
        let mut len = 0;
        self.cells.retain(|_, bucket| {
            bucket.retain(|(id, _)| keep(*id));
            len += bucket.len();
            !bucket.is_empty()
        });
        self.len = len;
    }

    /// Entities whose insertion position lies inside `rect`.
    ///
    /// Visits only the occupied cells whose row and column fall in the
    /// rectangle's cell span.
    pub fn query(&self, rect: &Rect) -> Vec<EntityId> {
        let (r0, c0) = self.cell_of(rect.min);
        let (r1, c1) = self.cell_of(rect.max);
        let mut out = Vec::new();
        if r0 > r1 || c0 > c1 {
            return out;
        }
        for (&(_, col), bucket) in self.cells.range((r0, i32::MIN)..=(r1, i32::MAX)) {
            if col < c0 || col > c1 {
                continue;
            }
            out.extend(
                bucket
                    .iter()
                    .filter(|(_, p)| rect.contains(*p))
                    .map(|(id, _)| *id),
            );
        }
        out
    }

    /// Number of occupied cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, Vec2)> + '_ {
        self.cells.values().flat_map(|b| b.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: u32) -> EntityId {
        EntityId::new(i, 0)
    }

    #[test]
    fn test_cell_of_negative_coordinates() {
        let grid = GridBackend::new(10.0);
        assert_eq!(grid.cell_of(Vec2::new(0.0, 0.0)), (0, 0));
        assert_eq!(grid.cell_of(Vec2::new(-0.5, 25.0)), (2, -1));
        assert_eq!(grid.cell_of(Vec2::new(f32::INFINITY, f32::NEG_INFINITY)), (i32::MIN, i32::MAX));
    }

    #[test]
    fn test_invalid_cell_size_falls_back() {
        assert_eq!(GridBackend::new(0.0).cell_size(), 1.0);
        assert_eq!(GridBackend::new(f32::NAN).cell_size(), 1.0);
    }

    #[test]
    fn test_query_filters_by_rect() {
        let mut grid = GridBackend::new(10.0);
        grid.insert(id(0), Vec2::new(1.0, 1.0));
        grid.insert(id(1), Vec2::new(15.0, 5.0));
        grid.insert(id(2), Vec2::new(55.0, 55.0));
        grid.insert(id(3), Vec2::new(9.0, 9.0));
        let mut hits = grid.query(&Rect::new(0.0, 0.0, 12.0, 12.0));
        hits.sort();
        assert_eq!(hits, vec![id(0), id(3)]);
        assert_eq!(grid.query(&Rect::EVERYTHING).len(), 4);
    }

    #[test]
    fn test_remove_uses_insertion_cell() {
        let mut grid = GridBackend::new(10.0);
        let cell = grid.insert(id(0), Vec2::new(1.0, 1.0));
        assert!(!grid.remove(id(0), (5, 5)));
        assert!(grid.remove(id(0), cell));
        assert!(grid.is_empty());
        assert_eq!(grid.occupied_cells(), 0);
    }

    #[test]
    fn test_retain_drops_empty_cells() {
        let mut grid = GridBackend::new(10.0);
        grid.insert(id(0), Vec2::new(1.0, 1.0));
        grid.insert(id(1), Vec2::new(21.0, 1.0));
        grid.insert(id(2), Vec2::new(22.0, 1.0));
        grid.retain(|e| e != id(0));
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.occupied_cells(), 1);
        let ids: Vec<_> = grid.iter().map(|(e, _)| e).collect();
        assert_eq!(ids, vec![id(1), id(2)]);
    }
}

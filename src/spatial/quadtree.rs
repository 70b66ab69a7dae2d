//! Point quadtree backend.
//!
//! Nodes live in a flat `Vec` and split into four quadrants once they hold
//! more than `capacity` items (up to `max_depth`). Items live in a separate
//! slab; [`QuadHandle`] is an index into that slab, so a handle stays valid
//! across splits and removal never searches by value.
//!
//! Points outside the root bounds are kept in an overflow list that every
//! query scans, so nothing inserted is ever lost. A tree over unbounded
//! bounds such as [`Rect::EVERYTHING`] never splits and degrades to a
//! single scanned leaf.
//!
//! Like the grid, the tree indexes insertion-time positions and is not
//! rebalanced when entities move.

use smallvec::SmallVec;

use crate::components::entity::EntityId;
use crate::components::geometry::{Rect, Vec2};

/// Removable reference returned by [`QuadtreeBackend::insert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuadHandle(u32);

const OUTSIDE: u32 = u32::MAX;

#[derive(Debug, Clone)]
struct QuadNode {
    bounds: Rect,
    depth: u32,
    items: SmallVec<[u32; 8]>,
    /// NW, NE, SW, SE.
    children: Option<[u32; 4]>,
}

#[derive(Debug, Clone, Copy)]
struct QuadItem {
    id: EntityId,
    pos: Vec2,
    node: u32,
}

#[derive(Debug, Clone)]
pub struct QuadtreeBackend {
    capacity: usize,
    max_depth: u32,
    nodes: Vec<QuadNode>,
    slab: Vec<Option<QuadItem>>,
    free: Vec<u32>,
    outside: Vec<u32>,
    len: usize,
}

impl QuadtreeBackend {
    pub const DEFAULT_CAPACITY: usize = 8;
    pub const DEFAULT_MAX_DEPTH: u32 = 8;

    pub fn new(bounds: Rect, capacity: usize, max_depth: u32) -> Self {
        QuadtreeBackend {
            capacity: capacity.max(1),
            max_depth,
            nodes: vec![QuadNode {
                bounds,
                depth: 0,
                items: SmallVec::new(),
                children: None,
            }],
            slab: Vec::new(),
            free: Vec::new(),
            outside: Vec::new(),
            len: 0,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.nodes[0].bounds
    }

    /// Number of nodes, leaves and branches.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn insert(&mut self, id: EntityId, pos: Vec2) -> QuadHandle {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slab[slot as usize] = Some(QuadItem { id, pos, node: OUTSIDE });
                slot
            }
            None => {
                self.slab.push(Some(QuadItem { id, pos, node: OUTSIDE }));
                (self.slab.len() - 1) as u32
            }
        };
        self.len += 1;
        if self.nodes[0].bounds.contains(pos) {
            self.place(slot, 0);
        } else {
            self.outside.push(slot);
        }
        QuadHandle(slot)
    }

    /// Descend from `start` to the leaf containing the item and store it there.
    fn place(&mut self, slot: u32, start: u32) {
        let Some(pos) = self.slab[slot as usize].map(|item| item.pos) else {
            return;
        };
        let mut node = start;
        while let Some(children) = self.nodes[node as usize].children {
            node = children[self.quadrant(node, pos)];
        }
        if let Some(item) = self.slab[slot as usize].as_mut() {
            item.node = node;
        }
        let n = &mut self.nodes[node as usize];
        n.items.push(slot);
        // an unbounded node has no usable center to split on
        if n.items.len() > self.capacity && n.depth < self.max_depth && !n.bounds.is_unbounded() {
            self.split(node);
        }
    }

    fn quadrant(&self, node: u32, p: Vec2) -> usize {
        let c = self.nodes[node as usize].bounds.center();
        match (p.x >= c.x, p.y >= c.y) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }

    fn split(&mut self, node: u32) {
        let (bounds, depth) = {
            let n = &self.nodes[node as usize];
            (n.bounds, n.depth)
        };
        let c = bounds.center();
        let quads = [
            Rect::from_corners(bounds.min, c),
            Rect::from_corners(Vec2::new(c.x, bounds.min.y), Vec2::new(bounds.max.x, c.y)),
            Rect::from_corners(Vec2::new(bounds.min.x, c.y), Vec2::new(c.x, bounds.max.y)),
            Rect::from_corners(c, bounds.max),
        ];
        let first = self.nodes.len() as u32;
        for q in quads {
            self.nodes.push(QuadNode {
                bounds: q,
                depth: depth + 1,
                items: SmallVec::new(),
                children: None,
            });
        }
        let n = &mut self.nodes[node as usize];
        n.children = Some([first, first + 1, first + 2, first + 3]);
        let items = std::mem::take(&mut n.items);
        for slot in items {
            self.place(slot, node);
        }
    }

    /// Remove the item behind `handle`. Stale handles return `false`.
    pub fn remove(&mut self, handle: QuadHandle) -> bool {
        let Some(item) = self.slab.get_mut(handle.0 as usize).and_then(Option::take) else {
            return false;
        };
        if item.node == OUTSIDE {
            if let Some(i) = self.outside.iter().position(|s| *s == handle.0) {
                self.outside.remove(i);
            }
        } else {
            let items = &mut self.nodes[item.node as usize].items;
            if let Some(i) = items.iter().position(|s| *s == handle.0) {
                items.remove(i);
            }
        }
        self.free.push(handle.0);
        self.len -= 1;
        true
    }

    pub fn retain(&mut self, mut keep: impl FnMut(EntityId) -> bool) {
        let dropped: Vec<u32> = self
            .slab
            .iter()
            .enumerate()
            .filter_map(|(slot, item)| match item {
                Some(item) if !keep(item.id) => Some(slot as u32),
                _ => None,
            })
            .collect();
        for slot in dropped {
            self.remove(QuadHandle(slot));
        }
    }

    /// Entities whose insertion position lies inside `rect`.
    ///
    /// Only descends into nodes whose bounds intersect the rectangle.
    pub fn query(&self, rect: &Rect) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack: SmallVec<[u32; 32]> = SmallVec::new();
        if self.nodes[0].bounds.intersects(rect) {
            stack.push(0);
        }
        while let Some(node) = stack.pop() {
            let n = &self.nodes[node as usize];
            self.collect(&n.items, rect, &mut out);
            if let Some(children) = n.children {
                // reversed so quadrants pop in NW, NE, SW, SE order
                for child in children.into_iter().rev() {
                    if self.nodes[child as usize].bounds.intersects(rect) {
                        stack.push(child);
                    }
                }
            }
        }
        self.collect(&self.outside, rect, &mut out);
        out
    }

    fn collect(&self, slots: &[u32], rect: &Rect, out: &mut Vec<EntityId>) {
        out.extend(
            slots
                .iter()
                .filter_map(|slot| self.slab[*slot as usize])
                .filter(|item| rect.contains(item.pos))
                .map(|item| item.id),
        );
    }

    /// Every item in depth-first quadrant order, then the overflow list.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, Vec2)> + '_ {
        let mut order = Vec::with_capacity(self.len);
        let mut stack = vec![0u32];
        while let Some(node) = stack.pop() {
            let n = &self.nodes[node as usize];
            order.extend(n.items.iter().copied());
            if let Some(children) = n.children {
                stack.extend(children.into_iter().rev());
            }
        }
        order.extend(self.outside.iter().copied());
        order
            .into_iter()
            .filter_map(move |slot| self.slab[slot as usize].map(|item| (item.id, item.pos)))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every item and collapse back to a single root node.
    pub fn clear(&mut self) {
        let bounds = self.nodes[0].bounds;
        self.nodes.truncate(1);
        self.nodes[0] = QuadNode {
            bounds,
            depth: 0,
            items: SmallVec::new(),
            children: None,
        };
        self.slab.clear();
        self.free.clear();
        self.outside.clear();
        self.len = 0;
    }
}

//! Hierarchical scene graph.
//!
//! A [`Scene`] is an arena of nodes addressed by [`EntityId`] handles. Every
//! node holds an [`Entity`]; group nodes additionally own a
//! [`SpatialBackend`] indexing their children. Parent links are plain ids,
//! never owning references, and the root is always a group.
//!
//! # Invariants
//!
//! - Each node except the root is filed in exactly one group's backend, the
//!   group named by its parent link. Reparenting moves it.
//! - The graph is a tree: [`Scene::reparent`] rejects moving a group under
//!   itself or one of its descendants, and [`Scene::add`] only creates fresh
//!   leaves, so no cycle can be built.
//! - Children are indexed at their position when inserted. Grid and
//!   Quadtree groups only see later moves after [`Scene::reindex`].
//!
//! # Per-tick flow
//!
//! [`Scene::update_logic`] first prunes the whole tree bottom-up (an inactive
//! group is removed together with everything below it, after its own
//! inactive children were pruned), then updates every remaining active node
//! top-down, a group's own animations running before its children.
//! [`Scene::draw`] walks the tree again, asking each group's backend for the
//! children inside its view rectangle.

use std::fmt;

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::components::entity::{Entity, EntityId};
use crate::components::geometry::Rect;
use crate::resources::worldtime::WorldTime;
use crate::spatial::{BackendKind, BackendSlot, SpatialBackend};
use crate::systems::render::{DrawCommand, Surface};

/// Reasons a structural edit was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneError {
    /// The handle does not name a live node.
    UnknownEntity(EntityId),
    /// The node exists but cannot hold children.
    NotAGroup(EntityId),
    /// The edit would make a node its own ancestor.
    WouldCycle { child: EntityId, parent: EntityId },
    /// The root cannot be removed or moved.
    RootImmovable,
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::UnknownEntity(id) => write!(f, "unknown entity {id}"),
            SceneError::NotAGroup(id) => write!(f, "entity {id} is not a group"),
            SceneError::WouldCycle { child, parent } => {
                write!(f, "moving {child} under {parent} would create a cycle")
            }
            SceneError::RootImmovable => write!(f, "the scene root cannot be moved or removed"),
        }
    }
}

impl std::error::Error for SceneError {}

#[derive(Debug)]
struct Group {
    backend: SpatialBackend,
    view: Option<Rect>,
    cull_margin: f32,
}

#[derive(Debug)]
struct Node {
    entity: Entity,
    parent: Option<EntityId>,
    slot: BackendSlot,
    group: Option<Group>,
    name: Option<String>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena-backed scene graph rooted at a group.
#[derive(Debug)]
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: EntityId,
    live: usize,
    names: FxHashMap<String, EntityId>,
    /// Reused traversal stack for `update_logic`.
    pending: Vec<EntityId>,
}

impl Scene {
    /// Create a scene whose root group uses `backend`.
    pub fn new(backend: SpatialBackend) -> Self {
        Scene::with_root(Entity::default(), backend)
    }

    /// Create a scene with a custom root entity.
    pub fn with_root(root: Entity, backend: SpatialBackend) -> Self {
        let mut scene = Scene {
            slots: Vec::new(),
            free: Vec::new(),
            root: EntityId::new(0, 0),
            live: 0,
            names: FxHashMap::default(),
            pending: Vec::new(),
        };
        scene.root = scene.alloc(Node {
            entity: root,
            parent: None,
            slot: BackendSlot::List,
            group: Some(Group {
                backend,
                view: None,
                cull_margin: 0.0,
            }),
            name: None,
        });
        scene
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.live
    }

    /// `true` when the root has no children.
    pub fn is_empty(&self) -> bool {
        self.live <= 1
    }

    fn alloc(&mut self, node: Node) -> EntityId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                EntityId::new(index, slot.generation)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                EntityId::new((self.slots.len() - 1) as u32, 0)
            }
        }
    }

    fn node(&self, id: EntityId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    fn node_mut(&mut self, id: EntityId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    fn group(&self, id: EntityId) -> Result<&Group, SceneError> {
        let node = self.node(id).ok_or(SceneError::UnknownEntity(id))?;
        node.group.as_ref().ok_or(SceneError::NotAGroup(id))
    }

    fn group_mut(&mut self, id: EntityId) -> Result<&mut Group, SceneError> {
        let node = self.node_mut(id).ok_or(SceneError::UnknownEntity(id))?;
        node.group.as_mut().ok_or(SceneError::NotAGroup(id))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.node(id).is_some()
    }

    pub fn is_group(&self, id: EntityId) -> bool {
        self.node(id).is_some_and(|n| n.group.is_some())
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.node(id).map(|n| &n.entity)
    }

    /// Mutable access to an entity.
    ///
    /// Moving it does not re-index it in its group's backend.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.node_mut(id).map(|n| &mut n.entity)
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Children of `group` in backend iteration order. Empty for leaves.
    pub fn children(&self, group: EntityId) -> Vec<EntityId> {
        self.group(group)
            .map(|g| g.backend.ids())
            .unwrap_or_default()
    }

    pub fn backend_kind(&self, group: EntityId) -> Option<BackendKind> {
        self.group(group).ok().map(|g| g.backend.kind())
    }

    /// Attach a new leaf entity under `parent`, indexed at its current position.
    pub fn add(&mut self, parent: EntityId, entity: Entity) -> Result<EntityId, SceneError> {
        self.attach(parent, entity, None)
    }

    /// Attach a new composite group under `parent`.
    pub fn add_group(
        &mut self,
        parent: EntityId,
        entity: Entity,
        backend: SpatialBackend,
    ) -> Result<EntityId, SceneError> {
        let group = Group {
            backend,
            view: None,
            cull_margin: 0.0,
        };
        self.attach(parent, entity, Some(group))
    }

    fn attach(
        &mut self,
        parent: EntityId,
        entity: Entity,
        group: Option<Group>,
    ) -> Result<EntityId, SceneError> {
        self.group(parent)?;
        let pos = entity.position();
        let id = self.alloc(Node {
            entity,
            parent: Some(parent),
            slot: BackendSlot::List,
            group,
            name: None,
        });
        let slot = self.group_mut(parent)?.backend.insert(id, pos);
        if let Some(node) = self.node_mut(id) {
            node.slot = slot;
        }
        trace!("Attached {} under {}", id, parent);
        Ok(id)
    }

    /// Remove `id` and everything below it. Returns how many nodes were freed.
    pub fn remove(&mut self, id: EntityId) -> Result<usize, SceneError> {
        if id == self.root {
            return Err(SceneError::RootImmovable);
        }
        if !self.contains(id) {
            return Err(SceneError::UnknownEntity(id));
        }
        self.detach(id);
        Ok(self.free_subtree(id))
    }

    /// Take `id` out of its parent's backend, leaving the node itself alive.
    fn detach(&mut self, id: EntityId) {
        let Some((parent, slot)) = self.node(id).and_then(|n| n.parent.map(|p| (p, n.slot))) else {
            return;
        };
        if let Ok(group) = self.group_mut(parent) {
            group.backend.remove(id, slot);
        }
    }

    /// Free `id` and its descendants without touching its parent's backend.
    fn free_subtree(&mut self, id: EntityId) -> usize {
        let children = self.children(id);
        let mut freed = children.into_iter().map(|c| self.free_subtree(c)).sum::<usize>();
        let taken = match self.slots.get_mut(id.index as usize) {
            Some(slot) if slot.generation == id.generation => {
                let taken = slot.node.take();
                if taken.is_some() {
                    slot.generation = slot.generation.wrapping_add(1);
                }
                taken
            }
            _ => None,
        };
        if let Some(node) = taken {
            self.free.push(id.index);
            self.live -= 1;
            freed += 1;
            if let Some(name) = node.name {
                self.names.remove(&name);
            }
        }
        freed
    }

    /// `true` when `ancestor` lies on the parent chain of `id`.
    pub fn is_ancestor(&self, ancestor: EntityId, id: EntityId) -> bool {
        let mut cursor = self.parent(id);
        while let Some(p) = cursor {
            if p == ancestor {
                return true;
            }
            cursor = self.parent(p);
        }
        false
    }

    /// Move `child` (and its subtree) under `new_parent`, re-indexed at its
    /// current position.
    pub fn reparent(&mut self, child: EntityId, new_parent: EntityId) -> Result<(), SceneError> {
        if child == self.root {
            return Err(SceneError::RootImmovable);
        }
        if !self.contains(child) {
            return Err(SceneError::UnknownEntity(child));
        }
        self.group(new_parent)?;
        if child == new_parent || self.is_ancestor(child, new_parent) {
            return Err(SceneError::WouldCycle {
                child,
                parent: new_parent,
            });
        }
        self.detach(child);
        let pos = self
            .get(child)
            .map(|e| e.position())
            .ok_or(SceneError::UnknownEntity(child))?;
        let slot = self.group_mut(new_parent)?.backend.insert(child, pos);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(new_parent);
            node.slot = slot;
        }
        debug!("Reparented {} under {}", child, new_parent);
        Ok(())
    }

    /// Set the rectangle a group draws from. `None` draws everything for a
    /// List group and nothing for Grid and Quadtree groups.
    pub fn set_view(&mut self, group: EntityId, view: Option<Rect>) -> Result<(), SceneError> {
        self.group_mut(group)?.view = view;
        Ok(())
    }

    pub fn view(&self, group: EntityId) -> Option<Rect> {
        self.group(group).ok().and_then(|g| g.view)
    }

    /// Widen a group's view rectangle by `margin` world units when drawing,
    /// so sprites anchored just outside the view are still emitted.
    pub fn set_cull_margin(&mut self, group: EntityId, margin: f32) -> Result<(), SceneError> {
        self.group_mut(group)?.cull_margin = margin.max(0.0);
        Ok(())
    }

    /// Range query against one group's backend.
    pub fn query(&self, group: EntityId, rect: &Rect) -> Vec<EntityId> {
        self.group(group)
            .map(|g| g.backend.query_range(rect))
            .unwrap_or_default()
    }

    /// Re-index a group's children at their current positions.
    ///
    /// This is the explicit step Grid and Quadtree groups need after their
    /// children move; it is never run implicitly. Returns the number of
    /// children re-indexed (0 for a List group, which has nothing to do).
    pub fn reindex(&mut self, group: EntityId) -> Result<usize, SceneError> {
        let g = self.group(group)?;
        if g.backend.kind() == BackendKind::List {
            return Ok(0);
        }
        let items: Vec<_> = g
            .backend
            .ids()
            .into_iter()
            .filter_map(|id| self.get(id).map(|e| (id, e.position())))
            .collect();
        let slots = self.group_mut(group)?.backend.rebuild(&items);
        for ((id, _), slot) in items.iter().zip(slots) {
            if let Some(node) = self.node_mut(*id) {
                node.slot = slot;
            }
        }
        trace!("Reindexed {} children of {}", items.len(), group);
        Ok(items.len())
    }

    /// Prune every inactive node in the tree. Returns how many nodes were freed.
    pub fn prune(&mut self) -> usize {
        let removed = self.prune_group(self.root);
        if removed > 0 {
            debug!("Pruned {} inactive entities", removed);
        }
        removed
    }

    fn prune_group(&mut self, group: EntityId) -> usize {
        let children = self.children(group);
        if children.is_empty() {
            return 0;
        }
        let mut removed = 0;
        for &c in &children {
            if self.is_group(c) {
                removed += self.prune_group(c);
            }
        }
        let dead: Vec<EntityId> = children
            .into_iter()
            .filter(|c| self.get(*c).is_some_and(|e| !e.active))
            .collect();
        if dead.is_empty() {
            return removed;
        }
        let dead_set: FxHashSet<EntityId> = dead.iter().copied().collect();
        if let Ok(g) = self.group_mut(group) {
            g.backend.retain(|id| !dead_set.contains(&id));
        }
        for d in dead {
            removed += self.free_subtree(d);
        }
        removed
    }

    /// One logical tick: prune, then update every active node top-down.
    pub fn update_logic(&mut self, time: &WorldTime) {
        self.prune();
        self.update_node(self.root, time);
    }

    /// Pre-order walk: a group updates before its children, children in
    /// backend order.
    fn update_node(&mut self, id: EntityId, time: &WorldTime) {
        let mut pending = std::mem::take(&mut self.pending);
        pending.clear();
        pending.push(id);
        while let Some(id) = pending.pop() {
            let Some(node) = self.node_mut(id) else {
                continue;
            };
            if !node.entity.active {
                continue;
            }
            node.entity.update_logic(time);
            if let Some(group) = &node.group {
                let from = pending.len();
                group.backend.extend_ids(&mut pending);
                pending[from..].reverse();
            }
        }
        self.pending = pending;
    }

    /// Draw the tree. Returns the number of sprites emitted.
    pub fn draw(&self, surface: &mut dyn Surface, time: &WorldTime) -> Result<usize, String> {
        let mut drawn = 0;
        self.draw_node(self.root, surface, time, &mut drawn)?;
        Ok(drawn)
    }

    fn draw_node(
        &self,
        id: EntityId,
        surface: &mut dyn Surface,
        time: &WorldTime,
        drawn: &mut usize,
    ) -> Result<(), String> {
        let Some(node) = self.node(id) else {
            return Ok(());
        };
        let entity = &node.entity;
        if !entity.active || !entity.visible {
            return Ok(());
        }
        if let Some(sprite) = &entity.sprite {
            surface.draw(&DrawCommand::new(id, entity, sprite), time)?;
            *drawn += 1;
        }
        if let Some(group) = &node.group {
            let visible = match (group.view, group.backend.kind()) {
                (Some(view), _) => group.backend.query_range(&view.expanded(group.cull_margin)),
                (None, BackendKind::List) => group.backend.ids(),
                (None, kind) => {
                    trace!("Group {} ({:?}) has no view rectangle, skipping children", id, kind);
                    Vec::new()
                }
            };
            for c in visible {
                self.draw_node(c, surface, time, drawn)?;
            }
        }
        Ok(())
    }

    /// Start every not-yet-started animation on `id`.
    pub fn start_animations(&mut self, id: EntityId, now_ms: u64) -> usize {
        self.get_mut(id)
            .map(|e| e.start_animations(now_ms))
            .unwrap_or(0)
    }

    /// Name an entity for later lookup. Returns `false` for dead handles.
    ///
    /// A name belongs to one entity at a time: naming a second entity takes
    /// the name away from the first, and renaming releases the old name.
    pub fn set_name(&mut self, id: EntityId, name: impl Into<String>) -> bool {
        let name = name.into();
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        if let Some(old) = node.name.replace(name.clone()) {
            self.names.remove(&old);
        }
        if let Some(prev) = self.names.insert(name, id) {
            if prev != id {
                if let Some(node) = self.node_mut(prev) {
                    node.name = None;
                }
            }
        }
        true
    }

    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.names.get(name).copied().filter(|id| self.contains(*id))
    }

    /// Every live node, in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.node
                .as_ref()
                .map(|n| (EntityId::new(i as u32, s.generation), &n.entity))
        })
    }
}

//! Slot-sequenced timelines.
//!
//! A [`Timeline`] is an ordered list of [`Slot`]s. Each slot names a set of
//! entities and how long the slot lasts. Advancing the timeline against the
//! logical clock moves forward one slot at a time, starting the animations of
//! the newly current slot's entities. The timeline never goes back and
//! stops at its last slot.
//!
//! Each slot also says whether the entities of the slot that follows it
//! replace the visible set or are added to it; see [`Timeline::visible`].
//!
//! Timelines can be authored as JSON ([`TimelineData`]) naming entities by
//! the names registered with [`Scene::set_name`](crate::scene::Scene::set_name).
//!
//! # Related
//! - [`crate::components::animation::AnimationState`] – what a slot starts
//! - [`crate::scene::Scene::start_animations`]

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::components::entity::EntityId;
use crate::scene::Scene;

#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub entities: Vec<EntityId>,
    pub duration_ms: u64,
    /// When set, the next slot's entities replace the visible set instead of
    /// joining it.
    pub overwrite: bool,
}

impl Slot {
    pub fn new(entities: Vec<EntityId>, duration_ms: u64) -> Self {
        Slot {
            entities,
            duration_ms,
            overwrite: false,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    slots: Vec<Slot>,
    current: usize,
    slot_start_ms: u64,
    started: bool,
    changed: bool,
    visible: Vec<EntityId>,
}

impl Timeline {
    pub fn new(slots: Vec<Slot>) -> Self {
        Timeline {
            slots,
            ..Default::default()
        }
    }

    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Index of the current slot.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Logical time at which the current slot began.
    pub fn slot_start_ms(&self) -> u64 {
        self.slot_start_ms
    }

    /// `true` once the last slot is current.
    pub fn is_at_end(&self) -> bool {
        self.current + 1 >= self.slots.len()
    }

    /// Make the first slot current at `now_ms` and start its animations.
    ///
    /// Restarting a timeline rewinds it. Returns the first slot's entities
    /// (empty for an empty timeline).
    pub fn start(&mut self, now_ms: u64, scene: &mut Scene) -> &[EntityId] {
        self.current = 0;
        self.slot_start_ms = now_ms;
        self.started = true;
        self.changed = true;
        self.visible.clear();
        let Some(slot) = self.slots.first() else {
            return &[];
        };
        self.visible.extend_from_slice(&slot.entities);
        let started = start_slot(slot, now_ms, scene);
        debug!(
            "Timeline started: {} slots, {} animations in slot 0",
            self.slots.len(),
            started
        );
        &self.slots[0].entities
    }

    /// Move to the next slot once the current one has run its course.
    ///
    /// Returns the newly current slot's entities, or `None` when the current
    /// slot is still running, the timeline is at its last slot, or it was
    /// never started.
    pub fn advance(&mut self, now_ms: u64, scene: &mut Scene) -> Option<&[EntityId]> {
        if !self.started || self.is_at_end() {
            return None;
        }
        let duration = self.slots[self.current].duration_ms;
        if now_ms < self.slot_start_ms.saturating_add(duration) {
            return None;
        }
        self.slot_start_ms = self.slot_start_ms.saturating_add(duration);
        self.current += 1;
        self.changed = true;

        let slot = &self.slots[self.current];
        if self.is_overwrite() {
            self.visible.clear();
        }
        self.visible.extend_from_slice(&slot.entities);
        let started = start_slot(slot, now_ms, scene);
        trace!(
            "Timeline advanced to slot {} at {}ms ({} animations started)",
            self.current, now_ms, started
        );
        Some(&self.slots[self.current].entities)
    }

    /// Whether the slot before the current one asked for its entities to be
    /// replaced rather than accumulated. `false` on the first slot.
    pub fn is_overwrite(&self) -> bool {
        self.current
            .checked_sub(1)
            .and_then(|prev| self.slots.get(prev))
            .is_some_and(|slot| slot.overwrite)
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Read and clear the changed flag.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Entities currently shown, honoring each slot's overwrite flag.
    pub fn visible(&self) -> &[EntityId] {
        &self.visible
    }

    /// Show the entities of [`visible`](Self::visible) and hide every other
    /// entity named by a slot. Returns how many entities are now shown.
    pub fn apply_visibility(&self, scene: &mut Scene) -> usize {
        let mut shown = 0;
        for id in self.slots.iter().flat_map(|slot| &slot.entities) {
            let visible = self.visible.contains(id);
            if let Some(entity) = scene.get_mut(*id) {
                entity.visible = visible;
                shown += usize::from(visible);
            }
        }
        shown
    }
}

fn start_slot(slot: &Slot, now_ms: u64, scene: &mut Scene) -> usize {
    slot.entities
        .iter()
        .map(|id| scene.start_animations(*id, now_ms))
        .sum()
}

/// Serializable timeline description naming entities instead of holding ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineData {
    pub slots: Vec<SlotData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotData {
    #[serde(default)]
    pub entities: Vec<String>,
    pub duration_ms: u64,
    #[serde(default)]
    pub overwrite: bool,
}

impl TimelineData {
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Invalid timeline: {}", e))
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("Cannot encode timeline: {}", e))
    }

    /// Resolve entity names against `scene`. Unknown names are an error.
    pub fn into_timeline(self, scene: &Scene) -> Result<Timeline, String> {
        let mut slots = Vec::with_capacity(self.slots.len());
        for (i, data) in self.slots.into_iter().enumerate() {
            let entities = data
                .entities
                .iter()
                .map(|name| {
                    scene
                        .find(name)
                        .ok_or_else(|| format!("Slot {}: unknown entity '{}'", i, name))
                })
                .collect::<Result<Vec<_>, _>>()?;
            slots.push(Slot::new(entities, data.duration_ms).with_overwrite(data.overwrite));
        }
        Ok(Timeline::new(slots))
    }
}

//! Drawable, updatable scene entities.
//!
//! An [`Entity`] bundles the attributes the engine animates and draws
//! ([`Transform`]), the `active`/`visible` flags that drive pruning and
//! culling, an optional [`SpriteRef`] supplied by the asset loader, the list
//! of [`AnimationState`]s targeting it, and an optional [`Behavior`].
//!
//! Entities live inside a [`Scene`](crate::scene::Scene) arena and are
//! addressed by [`EntityId`] handles. Setting `active = false` marks the
//! entity for removal on the next prune pass of its owning group.

use std::fmt;

use smallvec::SmallVec;

use crate::components::animation::AnimationState;
use crate::components::geometry::Vec2;
use crate::resources::worldtime::WorldTime;

/// Stable handle to an entity stored in a [`Scene`](crate::scene::Scene).
///
/// Handles carry a generation counter so a handle to a removed entity never
/// aliases a later entity reusing the same slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl EntityId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        EntityId { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Animatable attributes of an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    /// Rotation in degrees.
    pub angle: f32,
    scale: f32,
    /// Opacity, 0 (transparent) to 255 (opaque).
    pub alpha: u8,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            x: 0.0,
            y: 0.0,
            angle: 0.0,
            scale: 1.0,
            alpha: 255,
        }
    }
}

impl Transform {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn set_position(&mut self, p: Vec2) {
        self.x = p.x;
        self.y = p.y;
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Set the scale; negative and NaN values are stored as 0.
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = if scale > 0.0 { scale } else { 0.0 };
    }

    /// Set opacity from an interpolated float, rounding and clamping to `0..=255`.
    pub fn set_alpha_f32(&mut self, alpha: f32) {
        self.alpha = if alpha.is_nan() {
            0
        } else {
            alpha.round().clamp(0.0, 255.0) as u8
        };
    }
}

/// Reference to an image supplied by the host's asset loader.
#[derive(Clone, Debug, PartialEq)]
pub struct SpriteRef {
    /// Key of the texture in the host's store.
    pub texture: String,
    pub width: f32,
    pub height: f32,
}

impl SpriteRef {
    pub fn new(texture: impl Into<String>, width: f32, height: f32) -> Self {
        SpriteRef {
            texture: texture.into(),
            width,
            height,
        }
    }
}

/// Mutable view handed to a [`Behavior`] during the update phase.
pub struct BehaviorCtx<'a> {
    pub transform: &'a mut Transform,
    pub active: &'a mut bool,
    pub visible: &'a mut bool,
    pub time: &'a WorldTime,
}

/// Per-entity game logic run once per logical tick, after animations.
pub trait Behavior: Send {
    fn update(&mut self, ctx: BehaviorCtx<'_>);
}

impl<F> Behavior for F
where
    F: FnMut(BehaviorCtx<'_>) + Send,
{
    fn update(&mut self, ctx: BehaviorCtx<'_>) {
        self(ctx)
    }
}

/// A drawable, updatable unit of the scene.
pub struct Entity {
    pub transform: Transform,
    /// Inactive entities are removed by the next prune pass.
    pub active: bool,
    /// Invisible entities are kept and updated but not drawn.
    pub visible: bool,
    pub sprite: Option<SpriteRef>,
    animations: SmallVec<[AnimationState; 2]>,
    behavior: Option<Box<dyn Behavior>>,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("transform", &self.transform)
            .field("active", &self.active)
            .field("visible", &self.visible)
            .field("sprite", &self.sprite)
            .field("animations", &self.animations)
            .field("has_behavior", &self.behavior.is_some())
            .finish()
    }
}

impl Default for Entity {
    fn default() -> Self {
        Entity::new(0.0, 0.0)
    }
}

impl Entity {
    pub fn new(x: f32, y: f32) -> Self {
        Entity {
            transform: Transform {
                x,
                y,
                ..Transform::default()
            },
            active: true,
            visible: true,
            sprite: None,
            animations: SmallVec::new(),
            behavior: None,
        }
    }

    pub fn with_sprite(mut self, sprite: SpriteRef) -> Self {
        self.sprite = Some(sprite);
        self
    }

    pub fn with_angle(mut self, degrees: f32) -> Self {
        self.transform.angle = degrees;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.transform.set_scale(scale);
        self
    }

    pub fn with_alpha(mut self, alpha: u8) -> Self {
        self.transform.alpha = alpha;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_animation(mut self, animation: AnimationState) -> Self {
        self.animations.push(animation);
        self
    }

    pub fn with_behavior(mut self, behavior: impl Behavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    pub fn position(&self) -> Vec2 {
        self.transform.position()
    }

    /// Mark for removal on the next prune pass.
    pub fn kill(&mut self) {
        self.active = false;
    }

    pub fn add_animation(&mut self, animation: AnimationState) {
        self.animations.push(animation);
    }

    pub fn animations(&self) -> &[AnimationState] {
        &self.animations
    }

    pub fn animations_mut(&mut self) -> &mut [AnimationState] {
        &mut self.animations
    }

    /// Drop every animation that has finished.
    pub fn clear_finished_animations(&mut self) {
        self.animations.retain(|a| !a.is_finished());
    }

    /// Start every animation still in `Created`. Returns how many started.
    pub fn start_animations(&mut self, now_ms: u64) -> usize {
        let transform = &self.transform;
        self.animations
            .iter_mut()
            .filter_map(|a| a.start(transform, now_ms).then_some(()))
            .count()
    }

    /// Stop every animation, cancelling their deadlines.
    pub fn stop_animations(&mut self) {
        for a in self.animations.iter_mut() {
            a.stop();
        }
    }

    /// One logical tick: run animations in insertion order, then the behaviour.
    pub fn update_logic(&mut self, time: &WorldTime) {
        for anim in self.animations.iter_mut() {
            anim.tick(&mut self.transform, time.elapsed_ms);
        }
        if let Some(behavior) = self.behavior.as_mut() {
            behavior.update(BehaviorCtx {
                transform: &mut self.transform,
                active: &mut self.active,
                visible: &mut self.visible,
                time,
            });
        }
    }
}

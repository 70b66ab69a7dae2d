//! Demo states and a headless surface.
//!
//! Two states are registered by `main`:
//!
//! - [`IntroState`] fades and scales a title card in, driven by a timeline
//!   authored as JSON.
//! - [`PlayState`] fills the viewport with wandering sprites held in the
//!   spatial backend picked on the command line. Sprites leaving the screen
//!   are killed and pruned, and the group is re-indexed every tick.
//!
//! [`ConsoleSurface`] stands in for a real renderer: it counts draw calls
//! and logs a summary now and then.

use clap::ValueEnum;
use log::{debug, info, trace, warn};

use tickscene::components::animation::{AnimationState, Attribute, Easing};
use tickscene::components::entity::{Behavior, BehaviorCtx, Entity, EntityId, SpriteRef};
use tickscene::components::geometry::{Rect, Vec2};
use tickscene::components::timeline::{Timeline, TimelineData};
use tickscene::events::animation::AnimationEvent;
use tickscene::events::input::KeyEvent;
use tickscene::resources::gameconfig::EngineConfig;
use tickscene::resources::gamestate::AppState;
use tickscene::resources::worldtime::WorldTime;
use tickscene::scene::Scene;
use tickscene::spatial::SpatialBackend;
use tickscene::systems::render::{DrawCommand, Surface};

/// Key code that spawns a burst of sprites in the play field.
pub const KEY_SPAWN: u32 = 32;

const INTRO_TIMELINE: &str = r#"{
  "slots": [
    { "entities": ["backdrop"], "duration_ms": 400 },
    { "entities": ["logo"], "duration_ms": 1200, "overwrite": true },
    { "entities": ["tagline", "prompt"], "duration_ms": 1000 }
  ]
}"#;

const BURST: usize = 10;
const SPRITE_SIZE: f32 = 16.0;

/// Spatial backend used by the play field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendChoice {
    List,
    Grid,
    Quadtree,
}

impl BackendChoice {
    fn build(self, bounds: Rect) -> SpatialBackend {
        match self {
            BackendChoice::List => SpatialBackend::list(),
            BackendChoice::Grid => SpatialBackend::grid(64.0),
            BackendChoice::Quadtree => SpatialBackend::quadtree(bounds),
        }
    }
}

fn viewport(config: &EngineConfig) -> Rect {
    let (w, h) = config.viewport_size();
    Rect::new(0.0, 0.0, w as f32, h as f32)
}

// ==================== SURFACE ====================

/// Surface that draws nothing and reports what it would have drawn.
pub struct ConsoleSurface {
    width: u32,
    height: u32,
    frame_draws: usize,
    total_draws: u64,
    frames: u64,
}

impl ConsoleSurface {
    pub fn new(width: u32, height: u32) -> Self {
        ConsoleSurface {
            width,
            height,
            frame_draws: 0,
            total_draws: 0,
            frames: 0,
        }
    }
}

impl Surface for ConsoleSurface {
    fn lock(&mut self) -> Option<(u32, u32)> {
        self.frame_draws = 0;
        Some((self.width, self.height))
    }

    fn draw(&mut self, cmd: &DrawCommand<'_>, _time: &WorldTime) -> Result<(), String> {
        if cmd.texture.is_empty() {
            return Err(format!("entity {} has no texture", cmd.id));
        }
        self.frame_draws += 1;
        Ok(())
    }

    fn unlock_and_present(&mut self) {
        self.frames += 1;
        self.total_draws += self.frame_draws as u64;
        trace!("Frame {}: {} sprites", self.frames, self.frame_draws);
        if self.frames % 500 == 0 {
            debug!(
                "{} frames presented, {:.1} sprites per frame",
                self.frames,
                self.total_draws as f64 / self.frames as f64
            );
        }
    }
}

// ==================== INTRO ====================

/// Title card sequenced by a timeline.
pub struct IntroState {
    scene: Scene,
    timeline: Timeline,
}

impl IntroState {
    pub fn new() -> Self {
        IntroState {
            scene: Scene::new(SpatialBackend::list()),
            timeline: Timeline::default(),
        }
    }

    fn build(&mut self, config: &EngineConfig) -> Result<(), String> {
        let tick = config.skip_ticks();
        let center = viewport(config).center();
        self.scene = Scene::new(SpatialBackend::list());
        let root = self.scene.root();

        let parts = [
            (
                "backdrop",
                Entity::new(center.x, center.y)
                    .with_sprite(SpriteRef::new("backdrop", 800.0, 480.0))
                    .with_alpha(0)
                    .with_animation(AnimationState::scalar(Attribute::Alpha, 0.0, 255.0, 400, tick)),
            ),
            (
                "logo",
                Entity::new(center.x, center.y - 40.0)
                    .with_sprite(SpriteRef::new("logo", 256.0, 64.0))
                    .with_scale(0.0)
                    .with_animation(
                        AnimationState::scalar(Attribute::Scale, 0.0, 1.0, 800, tick)
                            .with_easing(Easing::CubicOut)
                            .with_listener(|e: &AnimationEvent| {
                                if let AnimationEvent::Finished { .. } = e {
                                    debug!("Logo in place");
                                }
                            }),
                    ),
            ),
            (
                "tagline",
                Entity::new(center.x - 300.0, center.y + 40.0)
                    .with_sprite(SpriteRef::new("tagline", 320.0, 24.0))
                    .with_animation(
                        AnimationState::movement(
                            Vec2::new(center.x - 300.0, center.y + 40.0),
                            Vec2::new(center.x, center.y + 40.0),
                            600,
                            tick,
                        )
                        .with_easing(Easing::QuadOut),
                    ),
            ),
            (
                "prompt",
                Entity::new(center.x, center.y + 120.0)
                    .with_sprite(SpriteRef::new("prompt", 200.0, 16.0))
                    .with_animation(
                        AnimationState::scalar(Attribute::Alpha, 255.0, 64.0, 500, tick)
                            .with_loop(true),
                    ),
            ),
        ];
        for (name, entity) in parts {
            // hidden until the timeline reaches their slot
            let id = self
                .scene
                .add(root, entity.with_visible(false))
                .map_err(|e| e.to_string())?;
            self.scene.set_name(id, name);
        }

        self.timeline = TimelineData::from_json(INTRO_TIMELINE)?.into_timeline(&self.scene)?;
        Ok(())
    }
}

impl Default for IntroState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState for IntroState {
    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    fn init(&mut self, config: &EngineConfig) {
        if let Err(e) = self.build(config) {
            warn!("Intro could not be built: {}", e);
        }
        info!("Intro ready with {} entities", self.scene.len() - 1);
    }

    fn on_update(&mut self, time: &WorldTime) {
        if !self.timeline.is_started() {
            self.timeline.start(time.elapsed_ms, &mut self.scene);
        } else if let Some(n) = self
            .timeline
            .advance(time.elapsed_ms, &mut self.scene)
            .map(<[_]>::len)
        {
            debug!(
                "Intro slot {} ({} entities, overwrite={})",
                self.timeline.current(),
                n,
                self.timeline.is_overwrite()
            );
        }
        if self.timeline.take_changed() {
            self.timeline.apply_visibility(&mut self.scene);
        }
    }

    fn cleanup(&mut self) {
        info!("Intro finished at slot {}", self.timeline.current());
    }
}

// ==================== PLAY FIELD ====================

/// Moves an entity at constant velocity and kills it once it leaves `bounds`.
struct Wander {
    velocity: Vec2,
    bounds: Rect,
}

impl Behavior for Wander {
    fn update(&mut self, ctx: BehaviorCtx<'_>) {
        let dt = ctx.time.delta_seconds();
        ctx.transform.x += self.velocity.x * dt;
        ctx.transform.y += self.velocity.y * dt;
        if !self.bounds.contains(ctx.transform.position()) {
            *ctx.active = false;
        }
    }
}

/// Field of wandering sprites indexed by a spatial backend.
pub struct PlayState {
    scene: Scene,
    backend: BackendChoice,
    population: usize,
    rng: fastrand::Rng,
    bounds: Rect,
    tick_ms: u64,
    spawned: u64,
}

impl PlayState {
    pub fn new(backend: BackendChoice, population: usize, seed: u64) -> Self {
        PlayState {
            scene: Scene::new(SpatialBackend::list()),
            backend,
            population,
            rng: fastrand::Rng::with_seed(seed),
            bounds: Rect::new(0.0, 0.0, 800.0, 480.0),
            tick_ms: 20,
            spawned: 0,
        }
    }

    fn spawn_one(&mut self) -> Option<EntityId> {
        let x = self.rng.f32() * self.bounds.width();
        let y = self.rng.f32() * self.bounds.height();
        let speed = 20.0 + self.rng.f32() * 80.0;
        let heading = self.rng.f32() * std::f32::consts::TAU;
        let spin = AnimationState::scalar(Attribute::Angle, 0.0, 360.0, 2_000, self.tick_ms)
            .with_loop(true);
        let entity = Entity::new(x, y)
            .with_sprite(SpriteRef::new("ball", SPRITE_SIZE, SPRITE_SIZE))
            .with_animation(spin)
            .with_behavior(Wander {
                velocity: Vec2::new(heading.cos() * speed, heading.sin() * speed),
                bounds: self.bounds.expanded(SPRITE_SIZE),
            });
        let root = self.scene.root();
        match self.scene.add(root, entity) {
            Ok(id) => {
                self.spawned += 1;
                Some(id)
            }
            Err(e) => {
                warn!("Cannot spawn: {}", e);
                None
            }
        }
    }

    fn spawn(&mut self, count: usize, now_ms: u64) {
        for _ in 0..count {
            if let Some(id) = self.spawn_one() {
                self.scene.start_animations(id, now_ms);
            }
        }
    }

    pub fn live(&self) -> usize {
        self.scene.len() - 1
    }
}

impl AppState for PlayState {
    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    fn init(&mut self, config: &EngineConfig) {
        self.bounds = viewport(config);
        self.tick_ms = config.skip_ticks();
        self.scene = Scene::new(self.backend.build(self.bounds));
        let root = self.scene.root();
        let view = Some(self.bounds);
        if let Err(e) = self
            .scene
            .set_view(root, view)
            .and_then(|_| self.scene.set_cull_margin(root, SPRITE_SIZE))
        {
            warn!("Cannot configure play field: {}", e);
        }
        self.spawn(self.population, 0);
        info!(
            "Play field ready: {} entities in a {:?} backend",
            self.live(),
            self.backend
        );
    }

    fn on_update(&mut self, time: &WorldTime) {
        let root = self.scene.root();
        if let Err(e) = self.scene.reindex(root) {
            warn!("Reindex failed: {}", e);
        }
        let missing = self.population.saturating_sub(self.live());
        if missing > 0 {
            self.spawn(missing, time.elapsed_ms);
        }
        if time.tick % 250 == 0 {
            info!(
                "Tick {}: {} live, {} spawned so far",
                time.tick,
                self.live(),
                self.spawned
            );
        }
    }

    fn cleanup(&mut self) {
        info!("Play field closed with {} live entities", self.live());
    }

    fn on_key_event(&mut self, event: &KeyEvent) -> bool {
        if event.code != KEY_SPAWN || !event.pressed {
            return false;
        }
        self.population += BURST;
        debug!("Population raised to {}", self.population);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture {
        textures: Vec<String>,
    }

    impl Surface for Capture {
        fn lock(&mut self) -> Option<(u32, u32)> {
            self.textures.clear();
            Some((800, 480))
        }
        fn draw(&mut self, cmd: &DrawCommand<'_>, _time: &WorldTime) -> Result<(), String> {
            self.textures.push(cmd.texture.to_string());
            Ok(())
        }
        fn unlock_and_present(&mut self) {}
    }

    fn drawn_at(intro: &mut IntroState, time: &mut WorldTime, until_ms: u64) -> Vec<String> {
        while time.elapsed_ms < until_ms {
            time.advance();
            intro.update_logic(time);
        }
        let mut surface = Capture::default();
        surface.lock();
        intro.render(&mut surface, time).unwrap();
        surface.textures
    }

    #[test]
    fn test_intro_draws_only_current_slots() {
        let config = EngineConfig::new();
        let mut intro = IntroState::new();
        intro.init(&config);
        let mut time = WorldTime::new(config.skip_ticks());

        assert!(drawn_at(&mut intro, &mut time, 0).is_empty());
        assert_eq!(drawn_at(&mut intro, &mut time, 100), vec!["backdrop"]);
        assert_eq!(drawn_at(&mut intro, &mut time, 1000), vec!["backdrop", "logo"]);
        // the logo slot replaces everything shown so far
        assert_eq!(drawn_at(&mut intro, &mut time, 2000), vec!["tagline", "prompt"]);
    }
}

//! Fixed-timestep game loop.
//!
//! The loop keeps simulation time independent of rendering time with an
//! accumulator: a tick lasts `skip_ticks = 1000 / ticks_per_second`
//! milliseconds and `next_tick` marks when the next one is due. Every
//! iteration:
//!
//! 1. queued [`EngineCmd`](crate::resources::context::EngineCmd)s are applied
//! 2. while the loop is paused or a state transition is in flight, it sleeps
//!    for `pause_poll_ms` and does nothing else
//! 3. with the registry locked, `update_logic` runs once for every tick that
//!    is due, but at most `max_frameskip` times
//! 4. the active state renders exactly once, still under the same lock
//!
//! A render failure is logged and the loop carries on with the next
//! iteration. After a pause the schedule is resynchronized to the current
//! time, so the paused period is not caught up.
//!
//! [`GameLoop::run`] blocks the calling thread; [`GameLoop::spawn`] moves the
//! loop onto its own thread and returns a [`LoopHandle`] that stops and
//! joins it.

use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, info, warn};

use crate::resources::context::EngineContext;
use crate::resources::worldtime::WorldTime;
use crate::systems::render::{RenderOutcome, Surface, render_frame};
use crate::systems::time::{Clock, SystemClock};

/// Reasons the loop could not start or finish cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopError {
    /// The registry is empty; there is nothing to run.
    NoStateRegistered,
    /// The configuration failed validation.
    InvalidConfig(String),
    /// The loop thread could not be created.
    Spawn(String),
    /// The loop thread panicked.
    Panicked,
}

impl fmt::Display for LoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopError::NoStateRegistered => write!(f, "no application state registered"),
            LoopError::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            LoopError::Spawn(msg) => write!(f, "cannot spawn loop thread: {msg}"),
            LoopError::Panicked => write!(f, "loop thread panicked"),
        }
    }
}

impl std::error::Error for LoopError {}

/// What one loop iteration did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Logical updates run this iteration.
    pub updates: u32,
    /// Render result, `None` when nothing was rendered.
    pub render: Option<RenderOutcome>,
    /// The iteration only slept because the loop was paused, changing state,
    /// or had no active state.
    pub held: bool,
}

pub struct GameLoop<C: Clock = SystemClock> {
    ctx: Arc<EngineContext>,
    surface: Box<dyn Surface>,
    clock: C,
    time: WorldTime,
    next_tick: u64,
    skip_ticks: u64,
    max_frameskip: u32,
    pause_poll_ms: u64,
    holding: bool,
}

impl GameLoop<SystemClock> {
    pub fn new(ctx: Arc<EngineContext>, surface: impl Surface + 'static) -> Self {
        GameLoop::with_clock(ctx, surface, SystemClock::new())
    }
}

impl<C: Clock> GameLoop<C> {
    pub fn with_clock(ctx: Arc<EngineContext>, surface: impl Surface + 'static, clock: C) -> Self {
        let config = ctx.config();
        let skip_ticks = config.skip_ticks();
        let max_frameskip = config.max_frameskip;
        let pause_poll_ms = config.pause_poll_ms;
        GameLoop {
            ctx,
            surface: Box::new(surface),
            clock,
            time: WorldTime::new(skip_ticks),
            next_tick: 0,
            skip_ticks,
            max_frameskip,
            pause_poll_ms,
            holding: false,
        }
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub fn time(&self) -> &WorldTime {
        &self.time
    }

    /// Validate the setup and arm the schedule.
    ///
    /// Fails when the configuration is invalid or no state is registered.
    /// When no state is active yet, the first registered one is activated.
    pub fn prepare(&mut self) -> Result<(), LoopError> {
        let config = self.ctx.config();
        config.validate().map_err(LoopError::InvalidConfig)?;
        self.skip_ticks = config.skip_ticks();
        self.max_frameskip = config.max_frameskip;
        self.pause_poll_ms = config.pause_poll_ms;
        self.time = WorldTime::new(self.skip_ticks);

        let first = {
            let registry = self.ctx.lock_registry();
            if registry.is_empty() {
                return Err(LoopError::NoStateRegistered);
            }
            match registry.active_key() {
                Some(_) => None,
                None => registry.first_key().map(str::to_string),
            }
        };
        if let Some(key) = first {
            debug!("No active state, activating '{}'", key);
            self.ctx.activate(&key);
        }

        self.next_tick = self.clock.now_ms();
        self.holding = false;
        self.ctx.flags().set_running(true);
        info!(
            "Game loop ready: {} tps ({}ms ticks), frameskip {}",
            self.ctx.config().ticks_per_second,
            self.skip_ticks,
            self.max_frameskip
        );
        Ok(())
    }

    /// Run one loop iteration.
    pub fn step(&mut self) -> FrameStats {
        self.ctx.drain_commands();
        if !self.ctx.flags().is_running() {
            return FrameStats::default();
        }
        if self.ctx.flags().should_hold() {
            return self.hold();
        }
        if self.holding {
            self.holding = false;
            self.next_tick = self.clock.now_ms();
            debug!("Resumed, schedule resynchronized at {}ms", self.next_tick);
        }

        let mut registry = self.ctx.lock_registry();
        let Some(state) = registry.active_mut() else {
            drop(registry);
            return self.hold();
        };

        let mut updates = 0;
        while self.clock.now_ms() > self.next_tick && updates < self.max_frameskip {
            self.time.advance();
            state.update_logic(&self.time);
            self.next_tick += self.skip_ticks;
            updates += 1;
        }

        self.time.frame += 1;
        let render = render_frame(state, self.surface.as_mut(), &self.time);
        FrameStats {
            updates,
            render: Some(render),
            held: false,
        }
    }

    fn hold(&mut self) -> FrameStats {
        self.holding = true;
        self.clock.sleep_ms(self.pause_poll_ms);
        FrameStats {
            held: true,
            ..Default::default()
        }
    }

    /// Prepare, then iterate until the running flag clears.
    pub fn run(&mut self) -> Result<(), LoopError> {
        self.prepare()?;
        self.run_prepared();
        Ok(())
    }

    fn run_prepared(&mut self) {
        info!("Game loop started");
        while self.ctx.flags().is_running() {
            self.step();
            self.clock.yield_now();
        }
        info!(
            "Game loop stopped after {} ticks and {} frames",
            self.time.tick, self.time.frame
        );
    }
}

impl<C: Clock + 'static> GameLoop<C> {
    /// Prepare on the calling thread, then run on a dedicated one.
    ///
    /// Startup errors are returned here rather than from the thread.
    pub fn spawn(mut self) -> Result<LoopHandle, LoopError> {
        self.prepare()?;
        let ctx = self.ctx.clone();
        let handle = std::thread::Builder::new()
            .name("tickscene-loop".to_string())
            .spawn(move || self.run_prepared())
            .map_err(|e| {
                ctx.flags().stop();
                LoopError::Spawn(e.to_string())
            })?;
        Ok(LoopHandle { ctx, handle })
    }
}

/// Owner of a spawned loop thread.
pub struct LoopHandle {
    ctx: Arc<EngineContext>,
    handle: JoinHandle<()>,
}

impl LoopHandle {
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Clear the running flag and wait for the loop to exit its iteration.
    pub fn stop(self) -> Result<(), LoopError> {
        self.ctx.flags().stop();
        self.join()
    }

    /// Wait for the loop to exit on its own.
    pub fn join(self) -> Result<(), LoopError> {
        self.handle.join().map_err(|_| {
            warn!("Game loop thread panicked");
            LoopError::Panicked
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::gameconfig::EngineConfig;
    use crate::resources::gamestate::AppState;
    use crate::scene::Scene;
    use crate::spatial::SpatialBackend;
    use crate::systems::render::DrawCommand;
    use crate::systems::time::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Blank;

    impl Surface for Blank {
        fn lock(&mut self) -> Option<(u32, u32)> {
            Some((1, 1))
        }
        fn draw(&mut self, _cmd: &DrawCommand<'_>, _time: &WorldTime) -> Result<(), String> {
            Ok(())
        }
        fn unlock_and_present(&mut self) {}
    }

    struct Ticker {
        scene: Scene,
        updates: Arc<AtomicU32>,
    }

    impl AppState for Ticker {
        fn scene(&self) -> &Scene {
            &self.scene
        }
        fn scene_mut(&mut self) -> &mut Scene {
            &mut self.scene
        }
        fn on_update(&mut self, _time: &WorldTime) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup(config: EngineConfig) -> (GameLoop<ManualClock>, ManualClock, Arc<AtomicU32>) {
        let ctx = Arc::new(EngineContext::new(config));
        let updates = Arc::new(AtomicU32::new(0));
        ctx.register(
            "tick",
            Box::new(Ticker {
                scene: Scene::new(SpatialBackend::list()),
                updates: updates.clone(),
            }),
        );
        let clock = ManualClock::new(1_000);
        let game_loop = GameLoop::with_clock(ctx, Blank, clock.clone());
        (game_loop, clock, updates)
    }

    #[test]
    fn test_prepare_activates_first_state() {
        let (mut game_loop, _, _) = setup(EngineConfig::new());
        game_loop.prepare().unwrap();
        assert_eq!(game_loop.context().active_key().as_deref(), Some("tick"));
        assert!(game_loop.context().flags().is_running());
    }

    #[test]
    fn test_prepare_rejects_invalid_config() {
        let (mut game_loop, _, _) = setup(EngineConfig::new().with_max_frameskip(0));
        assert!(matches!(game_loop.prepare(), Err(LoopError::InvalidConfig(_))));
    }

    #[test]
    fn test_no_time_no_updates() {
        let (mut game_loop, _, updates) = setup(EngineConfig::new());
        game_loop.prepare().unwrap();
        let stats = game_loop.step();
        assert_eq!(stats.updates, 0);
        assert_eq!(stats.render, Some(RenderOutcome::Presented));
        assert_eq!(updates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tick_runs_once_schedule_is_passed() {
        let (mut game_loop, clock, _) = setup(EngineConfig::new());
        game_loop.prepare().unwrap();
        clock.advance(19);
        assert_eq!(game_loop.step().updates, 1);
        clock.advance(1);
        assert_eq!(game_loop.step().updates, 0);
        clock.advance(1);
        assert_eq!(game_loop.step().updates, 1);
    }

    #[test]
    fn test_lag_is_caught_up_over_frames() {
        let (mut game_loop, clock, updates) = setup(EngineConfig::new());
        game_loop.prepare().unwrap();
        clock.advance(20 * 8);
        assert_eq!(game_loop.step().updates, 5);
        assert_eq!(game_loop.step().updates, 3);
        assert_eq!(game_loop.step().updates, 0);
        assert_eq!(updates.load(Ordering::SeqCst), 8);
        assert_eq!(game_loop.time().tick, 8);
        assert_eq!(game_loop.time().elapsed_ms, 160);
    }

    #[test]
    fn test_pause_polls_and_resyncs() {
        let (mut game_loop, clock, updates) = setup(EngineConfig::new());
        game_loop.prepare().unwrap();
        game_loop.context().flags().pause();
        let stats = game_loop.step();
        assert!(stats.held);
        assert_eq!(stats.render, None);
        assert_eq!(clock.now_ms(), 1_250);
        game_loop.context().flags().resume();
        assert_eq!(game_loop.step().updates, 0);
        assert_eq!(updates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stopped_loop_does_nothing() {
        let (mut game_loop, clock, _) = setup(EngineConfig::new());
        game_loop.prepare().unwrap();
        game_loop.context().flags().stop();
        clock.advance(1_000);
        assert_eq!(game_loop.step(), FrameStats::default());
    }
}

//! tickscene demo entry point.
//!
//! Runs the engine headless for a fixed number of seconds:
//!
//! 1. Load the loop configuration (defaults when the file is missing)
//! 2. Register the intro and play-field states
//! 3. Spawn the game loop on its own thread with a logging surface
//! 4. From this thread, switch to the play field once the intro has run,
//!    poke it with a queued key event, then stop and join the loop
//!
//! # Running
//!
//! ```sh
//! RUST_LOG=debug cargo run --release -- --backend grid --entities 2000
//! ```

mod game;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use tickscene::events::input::KeyEvent;
use tickscene::resources::context::{EngineCmd, EngineContext};
use tickscene::resources::gameconfig::EngineConfig;
use tickscene::systems::gameloop::GameLoop;

use crate::game::{BackendChoice, ConsoleSurface, IntroState, KEY_SPAWN, PlayState};

/// How long the intro runs before the host switches states.
const INTRO_MS: u64 = 2_600;

/// tickscene headless demo
#[derive(Parser)]
#[command(version, about = "Fixed-timestep scene graph engine demo")]
struct Cli {
    /// Path to the INI configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Seconds to run before stopping.
    #[arg(long, default_value_t = 6)]
    seconds: u64,

    /// Spatial backend for the play field.
    #[arg(long, value_enum, default_value_t = BackendChoice::Quadtree)]
    backend: BackendChoice,

    /// Number of wandering entities kept alive in the play field.
    #[arg(long, default_value_t = 500)]
    entities: usize,

    /// Seed for entity placement.
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(path) => EngineConfig::with_path(path),
        None => EngineConfig::new(),
    };
    if let Err(e) = config.load_from_file() {
        warn!("{}; using defaults", e);
    }
    let (width, height) = config.viewport_size();

    let ctx = Arc::new(EngineContext::new(config));
    ctx.register("intro", Box::new(IntroState::new()));
    ctx.register(
        "play",
        Box::new(PlayState::new(cli.backend, cli.entities, cli.seed)),
    );

    let handle = match GameLoop::new(ctx.clone(), ConsoleSurface::new(width, height)).spawn() {
        Ok(handle) => handle,
        Err(e) => {
            error!("Cannot start the game loop: {}", e);
            std::process::exit(1);
        }
    };

    let total_ms = cli.seconds.saturating_mul(1000);
    let intro_ms = INTRO_MS.min(total_ms / 2);
    thread::sleep(Duration::from_millis(intro_ms));

    ctx.activate("play");
    ctx.send(EngineCmd::Key(KeyEvent::new(KEY_SPAWN, true)));

    thread::sleep(Duration::from_millis(total_ms - intro_ms));

    if let Err(e) = handle.stop() {
        error!("{}", e);
        std::process::exit(1);
    }
    ctx.lock_registry().deactivate();
    info!("Bye!");
}

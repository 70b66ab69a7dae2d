//! Engine configuration resource.
//!
//! Holds the constants the game loop's accumulator math depends on and the
//! viewport size handed to states. Values are read once when the loop
//! starts; changing them mid-run means stopping, reconfiguring and
//! restarting the loop.
//!
//! # Configuration File Format
//!
//! ```ini
//! [loop]
//! ticks_per_second = 50
//! max_frameskip = 5
//! pause_poll_ms = 250
//!
//! [viewport]
//! width = 800
//! height = 480
//! ```

use configparser::ini::Ini;
use log::info;
use std::path::PathBuf;

/// Default safe values for startup
const DEFAULT_TICKS_PER_SECOND: u32 = 50;
const DEFAULT_MAX_FRAMESKIP: u32 = 5;
const DEFAULT_PAUSE_POLL_MS: u64 = 250;
const DEFAULT_VIEWPORT_WIDTH: u32 = 800;
const DEFAULT_VIEWPORT_HEIGHT: u32 = 480;
const DEFAULT_CONFIG_PATH: &str = "./tickscene.ini";

/// Largest accepted tick rate; above it a tick would be shorter than 1ms.
pub const MAX_TICKS_PER_SECOND: u32 = 1000;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Logical updates per second.
    pub ticks_per_second: u32,
    /// Most catch-up updates run before a render.
    pub max_frameskip: u32,
    /// Sleep between polls while the loop is paused or a state is changing.
    pub pause_poll_ms: u64,
    /// Viewport width in pixels.
    pub viewport_width: u32,
    /// Viewport height in pixels.
    pub viewport_height: u32,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            max_frameskip: DEFAULT_MAX_FRAMESKIP,
            pause_poll_ms: DEFAULT_PAUSE_POLL_MS,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a new configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    pub fn with_ticks_per_second(mut self, tps: u32) -> Self {
        self.ticks_per_second = tps;
        self
    }

    pub fn with_max_frameskip(mut self, frames: u32) -> Self {
        self.max_frameskip = frames;
        self
    }

    pub fn with_pause_poll_ms(mut self, ms: u64) -> Self {
        self.pause_poll_ms = ms;
        self
    }

    /// Length of one logical tick in whole milliseconds.
    pub fn skip_ticks(&self) -> u64 {
        1000 / u64::from(self.ticks_per_second.max(1))
    }

    /// Get the viewport size.
    pub fn viewport_size(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.ticks_per_second == 0 || self.ticks_per_second > MAX_TICKS_PER_SECOND {
            return Err(format!(
                "ticks_per_second must be in 1..={}, got {}",
                MAX_TICKS_PER_SECOND, self.ticks_per_second
            ));
        }
        if self.max_frameskip == 0 {
            return Err("max_frameskip must be at least 1".to_string());
        }
        Ok(())
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current (default) values.
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(&mut self) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| format!("Failed to load config file: {}", e))?;

        // [loop] section
        if let Some(tps) = config.getuint("loop", "ticks_per_second").ok().flatten() {
            self.ticks_per_second = tps.min(u64::from(u32::MAX)) as u32;
        }
        if let Some(frames) = config.getuint("loop", "max_frameskip").ok().flatten() {
            self.max_frameskip = frames.min(u64::from(u32::MAX)) as u32;
        }
        if let Some(ms) = config.getuint("loop", "pause_poll_ms").ok().flatten() {
            self.pause_poll_ms = ms;
        }

        // [viewport] section
        if let Some(width) = config.getuint("viewport", "width").ok().flatten() {
            self.viewport_width = width as u32;
        }
        if let Some(height) = config.getuint("viewport", "height").ok().flatten() {
            self.viewport_height = height as u32;
        }

        info!(
            "Loaded config: {} tps, frameskip={}, poll={}ms, viewport {}x{}",
            self.ticks_per_second,
            self.max_frameskip,
            self.pause_poll_ms,
            self.viewport_width,
            self.viewport_height
        );

        Ok(())
    }

    /// Save configuration to the INI file.
    ///
    /// Creates the file if it doesn't exist.
    pub fn save_to_file(&self) -> Result<(), String> {
        let mut config = Ini::new();

        // [loop] section
        config.set("loop", "ticks_per_second", Some(self.ticks_per_second.to_string()));
        config.set("loop", "max_frameskip", Some(self.max_frameskip.to_string()));
        config.set("loop", "pause_poll_ms", Some(self.pause_poll_ms.to_string()));

        // [viewport] section
        config.set("viewport", "width", Some(self.viewport_width.to_string()));
        config.set("viewport", "height", Some(self.viewport_height.to_string()));

        config
            .write(&self.config_path)
            .map_err(|e| format!("Failed to save config file: {}", e))?;

        info!("Saved config to {:?}", self.config_path);

        Ok(())
    }
}

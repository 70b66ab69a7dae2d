//! Long-lived state shared by the loop and the host.
//!
//! Overview
//! - `context` – the per-run engine context: flags, registry lock, command queue
//! - `gameconfig` – loop and viewport configuration loaded from an INI file
//! - `gamestate` – application states and the registry switching between them
//! - `worldtime` – logical simulation clock
pub mod context;
pub mod gameconfig;
pub mod gamestate;
pub mod worldtime;

//! Per-frame drivers.
//!
//! - [`gameloop`] – fixed-timestep accumulator loop
//! - [`render`] – drawing surface interface and the render pass
//! - [`time`] – wall-clock sources
pub mod gameloop;
pub mod render;
pub mod time;

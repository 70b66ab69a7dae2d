//! Notifications emitted by the engine or delivered to it.
//!
//! - [`animation`] – animation lifecycle events for listeners
//! - [`input`] – key and touch events from the host's input dispatcher
pub mod animation;
pub mod input;

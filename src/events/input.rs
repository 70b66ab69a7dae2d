//! Input events delivered by the host's input dispatcher.
//!
//! The engine never reads hardware itself. The host translates platform
//! events into [`KeyEvent`] and [`TouchEvent`] values and hands them to the
//! active [`AppState`](crate::resources::gamestate::AppState), either directly
//! through [`StateRegistry`](crate::resources::gamestate::StateRegistry) or by
//! queueing an [`EngineCmd`](crate::resources::context::EngineCmd).

/// A key press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Platform key code, passed through untouched.
    pub code: u32,
    /// `true` on press, `false` on release.
    pub pressed: bool,
}

/// Phase of a touch or pointer contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// A single touch contact in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub pointer: u32,
    pub phase: TouchPhase,
    pub x: f32,
    pub y: f32,
}

impl KeyEvent {
    pub fn new(code: u32, pressed: bool) -> Self {
        KeyEvent { code, pressed }
    }
}

impl TouchEvent {
    pub fn new(pointer: u32, phase: TouchPhase, x: f32, y: f32) -> Self {
        TouchEvent {
            pointer,
            phase,
            x,
            y,
        }
    }
}

//! Animation lifecycle notifications.
//!
//! An [`AnimationState`](crate::components::animation::AnimationState) reports
//! its transitions through an optional listener closure receiving an
//! [`AnimationEvent`]. Listeners run synchronously on the loop thread, inside
//! the tick that caused the transition.
//!
//! # Example
//!
//! ```ignore
//! let anim = AnimationState::scalar(Attribute::Alpha, 0.0, 255.0, 500, tick_ms)
//!     .with_listener(|event| {
//!         if matches!(event, AnimationEvent::Finished { .. }) {
//!             log::info!("fade-in complete");
//!         }
//!     });
//! ```

use crate::components::animation::Attribute;

/// Transition reported by an animation to its listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationEvent {
    /// `CREATED -> RUNNING`.
    Started { attribute: Attribute },
    /// A looping run exhausted its samples and wrapped to the first one.
    Repeated { attribute: Attribute, iteration: u32 },
    /// `RUNNING -> FINISHED`, by exhaustion, deadline, or an explicit stop.
    Finished { attribute: Attribute },
}

/// Boxed listener attached to an animation.
pub type AnimationListener = Box<dyn FnMut(&AnimationEvent) + Send>;

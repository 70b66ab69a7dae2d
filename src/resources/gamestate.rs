//! Application states and the registry that switches between them.
//!
//! An [`AppState`] is one screen of the application: it owns a scene graph
//! and hooks for init, per-tick update, render and cleanup. The
//! [`StateRegistry`] holds every registered state under a string key and
//! keeps track of which one is active.
//!
//! Switching is a strict handshake: the previously active state's
//! [`AppState::cleanup`] runs to completion before the new state's
//! [`AppState::init`], and nothing is active in between. Callers that share
//! the registry across threads hold it behind the context's lock, so a
//! transition is never observed half-done (see
//! [`EngineContext::activate`](crate::resources::context::EngineContext::activate)).

use log::{debug, info, warn};
use rustc_hash::FxHashMap;

use crate::events::input::{KeyEvent, TouchEvent};
use crate::resources::gameconfig::EngineConfig;
use crate::resources::worldtime::WorldTime;
use crate::scene::Scene;
use crate::systems::render::Surface;

/// One application screen driven by the game loop.
pub trait AppState: Send {
    fn scene(&self) -> &Scene;
    fn scene_mut(&mut self) -> &mut Scene;

    /// Called each time the state becomes active.
    fn init(&mut self, _config: &EngineConfig) {}

    /// State-specific logic, run after the scene graph has been updated.
    fn on_update(&mut self, _time: &WorldTime) {}

    /// One logical tick. Defaults to a scene update followed by
    /// [`AppState::on_update`].
    fn update_logic(&mut self, time: &WorldTime) {
        self.scene_mut().update_logic(time);
        self.on_update(time);
    }

    /// Draw the state. Defaults to drawing the scene graph.
    fn render(&mut self, surface: &mut dyn Surface, time: &WorldTime) -> Result<(), String> {
        self.scene().draw(surface, time).map(|_| ())
    }

    /// Called when another state replaces this one.
    fn cleanup(&mut self) {}

    /// Returns `true` when the event was consumed.
    fn on_key_event(&mut self, _event: &KeyEvent) -> bool {
        false
    }

    /// Returns `true` when the event was consumed.
    fn on_touch_event(&mut self, _event: &TouchEvent) -> bool {
        false
    }
}

/// Outcome of [`StateRegistry::activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The requested state is now active.
    Switched,
    /// The requested state was already active; no hooks ran.
    AlreadyActive,
    /// No state is registered under the key; nothing changed.
    UnknownState,
}

/// Owns every [`AppState`] and tracks the active one.
#[derive(Default)]
pub struct StateRegistry {
    states: FxHashMap<String, Box<dyn AppState>>,
    order: Vec<String>,
    active: Option<String>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `state` under `key`.
    ///
    /// A key can only be registered once; a duplicate is rejected and
    /// `false` returned.
    pub fn register(&mut self, key: impl Into<String>, state: Box<dyn AppState>) -> bool {
        let key = key.into();
        if self.states.contains_key(&key) {
            warn!("State '{}' is already registered, ignoring", key);
            return false;
        }
        info!("Registered state '{}'", key);
        self.order.push(key.clone());
        self.states.insert(key, state);
        true
    }

    /// Make `key` the active state.
    ///
    /// Runs the current state's cleanup, then the new state's init, each
    /// exactly once. Activating the active state again, or an unknown key,
    /// changes nothing.
    pub fn activate(&mut self, key: &str, config: &EngineConfig) -> Activation {
        if !self.states.contains_key(key) {
            warn!("Cannot activate unknown state '{}'", key);
            return Activation::UnknownState;
        }
        if self.active.as_deref() == Some(key) {
            debug!("State '{}' is already active", key);
            return Activation::AlreadyActive;
        }
        let previous = self.active.take();
        if let Some(old) = previous.as_deref() {
            debug!("Calling cleanup() on '{}'", old);
            if let Some(state) = self.states.get_mut(old) {
                state.cleanup();
            }
        }
        info!(
            "Transitioning from {} to '{}'",
            previous.as_deref().map_or("<none>".to_string(), |k| format!("'{}'", k)),
            key
        );
        if let Some(state) = self.states.get_mut(key) {
            debug!("Calling init() on '{}'", key);
            state.init(config);
        }
        self.active = Some(key.to_string());
        Activation::Switched
    }

    /// Clean up and clear the active state, if any.
    pub fn deactivate(&mut self) -> bool {
        let Some(key) = self.active.take() else {
            return false;
        };
        if let Some(state) = self.states.get_mut(&key) {
            state.cleanup();
        }
        info!("Deactivated state '{}'", key);
        true
    }

    pub fn active(&self) -> Option<&dyn AppState> {
        let key = self.active.as_deref()?;
        self.states.get(key).map(|s| s.as_ref())
    }

    pub fn active_mut(&mut self) -> Option<&mut (dyn AppState + 'static)> {
        let key = self.active.as_deref()?;
        self.states.get_mut(key).map(|s| s.as_mut())
    }

    pub fn active_key(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// First registered key, in registration order.
    pub fn first_key(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    /// Registered keys, in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.states.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Route a key event to the active state.
    pub fn dispatch_key(&mut self, event: &KeyEvent) -> bool {
        self.active_mut().is_some_and(|s| s.on_key_event(event))
    }

    /// Route a touch event to the active state.
    pub fn dispatch_touch(&mut self, event: &TouchEvent) -> bool {
        self.active_mut().is_some_and(|s| s.on_touch_event(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::input::TouchPhase;
    use crate::spatial::SpatialBackend;
    use std::sync::{Arc, Mutex};

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Probe {
        name: &'static str,
        scene: Scene,
        journal: Journal,
    }

    impl Probe {
        fn boxed(name: &'static str, journal: &Journal) -> Box<dyn AppState> {
            Box::new(Probe {
                name,
                scene: Scene::new(SpatialBackend::list()),
                journal: journal.clone(),
            })
        }

        fn log(&self, what: &str) {
            self.journal.lock().unwrap().push(format!("{}.{}", self.name, what));
        }
    }

    impl AppState for Probe {
        fn scene(&self) -> &Scene {
            &self.scene
        }
        fn scene_mut(&mut self) -> &mut Scene {
            &mut self.scene
        }
        fn init(&mut self, _config: &EngineConfig) {
            self.log("init");
        }
        fn cleanup(&mut self) {
            self.log("cleanup");
        }
        fn on_key_event(&mut self, event: &KeyEvent) -> bool {
            self.log(&format!("key{}", event.code));
            true
        }
    }

    fn registry(journal: &Journal) -> StateRegistry {
        let mut registry = StateRegistry::new();
        registry.register("a", Probe::boxed("a", journal));
        registry.register("b", Probe::boxed("b", journal));
        registry
    }

    #[test]
    fn test_nothing_active_initially() {
        let journal = Journal::default();
        let registry = registry(&journal);
        assert!(registry.active().is_none());
        assert_eq!(registry.first_key(), Some("a"));
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_cleanup_runs_before_init() {
        let journal = Journal::default();
        let mut registry = registry(&journal);
        let config = EngineConfig::new();
        assert_eq!(registry.activate("a", &config), Activation::Switched);
        assert_eq!(registry.activate("b", &config), Activation::Switched);
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["a.init", "a.cleanup", "b.init"]
        );
        assert_eq!(registry.active_key(), Some("b"));
    }

    #[test]
    fn test_reactivation_and_unknown_are_noops() {
        let journal = Journal::default();
        let mut registry = registry(&journal);
        let config = EngineConfig::new();
        registry.activate("a", &config);
        assert_eq!(registry.activate("a", &config), Activation::AlreadyActive);
        assert_eq!(registry.activate("zzz", &config), Activation::UnknownState);
        assert_eq!(*journal.lock().unwrap(), vec!["a.init"]);
        assert_eq!(registry.active_key(), Some("a"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let journal = Journal::default();
        let mut registry = registry(&journal);
        assert!(!registry.register("a", Probe::boxed("dup", &journal)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_deactivate_cleans_up() {
        let journal = Journal::default();
        let mut registry = registry(&journal);
        assert!(!registry.deactivate());
        registry.activate("b", &EngineConfig::new());
        assert!(registry.deactivate());
        assert!(registry.active().is_none());
        assert_eq!(*journal.lock().unwrap(), vec!["b.init", "b.cleanup"]);
    }

    #[test]
    fn test_input_goes_to_active_state() {
        let journal = Journal::default();
        let mut registry = registry(&journal);
        let key = KeyEvent::new(7, true);
        assert!(!registry.dispatch_key(&key));
        registry.activate("b", &EngineConfig::new());
        assert!(registry.dispatch_key(&key));
        let touch = TouchEvent::new(0, TouchPhase::Down, 1.0, 1.0);
        assert!(!registry.dispatch_touch(&touch));
        assert_eq!(journal.lock().unwrap().last().map(String::as_str), Some("b.key7"));
    }
}

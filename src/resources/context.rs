//! Shared engine context.
//!
//! One [`EngineContext`] exists per run. It owns the configuration, the loop
//! control flags, the [`StateRegistry`] behind its lock, and the command
//! queue host threads use to talk to the loop thread. It is created by the
//! host, wrapped in an `Arc`, and handed to the
//! [`GameLoop`](crate::systems::gameloop::GameLoop).
//!
//! Two ways exist to act on the loop from another thread:
//!
//! - call [`EngineContext::activate`] or [`EngineContext::with_active`]
//!   directly; they take the registry lock, so they wait for the current
//!   frame to finish and the next frame sees the finished result
//! - enqueue an [`EngineCmd`] with [`EngineContext::send`]; the loop applies
//!   queued commands at the start of its next iteration
//!
//! # Related
//! - [`crate::resources::gamestate::StateRegistry`]
//! - [`crate::systems::gameloop::GameLoop`]

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, info};

use crate::events::input::{KeyEvent, TouchEvent};
use crate::resources::gameconfig::EngineConfig;
use crate::resources::gamestate::{Activation, AppState, StateRegistry};

/// Loop control flags, readable without taking any lock.
#[derive(Debug, Default)]
pub struct LoopFlags {
    running: AtomicBool,
    paused: AtomicBool,
    changing: AtomicBool,
}

impl LoopFlags {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Ask the loop to exit at its next iteration boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// `true` while a state transition is in flight.
    pub fn is_changing(&self) -> bool {
        self.changing.load(Ordering::SeqCst)
    }

    pub(crate) fn set_changing(&self, changing: bool) {
        self.changing.store(changing, Ordering::SeqCst);
    }

    /// The loop neither updates nor renders while this holds.
    pub fn should_hold(&self) -> bool {
        self.is_paused() || self.is_changing()
    }
}

/// Work a host thread asks the loop thread to perform.
pub enum EngineCmd {
    Activate(String),
    Pause,
    Resume,
    Stop,
    Key(KeyEvent),
    Touch(TouchEvent),
    /// Run a closure against the active state, e.g. to add entities.
    WithActive(Box<dyn FnOnce(&mut dyn AppState) + Send>),
}

impl fmt::Debug for EngineCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineCmd::Activate(key) => f.debug_tuple("Activate").field(key).finish(),
            EngineCmd::Pause => write!(f, "Pause"),
            EngineCmd::Resume => write!(f, "Resume"),
            EngineCmd::Stop => write!(f, "Stop"),
            EngineCmd::Key(e) => f.debug_tuple("Key").field(e).finish(),
            EngineCmd::Touch(e) => f.debug_tuple("Touch").field(e).finish(),
            EngineCmd::WithActive(_) => write!(f, "WithActive(..)"),
        }
    }
}

/// Everything shared between the loop thread and the host.
pub struct EngineContext {
    config: EngineConfig,
    flags: LoopFlags,
    registry: Mutex<StateRegistry>,
    tx_cmd: Sender<EngineCmd>,
    rx_cmd: Receiver<EngineCmd>,
}

impl EngineContext {
    pub fn new(config: EngineConfig) -> Self {
        let (tx_cmd, rx_cmd) = unbounded::<EngineCmd>();
        EngineContext {
            config,
            flags: LoopFlags::default(),
            registry: Mutex::new(StateRegistry::new()),
            tx_cmd,
            rx_cmd,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn flags(&self) -> &LoopFlags {
        &self.flags
    }

    /// Lock the registry. A lock poisoned by a panicking state is recovered.
    pub fn lock_registry(&self) -> MutexGuard<'_, StateRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, key: impl Into<String>, state: Box<dyn AppState>) -> bool {
        self.lock_registry().register(key, state)
    }

    /// Switch the active state.
    ///
    /// The `changing` flag is raised for the whole transition, and the
    /// registry lock is held while cleanup and init run, so the loop never
    /// updates or renders a half-switched state.
    pub fn activate(&self, key: &str) -> Activation {
        self.flags.set_changing(true);
        let result = self.lock_registry().activate(key, &self.config);
        self.flags.set_changing(false);
        result
    }

    pub fn active_key(&self) -> Option<String> {
        self.lock_registry().active_key().map(str::to_string)
    }

    /// Run `f` against the active state under the registry lock.
    pub fn with_active<R>(&self, f: impl FnOnce(&mut dyn AppState) -> R) -> Option<R> {
        let mut registry = self.lock_registry();
        registry.active_mut().map(|state| f(state))
    }

    /// A sender host threads can keep for queueing commands.
    pub fn sender(&self) -> Sender<EngineCmd> {
        self.tx_cmd.clone()
    }

    pub fn send(&self, cmd: EngineCmd) {
        // the context owns a receiver, so the channel is never disconnected
        let _ = self.tx_cmd.send(cmd);
    }

    /// Apply every queued command. Returns how many were applied.
    pub fn drain_commands(&self) -> usize {
        let mut applied = 0;
        while let Ok(cmd) = self.rx_cmd.try_recv() {
            debug!("Applying {:?}", cmd);
            match cmd {
                EngineCmd::Activate(key) => {
                    self.activate(&key);
                }
                EngineCmd::Pause => self.flags.pause(),
                EngineCmd::Resume => self.flags.resume(),
                EngineCmd::Stop => {
                    info!("Stop requested");
                    self.flags.stop();
                }
                EngineCmd::Key(e) => {
                    self.lock_registry().dispatch_key(&e);
                }
                EngineCmd::Touch(e) => {
                    self.lock_registry().dispatch_touch(&e);
                }
                EngineCmd::WithActive(f) => {
                    self.with_active(f);
                }
            }
            applied += 1;
        }
        applied
    }
}

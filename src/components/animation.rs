//! Per-entity attribute animations.
//!
//! An [`AnimationState`] drives one numeric [`Attribute`] of its owning
//! entity through a precomputed table of samples, one sample per logical
//! tick. The table is built once at construction:
//!
//! ```text
//! N          = max(1, duration_ms / tick_ms)
//! sample[i]  = start + (end - start) * ease(i / N)      for i in 0..N
//! ```
//!
//! With [`Easing::Linear`] this is `start*(1-i/N) + end*(i/N)`.
//!
//! # State machine
//!
//! ```text
//! Created --start()--> Running --(samples exhausted, !looping)--> Finished
//! Running --(samples exhausted, looping)--> Running   (Repeated event)
//! Finished --reset()--> Created
//! any --stop()--> Finished
//! ```
//!
//! `tick` is a no-op outside `Running`. An optional stop-after duration arms
//! a deadline on the logical clock when the animation starts; the deadline is
//! checked at the top of every tick and cleared by `stop`/`reset`.
//!
//! Animations are stored inside the entity they target, so they can never
//! outlive it. See [`Entity::update_logic`](super::entity::Entity::update_logic).

use std::fmt;

use crate::components::entity::Transform;
use crate::components::geometry::Vec2;
use crate::events::animation::{AnimationEvent, AnimationListener};

/// Entity attribute an animation writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Both position components, interpolated together.
    Position,
    PositionX,
    PositionY,
    /// Rotation in degrees.
    Angle,
    /// Uniform scale, clamped to `>= 0` when written.
    Scale,
    /// Opacity, rounded and clamped to `0..=255` when written.
    Alpha,
}

impl Attribute {
    /// Read the attribute's current value as a pair (second lane unused for scalars).
    pub fn read(self, t: &Transform) -> [f32; 2] {
        match self {
            Attribute::Position => [t.x, t.y],
            Attribute::PositionX => [t.x, 0.0],
            Attribute::PositionY => [t.y, 0.0],
            Attribute::Angle => [t.angle, 0.0],
            Attribute::Scale => [t.scale(), 0.0],
            Attribute::Alpha => [t.alpha as f32, 0.0],
        }
    }

    /// Write a value produced by the sample table.
    pub fn write(self, t: &mut Transform, v: [f32; 2]) {
        match self {
            Attribute::Position => {
                t.x = v[0];
                t.y = v[1];
            }
            Attribute::PositionX => t.x = v[0],
            Attribute::PositionY => t.y = v[0],
            Attribute::Angle => t.angle = v[0],
            Attribute::Scale => t.set_scale(v[0]),
            Attribute::Alpha => t.set_alpha_f32(v[0]),
        }
    }
}

/// Easing curves applied to the normalized sample position.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    #[default]
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
}

impl Easing {
    /// Map `t` in `[0, 1]` onto the curve. Inputs are clamped.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadIn => t * t,
            Easing::QuadOut => t * (2.0 - t),
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::CubicIn => t * t * t,
            Easing::CubicOut => {
                let p = t - 1.0;
                p * p * p + 1.0
            }
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let p = 2.0 * t - 2.0;
                    0.5 * p * p * p + 1.0
                }
            }
        }
    }
}

/// Lifecycle phase of an [`AnimationState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Created,
    Running,
    Finished,
}

/// A single interpolation run over one attribute.
pub struct AnimationState {
    attribute: Attribute,
    start: [f32; 2],
    end: [f32; 2],
    duration_ms: u64,
    tick_ms: u64,
    easing: Easing,
    samples: Vec<[f32; 2]>,
    index: usize,
    phase: Phase,
    looping: bool,
    reset_on_finish: bool,
    stop_after_ms: Option<u64>,
    deadline_ms: Option<u64>,
    /// Attribute value captured at `start`, restored when `reset_on_finish` is set.
    origin: Option<[f32; 2]>,
    iterations: u32,
    listener: Option<AnimationListener>,
}

impl fmt::Debug for AnimationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationState")
            .field("attribute", &self.attribute)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("duration_ms", &self.duration_ms)
            .field("phase", &self.phase)
            .field("index", &self.index)
            .field("samples", &self.samples.len())
            .field("looping", &self.looping)
            .field("reset_on_finish", &self.reset_on_finish)
            .field("deadline_ms", &self.deadline_ms)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl AnimationState {
    /// Animate a scalar attribute from `from` to `to`.
    ///
    /// `tick_ms` is the loop's fixed tick length; it determines how many
    /// samples the table holds.
    pub fn scalar(attribute: Attribute, from: f32, to: f32, duration_ms: u64, tick_ms: u64) -> Self {
        Self::build(attribute, [from, 0.0], [to, 0.0], duration_ms, tick_ms)
    }

    /// Animate the entity's position from `from` to `to`.
    pub fn movement(from: Vec2, to: Vec2, duration_ms: u64, tick_ms: u64) -> Self {
        Self::build(
            Attribute::Position,
            [from.x, from.y],
            [to.x, to.y],
            duration_ms,
            tick_ms,
        )
    }

    fn build(attribute: Attribute, start: [f32; 2], end: [f32; 2], duration_ms: u64, tick_ms: u64) -> Self {
        let mut anim = AnimationState {
            attribute,
            start,
            end,
            duration_ms,
            tick_ms,
            easing: Easing::Linear,
            samples: Vec::new(),
            index: 0,
            phase: Phase::Created,
            looping: false,
            reset_on_finish: false,
            stop_after_ms: None,
            deadline_ms: None,
            origin: None,
            iterations: 0,
            listener: None,
        };
        anim.samples = anim.compute_samples();
        anim
    }

    fn compute_samples(&self) -> Vec<[f32; 2]> {
        let n = sample_count(self.duration_ms, self.tick_ms);
        (0..n)
            .map(|i| {
                let t = self.easing.apply(i as f32 / n as f32);
                [
                    self.start[0] + (self.end[0] - self.start[0]) * t,
                    self.start[1] + (self.end[1] - self.start[1]) * t,
                ]
            })
            .collect()
    }

    /// Reshape the sample table with an easing curve.
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self.samples = self.compute_samples();
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_reset_on_finish(mut self, reset: bool) -> Self {
        self.reset_on_finish = reset;
        self
    }

    /// Force the animation to finish `ms` logical milliseconds after it starts.
    pub fn with_stop_after(mut self, ms: u64) -> Self {
        self.stop_after_ms = Some(ms);
        self
    }

    pub fn with_listener(mut self, listener: impl FnMut(&AnimationEvent) + Send + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn attribute(&self) -> Attribute {
        self.attribute
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Index of the next sample to be written.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn samples(&self) -> &[[f32; 2]] {
        &self.samples
    }

    pub fn sample_len(&self) -> usize {
        self.samples.len()
    }

    /// Number of completed loop iterations.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }

    fn emit(&mut self, event: AnimationEvent) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&event);
        }
    }

    /// Begin the run. Only valid from `Created`; otherwise a no-op.
    ///
    /// Captures the attribute's current value so `reset_on_finish` can
    /// restore it, and arms the stop-after deadline relative to `now_ms`.
    /// Returns `true` when the animation actually started.
    pub fn start(&mut self, target: &Transform, now_ms: u64) -> bool {
        if self.phase != Phase::Created {
            return false;
        }
        self.phase = Phase::Running;
        self.index = 0;
        self.origin = Some(self.attribute.read(target));
        self.deadline_ms = self.stop_after_ms.map(|ms| now_ms.saturating_add(ms));
        let attribute = self.attribute;
        self.emit(AnimationEvent::Started { attribute });
        true
    }

    /// Advance by one logical tick.
    ///
    /// Writes `sample[index]` to the target and moves the index forward.
    /// Returns `true` while the animation is still running afterwards.
    pub fn tick(&mut self, target: &mut Transform, now_ms: u64) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        if self.deadline_ms.is_some_and(|deadline| now_ms >= deadline) {
            self.finish(target, false);
            return false;
        }
        // samples is never empty: sample_count() is at least 1
        let value = self.samples[self.index];
        self.attribute.write(target, value);
        self.index += 1;
        if self.index >= self.samples.len() {
            if self.looping {
                self.index = 0;
                self.iterations += 1;
                let attribute = self.attribute;
                let iteration = self.iterations;
                self.emit(AnimationEvent::Repeated {
                    attribute,
                    iteration,
                });
            } else {
                self.finish(target, true);
                return false;
            }
        }
        true
    }

    /// Transition to `Finished`, leaving the target at `end` (when `pin_end`)
    /// or at its captured origin (when `reset_on_finish`).
    fn finish(&mut self, target: &mut Transform, pin_end: bool) {
        self.phase = Phase::Finished;
        self.deadline_ms = None;
        if self.reset_on_finish {
            if let Some(origin) = self.origin {
                self.attribute.write(target, origin);
            }
        } else if pin_end {
            self.attribute.write(target, self.end);
        }
        let attribute = self.attribute;
        self.emit(AnimationEvent::Finished { attribute });
    }

    /// Stop immediately. Cancels any deadline; idempotent.
    ///
    /// The target is left wherever the last tick put it. `Finished` is only
    /// reported when the animation was running.
    pub fn stop(&mut self) {
        self.deadline_ms = None;
        let was_running = self.phase == Phase::Running;
        self.phase = Phase::Finished;
        if was_running {
            let attribute = self.attribute;
            self.emit(AnimationEvent::Finished { attribute });
        }
    }

    /// Return to `Created` so the animation can be started again. Idempotent.
    pub fn reset(&mut self) {
        self.deadline_ms = None;
        self.phase = Phase::Created;
        self.index = 0;
        self.iterations = 0;
    }
}

/// Number of samples for a run of `duration_ms` at `tick_ms` per tick.
pub fn sample_count(duration_ms: u64, tick_ms: u64) -> usize {
    let tick_ms = tick_ms.max(1);
    ((duration_ms / tick_ms) as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn recorder() -> (Arc<Mutex<Vec<AnimationEvent>>>, impl FnMut(&AnimationEvent) + Send + 'static) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (log, move |e: &AnimationEvent| sink.lock().unwrap().push(*e))
    }

    // ==================== SAMPLE TABLE ====================

    #[test]
    fn test_sample_count_derivation() {
        assert_eq!(sample_count(1000, 20), 50);
        assert_eq!(sample_count(10, 20), 1);
        assert_eq!(sample_count(0, 20), 1);
        assert_eq!(sample_count(1000, 0), 1000);
    }

    #[test]
    fn test_linear_samples_match_formula() {
        let anim = AnimationState::scalar(Attribute::PositionX, 0.0, 100.0, 1000, 20);
        assert_eq!(anim.sample_len(), 50);
        assert!(approx_eq(anim.samples()[0][0], 0.0));
        assert!(approx_eq(anim.samples()[25][0], 50.0));
        assert!(approx_eq(anim.samples()[49][0], 98.0));
    }

    #[test]
    fn test_easing_reshapes_table() {
        let anim = AnimationState::scalar(Attribute::Angle, 0.0, 100.0, 1000, 20)
            .with_easing(Easing::QuadIn);
        assert!(approx_eq(anim.samples()[25][0], 25.0));
    }

    #[test]
    fn test_easing_endpoints() {
        for e in [
            Easing::Linear,
            Easing::QuadIn,
            Easing::QuadOut,
            Easing::QuadInOut,
            Easing::CubicIn,
            Easing::CubicOut,
            Easing::CubicInOut,
        ] {
            assert!(approx_eq(e.apply(0.0), 0.0), "{e:?} at 0");
            assert!(approx_eq(e.apply(1.0), 1.0), "{e:?} at 1");
            assert!(approx_eq(e.apply(2.0), 1.0), "{e:?} clamps");
        }
    }

    // ==================== STATE MACHINE ====================

    #[test]
    fn test_tick_is_noop_before_start() {
        let mut t = Transform::default();
        let mut anim = AnimationState::scalar(Attribute::PositionX, 0.0, 100.0, 1000, 20);
        t.x = 7.0;
        assert!(!anim.tick(&mut t, 0));
        assert!(approx_eq(t.x, 7.0));
        assert_eq!(anim.phase(), Phase::Created);
    }

    #[test]
    fn test_runs_to_end_value_and_finishes() {
        let mut t = Transform::default();
        let mut anim = AnimationState::scalar(Attribute::PositionX, 0.0, 100.0, 1000, 20);
        assert!(anim.start(&t, 0));
        for i in 0..49 {
            assert!(anim.tick(&mut t, i * 20));
        }
        assert!(approx_eq(t.x, 96.0));
        assert!(!anim.tick(&mut t, 49 * 20));
        assert!(approx_eq(t.x, 100.0));
        assert_eq!(anim.phase(), Phase::Finished);
        assert!(!anim.tick(&mut t, 50 * 20));
        assert!(approx_eq(t.x, 100.0));
    }

    #[test]
    fn test_loop_wraps_to_first_sample() {
        let mut t = Transform::default();
        let (log, listener) = recorder();
        let mut anim = AnimationState::scalar(Attribute::Angle, 10.0, 20.0, 100, 20)
            .with_loop(true)
            .with_listener(listener);
        anim.start(&t, 0);
        for _ in 0..5 {
            anim.tick(&mut t, 0);
        }
        assert_eq!(anim.index(), 0);
        assert_eq!(anim.iterations(), 1);
        assert!(approx_eq(t.angle, 18.0));
        anim.tick(&mut t, 0);
        assert!(approx_eq(t.angle, 10.0));
        assert!(anim.is_running());
        let events = log.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                AnimationEvent::Started {
                    attribute: Attribute::Angle
                },
                AnimationEvent::Repeated {
                    attribute: Attribute::Angle,
                    iteration: 1
                },
            ]
        );
    }

    #[test]
    fn test_reset_on_finish_restores_origin() {
        let mut t = Transform::default();
        t.set_scale(2.0);
        let mut anim =
            AnimationState::scalar(Attribute::Scale, 0.0, 4.0, 60, 20).with_reset_on_finish(true);
        anim.start(&t, 0);
        anim.tick(&mut t, 0);
        anim.tick(&mut t, 20);
        assert!(approx_eq(t.scale(), 4.0 / 3.0));
        anim.tick(&mut t, 40);
        assert!(anim.is_finished());
        assert!(approx_eq(t.scale(), 2.0));
    }

    #[test]
    fn test_deadline_stops_run_early() {
        let mut t = Transform::default();
        let (log, listener) = recorder();
        let mut anim = AnimationState::scalar(Attribute::PositionY, 0.0, 100.0, 1000, 20)
            .with_loop(true)
            .with_stop_after(100)
            .with_listener(listener);
        anim.start(&t, 1000);
        assert_eq!(anim.deadline_ms(), Some(1100));
        let mut now = 1000;
        while anim.tick(&mut t, now) {
            now += 20;
        }
        assert_eq!(now, 1100);
        assert!(anim.is_finished());
        assert_eq!(anim.deadline_ms(), None);
        // left where the last sample put it, not pinned to `end`
        assert!(approx_eq(t.y, 8.0));
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_stop_and_reset_are_idempotent() {
        let t = Transform::default();
        let (log, listener) = recorder();
        let mut anim = AnimationState::scalar(Attribute::Alpha, 0.0, 255.0, 200, 20)
            .with_stop_after(50)
            .with_listener(listener);
        anim.start(&t, 0);
        anim.stop();
        anim.stop();
        assert!(anim.is_finished());
        assert_eq!(anim.deadline_ms(), None);
        anim.reset();
        anim.reset();
        assert_eq!(anim.phase(), Phase::Created);
        assert_eq!(anim.index(), 0);
        assert!(anim.start(&t, 10));
        assert_eq!(anim.deadline_ms(), Some(60));
        // Started, Finished (single stop), Started
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_start_is_noop_unless_created() {
        let t = Transform::default();
        let mut anim = AnimationState::scalar(Attribute::Alpha, 0.0, 255.0, 200, 20);
        assert!(anim.start(&t, 0));
        assert!(!anim.start(&t, 0));
        anim.stop();
        assert!(!anim.start(&t, 0));
    }

    #[test]
    fn test_alpha_writes_are_clamped() {
        let mut t = Transform::default();
        Attribute::Alpha.write(&mut t, [300.0, 0.0]);
        assert_eq!(t.alpha, 255);
        Attribute::Alpha.write(&mut t, [-5.0, 0.0]);
        assert_eq!(t.alpha, 0);
        Attribute::Alpha.write(&mut t, [127.6, 0.0]);
        assert_eq!(t.alpha, 128);
    }

    #[test]
    fn test_movement_interpolates_both_axes() {
        let mut t = Transform::default();
        let mut anim = AnimationState::movement(Vec2::new(0.0, 0.0), Vec2::new(10.0, -10.0), 40, 20);
        anim.start(&t, 0);
        anim.tick(&mut t, 0);
        anim.tick(&mut t, 20);
        assert!(approx_eq(t.x, 10.0));
        assert!(approx_eq(t.y, -10.0));
    }
}

//! Smoothed counter animation.
//!
//! Modeled as a discrete time-stepped interpolation, independent of any
//! scheduling primitive, so it is testable without a real clock. At 100%
//! the value snaps exactly to target; given enough idle time the displayed
//! counter always equals the last-set target.

use std::time::{Duration, Instant};

/// The minimum interpolation duration.
pub const MIN_ANIMATION: Duration = Duration::from_millis(100);
/// The maximum interpolation duration.
pub const MAX_ANIMATION: Duration = Duration::from_millis(400);

/// Interpolation duration for a jump, proportional to its magnitude at one
/// millisecond per unit, clamped to the animation bounds.
pub fn duration_for(start: f64, target: f64) -> Duration {
    let jump = (target - start).abs();
    let ms = (MIN_ANIMATION.as_millis() as f64 + jump).min(MAX_ANIMATION.as_millis() as f64);
    Duration::from_millis(ms as u64)
}

/// An ease-in-ease-out curve over `t` in `[0, 1]`.
pub fn ease_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// The interpolated value at `elapsed` into an animation.
pub fn value_at(elapsed: Duration, start: f64, target: f64, duration: Duration) -> f64 {
    if duration.is_zero() || elapsed >= duration {
        return target;
    }
    start + (target - start) * ease_in_out(elapsed.as_secs_f64() / duration.as_secs_f64())
}

/// One step's independent counter interpolation.
#[derive(Clone, Debug)]
pub struct CounterAnim {
    start: f64,
    target: f64,
    started_at: Instant,
    duration: Duration,
}

impl CounterAnim {
    /// An animation already at rest on the given value.
    pub fn idle(value: f64) -> Self {
        Self {
            start: value,
            target: value,
            started_at: tokio::time::Instant::now().into_std(),
            duration: Duration::ZERO,
        }
    }

    /// The target this animation is converging to.
    pub fn target(&self) -> f64 {
        self.target
    }

    /// The displayed value at the given instant.
    pub fn value(&self, now: Instant) -> f64 {
        value_at(now.saturating_duration_since(self.started_at), self.start, self.target, self.duration)
    }

    /// Begin interpolating towards a new target from the currently displayed
    /// value. A target equal to the current one leaves the animation alone;
    /// a new target mid-animation cancels and restarts the interpolation.
    pub fn retarget(&mut self, now: Instant, target: f64) {
        if (target - self.target).abs() < f64::EPSILON {
            return;
        }
        let current = self.value(now);
        self.start = current;
        self.target = target;
        self.started_at = now;
        self.duration = duration_for(current, target);
    }

    /// Snap to the given value immediately, cancelling any interpolation.
    pub fn snap(&mut self, value: f64) {
        self.start = value;
        self.target = value;
        self.duration = Duration::ZERO;
    }
}

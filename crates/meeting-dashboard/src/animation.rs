//! Counter animation.
//!
//! Each displayed metric animates independently from the value currently on
//! screen to its new value over a fixed duration. Animation state is a plain
//! value advanced by elapsed time, so nothing here touches the metric store.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Linear interpolation with `progress` clamped to `[0, 1]`.
///
/// Returns exactly `to` once progress reaches 1. Intermediate values lie
/// strictly between the endpoints only while `(to - from) * progress` is
/// representable next to `from` in `f64`. Past about 2^52 a small step can
/// round back to `from`; meeting counts and capital sums stay far below that.
pub fn interpolate(from: f64, to: f64, progress: f64) -> f64 {
    let progress = progress.clamp(0.0, 1.0);
    if progress >= 1.0 {
        to
    } else if progress <= 0.0 {
        from
    } else {
        from + (to - from) * progress
    }
}

/// One in-flight transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationState {
    pub from: f64,
    pub to: f64,
    pub started_at: Instant,
    pub duration: Duration,
}

impl AnimationState {
    pub fn new(from: f64, to: f64, started_at: Instant, duration: Duration) -> Self {
        Self {
            from,
            to,
            started_at,
            duration,
        }
    }

    /// Fraction of the duration elapsed at `now`, in `[0, 1]`.
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    pub fn value_at(&self, now: Instant) -> f64 {
        interpolate(self.from, self.to, self.progress(now))
    }

    pub fn is_complete(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }
}

/// Tracks the on-screen value of every animated metric.
#[derive(Debug, Clone)]
pub struct Interpolator<K> {
    duration: Duration,
    settled: HashMap<K, f64>,
    animations: HashMap<K, AnimationState>,
}

impl<K: Copy + Eq + Hash> Interpolator<K> {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            settled: HashMap::new(),
            animations: HashMap::new(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Value to show for `key` at `now`. Unknown keys display 0.
    pub fn displayed(&self, key: K, now: Instant) -> f64 {
        match self.animations.get(&key) {
            Some(animation) => animation.value_at(now),
            None => self.settled.get(&key).copied().unwrap_or(0.0),
        }
    }

    /// Animate `key` towards `to`, starting from whatever is on screen now.
    ///
    /// An in-flight animation is replaced, and the new one starts from its
    /// partially interpolated value so the display never jumps.
    pub fn retarget(&mut self, key: K, to: f64, now: Instant) {
        if let Some(animation) = self.animations.get(&key) {
            if animation.to == to {
                return;
            }
        }

        let from = self.displayed(key, now);
        if from == to {
            self.animations.remove(&key);
            self.settled.insert(key, to);
            return;
        }

        self.animations
            .insert(key, AnimationState::new(from, to, now, self.duration));
    }

    /// Show `value` for `key` immediately, cancelling any animation.
    pub fn snap(&mut self, key: K, value: f64) {
        self.animations.remove(&key);
        self.settled.insert(key, value);
    }

    /// Retire animations that have finished by `now`.
    ///
    /// Returns true while any animation is still running.
    pub fn tick(&mut self, now: Instant) -> bool {
        let finished: Vec<K> = self
            .animations
            .iter()
            .filter(|(_, animation)| animation.is_complete(now))
            .map(|(key, _)| *key)
            .collect();

        for key in finished {
            if let Some(animation) = self.animations.remove(&key) {
                self.settled.insert(key, animation.to);
            }
        }

        !self.animations.is_empty()
    }

    pub fn is_animating(&self, key: K) -> bool {
        self.animations.contains_key(&key)
    }

    pub fn animation(&self, key: K) -> Option<&AnimationState> {
        self.animations.get(&key)
    }

    /// Drop all state, e.g. when the view is torn down.
    pub fn clear(&mut self) {
        self.animations.clear();
        self.settled.clear();
    }
}

//! Time-driven transitions sampled by the caller.
//!
//! Nothing here owns a clock: the caller passes `now` (seconds on any
//! monotonic timeline) and the current value is a pure function of it.

/// Values that can be blended between two endpoints.
pub trait Interpolate: Clone {
    /// Value at `alpha` in `[0, 1]` between `self` (0) and `to` (1).
    fn interpolate(&self, to: &Self, alpha: f64) -> Self;
}

/// A value moving from `from` to `to` over `[start, start + duration]`.
#[derive(Debug, Clone)]
pub struct Animated<T> {
    from: T,
    to: T,
    start: f64,
    duration: f64,
}

impl<T: Interpolate> Animated<T> {
    pub fn new(value: T) -> Self {
        Self {
            from: value.clone(),
            to: value,
            start: 0.0,
            duration: 0.0,
        }
    }

    /// Start a new transition from whatever value is showing at `now`.
    /// Replaces any transition still in flight.
    pub fn retarget(&mut self, to: T, now: f64, duration: f64) {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        self.from = self.sample(now);
        self.to = to;
        self.start = now;
        self.duration = duration;
    }

    /// Interpolation weight at `now`, in `[0, 1]`.
    pub fn progress(&self, now: f64) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start) / self.duration).clamp(0.0, 1.0)
    }

    /// Value at `now`. Exactly `from` at the start and exactly `to` once the
    /// duration has elapsed.
    pub fn sample(&self, now: f64) -> T {
        let alpha = self.progress(now);
        if alpha >= 1.0 {
            self.to.clone()
        } else if alpha <= 0.0 {
            self.from.clone()
        } else {
            self.from.interpolate(&self.to, alpha)
        }
    }

    pub fn target(&self) -> &T {
        &self.to
    }

    pub fn is_animating(&self, now: f64) -> bool {
        self.progress(now) < 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Interpolate for f64 {
        fn interpolate(&self, to: &Self, alpha: f64) -> Self {
            self + (to - self) * alpha
        }
    }

    #[test]
    fn test_immediate() {
        let mut value = Animated::new(1.0);
        value.retarget(3.0, 10.0, 0.0);
        assert_eq!(value.sample(10.0), 3.0);
        assert_eq!(value.sample(0.0), 3.0);
        assert!(!value.is_animating(10.0));
    }

    #[test]
    fn test_endpoints_are_exact() {
        let mut value = Animated::new(0.0);
        value.retarget(10.0, 2.0, 5.0);
        assert_eq!(value.sample(2.0), 0.0);
        assert_eq!(value.sample(4.5), 5.0);
        assert_eq!(value.sample(7.0), 10.0);
        assert_eq!(value.sample(100.0), 10.0);
        assert!(value.is_animating(6.9));
        assert!(!value.is_animating(7.0));
    }

    #[test]
    fn test_retarget_starts_from_current_value() {
        let mut value = Animated::new(0.0);
        value.retarget(10.0, 0.0, 10.0);
        value.retarget(-4.0, 5.0, 2.0);
        assert_eq!(*value.target(), -4.0);
        assert_eq!(value.sample(5.0), 5.0);
        assert_eq!(value.sample(6.0), 0.5);
        assert_eq!(value.sample(7.0), -4.0);
    }

    #[test]
    fn test_negative_duration_is_immediate() {
        let mut value = Animated::new(0.0);
        value.retarget(1.0, 0.0, -3.0);
        assert_eq!(value.sample(0.0), 1.0);
        value.retarget(2.0, 0.0, f64::NAN);
        assert_eq!(value.sample(0.0), 2.0);
    }
}

//! Parameter smoothing for zipper-free changes.
//!
//! Assigning an audio parameter (gain, frequency, delay time) directly
//! produces an audible discontinuity. [`SmoothedParam`] instead ramps the
//! value towards its target with a one-pole lowpass, so a `set_target` call
//! schedules a smooth transition starting at the current audio clock.

use libm::expf;

/// Default smoothing time for backend parameters.
pub const DEFAULT_SMOOTHING_MS: f32 = 10.0;

/// A parameter value with built-in one-pole smoothing.
///
/// The smoothing follows `y[n] = y[n-1] + coeff * (target - y[n-1])`, a
/// first-order IIR whose time constant tau (time to reach 63.2% of the
/// target) gives `coeff = 1 - exp(-1 / (tau * sample_rate))`. After 5*tau
/// the value is within 0.7% of the target, settled for audio purposes.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    coeff: f32,
    sample_rate: f32,
    smoothing_ms: f32,
}

impl SmoothedParam {
    /// Creates a smoothed parameter with the default 10 ms smoothing time.
    pub fn new(initial: f32, sample_rate: f32) -> Self {
        Self::with_smoothing(initial, sample_rate, DEFAULT_SMOOTHING_MS)
    }

    /// Creates a smoothed parameter with an explicit smoothing time.
    ///
    /// A smoothing time of 0 ms disables smoothing (instant changes).
    pub fn with_smoothing(initial: f32, sample_rate: f32, smoothing_ms: f32) -> Self {
        let mut param = Self {
            current: initial,
            target: initial,
            coeff: 1.0,
            sample_rate,
            smoothing_ms,
        };
        param.recalculate_coeff();
        param
    }

    /// Sets the target value; the parameter ramps towards it.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Sets the value immediately, bypassing the ramp.
    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.target = value;
        self.current = value;
    }

    /// Advances one sample and returns the smoothed value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.current += self.coeff * (self.target - self.current);
        self.current
    }

    /// Returns the current smoothed value without advancing.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Returns the target value.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Returns true once the ramp has effectively reached the target.
    #[inline]
    pub fn is_settled(&self) -> bool {
        (self.current - self.target).abs() < 1e-6
    }

    /// Updates the sample rate, preserving the smoothing time constant.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coeff();
    }

    fn recalculate_coeff(&mut self) {
        if self.smoothing_ms <= 0.0 || self.sample_rate <= 0.0 {
            self.coeff = 1.0;
        } else {
            let samples_per_tau = self.smoothing_ms / 1000.0 * self.sample_rate;
            self.coeff = 1.0 - expf(-1.0 / samples_per_tau);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_when_smoothing_disabled() {
        let mut param = SmoothedParam::with_smoothing(1.0, 48000.0, 0.0);
        param.set_target(0.25);
        assert!((param.advance() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn converges_to_target() {
        let mut param = SmoothedParam::new(0.0, 48000.0);
        param.set_target(1.0);

        // 50 ms = 5 time constants, should be within 1%
        for _ in 0..(48000 / 20) {
            param.advance();
        }
        assert!((param.get() - 1.0).abs() < 0.01, "got {}", param.get());
    }

    #[test]
    fn reaches_63_percent_after_one_tau() {
        let mut param = SmoothedParam::new(0.0, 48000.0);
        param.set_target(1.0);

        for _ in 0..480 {
            param.advance();
        }
        let expected = 1.0 - expf(-1.0);
        assert!(
            (param.get() - expected).abs() < 0.05,
            "expected ~{expected}, got {}",
            param.get()
        );
    }

    #[test]
    fn set_immediate_skips_ramp() {
        let mut param = SmoothedParam::new(0.0, 48000.0);
        param.set_immediate(0.7);
        assert_eq!(param.get(), 0.7);
        assert!(param.is_settled());
    }
}

//! Second-order allpass filter for phaser stages.
//!
//! An allpass filter shifts phase without changing magnitude. Cascading
//! several of them and mixing with the dry signal produces the moving
//! spectral notches of a phaser. Coefficients follow the RBJ Audio EQ
//! Cookbook allpass formulas.

use core::f32::consts::PI;
use libm::{cosf, sinf};

/// Second-order allpass biquad (Direct Form I).
///
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
/// ```
///
/// The center frequency is where the phase response crosses 180 degrees;
/// Q controls how sharply phase changes around it.
#[derive(Debug, Clone, Default)]
pub struct AllpassBiquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl AllpassBiquad {
    /// Creates an allpass configured for the given center frequency and Q.
    pub fn new(freq_hz: f32, q: f32, sample_rate: f32) -> Self {
        let mut filter = Self::default();
        filter.set_frequency(freq_hz, q, sample_rate);
        filter
    }

    /// Reconfigures the center frequency and Q.
    ///
    /// Frequency is clamped to (10 Hz, 0.45 * sample rate) to keep the
    /// filter stable under extreme modulation.
    #[inline]
    pub fn set_frequency(&mut self, freq_hz: f32, q: f32, sample_rate: f32) {
        let freq = freq_hz.clamp(10.0, sample_rate * 0.45);
        let q = q.max(0.05);

        let w0 = 2.0 * PI * freq / sample_rate;
        let alpha = sinf(w0) / (2.0 * q);
        let cos_w0 = cosf(w0);

        let a0 = 1.0 + alpha;
        self.b0 = (1.0 - alpha) / a0;
        self.b1 = (-2.0 * cos_w0) / a0;
        self.b2 = (1.0 + alpha) / a0;
        self.a1 = (-2.0 * cos_w0) / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    /// Processes one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Clears the filter state.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

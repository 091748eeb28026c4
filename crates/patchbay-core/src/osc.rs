//! Phase-accumulating oscillator.
//!
//! Serves double duty in the backend: audible signal generator (the `osc`
//! node) and low-frequency modulation source for delay-based effects. Uses
//! plain phase accumulation; at LFO rates aliasing is a non-issue, and at
//! audible rates the naive waveforms match the patching tool's character.

use core::f32::consts::PI;
use libm::{exp2f, sinf};

/// Oscillator waveform shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OscShape {
    /// Pure sine wave.
    #[default]
    Sine,
    /// Linear ramp up then down.
    Triangle,
    /// Rising ramp with abrupt reset.
    Sawtooth,
    /// Binary high/low.
    Square,
}

/// Free-running oscillator with cent-based detune.
///
/// Output is in `[-1.0, 1.0]`. Frequency changes take effect on the next
/// sample; detune is applied multiplicatively (`freq * 2^(cents/1200)`),
/// matching the semantics of a detune control on a native oscillator.
#[derive(Debug, Clone)]
pub struct Oscillator {
    phase: f32,
    freq_hz: f32,
    detune_cents: f32,
    sample_rate: f32,
    shape: OscShape,
}

impl Oscillator {
    /// Creates an oscillator at the given frequency, phase 0, sine shape.
    pub fn new(sample_rate: f32, freq_hz: f32) -> Self {
        Self {
            phase: 0.0,
            freq_hz,
            detune_cents: 0.0,
            sample_rate,
            shape: OscShape::Sine,
        }
    }

    /// Sets the base frequency in Hz.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.freq_hz = freq_hz;
    }

    /// Returns the base frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.freq_hz
    }

    /// Sets the detune offset in cents (1200 cents = one octave).
    pub fn set_detune(&mut self, cents: f32) {
        self.detune_cents = cents;
    }

    /// Sets the waveform shape. Takes effect immediately (enum-like param,
    /// no smoothing applies).
    pub fn set_shape(&mut self, shape: OscShape) {
        self.shape = shape;
    }

    /// Returns the current waveform shape.
    pub fn shape(&self) -> OscShape {
        self.shape
    }

    /// Sets the phase directly in `[0, 1)` cycles.
    pub fn set_phase(&mut self, phase: f32) {
        self.phase = phase.rem_euclid(1.0);
    }

    /// Generates the next sample and advances the phase.
    #[inline]
    pub fn next(&mut self) -> f32 {
        let output = match self.shape {
            OscShape::Sine => sinf(self.phase * 2.0 * PI),
            OscShape::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
            OscShape::Sawtooth => 2.0 * self.phase - 1.0,
            OscShape::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        };

        let effective = self.freq_hz * exp2f(self.detune_cents / 1200.0);
        self.phase += effective / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_stays_in_range() {
        for shape in [
            OscShape::Sine,
            OscShape::Triangle,
            OscShape::Sawtooth,
            OscShape::Square,
        ] {
            let mut osc = Oscillator::new(48000.0, 440.0);
            osc.set_shape(shape);
            for _ in 0..2000 {
                let v = osc.next();
                assert!((-1.0..=1.0).contains(&v), "{shape:?} out of range: {v}");
            }
        }
    }

    #[test]
    fn one_cycle_per_second_at_one_hz() {
        let mut osc = Oscillator::new(48000.0, 1.0);
        for _ in 0..48000 {
            osc.next();
        }
        let err = osc.phase.min((osc.phase - 1.0).abs());
        assert!(err < 0.01, "phase drifted: {}", osc.phase);
    }

    #[test]
    fn detune_octave_doubles_rate() {
        let mut plain = Oscillator::new(48000.0, 2.0);
        let mut detuned = Oscillator::new(48000.0, 2.0);
        detuned.set_detune(1200.0);

        // Half a second: plain completes 1 cycle, detuned 2.
        for _ in 0..24000 {
            plain.next();
            detuned.next();
        }
        assert!(plain.phase.min((plain.phase - 1.0).abs()) < 0.01);
        assert!(detuned.phase.min((detuned.phase - 1.0).abs()) < 0.01);
    }

    #[test]
    fn square_is_binary() {
        let mut osc = Oscillator::new(48000.0, 100.0);
        osc.set_shape(OscShape::Square);
        for _ in 0..1000 {
            let v = osc.next();
            assert!(v == 1.0 || v == -1.0);
        }
    }
}

//! Noise buffer synthesis.
//!
//! The noise node plays a pre-rendered looping buffer rather than generating
//! samples live, so color changes are a buffer swap instead of a filter
//! reconfiguration. Three colors are supported:
//!
//! - **white**: independent uniform samples in `[-1, 1]`
//! - **pink**: Paul Kellet's refined -3 dB/octave filter over white noise
//! - **brown**: leaky integration of white noise (random walk)
//!
//! Pink and brown outputs are scaled (x0.11 and x3.5) to roughly match the
//! perceived loudness of the white buffer. The filters do not hard-limit, so
//! isolated samples can exceed unity; see the statistical tests below.

/// Noise color selecting the synthesis algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoiseColor {
    /// Flat spectrum.
    #[default]
    White,
    /// -3 dB/octave (equal energy per octave).
    Pink,
    /// -6 dB/octave (random walk).
    Brown,
}

/// Xorshift32 PRNG for noise generation.
///
/// Deterministic for a given seed, which keeps buffer synthesis testable.
/// Not suitable for anything but audio noise.
#[derive(Debug, Clone)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    /// Creates a generator; a zero seed is remapped (xorshift fixpoint).
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x12345678 } else { seed },
        }
    }

    /// Next raw 32-bit value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Next value uniform in `[-1.0, 1.0]`.
    #[inline]
    pub fn next_bipolar(&mut self) -> f32 {
        (self.next_u32() as i32 as f32) / (i32::MAX as f32)
    }
}

/// Synthesizes a noise buffer of `len` samples.
///
/// The same `(color, len, seed)` triple always yields the same buffer.
pub fn noise_buffer(color: NoiseColor, len: usize, seed: u32) -> Vec<f32> {
    let mut rng = Xorshift32::new(seed);
    let mut buffer = vec![0.0f32; len];

    match color {
        NoiseColor::White => {
            for sample in &mut buffer {
                *sample = rng.next_bipolar();
            }
        }
        NoiseColor::Pink => {
            // Paul Kellet's refined pink filter: seven one-pole state
            // variables updated per sample with fixed coefficients.
            let (mut b0, mut b1, mut b2, mut b3, mut b4, mut b5, mut b6) =
                (0.0f32, 0.0f32, 0.0f32, 0.0f32, 0.0f32, 0.0f32, 0.0f32);
            for sample in &mut buffer {
                let white = rng.next_bipolar();
                b0 = 0.99886 * b0 + white * 0.0555179;
                b1 = 0.99332 * b1 + white * 0.0750759;
                b2 = 0.969 * b2 + white * 0.153852;
                b3 = 0.8665 * b3 + white * 0.3104856;
                b4 = 0.55 * b4 + white * 0.5329522;
                b5 = -0.7616 * b5 - white * 0.016898;
                *sample = (b0 + b1 + b2 + b3 + b4 + b5 + b6 + white * 0.5362) * 0.11;
                b6 = white * 0.115926;
            }
        }
        NoiseColor::Brown => {
            let mut last = 0.0f32;
            for sample in &mut buffer {
                let white = rng.next_bipolar();
                last = (last + 0.02 * white) / 1.02;
                *sample = last * 3.5;
            }
        }
    }

    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn white_noise_in_unit_range() {
        let buffer = noise_buffer(NoiseColor::White, 96000, 1);
        for &s in &buffer {
            assert!((-1.0..=1.0).contains(&s), "white sample out of range: {s}");
        }
    }

    #[test]
    fn deterministic_for_seed() {
        let a = noise_buffer(NoiseColor::Pink, 4096, 42);
        let b = noise_buffer(NoiseColor::Pink, 4096, 42);
        assert_eq!(a, b);

        let c = noise_buffer(NoiseColor::Pink, 4096, 43);
        assert_ne!(a, c);
    }

    #[test]
    fn noise_has_nonzero_energy() {
        for color in [NoiseColor::White, NoiseColor::Pink, NoiseColor::Brown] {
            let buffer = noise_buffer(color, 48000, 7);
            let energy: f32 = buffer.iter().map(|s| s * s).sum();
            assert!(energy > 1.0, "{color:?} buffer is near-silent");
        }
    }

    /// 99th percentile of |sample| for a buffer.
    fn p99_abs(buffer: &[f32]) -> f32 {
        let mut mags: Vec<f32> = buffer.iter().map(|s| s.abs()).collect();
        mags.sort_by(f32::total_cmp);
        mags[(mags.len() as f32 * 0.99) as usize]
    }

    proptest! {
        // The pink/brown filters are not hard-clamped, so a strict [-1, 1]
        // bound does not hold for every seed. Assert the statistical bound
        // instead: 99% of samples within unit range.
        #[test]
        fn pink_statistically_bounded(seed in 1u32..10_000) {
            let buffer = noise_buffer(NoiseColor::Pink, 48000, seed);
            prop_assert!(p99_abs(&buffer) <= 1.0);
        }

        #[test]
        fn brown_statistically_bounded(seed in 1u32..10_000) {
            let buffer = noise_buffer(NoiseColor::Brown, 48000, seed);
            prop_assert!(p99_abs(&buffer) <= 1.0);
        }
    }
}

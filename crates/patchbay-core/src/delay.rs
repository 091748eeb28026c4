//! Interpolated delay line for modulated delay effects.
//!
//! Flanger and chorus sweep their delay time continuously, so reads must
//! support fractional sample offsets. Linear interpolation between the two
//! neighbouring samples keeps the sweep free of zipper noise.

/// Circular-buffer delay line with linear-interpolated fractional reads.
///
/// The buffer is allocated once at construction and never reallocates.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    /// Creates a delay line holding up to `max_delay_samples` samples.
    ///
    /// # Panics
    ///
    /// Panics if `max_delay_samples` is 0.
    pub fn new(max_delay_samples: usize) -> Self {
        assert!(max_delay_samples > 0, "delay capacity must be > 0");
        Self {
            buffer: vec![0.0; max_delay_samples],
            write_pos: 0,
        }
    }

    /// Creates a delay line sized for `max_seconds` at `sample_rate`.
    pub fn from_time(sample_rate: f32, max_seconds: f32) -> Self {
        Self::new((sample_rate * max_seconds) as usize + 1)
    }

    /// Reads a sample `delay_samples` (possibly fractional) in the past.
    ///
    /// The delay is clamped to the buffer capacity.
    #[inline]
    pub fn read(&self, delay_samples: f32) -> f32 {
        let len = self.buffer.len();
        let clamped = delay_samples.clamp(0.0, (len - 1) as f32);

        let whole = clamped as usize;
        let frac = clamped - whole as f32;

        // Index of the sample `whole` samples before the last written.
        let read_pos = (self.write_pos + len - whole - 1) % len;
        let next_pos = (read_pos + len - 1) % len;

        let a = self.buffer[read_pos];
        let b = self.buffer[next_pos];
        a + (b - a) * frac
    }

    /// Writes a sample and advances the write position.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Clears the buffer to silence.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Returns the capacity in samples.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_delay_recalls_exact_sample() {
        let mut delay = DelayLine::new(16);
        for i in 0..16 {
            delay.write(i as f32);
        }
        // 0 samples of delay = the most recent write.
        assert_eq!(delay.read(0.0), 15.0);
        assert_eq!(delay.read(5.0), 10.0);
    }

    #[test]
    fn fractional_delay_interpolates() {
        let mut delay = DelayLine::new(8);
        delay.write(0.0);
        delay.write(1.0);
        // Halfway between the last two writes.
        let v = delay.read(0.5);
        assert!((v - 0.5).abs() < 1e-6, "got {v}");
    }

    #[test]
    fn read_clamps_to_capacity() {
        let mut delay = DelayLine::new(4);
        for _ in 0..4 {
            delay.write(2.0);
        }
        // Far beyond capacity still returns a valid (clamped) sample.
        assert_eq!(delay.read(100.0), 2.0);
    }

    #[test]
    fn clear_silences() {
        let mut delay = DelayLine::new(8);
        for _ in 0..8 {
            delay.write(1.0);
        }
        delay.clear();
        assert_eq!(delay.read(3.0), 0.0);
    }
}

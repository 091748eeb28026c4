//! Patchbay Core - DSP primitives the software audio backend is built from.
//!
//! This crate provides the small set of building blocks the patchbay backend
//! composes into live audio units:
//!
//! - [`SmoothedParam`] - one-pole parameter smoothing for click-free changes
//! - [`Oscillator`] - phase-accumulating oscillator (4 waveforms, cent detune)
//! - [`DelayLine`] - interpolated circular-buffer delay for modulated delays
//! - [`AllpassBiquad`] - second-order allpass filter for phaser stages
//! - [`noise_buffer`] - white/pink/brown noise buffer synthesis
//!
//! Everything here is allocation-free in the audio path: buffers are sized at
//! construction and never reallocate while processing.

pub mod allpass;
pub mod delay;
pub mod noise;
pub mod osc;
pub mod param;

pub use allpass::AllpassBiquad;
pub use delay::DelayLine;
pub use noise::{NoiseColor, Xorshift32, noise_buffer};
pub use osc::{OscShape, Oscillator};
pub use param::SmoothedParam;

//! Audio primitive backend for patchbay.
//!
//! The patching engine composes live audio units out of a small library of
//! DSP primitives: oscillators, gains, delays, allpass filters, buffer
//! sources, panners, channel mergers, analysers, and one terminal
//! destination. This crate defines that library as a trait seam,
//! [`AudioBackend`], so the engine can run against any realization of the
//! primitives — and ships [`SoftwareBackend`], a software renderer that
//! implements the full trait and produces stereo sample blocks.
//!
//! The backend is an explicit object passed to its consumers, never a hidden
//! process global. Tests inject a fresh backend per case; the CLI drives one
//! from an audio output stream.
//!
//! ## Scheduling semantics
//!
//! Continuously-varying parameters (frequency, gain, delay time, Q, pan) are
//! applied with a short smoothing ramp starting at the current audio clock
//! ([`AudioBackend::set_param`]), never as a discontinuous assignment.
//! Enum-like parameters (oscillator shape) switch instantly.

pub mod software;

use std::sync::Arc;

pub use patchbay_core::{NoiseColor, OscShape};
pub use software::SoftwareBackend;

use thiserror::Error;

/// Handle to a primitive owned by a backend.
///
/// Ids are never reused within one backend instance; a released primitive's
/// id stays dangling and operations on it fail with
/// [`BackendError::UnknownPrimitive`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveId(pub(crate) u32);

impl core::fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Schedulable continuous parameter of a primitive.
///
/// Which parameters a primitive accepts depends on its kind (an oscillator
/// has `Frequency` and `Detune`, a gain has `Gain`, and so on); routing a
/// parameter to a primitive without it is a [`BackendError::InvalidParam`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AudioParam {
    /// Oscillator or allpass center frequency, Hz.
    Frequency,
    /// Oscillator detune, cents.
    Detune,
    /// Gain factor, linear.
    Gain,
    /// Delay time, seconds.
    DelayTime,
    /// Allpass resonance.
    Q,
    /// Stereo pan position, -1 (left) to +1 (right).
    Pan,
}

/// Errors from backend operations.
///
/// Callers on teardown/rewire paths treat these as warnings: a disconnect
/// against an already-gone primitive must not abort a batch rebuild.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Operation referenced a primitive that does not exist (or was released).
    #[error("unknown primitive {0}")]
    UnknownPrimitive(PrimitiveId),

    /// Disconnect was asked to remove a connection that is not present.
    #[error("no connection {from} -> {to}")]
    NotConnected {
        /// Source primitive of the missing connection.
        from: PrimitiveId,
        /// Target primitive of the missing connection.
        to: PrimitiveId,
    },

    /// Channel-indexed connect against a primitive without that channel.
    #[error("primitive {id} has no input channel {channel}")]
    InvalidChannel {
        /// Target primitive.
        id: PrimitiveId,
        /// Requested channel index.
        channel: usize,
    },

    /// Parameter routed to a primitive kind that does not own it.
    #[error("primitive {id} has no parameter {param:?}")]
    InvalidParam {
        /// Target primitive.
        id: PrimitiveId,
        /// The rejected parameter.
        param: AudioParam,
    },

    /// `stop` called on a primitive that is not a stoppable source.
    #[error("primitive {0} is not a source")]
    NotASource(PrimitiveId),
}

/// The native audio primitive library, as a trait.
///
/// Creation methods allocate a primitive and return its handle; wiring
/// methods edit the signal graph; `set_param` schedules click-free value
/// transitions. The destination is permanent: it exists for the lifetime of
/// the backend and [`AudioBackend::release`] ignores it.
pub trait AudioBackend {
    /// Creates an oscillator. It starts running immediately; silence is
    /// achieved by not connecting it, not by stopping it.
    fn create_oscillator(&mut self, shape: OscShape, freq_hz: f32) -> PrimitiveId;

    /// Creates a gain (signal scaling) primitive.
    fn create_gain(&mut self, gain: f32) -> PrimitiveId;

    /// Creates a delay line with the given initial delay and capacity, in
    /// seconds. Delay time can be modulated via [`AudioParam::DelayTime`].
    fn create_delay(&mut self, delay_secs: f32, max_secs: f32) -> PrimitiveId;

    /// Creates a second-order allpass filter.
    fn create_allpass(&mut self, freq_hz: f32, q: f32) -> PrimitiveId;

    /// Creates a buffer source playing `samples`; starts immediately.
    fn create_buffer_source(&mut self, samples: Arc<[f32]>, looping: bool) -> PrimitiveId;

    /// Creates an equal-power stereo panner.
    fn create_panner(&mut self, pan: f32) -> PrimitiveId;

    /// Creates a channel merger with `channels` input channels.
    fn create_merger(&mut self, channels: usize) -> PrimitiveId;

    /// Creates an analyser: a pass-through tap recording the most recent
    /// `window` mono samples.
    fn create_analyser(&mut self, window: usize) -> PrimitiveId;

    /// Returns the permanent terminal destination.
    fn destination(&mut self) -> PrimitiveId;

    /// Connects `from`'s output to `to`'s signal input. Parallel connections
    /// between the same pair are kept as independent connections.
    fn connect(&mut self, from: PrimitiveId, to: PrimitiveId) -> Result<(), BackendError>;

    /// Connects `from` (mono-ized) into input channel `channel` of a merger.
    fn connect_to_channel(
        &mut self,
        from: PrimitiveId,
        to: PrimitiveId,
        channel: usize,
    ) -> Result<(), BackendError>;

    /// Connects `from`'s output as additive modulation of `param` on `to`.
    fn connect_param(
        &mut self,
        from: PrimitiveId,
        to: PrimitiveId,
        param: AudioParam,
    ) -> Result<(), BackendError>;

    /// Removes one signal connection `from -> to` (channel-indexed or plain).
    fn disconnect(&mut self, from: PrimitiveId, to: PrimitiveId) -> Result<(), BackendError>;

    /// Removes one modulation connection `from -> to.param`.
    fn disconnect_param(
        &mut self,
        from: PrimitiveId,
        to: PrimitiveId,
        param: AudioParam,
    ) -> Result<(), BackendError>;

    /// Removes every connection touching `id`, in either direction.
    fn disconnect_all(&mut self, id: PrimitiveId) -> Result<(), BackendError>;

    /// Schedules a smooth transition of `param` to `value` starting at the
    /// current audio clock time.
    fn set_param(
        &mut self,
        id: PrimitiveId,
        param: AudioParam,
        value: f32,
    ) -> Result<(), BackendError>;

    /// Switches an oscillator's waveform shape (instant, enum-like).
    fn set_oscillator_shape(
        &mut self,
        id: PrimitiveId,
        shape: OscShape,
    ) -> Result<(), BackendError>;

    /// Stops a source primitive (oscillator or buffer source).
    fn stop(&mut self, id: PrimitiveId) -> Result<(), BackendError>;

    /// Releases a primitive: removes it and all its connections. Releasing
    /// the destination is a no-op; releasing an unknown id is an error.
    fn release(&mut self, id: PrimitiveId) -> Result<(), BackendError>;

    /// Copies the analyser's most recent time-domain window into `out`
    /// (oldest sample first). Returns false if `id` is not an analyser.
    fn analyser_samples(&self, id: PrimitiveId, out: &mut [f32]) -> bool;

    /// Sample rate of the processing clock, Hz.
    fn sample_rate(&self) -> f32;

    /// Audio clock time in seconds (frames rendered / sample rate).
    fn current_time(&self) -> f64;

    /// True while the backend is actively processing.
    fn is_running(&self) -> bool;

    /// Suspends processing; rendered output is silence and the clock halts.
    fn suspend(&mut self);

    /// Resumes processing.
    fn resume(&mut self);
}

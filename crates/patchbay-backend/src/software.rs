//! Software realization of the audio primitive library.
//!
//! [`SoftwareBackend`] keeps its primitives in a slab and evaluates the
//! signal graph one sample at a time. Evaluation is Jacobi-style: every
//! primitive reads the *previous* sample's outputs of its inputs, then all
//! primitives commit their new outputs. The implied one-sample delay on
//! every connection makes feedback cycles (the flanger's delay -> feedback
//! -> delay loop) well-defined without topological analysis.
//!
//! Signals are stereo `(left, right)` pairs throughout; mono primitives
//! (oscillator, buffer source) emit the same sample on both channels, and
//! the panner/merger pair is what gives the chorus its stereo image.

use std::sync::Arc;

use libm::{cosf, sinf};
use patchbay_core::{AllpassBiquad, DelayLine, OscShape, Oscillator, SmoothedParam};

use crate::{AudioBackend, AudioParam, BackendError, PrimitiveId};

/// Number of entries in [`ParamAccum`]; one slot per [`AudioParam`] variant.
const PARAM_SLOTS: usize = 6;

const fn param_slot(param: AudioParam) -> usize {
    match param {
        AudioParam::Frequency => 0,
        AudioParam::Detune => 1,
        AudioParam::Gain => 2,
        AudioParam::DelayTime => 3,
        AudioParam::Q => 4,
        AudioParam::Pan => 5,
    }
}

/// Per-primitive input accumulator for one sample.
#[derive(Clone, Copy, Default)]
struct InputAccum {
    left: f32,
    right: f32,
    params: [f32; PARAM_SLOTS],
}

impl InputAccum {
    #[inline]
    fn modulation(&self, param: AudioParam) -> f32 {
        self.params[param_slot(param)]
    }
}

/// Where a connection delivers its signal on the target primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Port {
    /// Ordinary signal input.
    Audio,
    /// A specific input channel of a merger.
    Channel(usize),
    /// Additive modulation of a continuous parameter.
    Param(AudioParam),
}

#[derive(Clone, Copy, Debug)]
struct Connection {
    from: PrimitiveId,
    to: PrimitiveId,
    port: Port,
}

/// One primitive's DSP state.
enum Dsp {
    Oscillator {
        osc: Oscillator,
        freq: SmoothedParam,
        detune: SmoothedParam,
        playing: bool,
    },
    Gain {
        gain: SmoothedParam,
    },
    Delay {
        line_l: DelayLine,
        line_r: DelayLine,
        delay_secs: SmoothedParam,
        max_secs: f32,
    },
    Allpass {
        filter_l: AllpassBiquad,
        filter_r: AllpassBiquad,
        freq: SmoothedParam,
        q: SmoothedParam,
    },
    BufferSource {
        samples: Arc<[f32]>,
        position: usize,
        looping: bool,
        playing: bool,
    },
    Panner {
        pan: SmoothedParam,
    },
    Merger {
        channels: usize,
    },
    Analyser {
        ring: Vec<f32>,
        write: usize,
    },
    Destination,
}

struct Primitive {
    dsp: Dsp,
    /// Output committed at the end of the previous sample.
    out: (f32, f32),
}

/// Software audio backend rendering stereo f32 blocks.
///
/// Created suspended, like a fresh audio context before the first user
/// gesture; call [`AudioBackend::resume`] (or toggle playback through the
/// engine) to start processing. The destination primitive is created up
/// front and lives as long as the backend.
pub struct SoftwareBackend {
    primitives: Vec<Option<Primitive>>,
    connections: Vec<Connection>,
    sample_rate: f32,
    frames_rendered: u64,
    running: bool,
    dest: PrimitiveId,
    /// Scratch accumulators, reused every sample.
    accum: Vec<InputAccum>,
}

impl SoftwareBackend {
    /// Creates a suspended backend at the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        let mut backend = Self {
            primitives: Vec::new(),
            connections: Vec::new(),
            sample_rate,
            frames_rendered: 0,
            running: false,
            dest: PrimitiveId(0),
            accum: Vec::new(),
        };
        backend.dest = backend.insert(Dsp::Destination);
        backend
    }

    fn insert(&mut self, dsp: Dsp) -> PrimitiveId {
        let id = PrimitiveId(self.primitives.len() as u32);
        self.primitives.push(Some(Primitive {
            dsp,
            out: (0.0, 0.0),
        }));
        tracing::debug!(%id, "primitive created");
        id
    }

    fn get(&self, id: PrimitiveId) -> Result<&Primitive, BackendError> {
        self.primitives
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(BackendError::UnknownPrimitive(id))
    }

    fn get_mut(&mut self, id: PrimitiveId) -> Result<&mut Primitive, BackendError> {
        self.primitives
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(BackendError::UnknownPrimitive(id))
    }

    fn ensure_exists(&self, id: PrimitiveId) -> Result<(), BackendError> {
        self.get(id).map(|_| ())
    }

    /// True if `id` refers to a live primitive.
    pub fn contains(&self, id: PrimitiveId) -> bool {
        self.get(id).is_ok()
    }

    /// Number of live primitives (including the destination).
    pub fn primitive_count(&self) -> usize {
        self.primitives.iter().flatten().count()
    }

    /// Number of connections of any port type.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// True if a signal connection (plain or channel-indexed) exists.
    pub fn is_connected(&self, from: PrimitiveId, to: PrimitiveId) -> bool {
        self.connections.iter().any(|c| {
            c.from == from && c.to == to && matches!(c.port, Port::Audio | Port::Channel(_))
        })
    }

    /// True if a modulation connection onto `param` exists.
    pub fn is_param_connected(&self, from: PrimitiveId, to: PrimitiveId, param: AudioParam) -> bool {
        self.connections
            .iter()
            .any(|c| c.from == from && c.to == to && c.port == Port::Param(param))
    }

    /// Renders one block of audio into `left`/`right`.
    ///
    /// While suspended the block is silence and the clock does not advance.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len());

        if !self.running {
            left.fill(0.0);
            right.fill(0.0);
            return;
        }

        for frame in 0..left.len() {
            self.tick();
            let out = self.primitives[self.dest.0 as usize]
                .as_ref()
                .map_or((0.0, 0.0), |p| p.out);
            left[frame] = out.0;
            right[frame] = out.1;
        }
        self.frames_rendered += left.len() as u64;
    }

    /// Advances the graph by one sample.
    fn tick(&mut self) {
        // Gather: sum previous-sample outputs into each target's accumulator.
        self.accum.clear();
        self.accum
            .resize(self.primitives.len(), InputAccum::default());

        for conn in &self.connections {
            let Some(src) = self.primitives[conn.from.0 as usize].as_ref() else {
                continue;
            };
            let (l, r) = src.out;
            let acc = &mut self.accum[conn.to.0 as usize];
            match conn.port {
                Port::Audio => {
                    acc.left += l;
                    acc.right += r;
                }
                Port::Channel(ch) => {
                    let mono = 0.5 * (l + r);
                    if ch == 0 {
                        acc.left += mono;
                    } else {
                        acc.right += mono;
                    }
                }
                Port::Param(param) => {
                    acc.params[param_slot(param)] += 0.5 * (l + r);
                }
            }
        }

        // Process: every primitive commits its new output from the gathered
        // inputs. No primitive reads another's `out` in this phase, which is
        // what preserves the one-sample-delay semantics.
        let sample_rate = self.sample_rate;
        for (index, slot) in self.primitives.iter_mut().enumerate() {
            if let Some(prim) = slot {
                prim.out = prim.dsp.process(&self.accum[index], sample_rate);
            }
        }
    }
}

impl Dsp {
    fn process(&mut self, input: &InputAccum, sample_rate: f32) -> (f32, f32) {
        match self {
            Dsp::Oscillator {
                osc,
                freq,
                detune,
                playing,
            } => {
                if !*playing {
                    return (0.0, 0.0);
                }
                osc.set_frequency(freq.advance() + input.modulation(AudioParam::Frequency));
                osc.set_detune(detune.advance() + input.modulation(AudioParam::Detune));
                let v = osc.next();
                (v, v)
            }
            Dsp::Gain { gain } => {
                let g = gain.advance() + input.modulation(AudioParam::Gain);
                (input.left * g, input.right * g)
            }
            Dsp::Delay {
                line_l,
                line_r,
                delay_secs,
                max_secs,
            } => {
                let secs = (delay_secs.advance() + input.modulation(AudioParam::DelayTime))
                    .clamp(0.0, *max_secs);
                let samples = secs * sample_rate;
                let out = (line_l.read(samples), line_r.read(samples));
                line_l.write(input.left);
                line_r.write(input.right);
                out
            }
            Dsp::Allpass {
                filter_l,
                filter_r,
                freq,
                q,
            } => {
                let f = freq.advance() + input.modulation(AudioParam::Frequency);
                let qv = (q.advance() + input.modulation(AudioParam::Q)).max(0.05);
                filter_l.set_frequency(f, qv, sample_rate);
                filter_r.set_frequency(f, qv, sample_rate);
                (filter_l.process(input.left), filter_r.process(input.right))
            }
            Dsp::BufferSource {
                samples,
                position,
                looping,
                playing,
            } => {
                if !*playing || samples.is_empty() {
                    return (0.0, 0.0);
                }
                let v = samples[*position];
                *position += 1;
                if *position >= samples.len() {
                    if *looping {
                        *position = 0;
                    } else {
                        *playing = false;
                    }
                }
                (v, v)
            }
            Dsp::Panner { pan } => {
                let p = (pan.advance() + input.modulation(AudioParam::Pan)).clamp(-1.0, 1.0);
                let mono = 0.5 * (input.left + input.right);
                // Equal-power pan law.
                let angle = (p + 1.0) * core::f32::consts::FRAC_PI_4;
                (mono * cosf(angle), mono * sinf(angle))
            }
            Dsp::Merger { .. } | Dsp::Destination => (input.left, input.right),
            Dsp::Analyser { ring, write } => {
                ring[*write] = 0.5 * (input.left + input.right);
                *write = (*write + 1) % ring.len();
                (input.left, input.right)
            }
        }
    }
}

impl AudioBackend for SoftwareBackend {
    fn create_oscillator(&mut self, shape: OscShape, freq_hz: f32) -> PrimitiveId {
        let mut osc = Oscillator::new(self.sample_rate, freq_hz);
        osc.set_shape(shape);
        self.insert(Dsp::Oscillator {
            osc,
            freq: SmoothedParam::new(freq_hz, self.sample_rate),
            detune: SmoothedParam::new(0.0, self.sample_rate),
            playing: true,
        })
    }

    fn create_gain(&mut self, gain: f32) -> PrimitiveId {
        self.insert(Dsp::Gain {
            gain: SmoothedParam::new(gain, self.sample_rate),
        })
    }

    fn create_delay(&mut self, delay_secs: f32, max_secs: f32) -> PrimitiveId {
        self.insert(Dsp::Delay {
            line_l: DelayLine::from_time(self.sample_rate, max_secs),
            line_r: DelayLine::from_time(self.sample_rate, max_secs),
            delay_secs: SmoothedParam::new(delay_secs.clamp(0.0, max_secs), self.sample_rate),
            max_secs,
        })
    }

    fn create_allpass(&mut self, freq_hz: f32, q: f32) -> PrimitiveId {
        self.insert(Dsp::Allpass {
            filter_l: AllpassBiquad::new(freq_hz, q, self.sample_rate),
            filter_r: AllpassBiquad::new(freq_hz, q, self.sample_rate),
            freq: SmoothedParam::new(freq_hz, self.sample_rate),
            q: SmoothedParam::new(q, self.sample_rate),
        })
    }

    fn create_buffer_source(&mut self, samples: Arc<[f32]>, looping: bool) -> PrimitiveId {
        self.insert(Dsp::BufferSource {
            samples,
            position: 0,
            looping,
            playing: true,
        })
    }

    fn create_panner(&mut self, pan: f32) -> PrimitiveId {
        self.insert(Dsp::Panner {
            pan: SmoothedParam::new(pan.clamp(-1.0, 1.0), self.sample_rate),
        })
    }

    fn create_merger(&mut self, channels: usize) -> PrimitiveId {
        self.insert(Dsp::Merger { channels })
    }

    fn create_analyser(&mut self, window: usize) -> PrimitiveId {
        self.insert(Dsp::Analyser {
            ring: vec![0.0; window.max(1)],
            write: 0,
        })
    }

    fn destination(&mut self) -> PrimitiveId {
        self.dest
    }

    fn connect(&mut self, from: PrimitiveId, to: PrimitiveId) -> Result<(), BackendError> {
        self.ensure_exists(from)?;
        self.ensure_exists(to)?;
        self.connections.push(Connection {
            from,
            to,
            port: Port::Audio,
        });
        Ok(())
    }

    fn connect_to_channel(
        &mut self,
        from: PrimitiveId,
        to: PrimitiveId,
        channel: usize,
    ) -> Result<(), BackendError> {
        self.ensure_exists(from)?;
        match &self.get(to)?.dsp {
            Dsp::Merger { channels } if channel < *channels => {}
            _ => return Err(BackendError::InvalidChannel { id: to, channel }),
        }
        self.connections.push(Connection {
            from,
            to,
            port: Port::Channel(channel),
        });
        Ok(())
    }

    fn connect_param(
        &mut self,
        from: PrimitiveId,
        to: PrimitiveId,
        param: AudioParam,
    ) -> Result<(), BackendError> {
        self.ensure_exists(from)?;
        if !self.get(to)?.dsp.has_param(param) {
            return Err(BackendError::InvalidParam { id: to, param });
        }
        self.connections.push(Connection {
            from,
            to,
            port: Port::Param(param),
        });
        Ok(())
    }

    fn disconnect(&mut self, from: PrimitiveId, to: PrimitiveId) -> Result<(), BackendError> {
        self.ensure_exists(from)?;
        self.ensure_exists(to)?;
        let index = self
            .connections
            .iter()
            .position(|c| {
                c.from == from && c.to == to && matches!(c.port, Port::Audio | Port::Channel(_))
            })
            .ok_or(BackendError::NotConnected { from, to })?;
        self.connections.swap_remove(index);
        Ok(())
    }

    fn disconnect_param(
        &mut self,
        from: PrimitiveId,
        to: PrimitiveId,
        param: AudioParam,
    ) -> Result<(), BackendError> {
        let index = self
            .connections
            .iter()
            .position(|c| c.from == from && c.to == to && c.port == Port::Param(param))
            .ok_or(BackendError::NotConnected { from, to })?;
        self.connections.swap_remove(index);
        Ok(())
    }

    fn disconnect_all(&mut self, id: PrimitiveId) -> Result<(), BackendError> {
        self.ensure_exists(id)?;
        self.connections.retain(|c| c.from != id && c.to != id);
        Ok(())
    }

    fn set_param(
        &mut self,
        id: PrimitiveId,
        param: AudioParam,
        value: f32,
    ) -> Result<(), BackendError> {
        let prim = self.get_mut(id)?;
        let target = match (&mut prim.dsp, param) {
            (Dsp::Oscillator { freq, .. }, AudioParam::Frequency) => freq,
            (Dsp::Oscillator { detune, .. }, AudioParam::Detune) => detune,
            (Dsp::Gain { gain }, AudioParam::Gain) => gain,
            (Dsp::Delay { delay_secs, .. }, AudioParam::DelayTime) => delay_secs,
            (Dsp::Allpass { freq, .. }, AudioParam::Frequency) => freq,
            (Dsp::Allpass { q, .. }, AudioParam::Q) => q,
            (Dsp::Panner { pan }, AudioParam::Pan) => pan,
            _ => return Err(BackendError::InvalidParam { id, param }),
        };
        target.set_target(value);
        Ok(())
    }

    fn set_oscillator_shape(
        &mut self,
        id: PrimitiveId,
        shape: OscShape,
    ) -> Result<(), BackendError> {
        match &mut self.get_mut(id)?.dsp {
            Dsp::Oscillator { osc, .. } => {
                osc.set_shape(shape);
                Ok(())
            }
            _ => Err(BackendError::NotASource(id)),
        }
    }

    fn stop(&mut self, id: PrimitiveId) -> Result<(), BackendError> {
        match &mut self.get_mut(id)?.dsp {
            Dsp::Oscillator { playing, .. } | Dsp::BufferSource { playing, .. } => {
                *playing = false;
                Ok(())
            }
            _ => Err(BackendError::NotASource(id)),
        }
    }

    fn release(&mut self, id: PrimitiveId) -> Result<(), BackendError> {
        if id == self.dest {
            // The destination is permanent.
            return Ok(());
        }
        self.ensure_exists(id)?;
        self.primitives[id.0 as usize] = None;
        self.connections.retain(|c| c.from != id && c.to != id);
        tracing::debug!(%id, "primitive released");
        Ok(())
    }

    fn analyser_samples(&self, id: PrimitiveId, out: &mut [f32]) -> bool {
        let Ok(prim) = self.get(id) else {
            return false;
        };
        let Dsp::Analyser { ring, write } = &prim.dsp else {
            return false;
        };
        let n = out.len().min(ring.len());
        for (i, slot) in out[..n].iter_mut().enumerate() {
            *slot = ring[(*write + ring.len() - n + i) % ring.len()];
        }
        out[n..].fill(0.0);
        true
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / f64::from(self.sample_rate)
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn suspend(&mut self) {
        self.running = false;
        tracing::debug!("backend suspended");
    }

    fn resume(&mut self) {
        self.running = true;
        tracing::debug!("backend resumed");
    }
}

impl Dsp {
    fn has_param(&self, param: AudioParam) -> bool {
        matches!(
            (self, param),
            (Dsp::Oscillator { .. }, AudioParam::Frequency | AudioParam::Detune)
                | (Dsp::Gain { .. }, AudioParam::Gain)
                | (Dsp::Delay { .. }, AudioParam::DelayTime)
                | (Dsp::Allpass { .. }, AudioParam::Frequency | AudioParam::Q)
                | (Dsp::Panner { .. }, AudioParam::Pan)
        )
    }
}

//! Audio synchronizer: mirrors the patch graph onto live backend primitives.
//!
//! Each graph node is realized as a [`LiveUnit`]: one primitive for the
//! simple kinds, a wired cluster for the composite effects. Units expose an
//! `input()` and `output()` primitive so edge wiring never branches on unit
//! shape; a flanger connects downstream of an oscillator exactly the way a
//! bare gain does.
//!
//! Teardown and rewiring are unconditionally best-effort: backend errors on
//! those paths are logged and swallowed, so one failed disconnect never
//! aborts the rest of a batch rebuild.

use std::collections::HashMap;
use std::sync::Arc;

use patchbay_backend::{AudioBackend, AudioParam, NoiseColor, OscShape, PrimitiveId};
use patchbay_core::noise_buffer;

use crate::node::{NodeKind, ParamMap, ParamValue};

/// Maximum delay-line capacity for flanger/chorus delays, seconds.
const MAX_DELAY_SECS: f32 = 1.0;

/// Length of a synthesized noise loop, seconds.
const NOISE_SECS: f32 = 2.0;

/// Analyser window for the waveform tap, samples.
const ANALYSER_WINDOW: usize = 2048;

fn num(params: &ParamMap, key: &str, default: f32) -> f32 {
    params
        .get(key)
        .and_then(ParamValue::as_number)
        .unwrap_or(default)
}

fn choice<'a>(params: &'a ParamMap, key: &str, default: &'a str) -> &'a str {
    params
        .get(key)
        .and_then(ParamValue::as_choice)
        .unwrap_or(default)
}

fn osc_shape(name: &str) -> OscShape {
    match name {
        "triangle" => OscShape::Triangle,
        "sawtooth" => OscShape::Sawtooth,
        "square" => OscShape::Square,
        _ => OscShape::Sine,
    }
}

fn noise_color(name: &str) -> NoiseColor {
    match name {
        "pink" => NoiseColor::Pink,
        "brown" => NoiseColor::Brown,
        _ => NoiseColor::White,
    }
}

fn wire<B: AudioBackend>(backend: &mut B, from: PrimitiveId, to: PrimitiveId) {
    if let Err(err) = backend.connect(from, to) {
        tracing::warn!(%from, %to, %err, "connect failed");
    }
}

fn wire_channel<B: AudioBackend>(backend: &mut B, from: PrimitiveId, to: PrimitiveId, ch: usize) {
    if let Err(err) = backend.connect_to_channel(from, to, ch) {
        tracing::warn!(%from, %to, ch, %err, "channel connect failed");
    }
}

fn wire_param<B: AudioBackend>(
    backend: &mut B,
    from: PrimitiveId,
    to: PrimitiveId,
    param: AudioParam,
) {
    if let Err(err) = backend.connect_param(from, to, param) {
        tracing::warn!(%from, %to, ?param, %err, "param connect failed");
    }
}

fn unwire<B: AudioBackend>(backend: &mut B, from: PrimitiveId, to: PrimitiveId) {
    if let Err(err) = backend.disconnect(from, to) {
        tracing::warn!(%from, %to, %err, "disconnect failed");
    }
}

fn set<B: AudioBackend>(backend: &mut B, id: PrimitiveId, param: AudioParam, value: f32) {
    if let Err(err) = backend.set_param(id, param, value) {
        tracing::warn!(%id, ?param, value, %err, "set_param failed");
    }
}

/// Builds a looping noise source feeding `gain` and starts it.
fn start_noise_source<B: AudioBackend>(
    backend: &mut B,
    gain: PrimitiveId,
    color: NoiseColor,
    seed: u32,
) -> PrimitiveId {
    let len = (backend.sample_rate() * NOISE_SECS) as usize;
    let samples: Arc<[f32]> = noise_buffer(color, len, seed).into();
    let source = backend.create_buffer_source(samples, true);
    wire(backend, source, gain);
    source
}

/// The live realization of one graph node.
enum LiveUnit {
    Osc {
        osc: PrimitiveId,
    },
    Amp {
        gain: PrimitiveId,
    },
    /// The gain is the visible unit; the buffer source exists only while the
    /// node has outgoing edges (`out_degree > 0`).
    Noise {
        gain: PrimitiveId,
        source: Option<PrimitiveId>,
        color: NoiseColor,
        out_degree: usize,
        seed: u32,
    },
    Flanger {
        input: PrimitiveId,
        delay: PrimitiveId,
        lfo: PrimitiveId,
        lfo_gain: PrimitiveId,
        feedback: PrimitiveId,
        mix: PrimitiveId,
    },
    Chorus {
        input: PrimitiveId,
        delay_l: PrimitiveId,
        delay_r: PrimitiveId,
        lfo_l: PrimitiveId,
        lfo_r: PrimitiveId,
        lfo_gain_l: PrimitiveId,
        lfo_gain_r: PrimitiveId,
        dry: PrimitiveId,
        wet_l: PrimitiveId,
        wet_r: PrimitiveId,
        pan_l: PrimitiveId,
        pan_r: PrimitiveId,
        merger: PrimitiveId,
    },
    /// `freq`/`q` shadow the filters' targets so a stage-count rebuild can
    /// seed the new chain with the current values.
    Phaser {
        input: PrimitiveId,
        filters: Vec<PrimitiveId>,
        lfo: PrimitiveId,
        lfo_gain: PrimitiveId,
        dry: PrimitiveId,
        wet: PrimitiveId,
        output: PrimitiveId,
        freq: f32,
        q: f32,
    },
    Waveform {
        analyser: PrimitiveId,
    },
    Out {
        dest: PrimitiveId,
    },
}

impl LiveUnit {
    /// Primitive that upstream edges connect into.
    fn input(&self) -> PrimitiveId {
        match self {
            LiveUnit::Osc { osc } => *osc,
            LiveUnit::Amp { gain } => *gain,
            LiveUnit::Noise { gain, .. } => *gain,
            LiveUnit::Flanger { input, .. } => *input,
            LiveUnit::Chorus { input, .. } => *input,
            LiveUnit::Phaser { input, .. } => *input,
            LiveUnit::Waveform { analyser } => *analyser,
            LiveUnit::Out { dest } => *dest,
        }
    }

    /// Primitive that downstream edges connect from.
    fn output(&self) -> PrimitiveId {
        match self {
            LiveUnit::Osc { osc } => *osc,
            LiveUnit::Amp { gain } => *gain,
            LiveUnit::Noise { gain, .. } => *gain,
            LiveUnit::Flanger { mix, .. } => *mix,
            LiveUnit::Chorus { merger, .. } => *merger,
            LiveUnit::Phaser { output, .. } => *output,
            LiveUnit::Waveform { analyser } => *analyser,
            LiveUnit::Out { dest } => *dest,
        }
    }

    /// Stoppable source primitives owned by this unit.
    fn sources(&self) -> Vec<PrimitiveId> {
        match self {
            LiveUnit::Osc { osc } => vec![*osc],
            LiveUnit::Noise { source, .. } => source.iter().copied().collect(),
            LiveUnit::Flanger { lfo, .. } => vec![*lfo],
            LiveUnit::Chorus { lfo_l, lfo_r, .. } => vec![*lfo_l, *lfo_r],
            LiveUnit::Phaser { lfo, .. } => vec![*lfo],
            _ => Vec::new(),
        }
    }

    /// Every primitive owned by this unit.
    fn primitives(&self) -> Vec<PrimitiveId> {
        match self {
            LiveUnit::Osc { osc } => vec![*osc],
            LiveUnit::Amp { gain } => vec![*gain],
            LiveUnit::Noise { gain, source, .. } => {
                let mut all = vec![*gain];
                all.extend(source.iter().copied());
                all
            }
            LiveUnit::Flanger {
                input,
                delay,
                lfo,
                lfo_gain,
                feedback,
                mix,
            } => vec![*input, *delay, *lfo, *lfo_gain, *feedback, *mix],
            LiveUnit::Chorus {
                input,
                delay_l,
                delay_r,
                lfo_l,
                lfo_r,
                lfo_gain_l,
                lfo_gain_r,
                dry,
                wet_l,
                wet_r,
                pan_l,
                pan_r,
                merger,
            } => vec![
                *input, *delay_l, *delay_r, *lfo_l, *lfo_r, *lfo_gain_l, *lfo_gain_r, *dry,
                *wet_l, *wet_r, *pan_l, *pan_r, *merger,
            ],
            LiveUnit::Phaser {
                input,
                filters,
                lfo,
                lfo_gain,
                dry,
                wet,
                output,
                ..
            } => {
                let mut all = vec![*input, *lfo, *lfo_gain, *dry, *wet, *output];
                all.extend(filters.iter().copied());
                all
            }
            LiveUnit::Waveform { analyser } => vec![*analyser],
            // Releasing the destination is a backend no-op; listing it keeps
            // teardown uniform.
            LiveUnit::Out { dest } => vec![*dest],
        }
    }
}

/// Keeps a set of live units consistent with the graph model.
pub struct AudioSynchronizer<B: AudioBackend> {
    backend: B,
    units: HashMap<String, LiveUnit>,
    noise_seed: u32,
}

impl<B: AudioBackend> AudioSynchronizer<B> {
    /// Wraps a backend with an empty unit set.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            units: HashMap::new(),
            noise_seed: 1,
        }
    }

    /// Shared access to the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Exclusive access to the backend (rendering, transport).
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Ids of all live units.
    pub fn unit_ids(&self) -> Vec<&str> {
        self.units.keys().map(String::as_str).collect()
    }

    /// True if a unit exists for `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.units.contains_key(id)
    }

    /// Current allpass chain length of a phaser unit.
    pub fn phaser_stage_count(&self, id: &str) -> Option<usize> {
        match self.units.get(id)? {
            LiveUnit::Phaser { filters, .. } => Some(filters.len()),
            _ => None,
        }
    }

    /// Whether a noise unit currently has a running source.
    pub fn noise_active(&self, id: &str) -> Option<bool> {
        match self.units.get(id)? {
            LiveUnit::Noise { source, .. } => Some(source.is_some()),
            _ => None,
        }
    }

    /// True while the backend clock is running.
    pub fn is_running(&self) -> bool {
        self.backend.is_running()
    }

    /// Suspends or resumes the backend; returns the new running state.
    pub fn toggle_playback(&mut self) -> bool {
        if self.backend.is_running() {
            self.backend.suspend();
        } else {
            self.backend.resume();
        }
        self.backend.is_running()
    }

    /// Copies the most recent waveform window of a `waveform` unit.
    pub fn waveform_samples(&self, id: &str, out: &mut [f32]) -> bool {
        match self.units.get(id) {
            Some(LiveUnit::Waveform { analyser }) => self.backend.analyser_samples(*analyser, out),
            _ => false,
        }
    }

    /// Builds the live unit for a freshly created or rebuilt node.
    pub fn create_unit(&mut self, id: &str, kind: NodeKind, params: &ParamMap) {
        let backend = &mut self.backend;
        let unit = match kind {
            NodeKind::Osc => LiveUnit::Osc {
                osc: backend.create_oscillator(
                    osc_shape(choice(params, "type", "sine")),
                    num(params, "frequency", 440.0),
                ),
            },
            NodeKind::Amp => LiveUnit::Amp {
                gain: backend.create_gain(num(params, "gain", 0.5)),
            },
            NodeKind::Noise => LiveUnit::Noise {
                gain: backend.create_gain(num(params, "gain", 0.5)),
                source: None,
                color: noise_color(choice(params, "type", "white")),
                out_degree: 0,
                seed: {
                    self.noise_seed += 1;
                    self.noise_seed
                },
            },
            NodeKind::Flanger => {
                let delay = backend.create_delay(num(params, "delay", 5.0) / 1000.0, MAX_DELAY_SECS);
                let lfo = backend.create_oscillator(OscShape::Sine, num(params, "rate", 1.0));
                let lfo_gain = backend.create_gain(num(params, "depth", 0.5) / 1000.0);
                let feedback = backend.create_gain(num(params, "feedback", 0.5));
                let mix = backend.create_gain(0.5);
                let input = backend.create_gain(0.5);

                wire(backend, lfo, lfo_gain);
                wire_param(backend, lfo_gain, delay, AudioParam::DelayTime);
                wire(backend, input, delay);
                wire(backend, input, mix);
                wire(backend, delay, feedback);
                wire(backend, feedback, delay);
                wire(backend, delay, mix);

                LiveUnit::Flanger {
                    input,
                    delay,
                    lfo,
                    lfo_gain,
                    feedback,
                    mix,
                }
            }
            NodeKind::Chorus => {
                let delay_secs = num(params, "delay", 30.0) / 1000.0;
                let depth_secs = num(params, "depth", 0.5) / 1000.0;
                let rate = num(params, "rate", 1.5);
                let mix = num(params, "mix", 0.5);

                let delay_l = backend.create_delay(delay_secs, MAX_DELAY_SECS);
                let delay_r = backend.create_delay(delay_secs, MAX_DELAY_SECS);
                let lfo_l = backend.create_oscillator(OscShape::Sine, rate);
                let lfo_r = backend.create_oscillator(OscShape::Sine, rate);
                let lfo_gain_l = backend.create_gain(depth_secs);
                let lfo_gain_r = backend.create_gain(depth_secs);
                // Detune the right LFO one octave so the channels drift apart.
                set(backend, lfo_r, AudioParam::Detune, 1200.0);

                let dry = backend.create_gain(1.0 - mix);
                let wet_l = backend.create_gain(mix * 0.5);
                let wet_r = backend.create_gain(mix * 0.5);
                let pan_l = backend.create_panner(-1.0);
                let pan_r = backend.create_panner(1.0);
                let input = backend.create_gain(0.7);
                let merger = backend.create_merger(2);

                wire(backend, lfo_l, lfo_gain_l);
                wire(backend, lfo_r, lfo_gain_r);
                wire_param(backend, lfo_gain_l, delay_l, AudioParam::DelayTime);
                wire_param(backend, lfo_gain_r, delay_r, AudioParam::DelayTime);

                wire(backend, input, dry);
                wire(backend, input, delay_l);
                wire(backend, input, delay_r);
                wire(backend, delay_l, wet_l);
                wire(backend, delay_r, wet_r);
                wire(backend, wet_l, pan_l);
                wire(backend, wet_r, pan_r);
                wire_channel(backend, dry, merger, 0);
                wire_channel(backend, dry, merger, 1);
                wire_channel(backend, pan_l, merger, 0);
                wire_channel(backend, pan_r, merger, 1);

                LiveUnit::Chorus {
                    input,
                    delay_l,
                    delay_r,
                    lfo_l,
                    lfo_r,
                    lfo_gain_l,
                    lfo_gain_r,
                    dry,
                    wet_l,
                    wet_r,
                    pan_l,
                    pan_r,
                    merger,
                }
            }
            NodeKind::Phaser => {
                let stages = (num(params, "stages", 6.0) as usize).max(1);
                let freq = num(params, "freq", 1000.0);
                let q = num(params, "q", 1.0);
                let mix = num(params, "mix", 0.5);

                let filters: Vec<PrimitiveId> = (0..stages)
                    .map(|_| backend.create_allpass(freq, q))
                    .collect();
                let lfo = backend.create_oscillator(OscShape::Sine, num(params, "rate", 1.0));
                let lfo_gain = backend.create_gain(freq * 0.5);
                let dry = backend.create_gain(1.0 - mix);
                let wet = backend.create_gain(mix);
                let input = backend.create_gain(0.7);
                let output = backend.create_gain(1.0);

                wire(backend, lfo, lfo_gain);
                for &filter in &filters {
                    wire_param(backend, lfo_gain, filter, AudioParam::Frequency);
                }
                wire(backend, input, dry);
                wire(backend, input, filters[0]);
                wire(backend, dry, output);
                for pair in filters.windows(2) {
                    wire(backend, pair[0], pair[1]);
                }
                wire(backend, filters[filters.len() - 1], wet);
                wire(backend, wet, output);

                LiveUnit::Phaser {
                    input,
                    filters,
                    lfo,
                    lfo_gain,
                    dry,
                    wet,
                    output,
                    freq,
                    q,
                }
            }
            NodeKind::Waveform => LiveUnit::Waveform {
                analyser: backend.create_analyser(ANALYSER_WINDOW),
            },
            NodeKind::Out => LiveUnit::Out {
                dest: backend.destination(),
            },
        };

        tracing::debug!(id, %kind, "live unit created");
        self.units.insert(id.to_owned(), unit);
    }

    /// Applies a partial parameter update to a live unit. Unknown ids are a
    /// logged no-op.
    pub fn update_unit(&mut self, id: &str, partial: &ParamMap) {
        let Some(unit) = self.units.get_mut(id) else {
            tracing::debug!(id, "update for unknown unit ignored");
            return;
        };
        let backend = &mut self.backend;

        match unit {
            LiveUnit::Osc { osc } => {
                for (key, value) in partial {
                    match (key.as_str(), value) {
                        ("frequency", ParamValue::Number(v)) => {
                            set(backend, *osc, AudioParam::Frequency, *v);
                        }
                        ("type", ParamValue::Choice(name)) => {
                            if let Err(err) = backend.set_oscillator_shape(*osc, osc_shape(name)) {
                                tracing::warn!(id, %err, "shape change failed");
                            }
                        }
                        _ => {}
                    }
                }
            }
            LiveUnit::Amp { gain } => {
                if let Some(v) = partial.get("gain").and_then(ParamValue::as_number) {
                    set(backend, *gain, AudioParam::Gain, v);
                }
            }
            LiveUnit::Noise {
                gain,
                source,
                color,
                out_degree,
                seed,
            } => {
                if let Some(v) = partial.get("gain").and_then(ParamValue::as_number) {
                    set(backend, *gain, AudioParam::Gain, v);
                }
                if let Some(name) = partial.get("type").and_then(ParamValue::as_choice) {
                    *color = noise_color(name);
                    // Hot-swap: regenerate the loop only if one is playing.
                    if let Some(old) = source.take() {
                        if let Err(err) = backend.stop(old) {
                            tracing::warn!(id, %err, "stopping noise source failed");
                        }
                        if let Err(err) = backend.release(old) {
                            tracing::warn!(id, %err, "releasing noise source failed");
                        }
                    }
                    if *out_degree > 0 {
                        *seed += 1;
                        *source = Some(start_noise_source(backend, *gain, *color, *seed));
                    }
                }
            }
            LiveUnit::Flanger {
                delay,
                lfo,
                lfo_gain,
                feedback,
                ..
            } => {
                for (key, value) in partial {
                    let Some(v) = value.as_number() else { continue };
                    match key.as_str() {
                        "delay" => set(backend, *delay, AudioParam::DelayTime, v / 1000.0),
                        "depth" => set(backend, *lfo_gain, AudioParam::Gain, v / 1000.0),
                        "rate" => set(backend, *lfo, AudioParam::Frequency, v),
                        "feedback" => set(backend, *feedback, AudioParam::Gain, v),
                        _ => {}
                    }
                }
            }
            LiveUnit::Chorus {
                delay_l,
                delay_r,
                lfo_l,
                lfo_r,
                lfo_gain_l,
                lfo_gain_r,
                dry,
                wet_l,
                wet_r,
                ..
            } => {
                for (key, value) in partial {
                    let Some(v) = value.as_number() else { continue };
                    match key.as_str() {
                        "delay" => {
                            set(backend, *delay_l, AudioParam::DelayTime, v / 1000.0);
                            set(backend, *delay_r, AudioParam::DelayTime, v / 1000.0);
                        }
                        "depth" => {
                            set(backend, *lfo_gain_l, AudioParam::Gain, v / 1000.0);
                            set(backend, *lfo_gain_r, AudioParam::Gain, v / 1000.0);
                        }
                        "rate" => {
                            set(backend, *lfo_l, AudioParam::Frequency, v);
                            set(backend, *lfo_r, AudioParam::Frequency, v);
                        }
                        "mix" => {
                            set(backend, *dry, AudioParam::Gain, 1.0 - v);
                            set(backend, *wet_l, AudioParam::Gain, v * 0.5);
                            set(backend, *wet_r, AudioParam::Gain, v * 0.5);
                        }
                        _ => {}
                    }
                }
            }
            LiveUnit::Phaser {
                input,
                filters,
                lfo,
                lfo_gain,
                dry,
                wet,
                freq,
                q,
                ..
            } => {
                if let Some(stages) = partial.get("stages").and_then(ParamValue::as_number) {
                    let stages = (stages as usize).max(1);
                    if stages != filters.len() {
                        // Rebuild exactly the allpass chain, seeded with the
                        // current freq/q; LFO, dry/wet and gains stay put.
                        for &old in filters.iter() {
                            if let Err(err) = backend.release(old) {
                                tracing::warn!(id, %err, "releasing phaser stage failed");
                            }
                        }
                        let fresh: Vec<PrimitiveId> = (0..stages)
                            .map(|_| backend.create_allpass(*freq, *q))
                            .collect();
                        for &filter in &fresh {
                            wire_param(backend, *lfo_gain, filter, AudioParam::Frequency);
                        }
                        wire(backend, *input, fresh[0]);
                        for pair in fresh.windows(2) {
                            wire(backend, pair[0], pair[1]);
                        }
                        wire(backend, fresh[fresh.len() - 1], *wet);
                        *filters = fresh;
                        tracing::debug!(id, stages, "phaser chain rebuilt");
                    }
                }
                for (key, value) in partial {
                    let Some(v) = value.as_number() else { continue };
                    match key.as_str() {
                        "freq" => {
                            for &filter in filters.iter() {
                                set(backend, filter, AudioParam::Frequency, v);
                            }
                            set(backend, *lfo_gain, AudioParam::Gain, v * 0.5);
                            *freq = v;
                        }
                        "q" => {
                            for &filter in filters.iter() {
                                set(backend, filter, AudioParam::Q, v);
                            }
                            *q = v;
                        }
                        "rate" => set(backend, *lfo, AudioParam::Frequency, v),
                        "mix" => {
                            set(backend, *dry, AudioParam::Gain, 1.0 - v);
                            set(backend, *wet, AudioParam::Gain, v);
                        }
                        _ => {}
                    }
                }
            }
            // Waveform zoom is a display concern; out has no params.
            LiveUnit::Waveform { .. } | LiveUnit::Out { .. } => {}
        }
    }

    /// Tears down a unit: stop its sources, release every owned primitive.
    /// Best-effort; errors are logged and swallowed.
    pub fn destroy_unit(&mut self, id: &str) {
        let Some(unit) = self.units.remove(id) else {
            tracing::debug!(id, "destroy for unknown unit ignored");
            return;
        };
        for source in unit.sources() {
            if let Err(err) = self.backend.stop(source) {
                tracing::warn!(id, %source, %err, "stopping source failed");
            }
        }
        for primitive in unit.primitives() {
            if let Err(err) = self.backend.release(primitive) {
                tracing::warn!(id, %primitive, %err, "releasing primitive failed");
            }
        }
        tracing::debug!(id, "live unit destroyed");
    }

    /// Connects `src`'s output into `dst`'s input. Missing endpoints are a
    /// logged no-op. First connection out of a noise unit starts its source.
    pub fn connect_units(&mut self, src_id: &str, dst_id: &str) {
        let Some(dst) = self.units.get(dst_id) else {
            tracing::warn!(src_id, dst_id, "connect target missing");
            return;
        };
        let dst_input = dst.input();
        let Some(src) = self.units.get_mut(src_id) else {
            tracing::warn!(src_id, dst_id, "connect source missing");
            return;
        };

        if let LiveUnit::Noise {
            gain,
            source,
            color,
            out_degree,
            seed,
        } = src
        {
            if *out_degree == 0 && source.is_none() {
                *seed += 1;
                *source = Some(start_noise_source(&mut self.backend, *gain, *color, *seed));
                tracing::debug!(src_id, "noise source started");
            }
            *out_degree += 1;
        }

        let output = src.output();
        wire(&mut self.backend, output, dst_input);
    }

    /// Removes one `src -> dst` connection. A noise unit whose out-degree
    /// returns to zero stops and drops its source.
    pub fn disconnect_units(&mut self, src_id: &str, dst_id: &str) {
        let Some(dst) = self.units.get(dst_id) else {
            tracing::warn!(src_id, dst_id, "disconnect target missing");
            return;
        };
        let dst_input = dst.input();
        let Some(src) = self.units.get_mut(src_id) else {
            tracing::warn!(src_id, dst_id, "disconnect source missing");
            return;
        };

        let output = src.output();
        unwire(&mut self.backend, output, dst_input);

        if let LiveUnit::Noise {
            source, out_degree, ..
        } = src
        {
            *out_degree = out_degree.saturating_sub(1);
            if *out_degree == 0
                && let Some(old) = source.take()
            {
                if let Err(err) = self.backend.stop(old) {
                    tracing::warn!(src_id, %err, "stopping noise source failed");
                }
                if let Err(err) = self.backend.release(old) {
                    tracing::warn!(src_id, %err, "releasing noise source failed");
                }
                tracing::debug!(src_id, "noise source stopped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_params;
    use patchbay_backend::SoftwareBackend;

    fn sync() -> AudioSynchronizer<SoftwareBackend> {
        AudioSynchronizer::new(SoftwareBackend::new(48000.0))
    }

    #[test]
    fn flanger_builds_its_cluster() {
        let mut sync = sync();
        // Destination exists up front.
        let base = sync.backend().primitive_count();
        sync.create_unit("f", NodeKind::Flanger, &default_params(NodeKind::Flanger));
        // input, delay, lfo, lfo gain, feedback, mix
        assert_eq!(sync.backend().primitive_count(), base + 6);
        // lfo->lfoGain, lfoGain->delayTime, input->delay, input->mix,
        // delay->feedback, feedback->delay, delay->mix
        assert_eq!(sync.backend().connection_count(), 7);
    }

    #[test]
    fn noise_source_is_lazy() {
        let mut sync = sync();
        sync.create_unit("n", NodeKind::Noise, &default_params(NodeKind::Noise));
        sync.create_unit("a", NodeKind::Amp, &default_params(NodeKind::Amp));
        assert_eq!(sync.noise_active("n"), Some(false));

        sync.connect_units("n", "a");
        assert_eq!(sync.noise_active("n"), Some(true));

        // Second fan-out edge, then remove one: still active.
        sync.connect_units("n", "a");
        sync.disconnect_units("n", "a");
        assert_eq!(sync.noise_active("n"), Some(true));

        sync.disconnect_units("n", "a");
        assert_eq!(sync.noise_active("n"), Some(false));
    }

    #[test]
    fn noise_color_swap_keeps_gain_staging() {
        let mut sync = sync();
        sync.create_unit("n", NodeKind::Noise, &default_params(NodeKind::Noise));
        sync.create_unit("o", NodeKind::Out, &default_params(NodeKind::Out));
        sync.connect_units("n", "o");

        let before = sync.backend().primitive_count();
        let mut partial = ParamMap::new();
        partial.insert("type".into(), "pink".into());
        sync.update_unit("n", &partial);

        // Old source released, new source created: net zero.
        assert_eq!(sync.backend().primitive_count(), before);
        assert_eq!(sync.noise_active("n"), Some(true));
    }

    #[test]
    fn destroy_is_best_effort_and_complete() {
        let mut sync = sync();
        sync.create_unit("c", NodeKind::Chorus, &default_params(NodeKind::Chorus));
        let base = sync.backend().primitive_count();
        assert_eq!(base, 1 + 13); // destination + chorus cluster

        sync.destroy_unit("c");
        assert_eq!(sync.backend().primitive_count(), 1);
        assert_eq!(sync.backend().connection_count(), 0);
        assert!(!sync.contains("c"));

        // Destroying again is a no-op, not a panic.
        sync.destroy_unit("c");
    }

    #[test]
    fn connect_to_missing_unit_is_noop() {
        let mut sync = sync();
        sync.create_unit("a", NodeKind::Amp, &default_params(NodeKind::Amp));
        sync.connect_units("a", "ghost");
        sync.connect_units("ghost", "a");
        assert_eq!(sync.backend().connection_count(), 0);
    }
}

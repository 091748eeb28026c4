//! Node kind registry: metadata and default parameters.
//!
//! Central place for everything a UI or CLI needs to offer the palette of
//! node kinds: a summary string and the default parameter map applied when a
//! node of that kind is created.

use crate::node::{NodeKind, ParamMap, ParamValue};

/// Human-readable summary for a node kind.
pub const fn summary(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Osc => "Oscillator with sine/triangle/sawtooth/square waveforms",
        NodeKind::Amp => "Gain stage for volume control",
        NodeKind::Noise => "Looping white/pink/brown noise source",
        NodeKind::Flanger => "Swept short delay with feedback",
        NodeKind::Chorus => "Stereo modulated delay pair",
        NodeKind::Phaser => "Cascaded allpass stages with LFO sweep",
        NodeKind::Waveform => "Pass-through oscilloscope tap",
        NodeKind::Out => "Audio output",
    }
}

/// Default parameters for a freshly created node of `kind`.
pub fn default_params(kind: NodeKind) -> ParamMap {
    fn map<const N: usize>(entries: [(&str, ParamValue); N]) -> ParamMap {
        entries
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value))
            .collect()
    }

    match kind {
        NodeKind::Osc => map([("frequency", 440.0.into()), ("type", "sine".into())]),
        NodeKind::Amp => map([("gain", 0.5.into())]),
        NodeKind::Noise => map([("type", "white".into()), ("gain", 0.5.into())]),
        NodeKind::Flanger => map([
            ("delay", 5.0.into()),
            ("depth", 0.5.into()),
            ("rate", 1.0.into()),
            ("feedback", 0.5.into()),
        ]),
        NodeKind::Chorus => map([
            ("delay", 30.0.into()),
            ("depth", 0.5.into()),
            ("rate", 1.5.into()),
            ("mix", 0.5.into()),
        ]),
        NodeKind::Phaser => map([
            ("stages", 6.0.into()),
            ("freq", 1000.0.into()),
            ("q", 1.0.into()),
            ("rate", 1.0.into()),
            ("mix", 0.5.into()),
        ]),
        NodeKind::Waveform => map([("zoom", 1.0.into())]),
        NodeKind::Out => ParamMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_defaults() {
        for kind in NodeKind::ALL {
            // Out has no params; everything else does.
            let params = default_params(kind);
            if kind == NodeKind::Out {
                assert!(params.is_empty());
            } else {
                assert!(!params.is_empty(), "{kind} has no defaults");
            }
        }
    }

    #[test]
    fn osc_defaults_match_palette() {
        let params = default_params(NodeKind::Osc);
        assert_eq!(params["frequency"].as_number(), Some(440.0));
        assert_eq!(params["type"].as_choice(), Some("sine"));
    }
}

//! Graph data model: nodes, edges, parameters.
//!
//! The patch graph is declarative and fully serializable: a node is its kind
//! plus a parameter map, an edge is a `source -> target` pair of node ids.
//! Everything the audio side needs is derivable from these values, which is
//! what makes full-rebuild undo/redo possible.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The closed set of node kinds the engine understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Audible oscillator.
    Osc,
    /// Gain (volume) stage.
    Amp,
    /// Looping colored-noise source.
    Noise,
    /// Mono flanger with feedback.
    Flanger,
    /// Stereo chorus.
    Chorus,
    /// Multi-stage allpass phaser.
    Phaser,
    /// Pass-through waveform tap for visualization.
    Waveform,
    /// Terminal audio output.
    Out,
}

impl NodeKind {
    /// Every kind, in display order.
    pub const ALL: [NodeKind; 8] = [
        NodeKind::Osc,
        NodeKind::Amp,
        NodeKind::Noise,
        NodeKind::Flanger,
        NodeKind::Chorus,
        NodeKind::Phaser,
        NodeKind::Waveform,
        NodeKind::Out,
    ];

    /// The kind's canonical lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            NodeKind::Osc => "osc",
            NodeKind::Amp => "amp",
            NodeKind::Noise => "noise",
            NodeKind::Flanger => "flanger",
            NodeKind::Chorus => "chorus",
            NodeKind::Phaser => "phaser",
            NodeKind::Waveform => "waveform",
            NodeKind::Out => "out",
        }
    }

    /// Parses a canonical name back into a kind.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl core::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single parameter value.
///
/// Numeric params (frequency, gain, mix...) are `Number`; enum-like params
/// (oscillator waveform, noise color) are `Choice` strings. Serialized
/// untagged, so a param map reads as plain JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Continuous numeric value.
    Number(f32),
    /// Named variant of an enum-like parameter.
    Choice(String),
}

impl ParamValue {
    /// The numeric value, if this is a `Number`.
    pub fn as_number(&self) -> Option<f32> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Choice(_) => None,
        }
    }

    /// The choice name, if this is a `Choice`.
    pub fn as_choice(&self) -> Option<&str> {
        match self {
            ParamValue::Number(_) => None,
            ParamValue::Choice(name) => Some(name),
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Choice(value.to_owned())
    }
}

/// Ordered parameter map. Ordering keeps serialization stable.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Canvas position of a node. Opaque to the audio side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

/// A node in the patch graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique, stable id.
    pub id: String,
    /// Node kind; immutable after creation.
    pub kind: NodeKind,
    /// Current parameter values (kind defaults merged with edits).
    pub params: ParamMap,
    /// Canvas position.
    pub position: Position,
}

/// A directed edge between two nodes.
///
/// Parallel edges between the same pair are legal and independent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Unique, stable id.
    pub id: String,
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(NodeKind::from_name("reverb"), None);
    }

    #[test]
    fn param_value_untagged_serde() {
        let mut params = ParamMap::new();
        params.insert("frequency".into(), ParamValue::Number(440.0));
        params.insert("type".into(), ParamValue::from("sine"));

        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"frequency":440.0,"type":"sine"}"#);

        let back: ParamMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn node_serde_round_trip() {
        let node = GraphNode {
            id: "n1".into(),
            kind: NodeKind::Phaser,
            params: ParamMap::from([
                ("stages".into(), ParamValue::Number(6.0)),
                ("mix".into(), ParamValue::Number(0.5)),
            ]),
            position: Position { x: 10.0, y: -4.0 },
        };
        let json = serde_json::to_string(&node).unwrap();
        let back: GraphNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}

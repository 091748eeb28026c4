//! The graph state store: the engine's entire public mutation surface.
//!
//! Every mutation follows the same fixed ordering: apply the audio-side
//! effect through the synchronizer, update the declarative state, push a
//! history snapshot. Undo/redo replays audio side effects by tearing down
//! every live unit and rebuilding from the target snapshot; full rebuild,
//! not diffing, is the convergence guarantee.

use patchbay_backend::AudioBackend;

use crate::error::PatchError;
use crate::history::{HistoryLog, Snapshot};
use crate::node::{GraphEdge, GraphNode, NodeKind, ParamMap, Position};
use crate::registry::default_params;
use crate::sync::AudioSynchronizer;

/// Owns the patch graph, its history, and the audio synchronizer.
///
/// Invariant: after any public method returns, the set of node ids equals
/// the set of live unit ids in the synchronizer.
pub struct PatchStore<B: AudioBackend> {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    history: HistoryLog,
    sync: AudioSynchronizer<B>,
    next_node_id: u64,
    next_edge_id: u64,
}

impl<B: AudioBackend> PatchStore<B> {
    /// Creates an empty store over `backend`. History is seeded with the
    /// empty state so the first mutation is undoable.
    pub fn new(backend: B) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            history: HistoryLog::new(Snapshot::default()),
            sync: AudioSynchronizer::new(backend),
            next_node_id: 1,
            next_edge_id: 1,
        }
    }

    /// All nodes, in creation order.
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// All edges, most recent first.
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Looks up a node by id.
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The synchronizer, for live-state introspection.
    pub fn synchronizer(&self) -> &AudioSynchronizer<B> {
        &self.sync
    }

    /// Shared access to the backend.
    pub fn backend(&self) -> &B {
        self.sync.backend()
    }

    /// Exclusive access to the backend (rendering, transport).
    pub fn backend_mut(&mut self) -> &mut B {
        self.sync.backend_mut()
    }

    /// Number of history entries, including the seed.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// True if `undo` would change state.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// True if `redo` would change state.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// True while audio is playing.
    pub fn is_running(&self) -> bool {
        self.sync.is_running()
    }

    /// Starts or stops audio; returns the new running state. Not recorded
    /// in history.
    pub fn toggle_playback(&mut self) -> bool {
        self.sync.toggle_playback()
    }

    /// Copies the latest waveform window of a `waveform` node into `out`.
    pub fn waveform_samples(&self, id: &str, out: &mut [f32]) -> bool {
        self.sync.waveform_samples(id, out)
    }

    fn commit(&mut self) {
        self.history.commit(Snapshot {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        });
    }

    /// Creates a node of the named kind with its default parameters and
    /// returns its id. Unknown kind names leave the store untouched.
    pub fn create_node(&mut self, kind: &str) -> Result<String, PatchError> {
        let Some(kind) = NodeKind::from_name(kind) else {
            return Err(PatchError::UnknownKind(kind.to_owned()));
        };

        let id = format!("n{}", self.next_node_id);
        self.next_node_id += 1;
        let params = default_params(kind);

        self.sync.create_unit(&id, kind, &params);
        self.nodes.push(GraphNode {
            id: id.clone(),
            kind,
            params,
            position: Position::default(),
        });
        self.commit();
        tracing::debug!(id, %kind, "node created");
        Ok(id)
    }

    /// Applies a partial parameter update to one node: the live unit is
    /// updated incrementally and the keys are shallow-merged into the node's
    /// params. Unknown ids are a silent no-op.
    pub fn update_node_params(&mut self, id: &str, partial: ParamMap) {
        let Some(index) = self.nodes.iter().position(|n| n.id == id) else {
            tracing::debug!(id, "update for unknown node ignored");
            return;
        };

        self.sync.update_unit(id, &partial);
        self.nodes[index].params.extend(partial);
        self.commit();
    }

    /// Deletes the listed nodes, every edge touching them, and their live
    /// units. Ids that do not exist are ignored.
    pub fn delete_nodes(&mut self, ids: &[&str]) {
        let doomed: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| ids.contains(&n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();
        if doomed.is_empty() {
            return;
        }

        let touches = |edge: &GraphEdge| {
            doomed.iter().any(|id| *id == edge.source || *id == edge.target)
        };

        // Drop the edges first so noise out-degree bookkeeping sees each
        // disconnect before the endpoints disappear.
        let removed: Vec<GraphEdge> = self.edges.iter().filter(|e| touches(e)).cloned().collect();
        for edge in &removed {
            self.sync.disconnect_units(&edge.source, &edge.target);
        }
        for id in &doomed {
            self.sync.destroy_unit(id);
        }

        self.edges.retain(|e| !touches(e));
        self.nodes.retain(|n| !doomed.contains(&n.id));
        self.commit();
        tracing::debug!(count = doomed.len(), "nodes deleted");
    }

    /// Adds an edge and connects the corresponding live units. Returns the
    /// new edge id, or `None` if either endpoint is missing. Edges are not
    /// deduplicated; parallel edges are independent.
    pub fn add_edge(&mut self, source: &str, target: &str) -> Option<String> {
        if self.node(source).is_none() || self.node(target).is_none() {
            tracing::debug!(source, target, "edge endpoint missing, ignored");
            return None;
        }

        let id = format!("e{}", self.next_edge_id);
        self.next_edge_id += 1;

        self.sync.connect_units(source, target);
        self.edges.insert(
            0,
            GraphEdge {
                id: id.clone(),
                source: source.to_owned(),
                target: target.to_owned(),
            },
        );
        self.commit();
        Some(id)
    }

    /// Deletes the listed edges and disconnects the corresponding live
    /// pairs. Unknown ids are ignored.
    pub fn delete_edges(&mut self, ids: &[&str]) {
        let removed: Vec<GraphEdge> = self
            .edges
            .iter()
            .filter(|e| ids.contains(&e.id.as_str()))
            .cloned()
            .collect();
        if removed.is_empty() {
            return;
        }

        for edge in &removed {
            self.sync.disconnect_units(&edge.source, &edge.target);
        }
        self.edges.retain(|e| !ids.contains(&e.id.as_str()));
        self.commit();
    }

    /// Steps back one history entry, rebuilding the live graph from the
    /// snapshot. Returns false if there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        if !self.history.can_undo() {
            return false;
        }
        self.restore(Direction::Back);
        true
    }

    /// Steps forward one history entry. Returns false if there is nothing
    /// to redo.
    pub fn redo(&mut self) -> bool {
        if !self.history.can_redo() {
            return false;
        }
        self.restore(Direction::Forward);
        true
    }

    fn restore(&mut self, direction: Direction) {
        if self.sync.is_running() {
            self.sync.toggle_playback();
        }

        for node in &self.nodes {
            self.sync.destroy_unit(&node.id);
        }

        let snapshot = match direction {
            Direction::Back => self.history.undo(),
            Direction::Forward => self.history.redo(),
        };
        // can_undo/can_redo was checked by the caller.
        let Some(snapshot) = snapshot.cloned() else {
            return;
        };

        for node in &snapshot.nodes {
            self.sync.create_unit(&node.id, node.kind, &node.params);
        }
        for edge in &snapshot.edges {
            self.sync.connect_units(&edge.source, &edge.target);
        }

        self.nodes = snapshot.nodes;
        self.edges = snapshot.edges;
        tracing::debug!(?direction, "history restored");
    }

    /// Empties the patch: stops playback, tears down every unit, clears
    /// nodes and edges, and resets history to a single empty snapshot.
    pub fn clear_all(&mut self) {
        if self.sync.is_running() {
            self.sync.toggle_playback();
        }
        for node in &self.nodes {
            self.sync.destroy_unit(&node.id);
        }
        self.nodes.clear();
        self.edges.clear();
        self.history.reset(Snapshot::default());
        tracing::debug!("patch cleared");
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Back,
    Forward,
}

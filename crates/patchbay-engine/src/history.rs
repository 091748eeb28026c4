//! Undo/redo history as a log of deep graph snapshots.
//!
//! Every committed mutation pushes a full copy of `{nodes, edges}`. The log
//! is seeded with one snapshot of the initial state, so the cursor always
//! points at a valid entry and "undo past the beginning" cannot happen by
//! construction. Committing while the cursor is in the middle of the log
//! discards the redo branch.

use crate::node::{GraphEdge, GraphNode};

/// Immutable deep copy of the graph at one point in time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    /// All nodes at snapshot time.
    pub nodes: Vec<GraphNode>,
    /// All edges at snapshot time.
    pub edges: Vec<GraphEdge>,
}

/// Snapshot log with a cursor.
///
/// Invariant: `cursor < entries.len()` and `entries` is never empty.
#[derive(Debug)]
pub struct HistoryLog {
    entries: Vec<Snapshot>,
    cursor: usize,
}

impl HistoryLog {
    /// Creates a log seeded with `initial` as the sole entry.
    pub fn new(initial: Snapshot) -> Self {
        Self {
            entries: vec![initial],
            cursor: 0,
        }
    }

    /// Pushes a snapshot after the cursor, discarding any redo branch.
    pub fn commit(&mut self, snapshot: Snapshot) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(snapshot);
        self.cursor += 1;
    }

    /// True if a step back exists.
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// True if a step forward exists.
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Moves the cursor back and returns the entry it lands on.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(&self.entries[self.cursor])
    }

    /// Moves the cursor forward and returns the entry it lands on.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(&self.entries[self.cursor])
    }

    /// Drops all history and reseeds with `initial`.
    pub fn reset(&mut self, initial: Snapshot) {
        self.entries = vec![initial];
        self.cursor = 0;
    }

    /// Number of entries, including the seed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; the seed entry is permanent.
    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn snap(ids: &[&str]) -> Snapshot {
        Snapshot {
            nodes: ids
                .iter()
                .map(|id| GraphNode {
                    id: (*id).to_owned(),
                    kind: NodeKind::Amp,
                    params: Default::default(),
                    position: Default::default(),
                })
                .collect(),
            edges: Vec::new(),
        }
    }

    #[test]
    fn seeded_log_cannot_undo() {
        let mut log = HistoryLog::new(Snapshot::default());
        assert!(!log.can_undo());
        assert!(!log.can_redo());
        assert!(log.undo().is_none());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn undo_redo_walk() {
        let mut log = HistoryLog::new(Snapshot::default());
        log.commit(snap(&["a"]));
        log.commit(snap(&["a", "b"]));

        assert_eq!(log.undo(), Some(&snap(&["a"])));
        assert_eq!(log.undo(), Some(&Snapshot::default()));
        assert!(log.undo().is_none());

        assert_eq!(log.redo(), Some(&snap(&["a"])));
        assert_eq!(log.redo(), Some(&snap(&["a", "b"])));
        assert!(log.redo().is_none());
    }

    #[test]
    fn commit_discards_redo_branch() {
        let mut log = HistoryLog::new(Snapshot::default());
        log.commit(snap(&["a"]));
        log.commit(snap(&["a", "b"]));
        log.undo();
        log.undo();

        log.commit(snap(&["c"]));
        assert_eq!(log.len(), 2);
        assert!(!log.can_redo());
        assert_eq!(log.undo(), Some(&Snapshot::default()));
    }
}

//! Engine error types.

use thiserror::Error;

/// Errors surfaced by [`crate::PatchStore`] operations.
///
/// The store's contract is deliberately forgiving: mutations referencing a
/// missing node or edge are silent no-ops, and audio-side failures are
/// logged and swallowed. The only hard error is asking for a node kind that
/// does not exist.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    /// `create_node` was called with an unrecognized kind name.
    #[error("unknown node kind `{0}`")]
    UnknownKind(String),
}

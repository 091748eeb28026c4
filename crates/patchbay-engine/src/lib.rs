//! Patch graph engine: declarative state synchronized to live audio.
//!
//! The engine keeps two representations of one patch: a serializable graph
//! of nodes and edges ([`PatchStore`]) and the live DSP units realizing it
//! in an [`patchbay_backend::AudioBackend`] ([`AudioSynchronizer`]). Store
//! mutations are mirrored onto the audio side synchronously; undo/redo and
//! clear replay side effects by full rebuild from deep history snapshots.
//!
//! ```no_run
//! use patchbay_backend::SoftwareBackend;
//! use patchbay_engine::PatchStore;
//!
//! let mut store = PatchStore::new(SoftwareBackend::new(48000.0));
//! let osc = store.create_node("osc").unwrap();
//! let out = store.create_node("out").unwrap();
//! store.add_edge(&osc, &out);
//! store.toggle_playback();
//! ```

pub mod error;
pub mod history;
pub mod node;
pub mod registry;
pub mod store;
pub mod sync;

pub use error::PatchError;
pub use history::{HistoryLog, Snapshot};
pub use node::{GraphEdge, GraphNode, NodeKind, ParamMap, ParamValue, Position};
pub use store::PatchStore;
pub use sync::AudioSynchronizer;

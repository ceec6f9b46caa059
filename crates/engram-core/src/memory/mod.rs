//! Memory data model: typed entries and the association graph's edges

mod association;
mod entry;

pub use association::{Association, AssociationKind};
pub use entry::{CaptureInput, Memory, MemoryKind, MemoryStats, META_SESSION_ID};

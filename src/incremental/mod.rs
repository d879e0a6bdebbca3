pub mod delta;
pub mod document;
pub mod updater;

pub use delta::{EditDelta, Position};
pub use document::{LiveDocument, SparseDocument};
pub use updater::{IncrementalUpdater, LineState, Mode, UpdateOutcome};

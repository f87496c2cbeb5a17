//! Emulation-thread-facing half of the input recording core: the session
//! state machine ([`recorder`]), the pause/frame-advance bridge
//! ([`control`]) and the save-state seam ([`snapshot`]).

pub mod control;
pub mod recorder;
pub mod snapshot;

pub use control::EmuControls;
pub use recorder::{Mode, Recorder, RecorderError};
pub use snapshot::SnapshotStore;

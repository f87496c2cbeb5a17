//! Seam to the save-state subsystem.
//!
//! Snapshot serialization itself is not this crate's business; the
//! recorder only needs to ask for a snapshot file to be produced or
//! applied, and to know whether the machine is live. The save-state
//! subsystem must call [`crate::recorder::Recorder::on_savestate_boundary`]
//! once per restore, after its own frame counter is back in place.

use std::io;
use std::path::Path;

/// Host-provided access to whole-machine snapshots.
pub trait SnapshotStore {
    /// Whether the emulated machine is constructed and able to snapshot.
    fn is_open(&self) -> bool;

    /// Serialize the machine state to `path`.
    fn save_to(&mut self, path: &Path) -> io::Result<()>;

    /// Restore the machine state from `path`. The restore may complete
    /// asynchronously on the emulation thread; callers must not assume the
    /// global frame counter is final until the savestate boundary fires.
    fn load_from(&mut self, path: &Path) -> io::Result<()>;
}

//! Format and codec layer of the input recording core.
//!
//! Three pieces, all free of threads and free of emulator state:
//!
//! - [`pad`] — the controller sample codec (wire layout of one pad).
//! - [`movie`] — the versioned on-disk movie file.
//! - [`virtual_pad`] — byte-level blending of manual overrides into the
//!   live polling stream.
//!
//! The recording state machine that ties these to the emulation thread
//! lives in `padrec-runtime`.

pub mod movie;
pub mod pad;
pub mod virtual_pad;

pub use movie::{MovieError, MovieFile, MovieHeader, SlotBitmap};
pub use pad::{Axis, Button, ButtonMask, PadData};
pub use virtual_pad::InputOverride;

//! Recording session state machine.
//!
//! A [`Recorder`] is an explicitly owned session object: holding one is
//! holding the single active recording/replay session, and dropping it (or
//! calling [`Recorder::stop`]) ends the session. It sits in the controller
//! polling path of the emulation thread and either captures each sampled
//! byte into the movie file or substitutes the recorded byte back into the
//! reply buffer.
//!
//! Frame bookkeeping is recording-relative: `frame_counter` counts frames
//! since `starting_frame`, the global frame count at which the session
//! began. After any savestate restore the counter is recomputed from the
//! global count rather than trusted, because the restore may land a frame
//! or two after the request.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use padrec_core::movie::{MovieError, MovieFile, SlotBitmap, companion_path};
use padrec_core::pad::{PORT_COUNT, POLL_ACK, POLL_COMMAND, POLL_HEADER_LEN, SUB_BLOCK_LEN};
use padrec_core::virtual_pad::InputOverride;

use crate::control::EmuControls;
use crate::snapshot::SnapshotStore;

/// Version tag stamped into the header of new recordings.
pub const EMULATOR_TAG: &str = concat!("padrec-", env!("CARGO_PKG_VERSION"));

/// Session state. `Idle` is both initial and reachable from either active
/// state via [`Recorder::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    Recording,
    Replaying,
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error(transparent)]
    Movie(#[from] MovieError),

    #[error("emulated machine is not open")]
    MachineClosed,

    #[error("snapshot i/o failed: {0}")]
    Snapshot(#[source] std::io::Error),
}

/// The recording orchestrator.
pub struct Recorder {
    mode: Mode,
    movie: Option<MovieFile>,
    overrides: InputOverride,
    controls: Arc<EmuControls>,
    /// The current exchange is a standard read query worth recording.
    interrupt_frame: bool,
    /// Recording-relative frame index.
    frame_counter: u32,
    /// Global frame count when the session began.
    starting_frame: u32,
    /// Set by `play` on a from-savestate movie; the first savestate
    /// boundary after it establishes `starting_frame`.
    savestate_pending: bool,
}

impl Recorder {
    pub fn new(controls: Arc<EmuControls>) -> Self {
        Self {
            mode: Mode::Idle,
            movie: None,
            overrides: InputOverride::new(),
            controls,
            interrupt_frame: false,
            frame_counter: 0,
            starting_frame: 0,
            savestate_pending: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    pub fn starting_frame(&self) -> u32 {
        self.starting_frame
    }

    pub fn movie(&self) -> Option<&MovieFile> {
        self.movie.as_ref()
    }

    /// Virtual-pad override state, e.g. for a manual-control panel.
    pub fn overrides_mut(&mut self) -> &mut InputOverride {
        &mut self.overrides
    }

    pub fn overrides(&self) -> &InputOverride {
        &self.overrides
    }

    /// Start a new recording.
    ///
    /// Any active session is stopped first and a pause is requested; the
    /// emulation thread may take a frame or two to actually halt. When
    /// `from_savestate` is set the machine must be open and a companion
    /// snapshot is produced next to the movie file; otherwise the
    /// recording starts from power-on and `global_frame` is ignored.
    #[allow(clippy::too_many_arguments)]
    pub fn create<S: SnapshotStore>(
        &mut self,
        path: &Path,
        slots: SlotBitmap,
        from_savestate: bool,
        author: &str,
        game_name: &str,
        global_frame: u32,
        snapshots: &mut S,
    ) -> Result<(), RecorderError> {
        self.stop();
        self.controls.request_pause();

        if from_savestate && !snapshots.is_open() {
            return Err(RecorderError::MachineClosed);
        }

        let mut movie = MovieFile::create(path, slots, from_savestate)?;
        if from_savestate {
            snapshots
                .save_to(&companion_path(path))
                .map_err(RecorderError::Snapshot)?;
        }

        movie.header_mut().set_emulator(EMULATOR_TAG);
        if !author.is_empty() {
            movie.header_mut().set_author(author);
        }
        movie.header_mut().set_game_name(game_name);
        movie.write_header()?;

        self.starting_frame = if from_savestate { global_frame } else { 0 };
        self.frame_counter = 0;
        self.savestate_pending = false;
        self.movie = Some(movie);
        self.mode = Mode::Recording;
        info!(
            path = %path.display(),
            from_savestate,
            starting_frame = self.starting_frame,
            "started new recording"
        );
        Ok(())
    }

    /// Open a movie file and start replaying it.
    ///
    /// `current_game` is the resolved name of the loaded game, if any;
    /// a mismatch against the header is advisory only.
    pub fn play<S: SnapshotStore>(
        &mut self,
        path: &Path,
        current_game: Option<&str>,
        snapshots: &mut S,
    ) -> Result<(), RecorderError> {
        self.stop();
        self.controls.request_pause();

        let movie = MovieFile::open(path)?;

        if movie.from_savestate() {
            if !snapshots.is_open() {
                return Err(RecorderError::MachineClosed);
            }
            snapshots
                .load_from(&companion_path(path))
                .map_err(RecorderError::Snapshot)?;
            self.savestate_pending = true;
        } else {
            self.savestate_pending = false;
            self.starting_frame = 0;
        }
        self.frame_counter = 0;

        if let Some(current) = current_game {
            let recorded = movie.header().game_name();
            if !recorded.is_empty() && recorded != current {
                warn!(recorded, current, "movie was possibly recorded on a different game");
            }
        }

        info!(
            path = %path.display(),
            emulator = movie.header().emulator(),
            author = movie.header().author(),
            game = movie.header().game_name(),
            version = movie.header().version(),
            total_frames = movie.max_frame(),
            undo_count = movie.undo_count(),
            "replaying input recording"
        );

        self.movie = Some(movie);
        self.mode = Mode::Replaying;
        Ok(())
    }

    /// End the session and close the movie file. Idempotent; takes effect
    /// at the next poll/frame boundary, never mid-byte.
    pub fn stop(&mut self) {
        if let Some(movie) = self.movie.take() {
            info!(path = %movie.path().display(), "recording stopped");
        }
        self.mode = Mode::Idle;
        self.interrupt_frame = false;
        self.savestate_pending = false;
    }

    /// Flip between capturing input and replaying it, mid-session.
    pub fn toggle_record_mode(&mut self) {
        match self.mode {
            Mode::Recording => {
                self.mode = Mode::Replaying;
                info!("replay mode on");
            }
            Mode::Replaying => {
                self.mode = Mode::Recording;
                info!("record mode on");
            }
            Mode::Idle => {}
        }
    }

    /// Hardware polling hook: must be called for every byte of every
    /// controller reply, in increasing `byte_index` order, every frame,
    /// whether or not a session is active.
    ///
    /// `data` is the byte at `byte_index`. Byte 1 must carry the standard
    /// read-query command and byte 2 the fixed acknowledge, otherwise the
    /// whole exchange is ignored (config-mode traffic and the like).
    /// Sample bytes start at index 3; overrides are blended in before the
    /// byte is captured or substituted, so recordings always reflect the
    /// blended stream.
    pub fn on_controller_poll(
        &mut self,
        data: u8,
        port: usize,
        slot: usize,
        byte_index: usize,
        buf: &mut [u8],
    ) {
        if port >= PORT_COUNT {
            return;
        }

        if byte_index == 1 {
            self.interrupt_frame = data == POLL_COMMAND;
            return;
        }
        if byte_index == 2 {
            if data != POLL_ACK {
                self.interrupt_frame = false;
            }
            return;
        }
        if !self.interrupt_frame || byte_index < POLL_HEADER_LEN {
            return;
        }

        self.overrides.apply(port, byte_index, buf);

        let Some(movie) = self.movie.as_mut() else {
            return;
        };
        let sub = byte_index - POLL_HEADER_LEN;
        if sub >= SUB_BLOCK_LEN || byte_index >= buf.len() {
            return;
        }

        match self.mode {
            Mode::Recording => {
                if let Err(err) =
                    movie.write_key_buf(self.frame_counter, port, slot, sub, buf[byte_index])
                {
                    warn!(frame = self.frame_counter, port, slot, sub, %err, "sample write failed");
                }
            }
            Mode::Replaying => {
                if self.frame_counter >= movie.max_frame() {
                    // The movie ran out; leave the live value in place and
                    // let the emulation halt at this boundary.
                    self.controls.request_pause();
                    return;
                }
                match movie.read_key_buf(self.frame_counter, port, slot, sub) {
                    Ok(Some(recorded)) => buf[byte_index] = recorded,
                    Ok(None) => {}
                    Err(err) => {
                        warn!(frame = self.frame_counter, port, slot, sub, %err, "sample read failed");
                    }
                }
            }
            Mode::Idle => {}
        }
    }

    /// Savestate boundary hook: must be invoked once per restore, after
    /// the snapshot's own frame counter has been re-established.
    ///
    /// The first boundary after `play` of a from-savestate movie anchors
    /// `starting_frame`. While recording, a restore is a rewind: the frame
    /// counter is recomputed from the global count (clamped into the
    /// recorded range) and the undo counter advances.
    pub fn on_savestate_boundary(&mut self, global_frame: u32) {
        if self.savestate_pending {
            self.starting_frame = global_frame;
            self.frame_counter = 0;
            self.savestate_pending = false;
            info!(starting_frame = global_frame, "replay anchored to restored savestate");
            return;
        }

        if self.mode != Mode::Recording {
            return;
        }
        let Some(movie) = self.movie.as_mut() else {
            return;
        };

        let relative = if global_frame < self.starting_frame {
            warn!(
                global_frame,
                starting_frame = self.starting_frame,
                "savestate restored before the recording started; clamping to frame 0"
            );
            0
        } else {
            global_frame - self.starting_frame
        };
        self.frame_counter = if relative > movie.max_frame() {
            warn!(
                relative,
                max_frame = movie.max_frame(),
                "savestate restored past the end of the recording; clamping"
            );
            movie.max_frame()
        } else {
            relative
        };

        if let Err(err) = movie.add_undo_count() {
            warn!(%err, "failed to persist undo count");
        }
    }

    /// Frame boundary hook: advances the recording-relative frame counter
    /// and, while recording, the movie's persistent length.
    pub fn increment_frame_counter(&mut self) {
        self.frame_counter += 1;
        if self.mode == Mode::Recording {
            if let Some(movie) = self.movie.as_mut() {
                if let Err(err) = movie.update_frame_max(self.frame_counter) {
                    warn!(frame = self.frame_counter, %err, "failed to persist frame count");
                }
            }
        }
    }
}

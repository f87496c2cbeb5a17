//! Versioned binary movie file: header, slot bitmap and per-frame blocks.
//!
//! # On-disk layout (little-endian, fixed widths)
//!
//! ```text
//! 0          version          u8
//! 1          emulator tag     50 bytes, nul padded
//! 51         author           255 bytes, nul padded
//! 306        game name        255 bytes, nul padded
//! 561        version body     (see below)
//! ...        frame blocks     block_len bytes per frame
//! ```
//!
//! Version 1 body (legacy): `max_frame: u32`, `undo_count: u32`,
//! `savestate: u8`; the slot bitmap is implied (slot 0 of both ports) and
//! the block length is fixed at 36 bytes. Frame data starts at 570.
//!
//! Version 2 body: `savestate: u8`, slot bitmap (8 bytes, one per slot),
//! `max_frame: u32`, `undo_count: u32`; the block length is 18 bytes per
//! active slot. Frame data starts at 578.
//!
//! Each frame block is the concatenation, in bitmap order, of one 18-byte
//! controller sample per active slot.
//!
//! # Durability
//!
//! Writes are one byte per polled sample plus the occasional counter
//! update, so every write is followed by a data sync. That bounds the loss
//! on a crash to the frame in flight, which matters more here than write
//! throughput.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::pad::{PORT_COUNT, SLOTS_PER_PORT, SUB_BLOCK_LEN};

/// Version written for newly created recordings.
pub const CURRENT_VERSION: u8 = 2;

pub const EMU_TAG_LEN: usize = 50;
pub const AUTHOR_LEN: usize = 255;
pub const GAME_NAME_LEN: usize = 255;

/// Bytes shared by every version: version byte plus the three string fields.
pub const HEADER_PREFIX_LEN: usize = 1 + EMU_TAG_LEN + AUTHOR_LEN + GAME_NAME_LEN;

const V1_BODY_LEN: usize = 9;
const V2_BODY_LEN: usize = 1 + SLOT_BITMAP_LEN + 8;
const SLOT_BITMAP_LEN: usize = PORT_COUNT * SLOTS_PER_PORT;

/// Appended to the movie path to form the companion savestate path.
pub const SAVESTATE_SUFFIX: &str = ".savestate";

/// Companion savestate path for a movie file path.
pub fn companion_path(movie: &Path) -> PathBuf {
    let mut os = movie.as_os_str().to_os_string();
    os.push(SAVESTATE_SUFFIX);
    PathBuf::from(os)
}

#[derive(Debug, Error)]
pub enum MovieError {
    #[error("i/o error on movie file: {0}")]
    Io(#[from] io::Error),

    #[error("movie header expected {expected} bytes, got {actual}")]
    TruncatedHeader { expected: usize, actual: usize },

    #[error("unsupported movie file version: {0}")]
    UnsupportedVersion(u8),

    #[error("companion savestate missing: {}", .0.display())]
    MissingCompanion(PathBuf),

    #[error("slot ({port}, {slot}) is not active in this recording")]
    InactiveSlot { port: usize, slot: usize },

    #[error("byte index {0} is outside the {SUB_BLOCK_LEN}-byte sample")]
    IndexOutOfRange(usize),

    #[error("slot bitmap can only change before any frame data is written")]
    SlotsLocked,

    #[error("slot bitmap has no active slots")]
    EmptySlots,
}

/// Which (port, slot) pairs carry data in a recording.
///
/// Fixed at creation time; both the per-frame block length and each slot's
/// offset inside a block derive from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBitmap {
    active: [[bool; SLOTS_PER_PORT]; PORT_COUNT],
}

impl Default for SlotBitmap {
    fn default() -> Self {
        Self::LEGACY
    }
}

impl SlotBitmap {
    /// The implied bitmap of version-1 files: slot 0 of both ports.
    pub const LEGACY: SlotBitmap = {
        let mut active = [[false; SLOTS_PER_PORT]; PORT_COUNT];
        active[0][0] = true;
        active[1][0] = true;
        SlotBitmap { active }
    };

    pub const EMPTY: SlotBitmap = SlotBitmap {
        active: [[false; SLOTS_PER_PORT]; PORT_COUNT],
    };

    pub fn set(&mut self, port: usize, slot: usize, on: bool) {
        if port < PORT_COUNT && slot < SLOTS_PER_PORT {
            self.active[port][slot] = on;
        }
    }

    pub fn is_active(&self, port: usize, slot: usize) -> bool {
        port < PORT_COUNT && slot < SLOTS_PER_PORT && self.active[port][slot]
    }

    pub fn active_count(&self) -> usize {
        self.active.iter().flatten().filter(|&&on| on).count()
    }

    /// Per-frame block length: one sample per active slot.
    pub fn block_len(&self) -> u64 {
        (self.active_count() * SUB_BLOCK_LEN) as u64
    }

    /// Byte offset of a slot's sample inside a frame block, in bitmap
    /// order. `None` when the slot is not part of the recording.
    pub fn slot_offset(&self, port: usize, slot: usize) -> Option<u64> {
        if !self.is_active(port, slot) {
            return None;
        }
        let mut offset = 0u64;
        for (p, slots) in self.active.iter().enumerate() {
            for (s, &on) in slots.iter().enumerate() {
                if p == port && s == slot {
                    return Some(offset);
                }
                if on {
                    offset += SUB_BLOCK_LEN as u64;
                }
            }
        }
        None
    }

    fn to_wire(self) -> [u8; SLOT_BITMAP_LEN] {
        let mut wire = [0u8; SLOT_BITMAP_LEN];
        for (p, slots) in self.active.iter().enumerate() {
            for (s, &on) in slots.iter().enumerate() {
                wire[p * SLOTS_PER_PORT + s] = on as u8;
            }
        }
        wire
    }

    fn from_wire(wire: &[u8; SLOT_BITMAP_LEN]) -> Self {
        let mut bitmap = SlotBitmap::EMPTY;
        for (i, &byte) in wire.iter().enumerate() {
            bitmap.active[i / SLOTS_PER_PORT][i % SLOTS_PER_PORT] = byte != 0;
        }
        bitmap
    }
}

/// In-memory image of the file header.
#[derive(Debug, Clone)]
pub struct MovieHeader {
    version: u8,
    emulator: [u8; EMU_TAG_LEN],
    author: [u8; AUTHOR_LEN],
    game_name: [u8; GAME_NAME_LEN],
    max_frame: u32,
    undo_count: u32,
    from_savestate: bool,
    slots: SlotBitmap,
}

impl MovieHeader {
    fn new(slots: SlotBitmap, from_savestate: bool) -> Self {
        Self {
            version: CURRENT_VERSION,
            emulator: [0; EMU_TAG_LEN],
            author: [0; AUTHOR_LEN],
            game_name: [0; GAME_NAME_LEN],
            max_frame: 0,
            undo_count: 0,
            from_savestate,
            slots,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn emulator(&self) -> String {
        fixed_to_string(&self.emulator)
    }

    pub fn author(&self) -> String {
        fixed_to_string(&self.author)
    }

    pub fn game_name(&self) -> String {
        fixed_to_string(&self.game_name)
    }

    pub fn set_emulator(&mut self, tag: &str) {
        string_to_fixed(tag, &mut self.emulator);
    }

    pub fn set_author(&mut self, author: &str) {
        string_to_fixed(author, &mut self.author);
    }

    pub fn set_game_name(&mut self, name: &str) {
        string_to_fixed(name, &mut self.game_name);
    }
}

/// Copy a string into a nul-padded fixed field, truncating and always
/// keeping at least one trailing nul.
fn string_to_fixed(value: &str, field: &mut [u8]) {
    field.fill(0);
    let take = value.len().min(field.len() - 1);
    field[..take].copy_from_slice(&value.as_bytes()[..take]);
}

fn fixed_to_string(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Everything a version decoder learns from the body bytes.
struct DecodedBody {
    from_savestate: bool,
    slots: SlotBitmap,
    max_frame: u32,
    undo_count: u32,
}

/// Fixed file offsets that depend on the header version.
#[derive(Debug, Clone, Copy)]
struct BodyLayout {
    body_len: usize,
    max_frame_offset: u64,
    undo_count_offset: u64,
    data_offset: u64,
}

const V1_LAYOUT: BodyLayout = BodyLayout {
    body_len: V1_BODY_LEN,
    max_frame_offset: HEADER_PREFIX_LEN as u64,
    undo_count_offset: HEADER_PREFIX_LEN as u64 + 4,
    data_offset: HEADER_PREFIX_LEN as u64 + V1_BODY_LEN as u64,
};

const V2_LAYOUT: BodyLayout = BodyLayout {
    body_len: V2_BODY_LEN,
    max_frame_offset: HEADER_PREFIX_LEN as u64 + 1 + SLOT_BITMAP_LEN as u64,
    undo_count_offset: HEADER_PREFIX_LEN as u64 + 1 + SLOT_BITMAP_LEN as u64 + 4,
    data_offset: HEADER_PREFIX_LEN as u64 + V2_BODY_LEN as u64,
};

type BodyDecoder = fn(&[u8]) -> DecodedBody;

/// One pure decoder per supported version; the version byte selects the
/// entry. Unknown versions fail closed before any body byte is read.
const DECODERS: &[(u8, BodyLayout, BodyDecoder)] =
    &[(1, V1_LAYOUT, decode_v1_body), (2, V2_LAYOUT, decode_v2_body)];

fn decode_v1_body(body: &[u8]) -> DecodedBody {
    DecodedBody {
        max_frame: u32::from_le_bytes([body[0], body[1], body[2], body[3]]),
        undo_count: u32::from_le_bytes([body[4], body[5], body[6], body[7]]),
        from_savestate: body[8] != 0,
        slots: SlotBitmap::LEGACY,
    }
}

fn decode_v2_body(body: &[u8]) -> DecodedBody {
    let mut wire = [0u8; SLOT_BITMAP_LEN];
    wire.copy_from_slice(&body[1..1 + SLOT_BITMAP_LEN]);
    let counters = &body[1 + SLOT_BITMAP_LEN..];
    DecodedBody {
        from_savestate: body[0] != 0,
        slots: SlotBitmap::from_wire(&wire),
        max_frame: u32::from_le_bytes([counters[0], counters[1], counters[2], counters[3]]),
        undo_count: u32::from_le_bytes([counters[4], counters[5], counters[6], counters[7]]),
    }
}

fn encode_body(header: &MovieHeader, out: &mut Vec<u8>) {
    match header.version {
        1 => {
            out.extend_from_slice(&header.max_frame.to_le_bytes());
            out.extend_from_slice(&header.undo_count.to_le_bytes());
            out.push(header.from_savestate as u8);
        }
        _ => {
            out.push(header.from_savestate as u8);
            out.extend_from_slice(&header.slots.to_wire());
            out.extend_from_slice(&header.max_frame.to_le_bytes());
            out.extend_from_slice(&header.undo_count.to_le_bytes());
        }
    }
}

/// An open movie file. Single writer, no concurrent access.
#[derive(Debug)]
pub struct MovieFile {
    file: File,
    path: PathBuf,
    header: MovieHeader,
    layout: BodyLayout,
    block_len: u64,
    /// Once any frame byte lands on disk the slot bitmap is frozen.
    wrote_frames: bool,
}

impl MovieFile {
    /// Create a brand new recording file, truncating anything in the way.
    ///
    /// All counters start at zero. When the recording is declared to start
    /// from a savestate, a pre-existing companion file is backed up first;
    /// producing the new companion is the caller's job (the snapshot
    /// machinery lives outside this crate).
    pub fn create(
        path: &Path,
        slots: SlotBitmap,
        from_savestate: bool,
    ) -> Result<Self, MovieError> {
        if slots.active_count() == 0 {
            return Err(MovieError::EmptySlots);
        }
        if from_savestate {
            let companion = companion_path(path);
            if companion.exists() {
                let mut backup = companion.clone().into_os_string();
                backup.push(".bak");
                fs::copy(&companion, PathBuf::from(backup))?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let header = MovieHeader::new(slots, from_savestate);
        let mut movie = Self {
            file,
            path: path.to_path_buf(),
            block_len: slots.block_len(),
            layout: V2_LAYOUT,
            header,
            wrote_frames: false,
        };
        movie.write_header()?;
        info!(path = %movie.path.display(), slots = slots.active_count(), "created new movie file");
        Ok(movie)
    }

    /// Open an existing recording read/write and verify its header.
    pub fn open(path: &Path) -> Result<Self, MovieError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut movie = Self {
            file,
            path: path.to_path_buf(),
            header: MovieHeader::new(SlotBitmap::LEGACY, false),
            layout: V1_LAYOUT,
            block_len: 0,
            // Conservative: an existing file may already carry frame data.
            wrote_frames: true,
        };
        movie.read_header_and_check()?;
        Ok(movie)
    }

    /// Read and validate the header, dispatching the body through the
    /// per-version decoder table.
    fn read_header_and_check(&mut self) -> Result<(), MovieError> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut prefix = [0u8; HEADER_PREFIX_LEN];
        read_exact_or_truncated(&mut self.file, &mut prefix, HEADER_PREFIX_LEN)?;

        let version = prefix[0];
        let Some((_, layout, decode)) = DECODERS.iter().find(|(v, _, _)| *v == version) else {
            return Err(MovieError::UnsupportedVersion(version));
        };

        let layout = *layout;
        let mut body = vec![0u8; layout.body_len];
        read_exact_or_truncated(&mut self.file, &mut body, HEADER_PREFIX_LEN + layout.body_len)?;
        let decoded = decode(&body);

        let mut header = MovieHeader::new(decoded.slots, decoded.from_savestate);
        header.version = version;
        header.emulator.copy_from_slice(&prefix[1..1 + EMU_TAG_LEN]);
        let author_start = 1 + EMU_TAG_LEN;
        header
            .author
            .copy_from_slice(&prefix[author_start..author_start + AUTHOR_LEN]);
        let game_start = author_start + AUTHOR_LEN;
        header
            .game_name
            .copy_from_slice(&prefix[game_start..game_start + GAME_NAME_LEN]);
        header.max_frame = decoded.max_frame;
        header.undo_count = decoded.undo_count;

        if header.from_savestate {
            let companion = companion_path(&self.path);
            if !companion.exists() {
                return Err(MovieError::MissingCompanion(companion));
            }
        }

        self.layout = layout;
        self.block_len = header.slots.block_len();
        self.header = header;
        debug!(
            version,
            max_frame = self.header.max_frame,
            undo_count = self.header.undo_count,
            block_len = self.block_len,
            "movie header verified"
        );
        Ok(())
    }

    /// Persist the current in-memory header.
    pub fn write_header(&mut self) -> Result<(), MovieError> {
        let mut buf = Vec::with_capacity(HEADER_PREFIX_LEN + self.layout.body_len);
        buf.push(self.header.version);
        buf.extend_from_slice(&self.header.emulator);
        buf.extend_from_slice(&self.header.author);
        buf.extend_from_slice(&self.header.game_name);
        encode_body(&self.header, &mut buf);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&buf)?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Absolute file offset of one sample byte.
    fn seek_point(
        &self,
        frame: u32,
        port: usize,
        slot: usize,
        index: usize,
    ) -> Result<u64, MovieError> {
        if index >= SUB_BLOCK_LEN {
            return Err(MovieError::IndexOutOfRange(index));
        }
        let slot_offset = self
            .header
            .slots
            .slot_offset(port, slot)
            .ok_or(MovieError::InactiveSlot { port, slot })?;
        Ok(self.layout.data_offset + u64::from(frame) * self.block_len + slot_offset + index as u64)
    }

    /// Write one sample byte at (frame, port, slot, index) and sync.
    pub fn write_key_buf(
        &mut self,
        frame: u32,
        port: usize,
        slot: usize,
        index: usize,
        value: u8,
    ) -> Result<(), MovieError> {
        let seek = self.seek_point(frame, port, slot, index)?;
        self.file.seek(SeekFrom::Start(seek))?;
        self.file.write_all(&[value])?;
        self.file.sync_data()?;
        self.wrote_frames = true;
        Ok(())
    }

    /// Read one sample byte, or `None` when the file has no data at that
    /// coordinate (movie shorter than the requested frame).
    pub fn read_key_buf(
        &mut self,
        frame: u32,
        port: usize,
        slot: usize,
        index: usize,
    ) -> Result<Option<u8>, MovieError> {
        let seek = self.seek_point(frame, port, slot, index)?;
        self.file.seek(SeekFrom::Start(seek))?;
        let mut byte = [0u8; 1];
        match self.file.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Raise the recorded length to `frame` and persist it. Never lowers.
    pub fn update_frame_max(&mut self, frame: u32) -> Result<(), MovieError> {
        if frame <= self.header.max_frame {
            return Ok(());
        }
        self.header.max_frame = frame;
        self.write_counter(self.layout.max_frame_offset, frame)
    }

    /// Count one more savestate rewind and persist it.
    pub fn add_undo_count(&mut self) -> Result<(), MovieError> {
        self.header.undo_count += 1;
        self.write_counter(self.layout.undo_count_offset, self.header.undo_count)
    }

    fn write_counter(&mut self, offset: u64, value: u32) -> Result<(), MovieError> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&value.to_le_bytes())?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Replace the slot bitmap. Only legal on a fresh recording before any
    /// frame byte has been written.
    pub fn set_slots(&mut self, slots: SlotBitmap) -> Result<(), MovieError> {
        if self.wrote_frames {
            return Err(MovieError::SlotsLocked);
        }
        if slots.active_count() == 0 {
            return Err(MovieError::EmptySlots);
        }
        self.header.slots = slots;
        self.block_len = slots.block_len();
        self.write_header()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &MovieHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut MovieHeader {
        &mut self.header
    }

    pub fn slots(&self) -> SlotBitmap {
        self.header.slots
    }

    pub fn block_len(&self) -> u64 {
        self.block_len
    }

    pub fn max_frame(&self) -> u32 {
        self.header.max_frame
    }

    pub fn undo_count(&self) -> u32 {
        self.header.undo_count
    }

    pub fn from_savestate(&self) -> bool {
        self.header.from_savestate
    }
}

/// `read_exact` with short reads reported as [`MovieError::TruncatedHeader`].
/// `expected` is the total header size being read across calls; `actual`
/// reflects how far into it the file ran dry.
fn read_exact_or_truncated(
    file: &mut File,
    buf: &mut [u8],
    expected: usize,
) -> Result<(), MovieError> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => {
                return Err(MovieError::TruncatedHeader {
                    expected,
                    actual: expected - (buf.len() - filled),
                });
            }
            n => filled += n,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    struct TempMovie {
        path: PathBuf,
    }

    impl TempMovie {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "padrec-movie-{}-{}.m2r",
                name,
                std::process::id()
            ));
            let _ = fs::remove_file(&path);
            let _ = fs::remove_file(companion_path(&path));
            Self { path }
        }
    }

    impl Drop for TempMovie {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.path);
            let _ = fs::remove_file(companion_path(&self.path));
        }
    }

    fn two_pad_slots() -> SlotBitmap {
        SlotBitmap::LEGACY
    }

    #[test]
    fn header_round_trips_through_reopen() {
        let tmp = TempMovie::new("header-roundtrip");
        {
            let mut movie = MovieFile::create(&tmp.path, two_pad_slots(), false).unwrap();
            movie.header_mut().set_emulator("padrec-0.2.0");
            movie.header_mut().set_author("somebody");
            movie.header_mut().set_game_name("Some Game (NTSC-U)");
            movie.write_header().unwrap();
            movie.update_frame_max(41).unwrap();
            movie.add_undo_count().unwrap();
        }
        let movie = MovieFile::open(&tmp.path).unwrap();
        assert_eq!(movie.header().version(), CURRENT_VERSION);
        assert_eq!(movie.header().emulator(), "padrec-0.2.0");
        assert_eq!(movie.header().author(), "somebody");
        assert_eq!(movie.header().game_name(), "Some Game (NTSC-U)");
        assert_eq!(movie.max_frame(), 41);
        assert_eq!(movie.undo_count(), 1);
        assert!(!movie.from_savestate());
        assert_eq!(movie.block_len(), 36);
    }

    #[test]
    fn key_buf_round_trips_at_every_active_coordinate() {
        let tmp = TempMovie::new("keybuf-roundtrip");
        let mut slots = SlotBitmap::EMPTY;
        slots.set(0, 0, true);
        slots.set(0, 2, true);
        slots.set(1, 3, true);
        let mut movie = MovieFile::create(&tmp.path, slots, false).unwrap();
        for frame in [0u32, 1, 7] {
            for (port, slot) in [(0usize, 0usize), (0, 2), (1, 3)] {
                for index in 0..SUB_BLOCK_LEN {
                    let value = (frame as usize * 31 + port * 7 + slot * 3 + index) as u8;
                    movie.write_key_buf(frame, port, slot, index, value).unwrap();
                    assert_eq!(
                        movie.read_key_buf(frame, port, slot, index).unwrap(),
                        Some(value)
                    );
                }
            }
        }
    }

    #[test]
    fn inactive_slot_and_bad_index_are_rejected() {
        let tmp = TempMovie::new("inactive-slot");
        let mut movie = MovieFile::create(&tmp.path, two_pad_slots(), false).unwrap();
        assert!(matches!(
            movie.write_key_buf(0, 0, 1, 0, 1),
            Err(MovieError::InactiveSlot { port: 0, slot: 1 })
        ));
        assert!(matches!(
            movie.write_key_buf(0, 0, 0, SUB_BLOCK_LEN, 1),
            Err(MovieError::IndexOutOfRange(_))
        ));
    }

    #[test]
    fn read_past_end_of_movie_returns_none() {
        let tmp = TempMovie::new("read-past-end");
        let mut movie = MovieFile::create(&tmp.path, two_pad_slots(), false).unwrap();
        movie.write_key_buf(0, 0, 0, 0, 9).unwrap();
        assert_eq!(movie.read_key_buf(500, 0, 0, 0).unwrap(), None);
    }

    #[test]
    fn max_frame_never_decreases() {
        let tmp = TempMovie::new("max-frame");
        let mut movie = MovieFile::create(&tmp.path, two_pad_slots(), false).unwrap();
        for frame in [5u32, 3, 10, 2, 10, 1] {
            movie.update_frame_max(frame).unwrap();
        }
        assert_eq!(movie.max_frame(), 10);
        drop(movie);
        let movie = MovieFile::open(&tmp.path).unwrap();
        assert_eq!(movie.max_frame(), 10);
    }

    #[test]
    fn slot_bitmap_locks_after_first_frame_write() {
        let tmp = TempMovie::new("slots-locked");
        let mut movie = MovieFile::create(&tmp.path, two_pad_slots(), false).unwrap();

        let mut wider = two_pad_slots();
        wider.set(0, 1, true);
        movie.set_slots(wider).unwrap();
        assert_eq!(movie.block_len(), 54);

        movie.write_key_buf(0, 0, 1, 0, 1).unwrap();
        assert!(matches!(
            movie.set_slots(two_pad_slots()),
            Err(MovieError::SlotsLocked)
        ));
    }

    #[test]
    fn version_1_file_parses_with_legacy_layout() {
        let tmp = TempMovie::new("v1-legacy");
        // Hand-build a v1 header: prefix + max/undo/savestate body.
        let mut bytes = vec![0u8; HEADER_PREFIX_LEN + V1_BODY_LEN];
        bytes[0] = 1;
        bytes[1..4].copy_from_slice(b"emu");
        bytes[HEADER_PREFIX_LEN..HEADER_PREFIX_LEN + 4].copy_from_slice(&77u32.to_le_bytes());
        bytes[HEADER_PREFIX_LEN + 4..HEADER_PREFIX_LEN + 8].copy_from_slice(&3u32.to_le_bytes());
        bytes[HEADER_PREFIX_LEN + 8] = 0;
        fs::write(&tmp.path, &bytes).unwrap();

        let movie = MovieFile::open(&tmp.path).unwrap();
        assert_eq!(movie.header().version(), 1);
        assert_eq!(movie.slots(), SlotBitmap::LEGACY);
        assert_eq!(movie.block_len(), 36);
        assert_eq!(movie.max_frame(), 77);
        assert_eq!(movie.undo_count(), 3);
    }

    #[test]
    fn v2_with_one_slot_per_port_matches_legacy_block_len() {
        let tmp = TempMovie::new("v2-block-len");
        let movie = MovieFile::create(&tmp.path, SlotBitmap::LEGACY, false).unwrap();
        assert_eq!(movie.block_len(), 36);
    }

    #[test]
    fn unknown_version_fails_closed() {
        let tmp = TempMovie::new("bad-version");
        let mut bytes = vec![0u8; HEADER_PREFIX_LEN + V2_BODY_LEN];
        bytes[0] = 99;
        fs::write(&tmp.path, &bytes).unwrap();
        assert!(matches!(
            MovieFile::open(&tmp.path),
            Err(MovieError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn truncated_header_is_reported() {
        let tmp = TempMovie::new("truncated");
        fs::write(&tmp.path, [2u8; 40]).unwrap();
        assert!(matches!(
            MovieFile::open(&tmp.path),
            Err(MovieError::TruncatedHeader { .. })
        ));
    }

    #[test]
    fn savestate_flag_requires_companion_file() {
        let tmp = TempMovie::new("companion");
        {
            let _movie = MovieFile::create(&tmp.path, two_pad_slots(), true).unwrap();
        }
        // No companion on disk: the open must fail.
        assert!(matches!(
            MovieFile::open(&tmp.path),
            Err(MovieError::MissingCompanion(_))
        ));
        fs::write(companion_path(&tmp.path), b"snapshot").unwrap();
        let movie = MovieFile::open(&tmp.path).unwrap();
        assert!(movie.from_savestate());
    }

    #[test]
    fn creating_over_savestate_movie_backs_up_companion() {
        let tmp = TempMovie::new("companion-backup");
        let companion = companion_path(&tmp.path);
        fs::write(&companion, b"old snapshot").unwrap();
        let _movie = MovieFile::create(&tmp.path, two_pad_slots(), true).unwrap();
        let mut backup = companion.clone().into_os_string();
        backup.push(".bak");
        let backup = PathBuf::from(backup);
        assert_eq!(fs::read(&backup).unwrap(), b"old snapshot");
        let _ = fs::remove_file(backup);
    }
}

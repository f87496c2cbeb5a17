//! Pause/resume/frame-advance coordination with the emulation thread.
//!
//! Pausing is two-phase. A UI-side call only raises a *pending* request;
//! the emulation thread observes it at its next frame boundary and then
//! acknowledges with [`EmuControls::set_halted`]. The observable
//! [`EmuControls::is_paused`] is therefore distinct from "pause requested"
//! and may lag the request by a frame or two.
//!
//! All state is a handful of atomics so the struct can be shared behind an
//! `Arc` between the UI and the emulation thread without locks.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Shared run-state flags between the UI and the emulation thread.
#[derive(Debug, Default)]
pub struct EmuControls {
    /// The emulated machine is constructed and executing frames.
    open: AtomicBool,
    /// The emulation thread has actually stopped at a frame boundary.
    halted: AtomicBool,
    /// A pause has been requested but possibly not yet observed.
    pause_pending: AtomicBool,
    /// A single-frame advance is armed.
    advance_armed: AtomicBool,
    /// Frame count at the moment the advance was requested; the pause
    /// re-arms once the observed count passes it.
    advance_from: AtomicU32,
}

impl EmuControls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the emulation thread stop at its next frame boundary.
    pub fn request_pause(&self) {
        self.pause_pending.store(true, Ordering::Release);
    }

    /// Request that a paused emulation thread keep running.
    pub fn request_resume(&self) {
        self.advance_armed.store(false, Ordering::Release);
        self.pause_pending.store(false, Ordering::Release);
    }

    pub fn toggle_pause(&self) {
        if self.pause_pending.load(Ordering::Acquire) {
            self.request_resume();
        } else {
            self.request_pause();
        }
    }

    /// Run exactly one more frame, then pause again.
    ///
    /// `global_frame` is the frame count at request time; the pause fires
    /// once the observed count exceeds it.
    pub fn frame_advance(&self, global_frame: u32) {
        self.advance_from.store(global_frame, Ordering::Release);
        self.advance_armed.store(true, Ordering::Release);
        self.pause_pending.store(false, Ordering::Release);
    }

    /// True only when a pause is requested *and* the emulation thread is
    /// open and has acknowledged the halt.
    pub fn is_paused(&self) -> bool {
        self.pause_pending.load(Ordering::Acquire)
            && self.open.load(Ordering::Acquire)
            && self.halted.load(Ordering::Acquire)
    }

    pub fn is_pause_pending(&self) -> bool {
        self.pause_pending.load(Ordering::Acquire)
    }

    /// Emulation-thread side: called once per frame boundary with the
    /// current global frame count. Converts an armed frame-advance into a
    /// pending pause when its frame has elapsed, and returns whether the
    /// thread should halt now.
    pub fn poll_frame_boundary(&self, global_frame: u32) -> bool {
        if self.advance_armed.load(Ordering::Acquire)
            && global_frame > self.advance_from.load(Ordering::Acquire)
        {
            self.advance_armed.store(false, Ordering::Release);
            self.pause_pending.store(true, Ordering::Release);
        }
        self.pause_pending.load(Ordering::Acquire)
    }

    /// Emulation-thread side: machine constructed/torn down.
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::Release);
        if !open {
            self.halted.store(false, Ordering::Release);
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Emulation-thread side: acknowledge that execution stopped (or
    /// resumed) at a frame boundary.
    pub fn set_halted(&self, halted: bool) {
        self.halted.store(halted, Ordering::Release);
    }
}

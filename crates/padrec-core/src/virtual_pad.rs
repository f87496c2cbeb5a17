//! Virtual-pad overrides blended into the live polling byte stream.
//!
//! A port under manual control carries an authored [`PadData`] that is
//! merged byte-for-byte into each controller reply before recording or
//! replay ever sees it. The merge rules follow the wire polarity:
//!
//! - digital bytes: live AND override. A cleared bit means pressed, so the
//!   AND yields "pressed if either source presses".
//! - analog bytes: the override replaces the live value while it sits away
//!   from neutral; a neutral override is transparent.
//! - pressure bytes: the override always replaces the live value.

use crate::pad::{
    ANALOG_LEN, ANALOG_OFFSET, AXIS_NEUTRAL, Axis, Button, PORT_COUNT, POLL_HEADER_LEN, PadData,
    PRESSURE_OFFSET, SUB_BLOCK_LEN,
};

/// Manual-control state for one port.
#[derive(Debug, Clone, Copy, Default)]
struct OverrideState {
    active: bool,
    pad: PadData,
    /// Last live analog bytes seen while the override was active. When the
    /// real stick moves away from what we cached, the override on that
    /// channel is stale and gets released back to the real controller.
    prev_live: [Option<u8>; ANALOG_LEN],
}

/// Blends manually-authored pad state into live controller replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputOverride {
    ports: [OverrideState; PORT_COUNT],
}

impl InputOverride {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a port under (or release it from) virtual-pad control.
    pub fn set_active(&mut self, port: usize, active: bool) {
        if let Some(state) = self.ports.get_mut(port) {
            state.active = active;
            if !active {
                state.pad = PadData::new();
                state.prev_live = [None; ANALOG_LEN];
            }
        }
    }

    pub fn is_active(&self, port: usize) -> bool {
        self.ports.get(port).is_some_and(|s| s.active)
    }

    pub fn set_button(&mut self, port: usize, button: Button, pressure: u8) {
        if let Some(state) = self.ports.get_mut(port) {
            state.pad.set_button(button, pressure);
        }
    }

    pub fn set_axis(&mut self, port: usize, axis: Axis, value: u8) {
        if let Some(state) = self.ports.get_mut(port) {
            state.pad.set_axis(axis, value);
        }
    }

    pub fn pad(&self, port: usize) -> Option<&PadData> {
        self.ports.get(port).map(|s| &s.pad)
    }

    /// Merge the override into one polled reply byte in place.
    ///
    /// `byte_index` counts reply bytes the way the polling handler does;
    /// the first sample byte sits at [`POLL_HEADER_LEN`]. Inactive ports
    /// and protocol-framing bytes pass through untouched.
    pub fn apply(&mut self, port: usize, byte_index: usize, buf: &mut [u8]) {
        let Some(state) = self.ports.get_mut(port) else {
            return;
        };
        if !state.active || byte_index < POLL_HEADER_LEN || byte_index >= buf.len() {
            return;
        }
        let sub = byte_index - POLL_HEADER_LEN;
        if sub >= SUB_BLOCK_LEN {
            return;
        }
        let authored = state.pad.as_bytes()[sub];

        if sub < ANALOG_OFFSET {
            // Inverted-polarity bitmask: AND presses buttons from both sides.
            buf[byte_index] &= authored;
        } else if sub < PRESSURE_OFFSET {
            let channel = sub - ANALOG_OFFSET;
            let live = buf[byte_index];
            if let Some(prev) = state.prev_live[channel] {
                if prev != live && authored != AXIS_NEUTRAL {
                    // The real stick moved underneath a parked override:
                    // release the channel back to the controller.
                    state.pad.set_axis(Axis::ALL[channel], AXIS_NEUTRAL);
                    state.prev_live[channel] = Some(live);
                    return;
                }
            }
            state.prev_live[channel] = Some(live);
            if authored != AXIS_NEUTRAL {
                buf[byte_index] = authored;
            }
        } else {
            buf[byte_index] = authored;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_with(byte_index: usize, value: u8) -> Vec<u8> {
        let mut buf = vec![0u8; byte_index + 1];
        buf[byte_index] = value;
        buf
    }

    #[test]
    fn inactive_port_passes_through() {
        let mut overrides = InputOverride::new();
        overrides.set_button(0, Button::Cross, 255);
        let mut buf = reply_with(4, 0b1111_0000);
        overrides.apply(0, 4, &mut buf);
        assert_eq!(buf[4], 0b1111_0000);
    }

    #[test]
    fn digital_blend_is_an_and_over_inverted_bits() {
        let mut overrides = InputOverride::new();
        overrides.set_active(0, true);
        // Make the override's second digital byte 0b00001111 (four pressed).
        overrides.set_button(0, Button::Square, 255);
        overrides.set_button(0, Button::Cross, 255);
        overrides.set_button(0, Button::Circle, 255);
        overrides.set_button(0, Button::Triangle, 255);
        assert_eq!(overrides.pad(0).unwrap().as_bytes()[1], 0b0000_1111);

        // Live side presses the other four buttons of that byte.
        let mut buf = reply_with(4, 0b1111_0000);
        overrides.apply(0, 4, &mut buf);
        assert_eq!(buf[4], 0b0000_0000, "all eight buttons must read pressed");
    }

    #[test]
    fn neutral_analog_override_is_transparent() {
        let mut overrides = InputOverride::new();
        overrides.set_active(0, true);
        let mut buf = reply_with(7, 42);
        overrides.apply(0, 7, &mut buf);
        assert_eq!(buf[7], 42);
    }

    #[test]
    fn non_neutral_analog_override_replaces_live() {
        let mut overrides = InputOverride::new();
        overrides.set_active(1, true);
        overrides.set_axis(1, Axis::LeftX, 200);
        // LeftX is sample byte 4, reply byte 7.
        let mut buf = reply_with(7, 120);
        overrides.apply(1, 7, &mut buf);
        assert_eq!(buf[7], 200);
    }

    #[test]
    fn stale_analog_override_releases_when_live_stick_moves() {
        let mut overrides = InputOverride::new();
        overrides.set_active(0, true);
        overrides.set_axis(0, Axis::LeftX, 200);

        let mut buf = reply_with(7, AXIS_NEUTRAL);
        overrides.apply(0, 7, &mut buf);
        assert_eq!(buf[7], 200);

        // Same live value next frame: still overridden.
        let mut buf = reply_with(7, AXIS_NEUTRAL);
        overrides.apply(0, 7, &mut buf);
        assert_eq!(buf[7], 200);

        // The real stick moves: the override channel is released.
        let mut buf = reply_with(7, 30);
        overrides.apply(0, 7, &mut buf);
        assert_eq!(buf[7], 30);
        assert_eq!(overrides.pad(0).unwrap().axis(Axis::LeftX), AXIS_NEUTRAL);
    }

    #[test]
    fn pressure_bytes_always_replace() {
        let mut overrides = InputOverride::new();
        overrides.set_active(0, true);
        overrides.set_button(0, Button::Cross, 77);
        // Cross pressure byte is sample index 12, reply byte 15.
        let mut buf = reply_with(15, 255);
        overrides.apply(0, 15, &mut buf);
        assert_eq!(buf[15], 77);
    }

    #[test]
    fn framing_bytes_are_never_touched() {
        let mut overrides = InputOverride::new();
        overrides.set_active(0, true);
        overrides.set_button(0, Button::Select, 255);
        let mut buf = reply_with(2, 0x5A);
        overrides.apply(0, 2, &mut buf);
        assert_eq!(buf[2], 0x5A);
    }
}

//! Controller sample codec for the pad polling protocol.
//!
//! Every polled controller replies with a fixed 18-byte sample whose layout
//! mirrors what goes into the movie file:
//!
//! ```text
//! [0..2)   digital buttons, two bitfield bytes, cleared bit = pressed
//! [2..6)   analog axes: RX, RY, LX, LY (neutral = 127)
//! [6..18)  pressure bytes, one per pressure-capable button
//! ```
//!
//! [`PadData`] isolates all knowledge of this layout behind named
//! button/axis accessors; nothing else in the workspace indexes the wire
//! buffer directly.

use bitflags::bitflags;

/// Number of controller ports on the emulated machine.
pub const PORT_COUNT: usize = 2;
/// Multitap slots per port.
pub const SLOTS_PER_PORT: usize = 4;

/// Length of one controller's sample on the wire and in the movie file.
pub const SUB_BLOCK_LEN: usize = 18;
/// The two digital bitfield bytes sit at the front of the sample.
pub const DIGITAL_LEN: usize = 2;
/// First analog axis byte.
pub const ANALOG_OFFSET: usize = 2;
/// Number of analog axis bytes (two sticks, two axes each).
pub const ANALOG_LEN: usize = 4;
/// First pressure byte.
pub const PRESSURE_OFFSET: usize = 6;
/// Number of pressure bytes.
pub const PRESSURE_LEN: usize = 12;
/// Centered stick position.
pub const AXIS_NEUTRAL: u8 = 127;

/// First byte of the standard read query issued by the emulated machine.
pub const POLL_COMMAND: u8 = 0x42;
/// Second reply byte of a read query; anything else means the exchange is
/// not a pad sample (config mode, rumble setup, ...).
pub const POLL_ACK: u8 = 0x5A;
/// Reply bytes before this index carry protocol framing, not sample data.
pub const POLL_HEADER_LEN: usize = 3;

bitflags! {
    /// Digital button bitmask in *logical* polarity (set bit = pressed).
    ///
    /// Bits 0-7 map to wire byte 0, bits 8-15 to wire byte 1. The wire
    /// stores the complement: a cleared wire bit means pressed.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ButtonMask: u16 {
        const SELECT   = 1 << 0;
        const L3       = 1 << 1;
        const R3       = 1 << 2;
        const START    = 1 << 3;
        const UP       = 1 << 4;
        const RIGHT    = 1 << 5;
        const DOWN     = 1 << 6;
        const LEFT     = 1 << 7;
        const L2       = 1 << 8;
        const R2       = 1 << 9;
        const L1       = 1 << 10;
        const R1       = 1 << 11;
        const TRIANGLE = 1 << 12;
        const CIRCLE   = 1 << 13;
        const CROSS    = 1 << 14;
        const SQUARE   = 1 << 15;
    }
}

/// Digital buttons addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Select,
    L3,
    R3,
    Start,
    Up,
    Right,
    Down,
    Left,
    L2,
    R2,
    L1,
    R1,
    Triangle,
    Circle,
    Cross,
    Square,
}

impl Button {
    /// Every button, in wire bit order.
    pub const ALL: [Button; 16] = [
        Button::Select,
        Button::L3,
        Button::R3,
        Button::Start,
        Button::Up,
        Button::Right,
        Button::Down,
        Button::Left,
        Button::L2,
        Button::R2,
        Button::L1,
        Button::R1,
        Button::Triangle,
        Button::Circle,
        Button::Cross,
        Button::Square,
    ];

    /// Logical-polarity mask for this button.
    pub fn mask(self) -> ButtonMask {
        match self {
            Button::Select => ButtonMask::SELECT,
            Button::L3 => ButtonMask::L3,
            Button::R3 => ButtonMask::R3,
            Button::Start => ButtonMask::START,
            Button::Up => ButtonMask::UP,
            Button::Right => ButtonMask::RIGHT,
            Button::Down => ButtonMask::DOWN,
            Button::Left => ButtonMask::LEFT,
            Button::L2 => ButtonMask::L2,
            Button::R2 => ButtonMask::R2,
            Button::L1 => ButtonMask::L1,
            Button::R1 => ButtonMask::R1,
            Button::Triangle => ButtonMask::TRIANGLE,
            Button::Circle => ButtonMask::CIRCLE,
            Button::Cross => ButtonMask::CROSS,
            Button::Square => ButtonMask::SQUARE,
        }
    }

    /// Bit within each of the two digital wire bytes, `(byte0, byte1)`.
    pub fn bit_pair(self) -> (u8, u8) {
        let bits = self.mask().bits();
        ((bits & 0xFF) as u8, (bits >> 8) as u8)
    }

    /// Index of this button's pressure byte, relative to
    /// [`PRESSURE_OFFSET`]. `None` for buttons without pressure sensing
    /// (Start/Select and the stick clicks).
    pub fn pressure_index(self) -> Option<usize> {
        match self {
            Button::Right => Some(0),
            Button::Left => Some(1),
            Button::Up => Some(2),
            Button::Down => Some(3),
            Button::Triangle => Some(4),
            Button::Circle => Some(5),
            Button::Cross => Some(6),
            Button::Square => Some(7),
            Button::L1 => Some(8),
            Button::R1 => Some(9),
            Button::L2 => Some(10),
            Button::R2 => Some(11),
            Button::Select | Button::Start | Button::L3 | Button::R3 => None,
        }
    }
}

/// Analog stick axes addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    RightX,
    RightY,
    LeftX,
    LeftY,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::RightX, Axis::RightY, Axis::LeftX, Axis::LeftY];

    /// Byte index of this axis inside the 18-byte sample.
    pub fn byte_index(self) -> usize {
        match self {
            Axis::RightX => ANALOG_OFFSET,
            Axis::RightY => ANALOG_OFFSET + 1,
            Axis::LeftX => ANALOG_OFFSET + 2,
            Axis::LeftY => ANALOG_OFFSET + 3,
        }
    }
}

/// One controller's sample in wire layout, with named accessors.
///
/// The default value is a released pad: all digital bits high (nothing
/// pressed), sticks centered, pressure bytes zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadData {
    bytes: [u8; SUB_BLOCK_LEN],
}

impl Default for PadData {
    fn default() -> Self {
        let mut bytes = [0u8; SUB_BLOCK_LEN];
        bytes[0] = 0xFF;
        bytes[1] = 0xFF;
        for axis in Axis::ALL {
            bytes[axis.byte_index()] = AXIS_NEUTRAL;
        }
        Self { bytes }
    }
}

impl PadData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Press or release a button.
    ///
    /// For pressure-capable buttons any non-zero `pressure` is stored in the
    /// button's pressure byte; for the others it only toggles the digital
    /// bit, so the readback coerces to 0/255.
    pub fn set_button(&mut self, button: Button, pressure: u8) {
        let (b0, b1) = button.bit_pair();
        if pressure > 0 {
            // Cleared bit = pressed on the wire.
            self.bytes[0] &= !b0;
            self.bytes[1] &= !b1;
            if let Some(idx) = button.pressure_index() {
                self.bytes[PRESSURE_OFFSET + idx] = pressure;
            }
        } else {
            self.bytes[0] |= b0;
            self.bytes[1] |= b1;
            if let Some(idx) = button.pressure_index() {
                self.bytes[PRESSURE_OFFSET + idx] = 0;
            }
        }
    }

    /// Current pressure of a button: 0 when released, the pressure byte when
    /// pressed, or 255 for pressed buttons without pressure sensing.
    pub fn button(&self, button: Button) -> u8 {
        let (b0, b1) = button.bit_pair();
        let pressed = (!self.bytes[0] & b0) != 0 || (!self.bytes[1] & b1) != 0;
        if !pressed {
            return 0;
        }
        match button.pressure_index() {
            Some(idx) => self.bytes[PRESSURE_OFFSET + idx],
            None => 255,
        }
    }

    /// All pressed buttons as a logical-polarity mask.
    pub fn digital(&self) -> ButtonMask {
        let wire = u16::from_le_bytes([self.bytes[0], self.bytes[1]]);
        ButtonMask::from_bits_truncate(!wire)
    }

    /// Replace the digital bytes wholesale from a logical-polarity mask.
    /// Pressure bytes follow: full scale for pressed buttons, zero for
    /// released ones, so `button` stays consistent with the mask.
    pub fn set_digital(&mut self, mask: ButtonMask) {
        let wire = !mask.bits();
        let [b0, b1] = wire.to_le_bytes();
        self.bytes[0] = b0;
        self.bytes[1] = b1;
        for button in Button::ALL {
            if let Some(idx) = button.pressure_index() {
                self.bytes[PRESSURE_OFFSET + idx] =
                    if mask.contains(button.mask()) { 255 } else { 0 };
            }
        }
    }

    pub fn set_axis(&mut self, axis: Axis, value: u8) {
        self.bytes[axis.byte_index()] = value;
    }

    pub fn axis(&self, axis: Axis) -> u8 {
        self.bytes[axis.byte_index()]
    }

    /// Raw wire bytes of the sample.
    pub fn as_bytes(&self) -> &[u8; SUB_BLOCK_LEN] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_pad_reads_all_zero() {
        let pad = PadData::new();
        for button in Button::ALL {
            assert_eq!(pad.button(button), 0);
        }
        for axis in Axis::ALL {
            assert_eq!(pad.axis(axis), AXIS_NEUTRAL);
        }
        assert_eq!(pad.digital(), ButtonMask::empty());
    }

    #[test]
    fn non_pressure_buttons_coerce_to_full_scale() {
        let mut pad = PadData::new();
        pad.set_button(Button::Start, 17);
        assert_eq!(pad.button(Button::Start), 255);
        pad.set_button(Button::Start, 0);
        assert_eq!(pad.button(Button::Start), 0);
    }

    #[test]
    fn pressure_buttons_store_intensity() {
        let mut pad = PadData::new();
        pad.set_button(Button::Cross, 63);
        assert_eq!(pad.button(Button::Cross), 63);
        // Digital bit must also drop on the wire.
        assert_eq!(pad.as_bytes()[1] & 0x40, 0);
        pad.set_button(Button::Cross, 0);
        assert_eq!(pad.button(Button::Cross), 0);
        assert_eq!(pad.as_bytes()[PRESSURE_OFFSET + 6], 0);
    }

    #[test]
    fn wire_bit_assignments_match_protocol() {
        // Byte 0: Left, Down, Right, Up, Start, R3, L3, Select from MSB down.
        assert_eq!(Button::Left.bit_pair(), (0b1000_0000, 0));
        assert_eq!(Button::Select.bit_pair(), (0b0000_0001, 0));
        // Byte 1: Square, Cross, Circle, Triangle, R1, L1, R2, L2.
        assert_eq!(Button::Square.bit_pair(), (0, 0b1000_0000));
        assert_eq!(Button::L2.bit_pair(), (0, 0b0000_0001));
    }

    #[test]
    fn axis_bytes_are_rx_ry_lx_ly() {
        let mut pad = PadData::new();
        pad.set_axis(Axis::LeftY, 200);
        assert_eq!(pad.as_bytes()[5], 200);
        assert_eq!(pad.axis(Axis::LeftY), 200);
        assert_eq!(Axis::RightX.byte_index(), 2);
    }

    #[test]
    fn digital_mask_round_trips_through_wire_polarity() {
        let mut pad = PadData::new();
        let mask = ButtonMask::CROSS | ButtonMask::UP | ButtonMask::R1;
        pad.set_digital(mask);
        assert_eq!(pad.digital(), mask);
        for button in Button::ALL {
            let expect = mask.contains(button.mask());
            assert_eq!(pad.button(button) > 0, expect, "{button:?}");
        }
    }

    #[test]
    fn set_digital_syncs_pressure_bytes() {
        let mut pad = PadData::new();
        pad.set_digital(ButtonMask::UP);
        // Wire bit drops and the pressure byte reads full scale.
        assert_eq!(pad.as_bytes()[0] & 0b0001_0000, 0);
        assert_eq!(pad.button(Button::Up), 255);

        pad.set_digital(ButtonMask::empty());
        assert_eq!(pad.button(Button::Up), 0);
        assert_eq!(pad.as_bytes()[PRESSURE_OFFSET + 2], 0);
    }

    #[test]
    fn every_pressure_index_is_unique_and_in_range() {
        let mut seen = [false; PRESSURE_LEN];
        for button in Button::ALL {
            if let Some(idx) = button.pressure_index() {
                assert!(idx < PRESSURE_LEN);
                assert!(!seen[idx], "duplicate pressure byte for {button:?}");
                seen[idx] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }
}

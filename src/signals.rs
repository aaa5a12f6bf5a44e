//! Physical HUB75 output signals.
//!
//! Every scan tick produces a [`ScanOutput`]: one [`ControlWord`] shared by
//! all connectors (row address, latch, blank and clock) plus one
//! [`PortWord`] per connector with the six colour bits of the current pixel
//! column.
//!
//! The colour bits of a port word come from one bit-plane of two pixels: the
//! upper lane pixel drives R1 G1 B1 and the lower lane pixel drives R2 G2 B2.
//! A pixel word is `0x..RRGGBB`, so plane `p` of red is bit `16 + p`.

use bitfield::bitfield;

use crate::Color;
use embedded_graphics::pixelcolor::RgbColor;

bitfield! {
    /// Control lines shared by every connector.
    ///
    /// The bit layout is as follows:
    /// - Bit 7: Clock
    /// - Bit 6: Blank (output enable, active low on the wire)
    /// - Bit 5: Latch
    /// - Bits 4-0: Row address (A B C D E)
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct ControlWord(u8);
    impl Debug;
    pub clock, set_clock: 7;
    pub blank, set_blank: 6;
    pub latch, set_latch: 5;
    pub u8, addr, set_addr: 4, 0;
}

impl ControlWord {
    /// All lines low.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Raw line levels.
    #[must_use]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Whether the LEDs are lit (output enable asserted).
    #[must_use]
    pub fn output_enabled(&self) -> bool {
        !self.blank()
    }
}

bitfield! {
    /// Colour lines of one connector.
    ///
    /// The bit layout is as follows:
    /// - Bit 5: Blue, lower lane
    /// - Bit 4: Green, lower lane
    /// - Bit 3: Red, lower lane
    /// - Bit 2: Blue, upper lane
    /// - Bit 1: Green, upper lane
    /// - Bit 0: Red, upper lane
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct PortWord(u8);
    impl Debug;
    pub blu2, set_blu2: 5;
    pub grn2, set_grn2: 4;
    pub red2, set_red2: 3;
    pub blu1, set_blu1: 2;
    pub grn1, set_grn1: 1;
    pub red1, set_red1: 0;
}

impl PortWord {
    /// All colour lines low.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Raw line levels.
    #[must_use]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Colour lines for `plane` of an upper and a lower lane pixel word.
    #[must_use]
    pub fn from_pixels(upper: u32, lower: u32, plane: u8) -> Self {
        let bit = |word: u32, channel: u32| (word >> (channel + u32::from(plane))) & 1 == 1;
        let mut port = Self::new();
        port.set_red1(bit(upper, 16));
        port.set_grn1(bit(upper, 8));
        port.set_blu1(bit(upper, 0));
        port.set_red2(bit(lower, 16));
        port.set_grn2(bit(lower, 8));
        port.set_blu2(bit(lower, 0));
        port
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ControlWord {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ControlWord({=u8:#x})", self.0);
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PortWord {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "PortWord({=u8:#x})", self.0);
    }
}

/// Pack a colour into the `0x00RRGGBB` pixel word layout.
#[must_use]
pub fn pixel_word(color: Color) -> u32 {
    (u32::from(color.r()) << 16) | (u32::from(color.g()) << 8) | u32::from(color.b())
}

/// Line levels of one scan tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanOutput<const PORTS: usize> {
    /// Shared control lines.
    pub control: ControlWord,
    /// Colour lines per connector.
    pub ports: [PortWord; PORTS],
}

impl<const PORTS: usize> ScanOutput<PORTS> {
    /// Idle lines: everything low except blank.
    #[must_use]
    pub fn idle() -> Self {
        let mut control = ControlWord::new();
        control.set_blank(true);
        Self {
            control,
            ports: [PortWord::new(); PORTS],
        }
    }
}

impl<const PORTS: usize> Default for ScanOutput<PORTS> {
    fn default() -> Self {
        Self::idle()
    }
}

//! Output enable sub-driver.
//!
//! Lights the panel for one bit-plane and, after the last plane of a row,
//! moves the row address lines.
//!
//! ```text
//! Idle -> OutputEnabled -> AddrSwitch -> Idle
//!                  \________________________/  (address unchanged)
//! ```
//!
//! Plane `p` stays lit for `output_cycles << p` ticks, which is what gives
//! binary code modulation its 1:2:4:...:128 brightness weighting.

use crate::registers::ScanTiming;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum EnableState {
    Idle,
    OutputEnabled,
    AddrSwitch,
}

/// Times output enable and row address changes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnableDriver {
    state: EnableState,
    request: bool,
    counter: u32,
    plane: u8,
    addr: u8,
    next_addr: u8,
    blank: bool,
}

impl EnableDriver {
    /// An idle, blanked driver on row 0.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: EnableState::Idle,
            request: false,
            counter: 0,
            plane: 0,
            addr: 0,
            next_addr: 0,
            blank: true,
        }
    }

    /// Request an enable window for `plane`.
    pub fn start(&mut self, plane: u8) {
        self.plane = plane;
        self.request = true;
    }

    /// Address to switch to at the end of the next enable window.
    pub fn set_next_addr(&mut self, addr: u8) {
        self.next_addr = addr;
    }

    /// Jump straight to `addr`. Only meaningful while idle.
    pub fn force_addr(&mut self, addr: u8) {
        self.addr = addr;
        self.next_addr = addr;
    }

    /// Busy from `start` until the window and any address switch are done.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.request || self.state != EnableState::Idle
    }

    /// Current row address lines.
    #[must_use]
    pub const fn addr(&self) -> u8 {
        self.addr
    }

    /// Whether the panel is blanked.
    #[must_use]
    pub const fn blank(&self) -> bool {
        self.blank
    }

    /// Advance one scan tick.
    pub fn tick(&mut self, timing: &ScanTiming) {
        match self.state {
            EnableState::Idle => {
                if self.request {
                    self.request = false;
                    self.state = EnableState::OutputEnabled;
                    self.counter = 1;
                    self.blank = false;
                }
            }
            EnableState::OutputEnabled => {
                let window = u32::from(timing.output_cycles) << self.plane;
                if self.counter >= window {
                    self.blank = true;
                    if self.next_addr == self.addr {
                        self.state = EnableState::Idle;
                    } else {
                        self.state = EnableState::AddrSwitch;
                        self.counter = 1;
                    }
                } else {
                    self.counter += 1;
                }
            }
            EnableState::AddrSwitch => {
                if self.counter >= u32::from(timing.addr_switch_cycles) {
                    self.addr = self.next_addr;
                    self.state = EnableState::Idle;
                } else {
                    self.counter += 1;
                }
            }
        }
    }
}

impl Default for EnableDriver {
    fn default() -> Self {
        Self::new()
    }
}

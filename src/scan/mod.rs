//! Row scan driver.
//!
//! A row is shown by walking the bit-planes from most to least significant.
//! For each plane the [`DataDriver`] clocks the plane's bits into the panel
//! shift registers and latches them, then the [`EnableDriver`] lights them
//! for a time proportional to the plane weight.
//!
//! The two sub-drivers overlap: while plane `p` is lit, plane `p - 1` is
//! already being shifted in. The data side holds its latch until the enable
//! side has blanked, so the panel never shows a half-updated plane.
//!
//! ```text
//! data:    [shift 7][latch]         [shift 6][latch]            ...
//! enable:                  [  lit 7 (128x)  ]       [ lit 6 ]   ...
//! ```
//!
//! After the plane 0 window the address lines move to the next row while the
//! panel is blanked.

pub mod data;
pub mod enable;

pub use data::DataDriver;
pub use enable::EnableDriver;

use crate::error::Result;
use crate::layout::{PanelLayout, PLANES};
use crate::registers::ScanTiming;
use crate::row_buffer::{Bank, LaneBuffers};
use crate::signals::{PortWord, ScanOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum RowState {
    Idle,
    SendingData,
    SendingEnable,
}

/// Shows one row of every lane per request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanDriver<const PORTS: usize> {
    data: DataDriver<PORTS>,
    enable: EnableDriver,
    state: RowState,
    request: bool,
    bank: Bank,
    plane: u8,
    next_addr: u8,
    scan_rows: u8,
    rows_shown: u32,
}

impl<const PORTS: usize> ScanDriver<PORTS> {
    /// Create an idle driver for `layout`.
    ///
    /// # Errors
    ///
    /// Propagates shifter width errors.
    pub fn new(layout: &PanelLayout) -> Result<Self> {
        Ok(Self {
            data: DataDriver::new(layout)?,
            enable: EnableDriver::new(),
            state: RowState::Idle,
            request: false,
            bank: Bank::Zero,
            plane: 0,
            next_addr: 0,
            scan_rows: layout.scan_rows() as u8,
            rows_shown: 0,
        })
    }

    /// Request the next row, read from `bank` of every lane buffer.
    pub fn start(&mut self, bank: Bank) {
        self.bank = bank;
        self.request = true;
    }

    /// Busy from `start` until the last plane is done and the address lines
    /// have settled on the next row.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.request || self.state != RowState::Idle
    }

    /// Row currently selected by the address lines.
    #[must_use]
    pub const fn row_address(&self) -> u8 {
        self.enable.addr()
    }

    /// Rows completed since creation.
    #[must_use]
    pub const fn rows_shown(&self) -> u32 {
        self.rows_shown
    }

    /// Select row 0 again. Ignored while a row is in progress.
    pub fn reset_address(&mut self) {
        if !self.is_busy() {
            self.enable.force_addr(0);
            self.next_addr = 0;
        }
    }

    /// Advance one scan tick and return the line levels.
    pub fn tick<const BANK_WORDS: usize>(
        &mut self,
        timing: &ScanTiming,
        buffers: &LaneBuffers<PORTS, BANK_WORDS>,
    ) -> ScanOutput<PORTS> {
        match self.state {
            RowState::Idle => {
                if self.request {
                    self.request = false;
                    self.next_addr = (self.enable.addr() + 1) % self.scan_rows;
                    self.plane = PLANES - 1;
                    self.data.start(self.plane);
                    self.state = RowState::SendingData;
                }
            }
            RowState::SendingData => {
                if !self.data.is_busy() {
                    if self.plane == 0 {
                        self.enable.set_next_addr(self.next_addr);
                    }
                    self.enable.start(self.plane);
                    self.state = RowState::SendingEnable;
                }
            }
            RowState::SendingEnable => {
                if self.plane > 0 {
                    self.plane -= 1;
                    self.data.start(self.plane);
                    self.state = RowState::SendingData;
                } else if !self.enable.is_busy() {
                    self.state = RowState::Idle;
                    self.rows_shown = self.rows_shown.wrapping_add(1);
                    trace!("row shown, address now {}", self.enable.addr());
                }
            }
        }

        let lat_wait = self.enable.is_busy();
        let pixels = self.data.tick(timing, lat_wait, buffers, self.bank);
        self.enable.tick(timing);

        let mut output = ScanOutput::idle();
        output.control.set_addr(self.enable.addr());
        output.control.set_blank(self.enable.blank());
        output.control.set_latch(self.data.latch());
        output.control.set_clock(pixels.is_some());
        output.ports = pixels.unwrap_or([PortWord::new(); PORTS]);
        output
    }
}

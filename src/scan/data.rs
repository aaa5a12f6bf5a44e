//! Data sub-driver.
//!
//! Clocks one bit-plane of every lane out of the row buffers and latches it
//! into the panels.
//!
//! ```text
//! Idle -> SendData -> Latch -> PostLatch -> Idle
//! ```
//!
//! Latch is held back until the shifters are done, `prelatch_cycles` have
//! passed, and the enable sub-driver has finished showing the previous plane
//! (`lat_wait`). Latching while a plane is still lit would cut that plane's
//! display time short.

use crate::error::Result;
use crate::layout::PanelLayout;
use crate::registers::ScanTiming;
use crate::row_buffer::{Bank, LaneBuffers};
use crate::shifter::BitPlaneShifter;
use crate::signals::PortWord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum DataState {
    Idle,
    SendData,
    Latch,
    PostLatch,
}

/// Shifts pixel data out and pulses latch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataDriver<const PORTS: usize> {
    state: DataState,
    request: bool,
    counter: u32,
    plane: u8,
    latch: bool,
    pixels: usize,
    shifters: [[BitPlaneShifter; 2]; PORTS],
}

impl<const PORTS: usize> DataDriver<PORTS> {
    /// Create a driver with one shifter per lane.
    ///
    /// # Errors
    ///
    /// Propagates shifter width errors.
    pub fn new(layout: &PanelLayout) -> Result<Self> {
        let shifter = BitPlaneShifter::new(32, layout.depth().pixel_bits())?;
        Ok(Self {
            state: DataState::Idle,
            request: false,
            counter: 0,
            plane: 0,
            latch: false,
            pixels: layout.lane_pixels(),
            shifters: core::array::from_fn(|_| [shifter.clone(), shifter.clone()]),
        })
    }

    /// Request one plane to be sent and latched.
    pub fn start(&mut self, plane: u8) {
        self.plane = plane;
        self.request = true;
    }

    /// Busy from `start` until post-latch is over.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.request || self.state != DataState::Idle
    }

    /// Latch line level.
    #[must_use]
    pub const fn latch(&self) -> bool {
        self.latch
    }

    fn shifting(&self) -> bool {
        self.shifters
            .iter()
            .flatten()
            .any(BitPlaneShifter::is_busy)
    }

    /// Advance one scan tick, reading from `bank` of every lane.
    ///
    /// Returns the colour lines when a pixel was clocked out this tick.
    pub fn tick<const BANK_WORDS: usize>(
        &mut self,
        timing: &ScanTiming,
        lat_wait: bool,
        buffers: &LaneBuffers<PORTS, BANK_WORDS>,
        bank: Bank,
    ) -> Option<[PortWord; PORTS]> {
        match self.state {
            DataState::Idle => {
                if self.request {
                    self.request = false;
                    self.state = DataState::SendData;
                    self.counter = 0;
                    for shifter in self.shifters.iter_mut().flatten() {
                        shifter.begin(0, self.pixels);
                    }
                }
            }
            DataState::SendData => {
                if !self.shifting() {
                    if self.counter >= u32::from(timing.prelatch_cycles) {
                        if !lat_wait {
                            self.state = DataState::Latch;
                            self.counter = 1;
                            self.latch = true;
                        }
                    } else {
                        self.counter += 1;
                    }
                }
            }
            DataState::Latch => {
                if self.counter >= u32::from(timing.latch_cycles) {
                    self.state = DataState::PostLatch;
                    self.counter = 1;
                    self.latch = false;
                } else {
                    self.counter += 1;
                }
            }
            DataState::PostLatch => {
                if self.counter >= u32::from(timing.postlatch_cycles) {
                    self.state = DataState::Idle;
                    self.counter = 0;
                } else {
                    self.counter += 1;
                }
            }
        }

        let mut ports = [PortWord::new(); PORTS];
        let mut clocked = false;
        for ((port, lanes), rows) in ports
            .iter_mut()
            .zip(self.shifters.iter_mut())
            .zip(buffers.iter())
        {
            let upper = lanes[0].tick(rows[0].bank(bank));
            let lower = lanes[1].tick(rows[1].bank(bank));
            if upper.is_some() || lower.is_some() {
                clocked = true;
                *port = PortWord::from_pixels(
                    upper.unwrap_or_default(),
                    lower.unwrap_or_default(),
                    self.plane,
                );
            }
        }
        clocked.then_some(ports)
    }
}

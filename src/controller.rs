//! Double-buffer arbiter between the row filler and the scan driver.
//!
//! The filler and the scanner run as two independent loops. The only state
//! they share is [`Occupancy`]: a `written` counter owned by the filler side
//! and a `read` counter owned by the scanner side. Each counter has exactly
//! one writer, so handing a bank over is a single atomic store.
//!
//! ```text
//! available = written - read        0 <= available <= max_buffers
//!
//! filler:  start a row only while available < max_buffers
//! scanner: start a row only while available > 0
//! ```
//!
//! Each side keeps its own bank pointer and flips it after every completed
//! row when double buffered. Because both sides start on bank 0 and advance
//! one bank per row, the filler is always one bank ahead of the scanner
//! whenever `available > 0`.
//!
//! # Disable
//! Dropping `enable` starts a drain. Each side finishes what it is doing and
//! then stops starting rows. Once both sides are idle they are parked
//! together: the filler rewinds to row 0, both bank pointers return to bank
//! 0, the scanner selects row address 0 and the counters are cleared. The
//! drain runs to completion even if `enable` comes back in the meantime, so
//! the filler row and the scanner address always restart in step.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::filler::RowFiller;
use crate::registers::Registers;
use crate::row_buffer::Bank;
use crate::scan::ScanDriver;

/// Row buffering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Buffering {
    /// One bank per lane; the filler waits for every row to be shown.
    Single,
    /// Two banks per lane; the filler prepares the next row while the
    /// current one is shown.
    #[default]
    Double,
}

impl Buffering {
    /// Rows that may be filled ahead of the scanner.
    #[must_use]
    pub const fn max_buffers(self) -> u8 {
        match self {
            Self::Single => 1,
            Self::Double => 2,
        }
    }
}

/// Filled-but-unsent row counters.
///
/// `written` is only stored by the filler loop and `read` only by the scan
/// loop. Both counters wrap, so `available` is their wrapping difference.
#[derive(Debug)]
pub struct Occupancy {
    written: AtomicU8,
    read: AtomicU8,
    max_buffers: u8,
}

impl Occupancy {
    /// Empty counters for the given buffering mode.
    #[must_use]
    pub const fn new(buffering: Buffering) -> Self {
        Self {
            written: AtomicU8::new(0),
            read: AtomicU8::new(0),
            max_buffers: buffering.max_buffers(),
        }
    }

    /// Rows filled so far.
    #[must_use]
    pub fn written(&self) -> u8 {
        self.written.load(Ordering::Acquire)
    }

    /// Rows shown so far.
    #[must_use]
    pub fn read(&self) -> u8 {
        self.read.load(Ordering::Acquire)
    }

    /// Rows filled and not yet shown.
    #[must_use]
    pub fn available(&self) -> u8 {
        self.written().wrapping_sub(self.read())
    }

    /// Bound on [`available`](Self::available).
    #[must_use]
    pub const fn max_buffers(&self) -> u8 {
        self.max_buffers
    }

    /// Whether the filler may start a row.
    #[must_use]
    pub fn can_fill(&self) -> bool {
        self.available() < self.max_buffers
    }

    /// Whether the scanner may start a row.
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.available() > 0
    }

    /// Hand a filled bank to the scanner. Filler loop only.
    pub fn commit_written(&self) {
        let written = self.written.load(Ordering::Relaxed);
        self.written.store(written.wrapping_add(1), Ordering::Release);
    }

    /// Hand a shown bank back to the filler. Scan loop only.
    pub fn commit_read(&self) {
        let read = self.read.load(Ordering::Relaxed);
        self.read.store(read.wrapping_add(1), Ordering::Release);
    }

    /// Clear both counters. Only valid while both loops are parked.
    pub fn reset(&self) {
        self.written.store(0, Ordering::Release);
        self.read.store(0, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum FillerState {
    Idle,
    Filling,
}

/// Filler half of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FillerSide {
    state: FillerState,
    row: usize,
    bank: Bank,
    scan_rows: usize,
    buffering: Buffering,
}

impl FillerSide {
    /// A parked filler side.
    #[must_use]
    pub const fn new(scan_rows: usize, buffering: Buffering) -> Self {
        Self {
            state: FillerState::Idle,
            row: 0,
            bank: Bank::Zero,
            scan_rows,
            buffering,
        }
    }

    /// Row the next fill will copy.
    #[must_use]
    pub const fn row(&self) -> usize {
        self.row
    }

    /// Bank the next fill will write.
    #[must_use]
    pub const fn bank(&self) -> Bank {
        self.bank
    }

    /// Whether no fill is in progress.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == FillerState::Idle
    }

    /// Rewind to row 0 on bank 0.
    pub fn park(&mut self) {
        self.row = 0;
        self.bank = Bank::Zero;
    }

    /// Advance one filler cycle: start a fill when `active` and allowed, and
    /// commit it once the filler is done.
    pub fn tick<const PORTS: usize>(
        &mut self,
        occupancy: &Occupancy,
        active: bool,
        regs: &Registers,
        filler: &mut RowFiller<PORTS>,
    ) {
        match self.state {
            FillerState::Idle => {
                if active && occupancy.can_fill() {
                    filler.begin(self.row, self.bank, regs.base_addr);
                    self.state = FillerState::Filling;
                }
            }
            FillerState::Filling => {
                if !filler.is_busy() {
                    occupancy.commit_written();
                    if self.buffering == Buffering::Double {
                        self.bank = self.bank.toggled();
                    }
                    self.row = (self.row + 1) % self.scan_rows;
                    self.state = FillerState::Idle;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum SenderState {
    Idle,
    Sending,
    Cooldown,
}

/// Scanner half of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SenderSide {
    state: SenderState,
    bank: Bank,
    cycles: u32,
    buffering: Buffering,
}

impl SenderSide {
    /// A parked sender side.
    #[must_use]
    pub const fn new(buffering: Buffering) -> Self {
        Self {
            state: SenderState::Idle,
            bank: Bank::Zero,
            cycles: 0,
            buffering,
        }
    }

    /// Bank the next row will be shown from.
    #[must_use]
    pub const fn bank(&self) -> Bank {
        self.bank
    }

    /// Whether no row is being shown or cooling down.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == SenderState::Idle
    }

    /// Return to bank 0 and select row address 0.
    pub fn park<const PORTS: usize>(&mut self, scanner: &mut ScanDriver<PORTS>) {
        self.bank = Bank::Zero;
        scanner.reset_address();
    }

    /// Advance one scan cycle.
    ///
    /// A row is started only when `active` and one is available, and no
    /// sooner than `cycle_length` scan cycles after the previous start.
    pub fn tick<const PORTS: usize>(
        &mut self,
        occupancy: &Occupancy,
        active: bool,
        regs: &Registers,
        scanner: &mut ScanDriver<PORTS>,
    ) {
        match self.state {
            SenderState::Idle => {
                if active && occupancy.can_send() {
                    scanner.start(self.bank);
                    self.cycles = 0;
                    self.state = SenderState::Sending;
                }
            }
            SenderState::Sending => {
                self.cycles = self.cycles.saturating_add(1);
                if !scanner.is_busy() {
                    occupancy.commit_read();
                    if self.buffering == Buffering::Double {
                        self.bank = self.bank.toggled();
                    }
                    self.state = SenderState::Cooldown;
                }
            }
            SenderState::Cooldown => {
                self.cycles = self.cycles.saturating_add(1);
                if self.cycles >= regs.cycle_length {
                    self.state = SenderState::Idle;
                }
            }
        }
    }
}

/// Both halves of the arbiter plus the shared counters.
#[derive(Debug)]
pub struct Controller {
    occupancy: Occupancy,
    filler: FillerSide,
    sender: SenderSide,
    enabled: bool,
    draining: bool,
}

impl Controller {
    /// A parked controller.
    #[must_use]
    pub const fn new(scan_rows: usize, buffering: Buffering) -> Self {
        Self {
            occupancy: Occupancy::new(buffering),
            filler: FillerSide::new(scan_rows, buffering),
            sender: SenderSide::new(buffering),
            enabled: false,
            draining: false,
        }
    }

    /// Shared occupancy counters.
    #[must_use]
    pub const fn occupancy(&self) -> &Occupancy {
        &self.occupancy
    }

    /// Filler half.
    #[must_use]
    pub const fn filler_side(&self) -> &FillerSide {
        &self.filler
    }

    /// Sender half.
    #[must_use]
    pub const fn sender_side(&self) -> &SenderSide {
        &self.sender
    }

    /// Whether a disable is still being drained.
    #[must_use]
    pub const fn is_draining(&self) -> bool {
        self.draining
    }

    /// Whether new rows may be started.
    #[must_use]
    pub const fn is_active(&self, regs: &Registers) -> bool {
        regs.enable && !self.draining
    }

    /// Run the filler half for one filler cycle.
    pub fn tick_filler<const PORTS: usize>(
        &mut self,
        regs: &Registers,
        filler: &mut RowFiller<PORTS>,
    ) {
        let active = self.is_active(regs);
        self.filler.tick(&self.occupancy, active, regs, filler);
    }

    /// Run the sender half for one scan cycle.
    pub fn tick_sender<const PORTS: usize>(
        &mut self,
        regs: &Registers,
        scanner: &mut ScanDriver<PORTS>,
    ) {
        let active = self.is_active(regs);
        self.sender.tick(&self.occupancy, active, regs, scanner);
    }

    /// Track enable transitions and finish a pending drain once both
    /// halves are idle.
    pub fn settle<const PORTS: usize>(
        &mut self,
        regs: &Registers,
        scanner: &mut ScanDriver<PORTS>,
    ) {
        if regs.enable != self.enabled {
            self.enabled = regs.enable;
            if regs.enable {
                info!("display enabled");
            } else {
                info!("display disabled");
                self.draining = true;
            }
        }
        if self.draining && self.filler.is_idle() && self.sender.is_idle() {
            self.filler.park();
            self.sender.park(scanner);
            self.occupancy.reset();
            self.draining = false;
            debug!("controller parked");
        }
    }
}

//! Runtime register table.
//!
//! Every field is independently readable and writable and takes effect the
//! next time a state machine reads it. There is no atomicity across fields
//! and no range checking: out-of-range timing values are a deployment error.
//!
//! Registers are also addressable as a CSR bank with one 32-bit register
//! every 4 bytes, in [`Register::ALL`] order. Writes through
//! [`Registers::write`] truncate to the field width, like the storage
//! registers they model.

use crate::error::{Error, Result};
use crate::limiter::Limits;

/// Highest brightness accepted by [`Registers::set_brightness`].
pub const MAX_BRIGHTNESS: u8 = 12;

/// Named registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Display on/off.
    Enable,
    /// Minimum scan ticks between row starts.
    CycleLength,
    /// Frame store address of the frame being scanned.
    BaseAddr,
    /// Guard ticks between the last data clock and latch.
    PrelatchCycles,
    /// Latch pulse length.
    LatchCycles,
    /// Guard ticks after latch.
    PostlatchCycles,
    /// Output enable ticks for plane 0; plane `p` gets `output_cycles << p`.
    OutputCycles,
    /// Settle ticks after a row address change.
    AddrSwitchCycles,
    /// Frame store read burst length.
    FillReadAllow,
    /// Frame store read idle cycles.
    FillReadSleep,
    /// Row buffer write burst length.
    FillWriteAllow,
    /// Row buffer write idle cycles.
    FillWriteSleep,
    /// Network ingress burst length.
    IngressAllow,
    /// Network ingress idle cycles.
    IngressSleep,
}

impl Register {
    /// Every register in CSR order.
    pub const ALL: [Self; 14] = [
        Self::Enable,
        Self::CycleLength,
        Self::BaseAddr,
        Self::PrelatchCycles,
        Self::LatchCycles,
        Self::PostlatchCycles,
        Self::OutputCycles,
        Self::AddrSwitchCycles,
        Self::FillReadAllow,
        Self::FillReadSleep,
        Self::FillWriteAllow,
        Self::FillWriteSleep,
        Self::IngressAllow,
        Self::IngressSleep,
    ];

    /// Register name as exported in the CSR map.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::CycleLength => "cycle_length",
            Self::BaseAddr => "base_addr",
            Self::PrelatchCycles => "prelatch_cycles",
            Self::LatchCycles => "latch_cycles",
            Self::PostlatchCycles => "postlatch_cycles",
            Self::OutputCycles => "output_cycles",
            Self::AddrSwitchCycles => "addr_switch_cycles",
            Self::FillReadAllow => "fill_read_allow",
            Self::FillReadSleep => "fill_read_sleep",
            Self::FillWriteAllow => "fill_write_allow",
            Self::FillWriteSleep => "fill_write_sleep",
            Self::IngressAllow => "ingress_allow",
            Self::IngressSleep => "ingress_sleep",
        }
    }

    /// Byte offset in the CSR bank.
    #[must_use]
    pub fn offset(self) -> u32 {
        let index = Self::ALL.iter().position(|&r| r == self).unwrap_or(0);
        index as u32 * 4
    }

    /// Look a register up by CSR byte offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRegister`] for unaligned or unmapped offsets.
    pub fn from_offset(offset: u32) -> Result<Self> {
        if offset % 4 != 0 {
            return Err(Error::UnknownRegister { offset });
        }
        Self::ALL
            .get((offset / 4) as usize)
            .copied()
            .ok_or(Error::UnknownRegister { offset })
    }

    /// Look a register up by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.name() == name)
    }
}

/// Phase timing of the scan driver, in scan ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanTiming {
    /// Guard ticks between the last data clock and latch.
    pub prelatch_cycles: u8,
    /// Latch pulse length.
    pub latch_cycles: u8,
    /// Guard ticks after latch.
    pub postlatch_cycles: u8,
    /// Output enable ticks for plane 0.
    pub output_cycles: u16,
    /// Settle ticks after a row address change.
    pub addr_switch_cycles: u16,
}

impl Default for ScanTiming {
    fn default() -> Self {
        Self {
            prelatch_cycles: 1,
            latch_cycles: 3,
            postlatch_cycles: 1,
            output_cycles: 6,
            addr_switch_cycles: 1,
        }
    }
}

/// The full register table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Registers {
    /// Display on/off.
    pub enable: bool,
    /// Minimum scan ticks between row starts.
    pub cycle_length: u32,
    /// Frame store address of the frame being scanned.
    pub base_addr: u32,
    /// Scan driver timing.
    pub timing: ScanTiming,
    /// Frame store read limiter.
    pub fill_read: Limits,
    /// Row buffer write limiter.
    pub fill_write: Limits,
    /// Network ingress limiter.
    pub ingress: Limits,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            enable: false,
            cycle_length: 5100,
            base_addr: 0,
            timing: ScanTiming::default(),
            fill_read: Limits::new(12, 12),
            fill_write: Limits::UNLIMITED,
            ingress: Limits::new(256, 128),
        }
    }
}

impl Registers {
    /// Read a register as a 32-bit value.
    #[must_use]
    pub fn read(&self, register: Register) -> u32 {
        match register {
            Register::Enable => u32::from(self.enable),
            Register::CycleLength => self.cycle_length,
            Register::BaseAddr => self.base_addr,
            Register::PrelatchCycles => u32::from(self.timing.prelatch_cycles),
            Register::LatchCycles => u32::from(self.timing.latch_cycles),
            Register::PostlatchCycles => u32::from(self.timing.postlatch_cycles),
            Register::OutputCycles => u32::from(self.timing.output_cycles),
            Register::AddrSwitchCycles => u32::from(self.timing.addr_switch_cycles),
            Register::FillReadAllow => u32::from(self.fill_read.allow),
            Register::FillReadSleep => u32::from(self.fill_read.sleep),
            Register::FillWriteAllow => u32::from(self.fill_write.allow),
            Register::FillWriteSleep => u32::from(self.fill_write.sleep),
            Register::IngressAllow => u32::from(self.ingress.allow),
            Register::IngressSleep => u32::from(self.ingress.sleep),
        }
    }

    /// Write a register, truncating to the field width.
    pub fn write(&mut self, register: Register, value: u32) {
        match register {
            Register::Enable => self.enable = value & 1 == 1,
            Register::CycleLength => self.cycle_length = value,
            Register::BaseAddr => self.base_addr = value,
            Register::PrelatchCycles => self.timing.prelatch_cycles = value as u8,
            Register::LatchCycles => self.timing.latch_cycles = value as u8,
            Register::PostlatchCycles => self.timing.postlatch_cycles = value as u8,
            Register::OutputCycles => self.timing.output_cycles = value as u16,
            Register::AddrSwitchCycles => self.timing.addr_switch_cycles = value as u16,
            Register::FillReadAllow => self.fill_read.allow = value as u16,
            Register::FillReadSleep => self.fill_read.sleep = value as u16,
            Register::FillWriteAllow => self.fill_write.allow = value as u16,
            Register::FillWriteSleep => self.fill_write.sleep = value as u16,
            Register::IngressAllow => self.ingress.allow = value as u16,
            Register::IngressSleep => self.ingress.sleep = value as u16,
        }
    }

    /// Read the register at a CSR byte offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRegister`] if nothing is mapped there.
    pub fn read_at(&self, offset: u32) -> Result<u32> {
        Register::from_offset(offset).map(|r| self.read(r))
    }

    /// Write the register at a CSR byte offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRegister`] if nothing is mapped there.
    pub fn write_at(&mut self, offset: u32, value: u32) -> Result<()> {
        let register = Register::from_offset(offset)?;
        self.write(register, value);
        Ok(())
    }

    /// Set `output_cycles` from a brightness level, clamped to
    /// `0..=MAX_BRIGHTNESS`.
    pub fn set_brightness(&mut self, level: u8) {
        self.timing.output_cycles = u16::from(level.min(MAX_BRIGHTNESS));
    }
}

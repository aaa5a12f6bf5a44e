//! Bit-plane shifter.
//!
//! Row buffers store pixels as a packed bit stream: with the 48-word row
//! depth, four 24-bit pixels share three 32-bit words. The scan side needs
//! them back one pixel per clock, so the shifter treats the source memory as
//! one long MSB-first bit string and slides a `dst_bits` window along it.
//!
//! The accumulator is a `u64`, twice the widest supported source word, so a
//! window straddling two words always fits. A new word is only read when the
//! bits left in the accumulator drop below one window. Reading `count`
//! windows therefore costs exactly `ceil(count * dst_bits / src_bits)` reads.

use crate::error::{Error, Result};

const ACC_BITS: u32 = u64::BITS;

/// Slides a fixed-width window along a stream of wider memory words.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitPlaneShifter {
    src_bits: u8,
    dst_bits: u8,
    start: usize,
    count: usize,
    pending: bool,
    busy: bool,
    acc: u64,
    level: u32,
    next_addr: usize,
    produced: usize,
    reads: usize,
}

impl BitPlaneShifter {
    /// Create a shifter producing `dst_bits` windows out of `src_bits` words.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidShifterWidth`] unless
    /// `1 <= dst_bits <= src_bits <= 32`.
    pub fn new(src_bits: u8, dst_bits: u8) -> Result<Self> {
        if dst_bits == 0 || dst_bits > src_bits || src_bits > 32 {
            return Err(Error::InvalidShifterWidth {
                source_bits: src_bits,
                output: dst_bits,
            });
        }
        Ok(Self {
            src_bits,
            dst_bits,
            start: 0,
            count: 0,
            pending: false,
            busy: false,
            acc: 0,
            level: 0,
            next_addr: 0,
            produced: 0,
            reads: 0,
        })
    }

    /// Width of the source words.
    #[must_use]
    pub const fn src_bits(&self) -> u8 {
        self.src_bits
    }

    /// Width of each output window.
    #[must_use]
    pub const fn dst_bits(&self) -> u8 {
        self.dst_bits
    }

    /// Request `count` windows starting at word address `start`. The request
    /// is picked up on the next [`tick`](Self::tick).
    pub fn begin(&mut self, start: usize, count: usize) {
        self.start = start;
        self.count = count;
        self.pending = true;
    }

    /// Busy from `begin` until the last window has been produced.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.pending || self.busy
    }

    /// Source words read since the last `begin`.
    #[must_use]
    pub const fn reads(&self) -> usize {
        self.reads
    }

    /// Advance one cycle, producing the next window if busy.
    ///
    /// Addresses past the end of `mem` read as zero.
    pub fn tick(&mut self, mem: &[u32]) -> Option<u32> {
        if !self.busy {
            if !self.pending {
                return None;
            }
            self.pending = false;
            self.acc = 0;
            self.level = 0;
            self.next_addr = self.start;
            self.produced = 0;
            self.reads = 0;
            if self.count == 0 {
                return None;
            }
            self.busy = true;
        }

        let src = u32::from(self.src_bits);
        let dst = u32::from(self.dst_bits);

        if self.level < dst {
            let word = mem.get(self.next_addr).copied().unwrap_or(0);
            let word = u64::from(word) & ((1u64 << src) - 1);
            self.acc |= word << (ACC_BITS - src - self.level);
            self.level += src;
            self.next_addr += 1;
            self.reads += 1;
        }

        let window = (self.acc >> (ACC_BITS - dst)) as u32;
        self.acc <<= dst;
        self.level -= dst;
        self.produced += 1;
        if self.produced >= self.count {
            self.busy = false;
        }
        Some(window)
    }
}

//! Row filler.
//!
//! Copies one logical row of every lane from the frame store into the row
//! buffers, one panel segment at a time. A row is `PORTS * 2 * chain`
//! transfers of `depth` words each. Transfer `t` feeds lane `t / chain` at
//! chain position `t % chain`; lane `l` is port `l / 2`, upper or lower line
//! `l % 2`.
//!
//! Each transfer runs three stages in parallel:
//! 1. an address counter walks the source words,
//! 2. the read limiter gates those requests into the frame store,
//! 3. the write limiter gates responses into the lane's row buffer.
//!
//! The next transfer is launched only once the counter is idle and every
//! request has been answered, so responses can never land in the wrong lane.

use crate::error::Result;
use crate::frame_store::ReadPort;
use crate::layout::PanelLayout;
use crate::limiter::RateLimiter;
use crate::registers::Registers;
use crate::row_buffer::{Bank, LaneBuffers};

/// Generates consecutive word addresses for one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AddressCounter {
    next: u32,
    remaining: usize,
}

impl AddressCounter {
    /// Start walking `count` addresses from `start`.
    pub fn begin(&mut self, start: u32, count: usize) {
        self.next = start;
        self.remaining = count;
    }

    /// Whether addresses are still left.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.remaining > 0
    }

    /// The next address, if any, without consuming it.
    #[must_use]
    pub const fn peek(&self) -> Option<u32> {
        if self.remaining > 0 {
            Some(self.next)
        } else {
            None
        }
    }

    /// Consume the current address.
    pub fn advance(&mut self) {
        if self.remaining > 0 {
            self.next = self.next.wrapping_add(1);
            self.remaining -= 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum FillState {
    Idle,
    Copying { transfer: usize },
}

/// Where the words of the current transfer go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Destination {
    port: usize,
    line: usize,
    offset: usize,
}

/// DMA-style copy engine from the frame store into the row buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RowFiller<const PORTS: usize> {
    layout: PanelLayout,
    state: FillState,
    request: bool,
    row: usize,
    bank: Bank,
    base: u32,
    counter: AddressCounter,
    dest: Destination,
    read_limiter: RateLimiter,
    write_limiter: RateLimiter,
    rows_filled: u32,
}

impl<const PORTS: usize> RowFiller<PORTS> {
    /// Create an idle filler for `layout`.
    #[must_use]
    pub fn new(layout: PanelLayout) -> Self {
        let defaults = Registers::default();
        Self {
            layout,
            state: FillState::Idle,
            request: false,
            row: 0,
            bank: Bank::Zero,
            base: 0,
            counter: AddressCounter::default(),
            dest: Destination::default(),
            read_limiter: RateLimiter::with_limits(defaults.fill_read),
            write_limiter: RateLimiter::with_limits(defaults.fill_write),
            rows_filled: 0,
        }
    }

    /// Create a filler whose row depth is given as a word count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedDepth`](crate::Error::UnsupportedDepth)
    /// unless `depth_words` is 48 or 64.
    pub fn with_depth(depth_words: usize, chain: usize, scan_rows: usize) -> Result<Self> {
        PanelLayout::new(depth_words, chain, scan_rows).map(Self::new)
    }

    /// Transfers per row.
    #[must_use]
    pub const fn transfers(&self) -> usize {
        PORTS * 2 * self.layout.chain()
    }

    /// Request a fill of `row` into `bank`, reading the frame at `base`.
    pub fn begin(&mut self, row: usize, bank: Bank, base: u32) {
        self.row = row;
        self.bank = bank;
        self.base = base;
        self.request = true;
    }

    /// Busy from `begin` until the last word of the row has been written.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.request || self.state != FillState::Idle
    }

    /// Rows completed since creation.
    #[must_use]
    pub const fn rows_filled(&self) -> u32 {
        self.rows_filled
    }

    fn launch(&mut self, transfer: usize) {
        let chain = self.layout.chain();
        let lane = transfer / chain;
        let link = transfer % chain;
        let port = lane >> 1;
        let line = lane & 1;
        let source = self
            .layout
            .source_address(self.base, self.row, port, line, link);
        let depth = self.layout.depth().words();
        self.counter.begin(source, depth);
        self.dest = Destination {
            port,
            line,
            offset: link * depth,
        };
        self.state = FillState::Copying { transfer };
    }

    /// Advance one filler cycle.
    ///
    /// Limiter settings are taken from `regs` every cycle.
    pub fn tick<S, const BANK_WORDS: usize>(
        &mut self,
        regs: &Registers,
        store: &mut S,
        buffers: &mut LaneBuffers<PORTS, BANK_WORDS>,
    ) where
        S: ReadPort + ?Sized,
    {
        self.read_limiter.set_limits(regs.fill_read);
        self.write_limiter.set_limits(regs.fill_write);

        match self.state {
            FillState::Idle => {
                if self.request {
                    self.request = false;
                    self.launch(0);
                }
            }
            FillState::Copying { transfer } => {
                if !self.counter.is_busy() && store.pending() == 0 {
                    if transfer + 1 < self.transfers() {
                        self.launch(transfer + 1);
                    } else {
                        self.state = FillState::Idle;
                        self.rows_filled = self.rows_filled.wrapping_add(1);
                        trace!("filled row {} into bank {}", self.row, self.bank.index());
                    }
                }
            }
        }

        let mut requested = false;
        if self.read_limiter.is_open() && store.can_request() {
            if let Some(address) = self.counter.peek() {
                store.request(address);
                self.counter.advance();
                requested = true;
            }
        }
        self.read_limiter.clock(requested);

        let mut written = false;
        if self.write_limiter.is_open() {
            if let Some(word) = store.response() {
                let Destination { port, line, offset } = self.dest;
                if let Some(lanes) = buffers.get_mut(port) {
                    lanes[line].write(self.bank, offset, word);
                }
                self.dest.offset += 1;
                written = true;
            }
        }
        self.write_limiter.clock(written);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec;
    use std::vec::Vec;

    use super::*;
    use crate::error::Error;
    use crate::frame_store::MemoryFrameStore;
    use crate::limiter::Limits;
    use crate::row_buffer::RowBuffer;

    const PORTS: usize = 2;
    const WORDS: usize = 96;

    /// Frame store words tagged with their own address.
    fn tagged(len: usize) -> Vec<u32> {
        (0..len as u32).map(|a| a | 0x8000_0000).collect()
    }

    fn fill_row<const P: usize, const W: usize, const F: usize>(
        filler: &mut RowFiller<P>,
        regs: &Registers,
        store: &mut MemoryFrameStore<'_, F>,
        buffers: &mut LaneBuffers<P, W>,
        row: usize,
        bank: Bank,
    ) -> usize {
        filler.begin(row, bank, regs.base_addr);
        let mut cycles = 0;
        while filler.is_busy() {
            filler.tick(regs, store, buffers);
            store.tick();
            cycles += 1;
            assert!(cycles < 100_000, "filler stalled");
        }
        cycles
    }

    #[test]
    fn test_address_counter() {
        let mut counter = AddressCounter::default();
        assert!(!counter.is_busy());
        assert_eq!(counter.peek(), None);
        counter.begin(10, 2);
        assert_eq!(counter.peek(), Some(10));
        counter.advance();
        assert_eq!(counter.peek(), Some(11));
        counter.advance();
        assert!(!counter.is_busy());
        counter.advance();
        assert_eq!(counter.peek(), None);
    }

    #[test]
    fn test_rejects_unsupported_depth() {
        assert_eq!(
            RowFiller::<1>::with_depth(40, 2, 32),
            Err(Error::UnsupportedDepth { words: 40 })
        );
        assert!(RowFiller::<1>::with_depth(64, 1, 32).is_ok());
    }

    #[test]
    fn test_fills_every_lane_from_its_block() {
        let layout = PanelLayout::new(48, 2, 4).unwrap();
        let mut words = tagged(layout.frame_words(PORTS));
        let mut store = MemoryFrameStore::<8>::new(&mut words, 3);
        let mut buffers: LaneBuffers<PORTS, WORDS> = [[RowBuffer::new(); 2]; PORTS];
        let mut filler = RowFiller::<PORTS>::new(layout);
        let regs = Registers::default();

        fill_row(&mut filler, &regs, &mut store, &mut buffers, 2, Bank::One);

        for port in 0..PORTS {
            for line in 0..2 {
                let bank = buffers[port][line].bank(Bank::One);
                for link in 0..2 {
                    let source = layout.source_address(0, 2, port, line, link);
                    for word in 0..48 {
                        assert_eq!(
                            bank[link * 48 + word],
                            (source + word as u32) | 0x8000_0000,
                            "port {port} line {line} link {link} word {word}"
                        );
                    }
                }
                // the other bank is untouched
                assert!(buffers[port][line].bank(Bank::Zero).iter().all(|&w| w == 0));
            }
        }
        assert_eq!(store.reads(), PORTS * 2 * 2 * 48);
        assert_eq!(filler.rows_filled(), 1);
    }

    #[test]
    fn test_base_address_offsets_reads() {
        let layout = PanelLayout::new(64, 1, 2).unwrap();
        let frame = layout.frame_words(1);
        let mut words = tagged(2 * frame);
        let mut store = MemoryFrameStore::<8>::new(&mut words, 1);
        let mut buffers: LaneBuffers<1, 64> = [[RowBuffer::new(); 2]];
        let mut filler = RowFiller::<1>::new(layout);
        let regs = Registers {
            base_addr: frame as u32,
            ..Registers::default()
        };

        filler.begin(1, Bank::Zero, regs.base_addr);
        while filler.is_busy() {
            filler.tick(&regs, &mut store, &mut buffers);
            store.tick();
        }
        let expected = layout.source_address(frame as u32, 1, 0, 0, 0);
        assert_eq!(buffers[0][0].bank(Bank::Zero)[0], expected | 0x8000_0000);
    }

    #[test]
    fn test_read_limiter_paces_requests() {
        let layout = PanelLayout::new(48, 1, 1).unwrap();
        let mut words = tagged(layout.frame_words(1));
        let mut store = MemoryFrameStore::<64>::new(&mut words, 0);
        let mut buffers: LaneBuffers<1, 48> = [[RowBuffer::new(); 2]];
        let mut filler = RowFiller::<1>::new(layout);
        let mut regs = Registers::default();

        regs.fill_read = Limits::UNLIMITED;
        let mut fast = 0;
        filler.begin(0, Bank::Zero, 0);
        while filler.is_busy() {
            filler.tick(&regs, &mut store, &mut buffers);
            store.tick();
            fast += 1;
        }

        regs.fill_read = Limits::new(4, 4);
        let mut slow = 0;
        filler.begin(0, Bank::One, 0);
        while filler.is_busy() {
            filler.tick(&regs, &mut store, &mut buffers);
            store.tick();
            slow += 1;
        }
        // 96 reads at half throughput take about twice as long
        assert!(slow > fast * 3 / 2, "fast {fast} slow {slow}");
        assert_eq!(
            buffers[0][0].bank(Bank::Zero),
            buffers[0][0].bank(Bank::One)
        );
    }

    #[test]
    fn test_write_limiter_stalls_responses() {
        let layout = PanelLayout::new(48, 1, 1).unwrap();
        let mut words = tagged(layout.frame_words(1));
        let mut store = MemoryFrameStore::<4>::new(&mut words, 0);
        let mut buffers: LaneBuffers<1, 48> = [[RowBuffer::new(); 2]];
        let mut filler = RowFiller::<1>::new(layout);
        let regs = Registers {
            fill_read: Limits::UNLIMITED,
            fill_write: Limits::new(1, 3),
            ..Registers::default()
        };

        fill_row(&mut filler, &regs, &mut store, &mut buffers, 0, Bank::Zero);
        let expected: Vec<u32> = (0..48).map(|a| a | 0x8000_0000).collect();
        assert_eq!(buffers[0][0].bank(Bank::Zero).to_vec(), expected);
        let lower: Vec<u32> = (48..96).map(|a| a | 0x8000_0000).collect();
        assert_eq!(buffers[0][1].bank(Bank::Zero).to_vec(), lower);
    }

    #[test]
    fn test_waits_for_outstanding_reads() {
        let layout = PanelLayout::new(48, 1, 1).unwrap();
        let mut words = vec![7; layout.frame_words(1)];
        let mut store = MemoryFrameStore::<8>::new(&mut words, 20);
        let mut buffers: LaneBuffers<1, 48> = [[RowBuffer::new(); 2]];
        let mut filler = RowFiller::<1>::new(layout);
        let regs = Registers {
            fill_read: Limits::UNLIMITED,
            ..Registers::default()
        };

        filler.begin(0, Bank::Zero, 0);
        let mut cycles = 0;
        while filler.is_busy() {
            filler.tick(&regs, &mut store, &mut buffers);
            store.tick();
            cycles += 1;
        }
        assert_eq!(store.pending(), 0);
        // each transfer ends with a full latency drain
        assert!(cycles > 2 * 20);
        assert!(buffers[0].iter().all(|b| b.bank(Bank::Zero).iter().all(|&w| w == 7)));
    }

    #[test]
    fn test_idle_without_begin() {
        let layout = PanelLayout::new(48, 1, 1).unwrap();
        let mut words = tagged(layout.frame_words(1));
        let mut store = MemoryFrameStore::<8>::new(&mut words, 0);
        let mut buffers: LaneBuffers<1, 48> = [[RowBuffer::new(); 2]];
        let mut filler = RowFiller::<1>::new(layout);
        for _ in 0..10 {
            filler.tick(&Registers::default(), &mut store, &mut buffers);
        }
        assert_eq!(store.reads(), 0);
        assert!(!filler.is_busy());
    }
}

//! The complete receiver.
//!
//! [`Receiver`] wires every stage together:
//!
//! ```text
//! datagrams -> Ingest -> frame store -> RowFiller -> row buffers -> ScanDriver -> pins
//!                                            \____ Controller ____/
//! ```
//!
//! Each call to [`Receiver::tick`] is one cycle of the filler loop. The
//! ingest loop runs every cycle as well, and the scan loop runs once every
//! `scan_divider` cycles. The frame store is owned by the caller and passed
//! in on every tick, so it can be shared with other bus masters; the caller
//! is also responsible for advancing its clock.

use crate::controller::{Buffering, Controller, Occupancy};
use crate::error::{Error, Result};
use crate::filler::RowFiller;
use crate::frame_store::{ReadPort, WritePort};
use crate::ingest::{Ingest, ADDRESS_BITS};
use crate::layout::PanelLayout;
use crate::registers::Registers;
use crate::row_buffer::{LaneBuffers, RowBuffer};
use crate::scan::ScanDriver;
use crate::signals::ScanOutput;

/// Counters for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Statistics {
    /// Rows copied into the row buffers.
    pub rows_filled: u32,
    /// Rows scanned out.
    pub rows_shown: u32,
    /// Words written into the frame store by ingest.
    pub ingress_writes: u32,
    /// Malformed ingress messages recovered from.
    pub recoveries: u32,
}

/// HUB75 receiver driving `PORTS` connectors.
///
/// `BANK_WORDS` is the size of one row buffer bank and must hold a lane's
/// worth of words (`chain * depth`). `FIFO` is the ingress FIFO depth in
/// words.
pub struct Receiver<const PORTS: usize, const BANK_WORDS: usize, const FIFO: usize = 1024> {
    layout: PanelLayout,
    registers: Registers,
    controller: Controller,
    filler: RowFiller<PORTS>,
    scanner: ScanDriver<PORTS>,
    buffers: LaneBuffers<PORTS, BANK_WORDS>,
    ingest: Ingest<FIFO>,
    scan_divider: u8,
    scan_phase: u8,
}

impl<const PORTS: usize, const BANK_WORDS: usize, const FIFO: usize>
    Receiver<PORTS, BANK_WORDS, FIFO>
{
    /// Build a disabled receiver.
    ///
    /// * `layout` - panel wall geometry
    /// * `buffering` - single or double buffered rows
    /// * `scan_divider` - filler cycles per scan cycle, at least 1
    ///
    /// # Errors
    ///
    /// Returns [`Error::BankTooSmall`] if `BANK_WORDS` cannot hold one lane.
    pub fn new(layout: PanelLayout, buffering: Buffering, scan_divider: u8) -> Result<Self> {
        if BANK_WORDS < layout.lane_words() {
            return Err(Error::BankTooSmall {
                capacity: BANK_WORDS,
                required: layout.lane_words(),
            });
        }
        let scanner = ScanDriver::new(&layout)?;
        info!(
            "receiver: {} ports, chain {}, {} scan rows, {} words per row",
            PORTS,
            layout.chain(),
            layout.scan_rows(),
            layout.depth().words(),
        );
        Ok(Self {
            layout,
            registers: Registers::default(),
            controller: Controller::new(layout.scan_rows(), buffering),
            filler: RowFiller::new(layout),
            scanner,
            buffers: [[RowBuffer::new(); 2]; PORTS],
            ingest: Ingest::default(),
            scan_divider: scan_divider.max(1),
            scan_phase: 0,
        })
    }

    /// Panel wall geometry.
    #[must_use]
    pub const fn layout(&self) -> &PanelLayout {
        &self.layout
    }

    /// Runtime registers.
    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Mutable runtime registers.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    /// The double-buffer arbiter.
    #[must_use]
    pub const fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Shared occupancy counters.
    #[must_use]
    pub const fn occupancy(&self) -> &Occupancy {
        self.controller.occupancy()
    }

    /// The scan driver.
    #[must_use]
    pub const fn scanner(&self) -> &ScanDriver<PORTS> {
        &self.scanner
    }

    /// The row filler.
    #[must_use]
    pub const fn filler(&self) -> &RowFiller<PORTS> {
        &self.filler
    }

    /// Row buffers of every lane.
    #[must_use]
    pub const fn buffers(&self) -> &LaneBuffers<PORTS, BANK_WORDS> {
        &self.buffers
    }

    /// The ingest pipeline.
    #[must_use]
    pub const fn ingest(&self) -> &Ingest<FIFO> {
        &self.ingest
    }

    /// Mutable ingest pipeline, for feeding raw stream words.
    pub fn ingest_mut(&mut self) -> &mut Ingest<FIFO> {
        &mut self.ingest
    }

    /// Queue a datagram for ingest. See [`Ingest::receive`].
    ///
    /// # Errors
    ///
    /// Propagates port mismatch and FIFO overflow.
    pub fn receive(&mut self, dst_port: u16, payload: &[u8]) -> Result<usize> {
        self.ingest.receive(dst_port, payload)
    }

    /// Scan frame half `half` of the frame store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] if that half does not fit the
    /// ingress address space.
    pub fn show_frame(&mut self, half: usize) -> Result<()> {
        let words = self.layout.frame_words(PORTS);
        let end = (half + 1) * words;
        if end > 1 << ADDRESS_BITS {
            return Err(Error::FrameTooLarge { words });
        }
        self.registers.base_addr = (half * words) as u32;
        debug!("showing frame half {}", half);
        Ok(())
    }

    /// Counters for observability.
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        Statistics {
            rows_filled: self.filler.rows_filled(),
            rows_shown: self.scanner.rows_shown(),
            ingress_writes: self.ingest.writes(),
            recoveries: self.ingest.recoveries(),
        }
    }

    /// Whether both the filler and the scanner are parked.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.controller.filler_side().is_idle()
            && self.controller.sender_side().is_idle()
            && !self.filler.is_busy()
            && !self.scanner.is_busy()
            && !self.controller.is_draining()
    }

    /// Advance one filler cycle.
    ///
    /// Returns the pin levels when the scan loop ran this cycle.
    pub fn tick<S>(&mut self, store: &mut S) -> Option<ScanOutput<PORTS>>
    where
        S: ReadPort + WritePort + ?Sized,
    {
        self.ingest.tick(store, self.registers.ingress);

        self.controller
            .tick_filler(&self.registers, &mut self.filler);
        self.filler
            .tick(&self.registers, store, &mut self.buffers);

        self.scan_phase += 1;
        let output = if self.scan_phase >= self.scan_divider {
            self.scan_phase = 0;
            self.controller
                .tick_sender(&self.registers, &mut self.scanner);
            Some(self.scanner.tick(&self.registers.timing, &self.buffers))
        } else {
            None
        };

        self.controller
            .settle(&self.registers, &mut self.scanner);
        output
    }
}

impl<const PORTS: usize, const BANK_WORDS: usize, const FIFO: usize> core::fmt::Debug
    for Receiver<PORTS, BANK_WORDS, FIFO>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Receiver")
            .field("layout", &self.layout)
            .field("registers", &self.registers)
            .field("controller", &self.controller)
            .field("scan_divider", &self.scan_divider)
            .field("statistics", &self.statistics())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec;
    use std::vec::Vec;

    use super::*;
    use crate::frame_store::MemoryFrameStore;
    use crate::ingest::{IngressWord, DEFAULT_PORT};
    use crate::limiter::Limits;
    use crate::registers::ScanTiming;
    use crate::row_buffer::Bank;
    use crate::sender::PanelImage;
    use crate::Color;

    const WORDS: usize = 48;

    type Small = Receiver<1, WORDS, 1024>;

    /// One chain of one 64x64 panel per port, fast timing.
    fn small(buffering: Buffering) -> Small {
        let layout = PanelLayout::new(48, 1, 32).unwrap();
        let mut receiver = Small::new(layout, buffering, 1).unwrap();
        let regs = receiver.registers_mut();
        regs.cycle_length = 0;
        regs.fill_read = Limits::UNLIMITED;
        regs.ingress = Limits::UNLIMITED;
        regs.timing = ScanTiming {
            prelatch_cycles: 1,
            latch_cycles: 1,
            postlatch_cycles: 1,
            output_cycles: 1,
            addr_switch_cycles: 1,
        };
        receiver
    }

    fn step(receiver: &mut Small, store: &mut MemoryFrameStore<'_>) -> Option<ScanOutput<1>> {
        let output = receiver.tick(store);
        store.tick();
        let available = receiver.occupancy().available();
        assert!(available <= receiver.occupancy().max_buffers());
        output
    }

    #[test]
    fn test_rejects_small_banks() {
        let layout = PanelLayout::standard();
        assert_eq!(
            Receiver::<1, 48>::new(layout, Buffering::Double, 1).err(),
            Some(Error::BankTooSmall {
                capacity: 48,
                required: 96
            })
        );
        assert!(Receiver::<1, 96>::new(layout, Buffering::Double, 1).is_ok());
    }

    #[test]
    fn test_show_frame() {
        let mut receiver = Receiver::<8, 96>::new(PanelLayout::standard(), Buffering::Double, 3)
            .unwrap();
        receiver.show_frame(1).unwrap();
        assert_eq!(receiver.registers().base_addr, 49_152);
        receiver.show_frame(0).unwrap();
        assert_eq!(receiver.registers().base_addr, 0);
        assert_eq!(
            receiver.show_frame(5),
            Err(Error::FrameTooLarge { words: 49_152 })
        );
    }

    #[test]
    fn test_disabled_stays_idle() {
        let mut words = vec![0; 4096];
        let mut store = MemoryFrameStore::new(&mut words, 2);
        let mut receiver = small(Buffering::Double);
        for _ in 0..1000 {
            let output = step(&mut receiver, &mut store).unwrap();
            assert!(output.control.blank());
        }
        assert_eq!(store.reads(), 0);
        assert!(receiver.is_idle());
    }

    #[test]
    fn test_double_buffer_fills_ahead() {
        let mut words = vec![0; 4096];
        let mut store = MemoryFrameStore::new(&mut words, 2);
        let mut receiver = small(Buffering::Double);
        // a long plane 7 keeps the first row on screen for a while
        receiver.registers_mut().timing.output_cycles = 40;
        receiver.registers_mut().enable = true;

        let mut cycles = 0;
        while receiver.occupancy().available() < 2 || receiver.filler().is_busy() {
            step(&mut receiver, &mut store);
            cycles += 1;
            assert!(cycles < 10_000, "never filled two rows");
        }
        // two rows filled while the first is still being shown
        assert!(receiver.scanner().is_busy());
        assert_eq!(receiver.filler().rows_filled(), 2);

        // the filler is blocked until the scanner hands a bank back
        while receiver.occupancy().read() == 0 {
            assert_eq!(receiver.filler().rows_filled(), 2);
            step(&mut receiver, &mut store);
        }
        for _ in 0..2000 {
            step(&mut receiver, &mut store);
        }
        assert!(receiver.filler().rows_filled() > 2);
    }

    #[test]
    fn test_single_buffer_never_fills_ahead() {
        let mut words = vec![0; 4096];
        let mut store = MemoryFrameStore::new(&mut words, 2);
        let mut receiver = small(Buffering::Single);
        receiver.registers_mut().enable = true;
        for _ in 0..20_000 {
            step(&mut receiver, &mut store);
            assert_eq!(receiver.controller().sender_side().bank(), Bank::Zero);
            assert_eq!(receiver.controller().filler_side().bank(), Bank::Zero);
            if receiver.filler().is_busy() {
                assert!(!receiver.scanner().is_busy());
            }
        }
        assert!(receiver.statistics().rows_shown > 2);
    }

    #[test]
    fn test_disable_mid_row_resets() {
        let mut words = vec![0; 4096];
        let mut store = MemoryFrameStore::new(&mut words, 2);
        let mut receiver = small(Buffering::Double);
        receiver.registers_mut().enable = true;
        // run into the middle of the third row
        while receiver.statistics().rows_shown < 2 {
            step(&mut receiver, &mut store);
        }
        for _ in 0..100 {
            step(&mut receiver, &mut store);
        }
        assert!(receiver.scanner().is_busy());

        receiver.registers_mut().enable = false;
        let mut cycles = 0;
        while !(receiver.is_idle()
            && receiver.occupancy().written() == 0
            && receiver.occupancy().read() == 0)
        {
            step(&mut receiver, &mut store);
            cycles += 1;
            assert!(cycles < 10_000, "disable never settled");
        }
        // one more cycle parks both sides on bank 0, row 0
        step(&mut receiver, &mut store);
        assert_eq!(receiver.controller().filler_side().row(), 0);
        assert_eq!(receiver.controller().filler_side().bank(), Bank::Zero);
        assert_eq!(receiver.controller().sender_side().bank(), Bank::Zero);
        assert_eq!(receiver.scanner().row_address(), 0);

        // re-enable starts over at row 0
        let reads_before = store.reads();
        receiver.registers_mut().enable = true;
        step(&mut receiver, &mut store);
        step(&mut receiver, &mut store);
        assert!(receiver.filler().is_busy());
        assert!(store.reads() > reads_before);
        assert_eq!(receiver.controller().filler_side().row(), 0);
    }

    #[test]
    fn test_short_disable_pulse_keeps_rows_aligned() {
        let layout = PanelLayout::new(48, 1, 32).unwrap();
        let mut image = PanelImage::new();
        image.set_pixel(3, 0, Color::new(0xff, 0, 0));

        let mut words = vec![0; layout.frame_words(1)];
        let mut store = MemoryFrameStore::new(&mut words, 1);
        let mut receiver = small(Buffering::Double);
        for payload in image.datagrams(0, &layout, 0) {
            receiver.receive(DEFAULT_PORT, &payload).unwrap();
            while !receiver.ingest().is_empty() {
                step(&mut receiver, &mut store);
            }
        }

        receiver.registers_mut().timing.output_cycles = 20;
        receiver.registers_mut().enable = true;
        let mut cycles = 0;
        while !(receiver.occupancy().available() == 2
            && !receiver.filler().is_busy()
            && receiver.scanner().is_busy())
        {
            step(&mut receiver, &mut store);
            cycles += 1;
            assert!(cycles < 10_000, "filler never got ahead");
        }

        // drop enable for less time than the row on screen takes to finish
        receiver.registers_mut().enable = false;
        step(&mut receiver, &mut store);
        step(&mut receiver, &mut store);
        receiver.registers_mut().enable = true;
        assert!(receiver.controller().is_draining());

        let mut lit = Vec::new();
        for _ in 0..200_000 {
            if let Some(output) = step(&mut receiver, &mut store) {
                if output.control.clock() && output.ports[0].red1() {
                    lit.push(output.control.addr());
                }
            }
        }
        assert!(!receiver.controller().is_draining());
        assert!(!lit.is_empty());
        assert!(lit.iter().all(|&addr| addr == 0), "row 0 shown at {lit:?}");
    }

    #[test]
    fn test_ingest_scenario() {
        let mut words = vec![0; 4096];
        let mut store = MemoryFrameStore::new(&mut words, 0);
        let mut receiver = small(Buffering::Double);
        let ingest = receiver.ingest_mut();
        ingest.push(IngressWord::data(100)).unwrap();
        ingest.push(IngressWord::data(5)).unwrap();
        ingest.push(IngressWord::last(6)).unwrap();
        ingest.push(IngressWord::data(7)).unwrap();
        ingest.push(IngressWord::last(8)).unwrap();
        for _ in 0..10 {
            step(&mut receiver, &mut store);
        }
        assert_eq!(store.words()[100], 5);
        assert_eq!(store.words()[101], 6);
        assert_eq!(store.words()[7], 8);
        assert_eq!(receiver.statistics().ingress_writes, 3);
    }

    #[test]
    fn test_scan_divider() {
        let layout = PanelLayout::new(48, 1, 32).unwrap();
        let mut receiver = Small::new(layout, Buffering::Double, 3).unwrap();
        let mut words = vec![0; 16];
        let mut store = MemoryFrameStore::new(&mut words, 0);
        let scans = (0..30)
            .filter(|_| step(&mut receiver, &mut store).is_some())
            .count();
        assert_eq!(scans, 10);
    }

    /// Collect the pin levels of the first plane 7 pass of the first row.
    fn first_plane(receiver: &mut Small, store: &mut MemoryFrameStore<'_>) -> Vec<ScanOutput<1>> {
        let mut columns = Vec::new();
        while columns.len() < 64 {
            if let Some(output) = step(receiver, store) {
                if output.control.clock() {
                    columns.push(output);
                }
            }
        }
        columns
    }

    #[test]
    fn test_image_reaches_the_pins() {
        let layout = PanelLayout::new(48, 1, 32).unwrap();
        let mut image = PanelImage::new();
        image.set_pixel(3, 0, Color::new(0xff, 0, 0));
        image.set_pixel(5, 32, Color::new(0, 0, 0x80));

        let mut words = vec![0; layout.frame_words(1)];
        let mut store = MemoryFrameStore::new(&mut words, 1);
        let mut receiver = small(Buffering::Double);
        for payload in image.datagrams(0, &layout, 0) {
            receiver.receive(DEFAULT_PORT, &payload).unwrap();
            while !receiver.ingest().is_empty() {
                step(&mut receiver, &mut store);
            }
        }
        assert_eq!(receiver.statistics().ingress_writes, 64 * 48);

        receiver.registers_mut().enable = true;
        let columns = first_plane(&mut receiver, &mut store);
        for (x, output) in columns.iter().enumerate() {
            let port = output.ports[0];
            assert_eq!(port.red1(), x == 3, "column {x}");
            assert_eq!(port.blu2(), x == 5, "column {x}");
            assert!(!port.grn1() && !port.grn2() && !port.red2() && !port.blu1());
            assert_eq!(output.control.addr(), 0);
        }
    }

    #[test]
    fn test_show_frame_selects_half() {
        let layout = PanelLayout::new(48, 1, 32).unwrap();
        let frame = layout.frame_words(1);
        let mut first = PanelImage::new();
        first.fill(Color::new(0xff, 0, 0));
        let mut second = PanelImage::new();
        second.fill(Color::new(0, 0xff, 0));

        let mut words = vec![0; 2 * frame];
        let mut store = MemoryFrameStore::new(&mut words, 1);
        let mut receiver = small(Buffering::Double);
        let payloads = first
            .datagrams(0, &layout, 0)
            .chain(second.datagrams(0, &layout, frame as u32));
        for payload in payloads {
            receiver.receive(DEFAULT_PORT, &payload).unwrap();
            while !receiver.ingest().is_empty() {
                step(&mut receiver, &mut store);
            }
        }

        receiver.show_frame(1).unwrap();
        receiver.registers_mut().enable = true;
        let columns = first_plane(&mut receiver, &mut store);
        assert!(columns.iter().all(|c| c.ports[0].grn1() && !c.ports[0].red1()));
    }
}

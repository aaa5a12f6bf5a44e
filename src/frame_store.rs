//! Frame store ports.
//!
//! The frame store is the large memory holding whole frames. It lives
//! outside this crate (SDRAM behind a DMA engine on real hardware), so the
//! pipeline only talks to it through two streaming ports:
//!
//! - [`ReadPort`]: address requests in, data responses out, in order. The
//!   number of requests still waiting for their response is observable so the
//!   row filler can tell when a transfer has fully drained.
//! - [`WritePort`]: address and data in, no response.
//!
//! [`MemoryFrameStore`] implements both over a word slice, with a fixed read
//! latency and a bounded number of reads in flight.

use heapless::Deque;

/// Streaming read side of the frame store.
pub trait ReadPort {
    /// Whether a read request can be accepted this cycle.
    fn can_request(&self) -> bool;

    /// Issue a read of one word.
    fn request(&mut self, address: u32);

    /// Take the oldest response, if it has arrived.
    fn response(&mut self) -> Option<u32>;

    /// Requests issued whose response has not been taken yet.
    fn pending(&self) -> usize;
}

/// Streaming write side of the frame store.
pub trait WritePort {
    /// Whether a write can be accepted this cycle.
    fn can_write(&self) -> bool;

    /// Write one word.
    fn write(&mut self, address: u32, data: u32);
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    data: u32,
    wait: u8,
}

/// Frame store backed by a word slice.
///
/// `IN_FLIGHT` bounds the reads that may be outstanding at once. Each read
/// becomes available `latency` calls to [`tick`](Self::tick) after it was
/// requested. Addresses outside the slice read as zero and ignore writes.
pub struct MemoryFrameStore<'a, const IN_FLIGHT: usize = 8> {
    words: &'a mut [u32],
    latency: u8,
    in_flight: Deque<InFlight, IN_FLIGHT>,
    reads: usize,
    writes: usize,
}

impl<'a, const IN_FLIGHT: usize> MemoryFrameStore<'a, IN_FLIGHT> {
    /// Wrap `words` with the given read latency in cycles.
    pub fn new(words: &'a mut [u32], latency: u8) -> Self {
        Self {
            words,
            latency,
            in_flight: Deque::new(),
            reads: 0,
            writes: 0,
        }
    }

    /// Advance one cycle.
    pub fn tick(&mut self) {
        for entry in self.in_flight.iter_mut() {
            entry.wait = entry.wait.saturating_sub(1);
        }
    }

    /// The backing words.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        self.words
    }

    /// Mutable access to the backing words, bypassing the ports.
    pub fn words_mut(&mut self) -> &mut [u32] {
        self.words
    }

    /// Reads requested so far.
    #[must_use]
    pub const fn reads(&self) -> usize {
        self.reads
    }

    /// Writes accepted so far.
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }
}

impl<const IN_FLIGHT: usize> ReadPort for MemoryFrameStore<'_, IN_FLIGHT> {
    fn can_request(&self) -> bool {
        !self.in_flight.is_full()
    }

    fn request(&mut self, address: u32) {
        let data = self.words.get(address as usize).copied().unwrap_or(0);
        let entry = InFlight {
            data,
            wait: self.latency,
        };
        if self.in_flight.push_back(entry).is_ok() {
            self.reads += 1;
        }
    }

    fn response(&mut self) -> Option<u32> {
        match self.in_flight.front() {
            Some(entry) if entry.wait == 0 => self.in_flight.pop_front().map(|e| e.data),
            _ => None,
        }
    }

    fn pending(&self) -> usize {
        self.in_flight.len()
    }
}

impl<const IN_FLIGHT: usize> WritePort for MemoryFrameStore<'_, IN_FLIGHT> {
    fn can_write(&self) -> bool {
        true
    }

    fn write(&mut self, address: u32, data: u32) {
        if let Some(slot) = self.words.get_mut(address as usize) {
            *slot = data;
            self.writes += 1;
        }
    }
}

impl<const IN_FLIGHT: usize> core::fmt::Debug for MemoryFrameStore<'_, IN_FLIGHT> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryFrameStore")
            .field("words", &self.words.len())
            .field("latency", &self.latency)
            .field("pending", &self.in_flight.len())
            .field("reads", &self.reads)
            .field("writes", &self.writes)
            .finish()
    }
}

//! Network ingest pipeline.
//!
//! Pixel data arrives as UDP datagrams, each one an address-prefixed write:
//!
//! ```text
//! +----------------+----------------+----------------+-----+
//! | address (LE)   | data 0 (BE)    | data 1 (BE)    | ... |
//! +----------------+----------------+----------------+-----+
//! ```
//!
//! The first word of a message is a frame store word address, the following
//! words are written at consecutive addresses and the last word of the
//! datagram carries the end-of-message flag. After it the next word is an
//! address again.
//!
//! Datagrams are split into [`IngressWord`]s and queued in a bounded FIFO.
//! [`Ingest::tick`] drains the FIFO into the frame store write port through
//! its own rate limiter, so bulk uploads cannot starve the row filler.
//!
//! The parser never fails. A lone address word flagged as end-of-message is
//! dropped and the parser keeps expecting an address.

use heapless::Deque;

use crate::error::{Error, Result};
use crate::frame_store::WritePort;
use crate::limiter::{Limits, RateLimiter};

/// UDP port pixel data is accepted on.
pub const DEFAULT_PORT: u16 = 4343;

/// Width of the frame store word address carried by a message.
pub const ADDRESS_BITS: u32 = 18;

const ADDRESS_MASK: u32 = (1 << ADDRESS_BITS) - 1;

/// One word of the ingress stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IngressWord {
    /// Address or pixel data.
    pub data: u32,
    /// Last word of its message.
    pub end: bool,
}

impl IngressWord {
    /// A word in the middle of a message.
    #[must_use]
    pub const fn data(data: u32) -> Self {
        Self { data, end: false }
    }

    /// The last word of a message.
    #[must_use]
    pub const fn last(data: u32) -> Self {
        Self { data, end: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum ParseState {
    ExpectAddress,
    Streaming { address: u32 },
}

/// Ingress FIFO, message parser and write-side rate limiter.
#[derive(Debug)]
pub struct Ingest<const DEPTH: usize = 1024> {
    port: u16,
    fifo: Deque<IngressWord, DEPTH>,
    state: ParseState,
    limiter: RateLimiter,
    writes: u32,
    recoveries: u32,
}

impl<const DEPTH: usize> Ingest<DEPTH> {
    /// Create a pipeline accepting datagrams for `port`.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            port,
            fifo: Deque::new(),
            state: ParseState::ExpectAddress,
            limiter: RateLimiter::default(),
            writes: 0,
            recoveries: 0,
        }
    }

    /// UDP port datagrams must be addressed to.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Queue a whole datagram.
    ///
    /// The leading address word is little-endian, pixel words are
    /// big-endian. Trailing bytes that do not fill a word are dropped.
    /// Returns the number of words queued.
    ///
    /// # Errors
    ///
    /// - [`Error::PortMismatch`] if `dst_port` is not ours.
    /// - [`Error::IngressOverflow`] if the FIFO cannot take every word; in
    ///   that case nothing is queued.
    pub fn receive(&mut self, dst_port: u16, payload: &[u8]) -> Result<usize> {
        if dst_port != self.port {
            return Err(Error::PortMismatch { port: dst_port });
        }
        let chunks = payload.chunks_exact(4);
        if !chunks.remainder().is_empty() {
            self.recoveries = self.recoveries.wrapping_add(1);
            warn!("dropping {} trailing datagram bytes", chunks.remainder().len());
        }
        let words = chunks.len();
        if words == 0 {
            return Ok(0);
        }
        let free = self.fifo.capacity() - self.fifo.len();
        if words > free {
            warn!("ingress FIFO full, dropping {} words", words);
            return Err(Error::IngressOverflow { words });
        }
        for (index, chunk) in chunks.enumerate() {
            let bytes = [chunk[0], chunk[1], chunk[2], chunk[3]];
            let data = if index == 0 {
                u32::from_le_bytes(bytes)
            } else {
                u32::from_be_bytes(bytes)
            };
            let word = IngressWord {
                data,
                end: index + 1 == words,
            };
            // capacity was checked above
            let _ = self.fifo.push_back(word);
        }
        Ok(words)
    }

    /// Queue a single stream word.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IngressOverflow`] if the FIFO is full.
    pub fn push(&mut self, word: IngressWord) -> Result<()> {
        self.fifo
            .push_back(word)
            .map_err(|_| Error::IngressOverflow { words: 1 })
    }

    /// Words waiting in the FIFO.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    /// Whether the FIFO is drained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    /// Words written to the frame store so far.
    #[must_use]
    pub const fn writes(&self) -> u32 {
        self.writes
    }

    /// Malformed messages recovered from so far.
    #[must_use]
    pub const fn recoveries(&self) -> u32 {
        self.recoveries
    }

    /// Move at most one word from the FIFO into the parser.
    pub fn tick<W>(&mut self, store: &mut W, limits: Limits)
    where
        W: WritePort + ?Sized,
    {
        self.limiter.set_limits(limits);

        let mut moved = false;
        if self.limiter.is_open() {
            if let Some(&word) = self.fifo.front() {
                match self.state {
                    ParseState::ExpectAddress => {
                        self.fifo.pop_front();
                        if word.end {
                            self.recoveries = self.recoveries.wrapping_add(1);
                            warn!("message without data at {}", word.data & ADDRESS_MASK);
                        } else {
                            self.state = ParseState::Streaming {
                                address: word.data & ADDRESS_MASK,
                            };
                        }
                        moved = true;
                    }
                    ParseState::Streaming { address } => {
                        if store.can_write() {
                            self.fifo.pop_front();
                            store.write(address, word.data);
                            self.writes = self.writes.wrapping_add(1);
                            self.state = if word.end {
                                ParseState::ExpectAddress
                            } else {
                                ParseState::Streaming {
                                    address: (address + 1) & ADDRESS_MASK,
                                }
                            };
                            moved = true;
                        }
                    }
                }
            }
        }
        self.limiter.clock(moved);
    }
}

impl<const DEPTH: usize> Default for Ingest<DEPTH> {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}

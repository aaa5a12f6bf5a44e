//! Error type for configuration and construction.
//!
//! The real-time `tick` paths never fail: they either make progress or stall
//! until the next cycle. Errors only come out of the APIs that build or
//! reconfigure the pipeline, and out of datagram ingress.

use derive_more::{Display, Error};

/// Errors reported when building or feeding the receiver.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Row depth must be 48 (packed 24-bit pixels) or 64 (one pixel per word).
    #[display("unsupported row depth of {words} words, expected 48 or 64")]
    UnsupportedDepth {
        /// The rejected depth.
        words: usize,
    },
    /// At least one panel must be chained on each output port.
    #[display("panel chain length {chain} is invalid")]
    InvalidChain {
        /// The rejected chain length.
        chain: usize,
    },
    /// Scan rows must fit the five row-address lines (1..=32).
    #[display("{rows} scan rows do not fit the row address lines")]
    InvalidScanRows {
        /// The rejected row count.
        rows: usize,
    },
    /// A row buffer bank cannot hold one lane's worth of words.
    #[display("row buffer bank holds {capacity} words but a lane needs {required}")]
    BankTooSmall {
        /// Words per bank.
        capacity: usize,
        /// Words one lane needs.
        required: usize,
    },
    /// Shifter output must be 1..=source bits wide and source at most 32 bits.
    #[display("cannot shift {output}-bit windows out of {source_bits}-bit words")]
    InvalidShifterWidth {
        /// Source word width.
        source_bits: u8,
        /// Output window width.
        output: u8,
    },
    /// A datagram arrived for a different UDP port.
    #[display("datagram for port {port} ignored")]
    PortMismatch {
        /// The datagram's destination port.
        port: u16,
    },
    /// The ingress FIFO cannot take the whole datagram.
    #[display("ingress FIFO full, {words} words dropped")]
    IngressOverflow {
        /// Number of words that did not fit.
        words: usize,
    },
    /// No register lives at this offset or name.
    #[display("no register at offset {offset:#x}")]
    UnknownRegister {
        /// The requested CSR offset.
        offset: u32,
    },
    /// The layout's frame does not fit the frame store.
    #[display("frame of {words} words does not fit the frame store")]
    FrameTooLarge {
        /// Words in one frame.
        words: usize,
    },
}

/// Convenience alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;

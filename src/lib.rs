//! Receiver pipeline for HUB75 LED matrix walls.
//!
//! This crate models, cycle by cycle, the gateware of a network-fed LED wall
//! controller: pixel data arrives over UDP, lands in a large frame store, is
//! copied row by row into small per-lane row buffers, and is scanned out to
//! the panels with binary code modulation.
//!
//! ## How HUB75 panels are driven
//!
//! A HUB75 panel is a chain of shift registers, not a memory. Nothing stays
//! lit unless the controller keeps streaming.
//!
//! ### Signal names
//! - **R1 G1 B1 / R2 G2 B2** – colour data for the upper and lower half of
//!   the panel. The two halves are scanned in parallel, so one connector
//!   carries two lanes.
//! - **CLK** – shift clock; every pulse moves the six colour bits one column
//!   along the chain
//! - **LAT** – latch; copies the shift registers into the LED drivers
//! - **OE** – output enable (active LOW on the wire, reported here as
//!   `blank`)
//! - **A B C D E** – row address, selecting which row of each half is lit
//!
//! ### One row, eight planes
//! Each 8-bit colour channel is shown as eight bit-planes. For plane `p` the
//! controller shifts in bit `p` of every pixel of the row, blanks, latches,
//! and lights the panel for `output_cycles << p` ticks. Showing all eight
//! planes with these 1:2:4:...:128 weights gives 256 intensity levels per
//! channel. This is Binary Code Modulation (BCM).
//!
//! Shifting plane `p - 1` overlaps with lighting plane `p`, so the panel is
//! only dark for the short blank-latch window between planes and while the
//! address lines move to the next row.
//!
//! ## Pipeline
//!
//! ```text
//! UDP --> ingest::Ingest --limiter--> frame store
//!                                         |
//!                           limiter (read)|
//!                                         v
//!                          filler::RowFiller --limiter (write)--> row_buffer::RowBuffer
//!                                         ^                              |
//!                                         |                              v
//!                        controller::Controller <---------- scan::ScanDriver --> pins
//! ```
//!
//! - [`limiter`] – the credit gate used at all three rate-limited boundaries
//! - [`shifter`] – slides pixel-wide windows over packed row words
//! - [`row_buffer`] – two banks per lane, one written while the other is shown
//! - [`filler`] – copies one row of every lane out of the frame store
//! - [`scan`] – the data, enable and row coordinator state machines
//! - [`controller`] – occupancy counters and bank ownership between the two
//!   loops
//! - [`ingest`] – address-prefixed write protocol and its FIFO
//! - [`receiver`] – everything wired together behind one `tick`
//! - [`sender`] – encodes `embedded-graphics` images into datagrams
//!
//! The frame store itself is external and reached through the
//! [`frame_store::ReadPort`] and [`frame_store::WritePort`] traits.
//! [`frame_store::MemoryFrameStore`] implements both over a word slice.
//!
//! ## Example
//!
//! ```rust
//! use hub75_receiver::controller::Buffering;
//! use hub75_receiver::frame_store::MemoryFrameStore;
//! use hub75_receiver::layout::PanelLayout;
//! use hub75_receiver::receiver::Receiver;
//!
//! let layout = PanelLayout::new(48, 1, 32).unwrap();
//! let mut receiver = Receiver::<1, 48>::new(layout, Buffering::Double, 3).unwrap();
//! let mut words = [0u32; 3072];
//! let mut store = MemoryFrameStore::<8>::new(&mut words, 4);
//!
//! receiver.registers_mut().enable = true;
//! for _ in 0..1000 {
//!     if let Some(pins) = receiver.tick(&mut store) {
//!         // drive the connector with pins.control and pins.ports
//!         let _ = pins.control.bits();
//!     }
//!     store.tick();
//! }
//! assert!(receiver.statistics().rows_filled > 0);
//! ```
//!
//! ## Available Feature Flags
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the public types and routes the crate's
//! internal log messages to `defmt`.
//!
//! ### `log` Feature
//! Routes the crate's internal log messages to the `log` facade. Ignored
//! when `defmt` is also enabled.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

#[macro_use]
mod fmt;

pub mod controller;
pub mod error;
pub mod filler;
pub mod frame_store;
pub mod ingest;
pub mod layout;
pub mod limiter;
pub mod receiver;
pub mod registers;
pub mod row_buffer;
pub mod scan;
pub mod sender;
pub mod shifter;
pub mod signals;

use embedded_graphics::pixelcolor::Rgb888;

pub use error::{Error, Result};
pub use receiver::Receiver;

/// Color type used for images and pixel words
pub type Color = Rgb888;

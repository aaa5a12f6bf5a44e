//! Client-side frame encoding.
//!
//! [`PanelImage`] is a 64x64 `embedded-graphics` canvas for one panel. Its
//! [`datagrams`](PanelImage::datagrams) iterator encodes the image in the
//! wire format [`Ingest::receive`](crate::ingest::Ingest::receive) expects,
//! four panel rows per datagram so every payload stays under a 1500 byte
//! Ethernet frame:
//!
//! ```text
//! offset (u32 LE) | row r pixels | row r+1 pixels | row r+2 | row r+3
//! ```
//!
//! Pixels are `R G B` bytes for 48-word rows and `0 R G B` for 64-word
//! rows.
//!
//! Register writes go out as Etherbone packets, see [`etherbone_write`].
//!
//! # Example
//! ```rust
//! use embedded_graphics::prelude::*;
//! use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
//! use hub75_receiver::layout::PanelLayout;
//! use hub75_receiver::sender::PanelImage;
//! use hub75_receiver::Color;
//!
//! let mut image = PanelImage::new();
//! Rectangle::new(Point::new(0, 0), Size::new(8, 8))
//!     .into_styled(PrimitiveStyle::with_fill(Color::RED))
//!     .draw(&mut image)
//!     .unwrap();
//!
//! let layout = PanelLayout::standard();
//! let datagrams: usize = image.datagrams(0, &layout, 0).count();
//! assert_eq!(datagrams, 16);
//! ```

use core::convert::Infallible;

use embedded_graphics::pixelcolor::RgbColor;
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Pixel, Size};
use heapless::Vec;

use crate::layout::{PanelLayout, RowDepth, PANEL_COLS};
use crate::signals::pixel_word;
use crate::Color;

/// Rows of a panel image.
pub const PANEL_ROWS: usize = 64;

/// Panel rows carried by one datagram.
pub const ROWS_PER_DATAGRAM: usize = 4;

/// Largest payload [`PanelImage::datagrams`] produces.
pub const MAX_PAYLOAD: usize = 4 + ROWS_PER_DATAGRAM * PANEL_COLS * 4;

/// One encoded datagram.
pub type Payload = Vec<u8, MAX_PAYLOAD>;

/// UDP port of the Etherbone register bridge.
pub const ETHERBONE_PORT: u16 = 1234;

const ETHERBONE_MAGIC: u32 = 0x4e6f_1044;
const ETHERBONE_RECORD: u32 = 0x00ff_0100;

/// Length of an Etherbone write packet.
pub const ETHERBONE_PACKET: usize = 20;

/// Encode a single 32-bit register write as an Etherbone packet.
///
/// `address` is the CSR bus address of the register.
#[must_use]
pub fn etherbone_write(address: u32, value: u32) -> [u8; ETHERBONE_PACKET] {
    let mut packet = [0; ETHERBONE_PACKET];
    let fields = [ETHERBONE_MAGIC, 0, ETHERBONE_RECORD, address, value];
    for (chunk, field) in packet.chunks_exact_mut(4).zip(fields) {
        chunk.copy_from_slice(&field.to_be_bytes());
    }
    packet
}

/// Image of one 64x64 panel.
#[derive(Clone, PartialEq, Eq)]
pub struct PanelImage {
    pixels: [[Color; PANEL_COLS]; PANEL_ROWS],
}

impl PanelImage {
    /// A black image.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pixels: [[Color::BLACK; PANEL_COLS]; PANEL_ROWS],
        }
    }

    /// Fill the whole image with `color`.
    pub fn fill(&mut self, color: Color) {
        self.pixels = [[color; PANEL_COLS]; PANEL_ROWS];
    }

    /// Pixel at column `x`, row `y`.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<Color> {
        self.pixels.get(y).and_then(|row| row.get(x)).copied()
    }

    /// Set one pixel. Out-of-bounds coordinates are ignored.
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color) {
        if let Some(pixel) = self.pixels.get_mut(y).and_then(|row| row.get_mut(x)) {
            *pixel = color;
        }
    }

    /// Encode the image as sender panel `panel` of a frame at word address
    /// `base`.
    #[must_use]
    pub fn datagrams<'a>(&'a self, panel: usize, layout: &PanelLayout, base: u32) -> Datagrams<'a> {
        let rows = PANEL_ROWS.min(2 * layout.scan_rows());
        Datagrams {
            image: self,
            depth: layout.depth(),
            origin: base.wrapping_add(layout.panel_offset(panel) as u32),
            rows,
            next_row: 0,
        }
    }
}

impl Default for PanelImage {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for PanelImage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PanelImage")
            .field("size", &(PANEL_COLS, PANEL_ROWS))
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PanelImage {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "PanelImage<{}x{}>", PANEL_COLS, PANEL_ROWS);
    }
}

impl OriginDimensions for PanelImage {
    fn size(&self) -> Size {
        Size::new(PANEL_COLS as u32, PANEL_ROWS as u32)
    }
}

impl DrawTarget for PanelImage {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(point.x as usize, point.y as usize, color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color);
        Ok(())
    }
}

/// Iterator over the datagrams of one panel image.
#[derive(Debug, Clone)]
pub struct Datagrams<'a> {
    image: &'a PanelImage,
    depth: RowDepth,
    origin: u32,
    rows: usize,
    next_row: usize,
}

impl Iterator for Datagrams<'_> {
    type Item = Payload;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_row >= self.rows {
            return None;
        }
        let first = self.next_row;
        let last = (first + ROWS_PER_DATAGRAM).min(self.rows);
        self.next_row = last;

        let offset = self
            .origin
            .wrapping_add((first * self.depth.words()) as u32);
        let mut payload = Payload::new();
        payload.extend_from_slice(&offset.to_le_bytes()).ok()?;
        for row in &self.image.pixels[first..last] {
            for &color in row {
                let bytes = pixel_word(color).to_be_bytes();
                let bytes = match self.depth {
                    RowDepth::Padded32 => &bytes[..],
                    RowDepth::Packed24 => &bytes[1..],
                };
                payload.extend_from_slice(bytes).ok()?;
            }
        }
        Some(payload)
    }
}

//! Panel wall geometry and frame store addressing.
//!
//! The receiver drives `PORTS` HUB75 connectors. Each connector carries a
//! chain of `chain` panels of [`PANEL_COLS`] columns, and each connector has
//! two lanes: the upper half of the chain (R1 G1 B1) and the lower half
//! (R2 G2 B2). A lane scans `scan_rows` rows, so a panel is
//! `2 * scan_rows` pixels tall.
//!
//! # Frame store layout
//! The frame store is a flat array of 32-bit words. One panel row takes
//! `depth` words, and the rows of one panel half form a block of
//! `scan_rows * depth` words. Blocks are numbered
//! `(port * chain + link) * 2 + line`, so a sender can treat panel `n` as
//! `2 * scan_rows` consecutive rows starting at
//! [`PanelLayout::panel_offset`]. The store holds two such frames back to
//! back; the scanned one is selected with the `base_addr` register.

use crate::error::{Error, Result};

/// Columns per panel.
pub const PANEL_COLS: usize = 64;

/// Bit-planes scanned per row.
pub const PLANES: u8 = 8;

/// Largest scan row count the five address lines can select.
pub const MAX_SCAN_ROWS: usize = 32;

/// How pixels are packed into frame store words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RowDepth {
    /// 24-bit RGB packed back to back, 48 words per 64-pixel row.
    Packed24,
    /// One `0x00RRGGBB` word per pixel, 64 words per row.
    Padded32,
}

impl RowDepth {
    /// Pick the depth matching a words-per-row count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedDepth`] for anything but 48 or 64.
    pub const fn from_words(words: usize) -> Result<Self> {
        match words {
            48 => Ok(Self::Packed24),
            64 => Ok(Self::Padded32),
            _ => Err(Error::UnsupportedDepth { words }),
        }
    }

    /// Words per panel row.
    #[must_use]
    pub const fn words(self) -> usize {
        match self {
            Self::Packed24 => 48,
            Self::Padded32 => 64,
        }
    }

    /// Bits per pixel in the packed stream.
    #[must_use]
    pub const fn pixel_bits(self) -> u8 {
        match self {
            Self::Packed24 => 24,
            Self::Padded32 => 32,
        }
    }

    /// Bytes per pixel on the wire.
    #[must_use]
    pub const fn pixel_bytes(self) -> usize {
        self.pixel_bits() as usize / 8
    }
}

/// Validated geometry of the panel wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelLayout {
    depth: RowDepth,
    chain: usize,
    scan_rows: usize,
}

impl PanelLayout {
    /// Create a layout.
    ///
    /// * `depth_words` - words per panel row, 48 or 64
    /// * `chain` - panels chained on each port
    /// * `scan_rows` - rows per lane, at most [`MAX_SCAN_ROWS`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedDepth`], [`Error::InvalidChain`] or
    /// [`Error::InvalidScanRows`] when a parameter is out of range.
    pub const fn new(depth_words: usize, chain: usize, scan_rows: usize) -> Result<Self> {
        let depth = match RowDepth::from_words(depth_words) {
            Ok(depth) => depth,
            Err(e) => return Err(e),
        };
        if chain == 0 {
            return Err(Error::InvalidChain { chain });
        }
        if scan_rows == 0 || scan_rows > MAX_SCAN_ROWS {
            return Err(Error::InvalidScanRows { rows: scan_rows });
        }
        Ok(Self {
            depth,
            chain,
            scan_rows,
        })
    }

    /// Two 64x64 panels per port, packed 24-bit pixels, 1/32 scan.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            depth: RowDepth::Packed24,
            chain: 2,
            scan_rows: MAX_SCAN_ROWS,
        }
    }

    /// Pixel packing.
    #[must_use]
    pub const fn depth(&self) -> RowDepth {
        self.depth
    }

    /// Panels per port.
    #[must_use]
    pub const fn chain(&self) -> usize {
        self.chain
    }

    /// Rows per lane.
    #[must_use]
    pub const fn scan_rows(&self) -> usize {
        self.scan_rows
    }

    /// Row buffer words needed for one lane.
    #[must_use]
    pub const fn lane_words(&self) -> usize {
        self.chain * self.depth.words()
    }

    /// Pixels clocked out per lane per plane.
    #[must_use]
    pub const fn lane_pixels(&self) -> usize {
        self.chain * PANEL_COLS
    }

    /// Frame store words of one full frame for `ports` connectors.
    #[must_use]
    pub const fn frame_words(&self, ports: usize) -> usize {
        ports * self.chain * 2 * self.scan_rows * self.depth.words()
    }

    /// Word offset of sender panel `panel` within a frame.
    #[must_use]
    pub const fn panel_offset(&self, panel: usize) -> usize {
        panel * 2 * self.scan_rows * self.depth.words()
    }

    /// Frame store address of one panel row feeding a lane.
    ///
    /// * `port` - output connector
    /// * `line` - 0 for the upper lane, 1 for the lower lane
    /// * `link` - panel position in the chain
    #[must_use]
    pub const fn source_address(
        &self,
        base: u32,
        row: usize,
        port: usize,
        line: usize,
        link: usize,
    ) -> u32 {
        let block = (port * self.chain + link) * 2 + line;
        let offset = self.depth.words() * (block * self.scan_rows + row);
        base.wrapping_add(offset as u32)
    }
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self::standard()
    }
}

//! Double-banked row memories.
//!
//! Each lane owns a [`RowBuffer`] with two banks of `BANK_WORDS` words. The
//! row filler writes one bank while the scan driver reads the other; the
//! controller decides which side owns which bank. Nothing here enforces that
//! rule: a bank is only ever handed to one side at a time.
//!
//! # Memory Layout
//! Both banks sit back to back in one `#[repr(C)]` block so the whole buffer
//! can be handed to a DMA engine through [`ReadBuffer`].

use embedded_dma::ReadBuffer;

/// One of the two banks of a row buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bank {
    /// First bank, also the only bank when single buffered.
    #[default]
    Zero,
    /// Second bank.
    One,
}

impl Bank {
    /// The other bank.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }

    /// Array index of this bank.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

/// Two banks of one lane's expanded pixel row.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(C)]
#[repr(align(4))]
pub struct RowBuffer<const BANK_WORDS: usize> {
    banks: [[u32; BANK_WORDS]; 2],
}

impl<const BANK_WORDS: usize> RowBuffer<BANK_WORDS> {
    /// A zeroed buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            banks: [[0; BANK_WORDS]; 2],
        }
    }

    /// Read access to one bank.
    #[must_use]
    pub fn bank(&self, bank: Bank) -> &[u32; BANK_WORDS] {
        &self.banks[bank.index()]
    }

    /// Write one word into a bank. Offsets past the bank are dropped.
    pub fn write(&mut self, bank: Bank, offset: usize, word: u32) {
        if let Some(slot) = self.banks[bank.index()].get_mut(offset) {
            *slot = word;
        }
    }

    /// Zero both banks.
    pub fn clear(&mut self) {
        self.banks = [[0; BANK_WORDS]; 2];
    }
}

impl<const BANK_WORDS: usize> Default for RowBuffer<BANK_WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

/// Row buffers of every lane, indexed `[port][line]`.
pub type LaneBuffers<const PORTS: usize, const BANK_WORDS: usize> =
    [[RowBuffer<BANK_WORDS>; 2]; PORTS];

unsafe impl<const BANK_WORDS: usize> ReadBuffer for RowBuffer<BANK_WORDS> {
    type Word = u32;

    unsafe fn read_buffer(&self) -> (*const u32, usize) {
        let ptr = self.banks.as_ptr().cast::<u32>();
        let len = 2 * BANK_WORDS;
        (ptr, len)
    }
}

#[cfg(feature = "defmt")]
impl<const BANK_WORDS: usize> defmt::Format for RowBuffer<BANK_WORDS> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "RowBuffer<{}>", BANK_WORDS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_toggle() {
        assert_eq!(Bank::Zero.toggled(), Bank::One);
        assert_eq!(Bank::One.toggled(), Bank::Zero);
        assert_eq!(Bank::default(), Bank::Zero);
        assert_eq!(Bank::Zero.index(), 0);
        assert_eq!(Bank::One.index(), 1);
    }

    #[test]
    fn test_banks_are_independent() {
        let mut buffer = RowBuffer::<4>::new();
        buffer.write(Bank::Zero, 1, 0xaa);
        buffer.write(Bank::One, 1, 0xbb);
        assert_eq!(buffer.bank(Bank::Zero), &[0, 0xaa, 0, 0]);
        assert_eq!(buffer.bank(Bank::One), &[0, 0xbb, 0, 0]);
    }

    #[test]
    fn test_out_of_range_write_dropped() {
        let mut buffer = RowBuffer::<2>::new();
        buffer.write(Bank::One, 2, 7);
        assert_eq!(buffer, RowBuffer::new());
    }

    #[test]
    fn test_clear() {
        let mut buffer = RowBuffer::<3>::new();
        buffer.write(Bank::Zero, 0, 1);
        buffer.write(Bank::One, 2, 2);
        buffer.clear();
        assert_eq!(buffer, RowBuffer::default());
    }

    #[test]
    fn test_read_buffer_covers_both_banks() {
        let mut buffer = RowBuffer::<5>::new();
        buffer.write(Bank::One, 4, 0x1234);
        let (ptr, len) = unsafe { buffer.read_buffer() };
        assert_eq!(len, 10);
        let words = unsafe { core::slice::from_raw_parts(ptr, len) };
        assert_eq!(words[9], 0x1234);
        assert_eq!(ptr, buffer.bank(Bank::Zero).as_ptr());
    }
}

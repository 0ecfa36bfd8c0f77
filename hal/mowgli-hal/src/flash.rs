//! Flash storage abstractions
//!
//! Describes non-volatile memory the way the configuration store uses it:
//! a fixed region that is erased as a whole and then programmed one 32-bit
//! word at a time in address order.

/// Width of a single program operation in bytes
pub const WORD_SIZE: usize = 4;

/// Value every byte reads back as after an erase
pub const ERASED_BYTE: u8 = 0xFF;

/// A fixed, word-aligned window of non-volatile memory
///
/// Addresses are absolute device addresses. The length is always a whole
/// number of words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StorageRegion {
    /// First byte of the region
    pub base: u32,
    /// Length in bytes (multiple of [`WORD_SIZE`])
    pub len: u32,
}

impl StorageRegion {
    /// Create a region holding `payload_len` bytes, rounded up to whole words
    pub const fn new(base: u32, payload_len: usize) -> Self {
        let words = payload_len.div_ceil(WORD_SIZE);
        Self {
            base,
            len: (words * WORD_SIZE) as u32,
        }
    }

    /// One past the last byte of the region
    pub const fn end(&self) -> u32 {
        self.base + self.len
    }

    /// Number of program words in the region
    pub const fn word_count(&self) -> usize {
        self.len as usize / WORD_SIZE
    }

    /// Address of the `index`-th word
    pub const fn word_address(&self, index: usize) -> u32 {
        self.base + (index * WORD_SIZE) as u32
    }

    /// Check whether `[address, address + len)` lies inside the region
    pub const fn contains(&self, address: u32, len: usize) -> bool {
        address >= self.base && (address as u64 + len as u64) <= self.end() as u64
    }
}

/// Errors from flash storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Erase reported failure
    Erase,
    /// Word program reported failure
    Program,
    /// Read reported failure
    Read,
    /// Device did not complete the operation
    Timeout,
    /// Address outside the device or region
    OutOfRange,
    /// Address not aligned to a program word
    Unaligned,
}

/// Block-erase, word-program non-volatile storage
///
/// All three operations block until the hardware finishes. Taking `&mut self`
/// means only one operation can be in flight on a device at a time.
/// Implementations that can bound a hardware operation report one that never
/// completes as [`FlashError::Timeout`]; those that cannot say so.
pub trait NvStorage {
    /// Erase every block overlapping `region`
    ///
    /// After success every byte of the region reads back as [`ERASED_BYTE`].
    /// After failure the region content is indeterminate.
    fn erase(&mut self, region: StorageRegion) -> Result<(), FlashError>;

    /// Program one little-endian word at a word-aligned `address`
    ///
    /// The target word must be erased.
    fn program_word(&mut self, address: u32, word: u32) -> Result<(), FlashError>;

    /// Read `buffer.len()` bytes starting at `address`
    fn read_bytes(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), FlashError>;
}

impl<T: NvStorage + ?Sized> NvStorage for &mut T {
    fn erase(&mut self, region: StorageRegion) -> Result<(), FlashError> {
        (**self).erase(region)
    }

    fn program_word(&mut self, address: u32, word: u32) -> Result<(), FlashError> {
        (**self).program_word(address, word)
    }

    fn read_bytes(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), FlashError> {
        (**self).read_bytes(address, buffer)
    }
}

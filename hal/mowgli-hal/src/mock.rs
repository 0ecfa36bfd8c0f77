//! In-memory storage device for host tests
//!
//! Behaves like NOR flash: erase sets bytes to [`ERASED_BYTE`], a word can
//! only be programmed while erased. Faults can be injected to simulate erase
//! failures, power loss part way through programming, and read errors.

use crate::flash::{FlashError, NvStorage, StorageRegion, ERASED_BYTE, WORD_SIZE};

/// Mock flash device covering `N` bytes starting at `base`
///
/// Starts fully erased, like a chip fresh from the factory.
#[derive(Debug, Clone)]
pub struct MockStorage<const N: usize> {
    base: u32,
    cells: [u8; N],
    erase_fault: Option<FlashError>,
    program_fault: Option<(usize, FlashError)>,
    read_fault: Option<FlashError>,
    erase_count: u32,
    program_count: u32,
}

impl<const N: usize> MockStorage<N> {
    /// Create an erased device mapped at `base`
    pub const fn new(base: u32) -> Self {
        Self {
            base,
            cells: [ERASED_BYTE; N],
            erase_fault: None,
            program_fault: None,
            read_fault: None,
            erase_count: 0,
            program_count: 0,
        }
    }

    /// Make the next erase fail with `error`
    ///
    /// The failed erase still blanks the first half of the region, the way a
    /// brown-out part way through a block erase would.
    pub fn fail_next_erase(&mut self, error: FlashError) {
        self.erase_fault = Some(error);
    }

    /// Let `words` more program operations succeed, then fail with `error`
    pub fn fail_program_after(&mut self, words: usize, error: FlashError) {
        self.program_fault = Some((words, error));
    }

    /// Make the next read fail with `error`
    pub fn fail_next_read(&mut self, error: FlashError) {
        self.read_fault = Some(error);
    }

    /// Remove every pending fault
    pub fn clear_faults(&mut self) {
        self.erase_fault = None;
        self.program_fault = None;
        self.read_fault = None;
    }

    /// Raw contents of `[address, address + len)`
    pub fn contents(&self, address: u32, len: usize) -> &[u8] {
        let start = (address - self.base) as usize;
        &self.cells[start..start + len]
    }

    /// Invert one bit in place, bypassing program rules
    pub fn flip_bit(&mut self, address: u32, bit: u8) {
        let index = (address - self.base) as usize;
        self.cells[index] ^= 1 << (bit & 7);
    }

    /// Overwrite raw bytes, bypassing program rules
    pub fn poke(&mut self, address: u32, bytes: &[u8]) {
        let start = (address - self.base) as usize;
        self.cells[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Number of erase calls that reached the device
    pub fn erase_count(&self) -> u32 {
        self.erase_count
    }

    /// Number of words successfully programmed
    pub fn program_count(&self) -> u32 {
        self.program_count
    }

    fn offset(&self, address: u32, len: usize) -> Result<usize, FlashError> {
        let device = StorageRegion {
            base: self.base,
            len: N as u32,
        };
        if !device.contains(address, len) {
            return Err(FlashError::OutOfRange);
        }
        Ok((address - self.base) as usize)
    }
}

impl<const N: usize> NvStorage for MockStorage<N> {
    fn erase(&mut self, region: StorageRegion) -> Result<(), FlashError> {
        let start = self.offset(region.base, region.len as usize)?;
        let end = start + region.len as usize;
        self.erase_count += 1;

        if let Some(error) = self.erase_fault.take() {
            let half = start + (region.len as usize / 2);
            self.cells[start..half].fill(ERASED_BYTE);
            return Err(error);
        }

        self.cells[start..end].fill(ERASED_BYTE);
        Ok(())
    }

    fn program_word(&mut self, address: u32, word: u32) -> Result<(), FlashError> {
        if address as usize % WORD_SIZE != 0 {
            return Err(FlashError::Unaligned);
        }
        let start = self.offset(address, WORD_SIZE)?;

        if let Some((remaining, error)) = self.program_fault {
            if remaining == 0 {
                self.program_fault = None;
                return Err(error);
            }
            self.program_fault = Some((remaining - 1, error));
        }

        let target = &mut self.cells[start..start + WORD_SIZE];
        if target.iter().any(|&b| b != ERASED_BYTE) {
            return Err(FlashError::Program);
        }
        target.copy_from_slice(&word.to_le_bytes());
        self.program_count += 1;
        Ok(())
    }

    fn read_bytes(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), FlashError> {
        if let Some(error) = self.read_fault.take() {
            return Err(error);
        }
        let start = self.offset(address, buffer.len())?;
        buffer.copy_from_slice(&self.cells[start..start + buffer.len()]);
        Ok(())
    }
}

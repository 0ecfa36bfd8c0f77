//! Flash storage driver for STM32F4
//!
//! Wraps embassy-stm32's blocking flash driver behind [`NvStorage`].
//! Sector geometry on the F401VC is 4x16KB, 1x64KB, then 128KB sectors; the
//! config partition is the whole of sector 3.

use embassy_stm32::flash::{Blocking, Error, Flash, FLASH_BASE};
use embassy_stm32::peripherals::FLASH;
use embassy_stm32::Peri;

use mowgli_hal::flash::{FlashError, NvStorage, StorageRegion, WORD_SIZE};

/// Flash size of the STM32F401VC
pub const FLASH_SIZE: usize = 256 * 1024;

/// Config partition: sector 3
pub const CONFIG_SECTOR_START: u32 = 0x0800_C000;
pub const CONFIG_SECTOR_SIZE: u32 = 16 * 1024;
pub const CONFIG_SECTOR_END: u32 = CONFIG_SECTOR_START + CONFIG_SECTOR_SIZE;

/// Base address of the configuration image
pub const CONFIG_REGION_BASE: u32 = CONFIG_SECTOR_START;

/// STM32F4 flash storage
///
/// Every erase clears the whole of sector 3, whatever the region length,
/// since the controller cannot erase less than a sector.
pub struct Stm32f4Flash<'d> {
    flash: Flash<'d, Blocking>,
}

impl<'d> Stm32f4Flash<'d> {
    /// Create a new flash storage instance
    pub fn new(flash: Peri<'d, FLASH>) -> Self {
        Self {
            flash: Flash::new_blocking(flash),
        }
    }

    fn check_partition(address: u32, len: usize) -> Result<u32, FlashError> {
        let partition = StorageRegion {
            base: CONFIG_SECTOR_START,
            len: CONFIG_SECTOR_SIZE,
        };
        if !partition.contains(address, len) {
            return Err(FlashError::OutOfRange);
        }
        Ok(address - FLASH_BASE as u32)
    }
}

/// Operations block on the flash controller's busy flag with no upper bound,
/// so this device never reports [`FlashError::Timeout`]. A controller that
/// stays busy is left to the independent watchdog.
impl<'d> NvStorage for Stm32f4Flash<'d> {
    fn erase(&mut self, region: StorageRegion) -> Result<(), FlashError> {
        Self::check_partition(region.base, region.len as usize)?;

        let from = CONFIG_SECTOR_START - FLASH_BASE as u32;
        let to = CONFIG_SECTOR_END - FLASH_BASE as u32;
        self.flash.blocking_erase(from, to).map_err(|e| map_error(e, FlashError::Erase))
    }

    fn program_word(&mut self, address: u32, word: u32) -> Result<(), FlashError> {
        if address as usize % WORD_SIZE != 0 {
            return Err(FlashError::Unaligned);
        }
        let offset = Self::check_partition(address, WORD_SIZE)?;

        self.flash
            .blocking_write(offset, &word.to_le_bytes())
            .map_err(|e| map_error(e, FlashError::Program))
    }

    fn read_bytes(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), FlashError> {
        let offset = Self::check_partition(address, buffer.len())?;

        self.flash
            .blocking_read(offset, buffer)
            .map_err(|e| map_error(e, FlashError::Read))
    }
}

fn map_error(error: Error, fallback: FlashError) -> FlashError {
    match error {
        Error::Size => FlashError::OutOfRange,
        Error::Unaligned => FlashError::Unaligned,
        _ => fallback,
    }
}

//! Configuration persistence
//!
//! Writes the active configuration to a fixed flash region and reads it back
//! on boot. A save is erase-then-program and is not atomic: power loss at any
//! point leaves a region that fails sentinel or checksum verification, and
//! the next load reports it as invalid so the caller falls back to defaults.

use mowgli_hal::{FlashError, NvStorage, StorageRegion};

use super::active::ActiveConfig;
use super::image::{ConfigImage, ImageError, IMAGE_SIZE};

/// Save failures
///
/// After either variant the in-memory configuration is untouched but the
/// flash region must be treated as invalid until the next successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SaveError {
    /// Erasing the region failed; nothing was programmed
    EraseFailed(FlashError),
    /// Programming stopped at `address`; words before it were written
    ProgramFailed { address: u32, cause: FlashError },
}

/// Load failures; all of them mean "no valid image, use defaults"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadError {
    /// Reading the region failed
    Device(FlashError),
    /// Image failed sentinel or checksum verification
    InvalidImage(ImageError),
}

impl From<FlashError> for LoadError {
    fn from(e: FlashError) -> Self {
        LoadError::Device(e)
    }
}

impl From<ImageError> for LoadError {
    fn from(e: ImageError) -> Self {
        LoadError::InvalidImage(e)
    }
}

/// Flash-backed configuration store
///
/// Owns the storage device (or a `&mut` to it), which serializes every
/// erase, program and read on that device.
pub struct PersistenceStore<D: NvStorage> {
    device: D,
    region: StorageRegion,
}

impl<D: NvStorage> PersistenceStore<D> {
    /// Create a store whose image starts at `base`
    pub fn new(device: D, base: u32) -> Self {
        Self {
            device,
            region: StorageRegion::new(base, IMAGE_SIZE),
        }
    }

    /// Region occupied by the image
    pub fn region(&self) -> StorageRegion {
        self.region
    }

    /// Access the underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the underlying device
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Consume the store and return the device
    pub fn into_device(self) -> D {
        self.device
    }

    /// Seal `config` into an image and write it
    pub fn save(&mut self, config: &ActiveConfig) -> Result<(), SaveError> {
        let image = ConfigImage::from_config(config);
        self.write_image(&image)?;

        info!(
            "Saved configuration to flash at {=u32:#x} (crc {=u32:#x})",
            self.region.base,
            image.checksum()
        );
        Ok(())
    }

    /// Erase the region and program `image` word by word in address order
    ///
    /// Stops at the first failed word. The sentinel is written first and the
    /// checksum last, so any prefix of the image fails verification.
    pub fn write_image(&mut self, image: &ConfigImage) -> Result<(), SaveError> {
        if let Err(e) = self.device.erase(self.region) {
            warn!("Config region erase failed: {:?}", e);
            return Err(SaveError::EraseFailed(e));
        }

        for (index, &word) in image.words().iter().enumerate() {
            let address = self.region.word_address(index);
            if let Err(cause) = self.device.program_word(address, word) {
                warn!(
                    "Config program failed at {=u32:#x} (word {} of {}): {:?}",
                    address,
                    index,
                    image.words().len(),
                    cause
                );
                return Err(SaveError::ProgramFailed { address, cause });
            }
        }
        Ok(())
    }

    /// Read and verify the image
    pub fn read_image(&mut self) -> Result<ConfigImage, LoadError> {
        let mut bytes = [0u8; IMAGE_SIZE];
        self.device.read_bytes(self.region.base, &mut bytes)?;

        let image = ConfigImage::from_bytes(&bytes);
        image.verify()?;
        Ok(image)
    }

    /// Load the stored configuration
    ///
    /// Only an image with a matching sentinel and checksum is accepted.
    pub fn load(&mut self) -> Result<ActiveConfig, LoadError> {
        let image = self.read_image()?;
        let (config, defaulted) = image.decode()?;

        if defaulted > 0 {
            warn!("{} stored value(s) out of bounds, replaced by defaults", defaulted);
        }
        debug!("Loaded configuration image (crc {=u32:#x})", image.checksum());
        Ok(config)
    }

    /// Erase the stored image so the next load falls back to defaults
    pub fn erase(&mut self) -> Result<(), SaveError> {
        self.device.erase(self.region).map_err(SaveError::EraseFailed)?;
        info!("Erased configuration region at {=u32:#x}", self.region.base);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::image::IMAGE_WORDS;
    use crate::config::validator::set_value;
    use mowgli_hal::mock::MockStorage;
    use mowgli_hal::WORD_SIZE;

    const BASE: u32 = 0x0800_C000;
    type Flash = MockStorage<256>;

    fn custom_config() -> ActiveConfig {
        let mut config = ActiveConfig::defaults();
        set_value(&mut config, "OM_MAX_CHARGE_CURRENT", "1.2");
        set_value(&mut config, "OM_WHEEL_BASE", "0.4");
        set_value(&mut config, "OM_STOP_BUTTON_TIMEOUT", "250");
        set_value(&mut config, "OM_EMERGENCY_DEBUG", "1");
        config
    }

    #[test]
    fn test_save_then_load() {
        let mut store = PersistenceStore::new(Flash::new(BASE), BASE);
        let config = custom_config();

        store.save(&config).unwrap();
        assert_eq!(store.load(), Ok(config));
    }

    #[test]
    fn test_blank_flash_is_invalid() {
        let mut store = PersistenceStore::new(Flash::new(BASE), BASE);
        assert_eq!(
            store.load(),
            Err(LoadError::InvalidImage(ImageError::Blank))
        );
    }

    #[test]
    fn test_region_size() {
        let store = PersistenceStore::new(Flash::new(BASE), BASE);
        assert_eq!(store.region().len as usize, IMAGE_SIZE);
        assert_eq!(store.region().len as usize % WORD_SIZE, 0);
    }

    #[test]
    fn test_save_overwrites_previous_image() {
        let mut store = PersistenceStore::new(Flash::new(BASE), BASE);
        store.save(&ActiveConfig::defaults()).unwrap();
        store.save(&custom_config()).unwrap();

        assert_eq!(store.load(), Ok(custom_config()));
        assert_eq!(store.device().erase_count(), 2);
    }

    #[test]
    fn test_save_is_idempotent() {
        let mut store = PersistenceStore::new(Flash::new(BASE), BASE);
        let config = custom_config();

        store.save(&config).unwrap();
        let first: [u8; IMAGE_SIZE] = store.device().contents(BASE, IMAGE_SIZE).try_into().unwrap();
        store.save(&config).unwrap();
        let second = store.device().contents(BASE, IMAGE_SIZE);

        assert_eq!(&first[..], second);
    }

    #[test]
    fn test_erase_failure() {
        let mut flash = Flash::new(BASE);
        let mut store = PersistenceStore::new(&mut flash, BASE);
        store.save(&custom_config()).unwrap();

        store.device_mut().fail_next_erase(FlashError::Erase);
        assert_eq!(
            store.save(&ActiveConfig::defaults()),
            Err(SaveError::EraseFailed(FlashError::Erase))
        );
        // Nothing programmed after the failed erase
        assert_eq!(flash.program_count(), 22);
    }

    #[test]
    fn test_interrupted_erase_leaves_invalid_image() {
        let mut store = PersistenceStore::new(Flash::new(BASE), BASE);
        store.save(&custom_config()).unwrap();

        store.device_mut().fail_next_erase(FlashError::Timeout);
        assert!(store.save(&custom_config()).is_err());
        assert!(store.load().is_err());
    }

    #[test]
    fn test_program_failure_reports_address() {
        let mut store = PersistenceStore::new(Flash::new(BASE), BASE);
        store.device_mut().fail_program_after(5, FlashError::Program);

        assert_eq!(
            store.save(&custom_config()),
            Err(SaveError::ProgramFailed {
                address: BASE + 5 * WORD_SIZE as u32,
                cause: FlashError::Program,
            })
        );
    }

    #[test]
    fn test_every_partial_write_is_invalid() {
        let config = custom_config();
        for written in 0..IMAGE_WORDS {
            let mut store = PersistenceStore::new(Flash::new(BASE), BASE);
            store.save(&ActiveConfig::defaults()).unwrap();

            store.device_mut().fail_program_after(written, FlashError::Timeout);
            assert!(store.save(&config).is_err());
            assert!(store.load().is_err(), "accepted image cut after {} words", written);
        }
    }

    #[test]
    fn test_every_single_bit_flip_is_detected() {
        let mut store = PersistenceStore::new(Flash::new(BASE), BASE);
        store.save(&custom_config()).unwrap();

        for byte in 0..IMAGE_SIZE as u32 {
            for bit in 0..8 {
                store.device_mut().flip_bit(BASE + byte, bit);
                assert!(store.load().is_err(), "flip of byte {} bit {} not detected", byte, bit);
                store.device_mut().flip_bit(BASE + byte, bit);
            }
        }
        assert_eq!(store.load(), Ok(custom_config()));
    }

    #[test]
    fn test_read_failure_is_invalid() {
        let mut store = PersistenceStore::new(Flash::new(BASE), BASE);
        store.save(&custom_config()).unwrap();

        store.device_mut().fail_next_read(FlashError::Timeout);
        assert_eq!(store.load(), Err(LoadError::Device(FlashError::Timeout)));
        assert_eq!(store.load(), Ok(custom_config()));
    }

    #[test]
    fn test_erase_clears_image() {
        let mut store = PersistenceStore::new(Flash::new(BASE), BASE);
        store.save(&custom_config()).unwrap();
        store.erase().unwrap();

        assert_eq!(
            store.load(),
            Err(LoadError::InvalidImage(ImageError::Blank))
        );
    }

    #[test]
    fn test_region_outside_device() {
        let mut store = PersistenceStore::new(Flash::new(BASE), BASE + 0x1000);
        assert_eq!(
            store.save(&ActiveConfig::defaults()),
            Err(SaveError::EraseFailed(FlashError::OutOfRange))
        );
        assert_eq!(store.load(), Err(LoadError::Device(FlashError::OutOfRange)));
    }
}

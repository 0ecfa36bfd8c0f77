//! Flash image layout
//!
//! A configuration image is a flat array of little-endian 32-bit words:
//!
//! ```text
//! word 0          sentinel (0xDEADBEEF)
//! word 1..=20     one field per parameter, catalog order
//! word 21         CRC-32 over words 0..=20
//! ```
//!
//! Floats are stored as their IEEE-754 bit pattern, integers as `u32`,
//! flags as 0 or 1. An image is only trusted when the sentinel matches and
//! the CRC recomputes; a blank or half-programmed region fails one or the
//! other.

use crc::{Crc, CRC_32_ISO_HDLC};
use mowgli_hal::WORD_SIZE;

use super::active::{ActiveConfig, ParamValue};
use super::catalog::{ParamId, ParamKind, PARAM_COUNT};
use super::validator;

/// Magic number marking a written image
pub const CONFIG_SENTINEL: u32 = 0xDEAD_BEEF;

/// Word read back from erased flash
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Words in an image: sentinel, fields, checksum
pub const IMAGE_WORDS: usize = PARAM_COUNT + 2;

/// Image size in bytes
pub const IMAGE_SIZE: usize = IMAGE_WORDS * WORD_SIZE;

const CHECKSUM_WORD: usize = IMAGE_WORDS - 1;

/// CRC-32 (ISO HDLC / Ethernet / ZIP)
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Reasons an image is not trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImageError {
    /// Sentinel word is erased: nothing was ever written, or an erase
    /// completed without a following program
    Blank,
    /// Sentinel word holds something other than [`CONFIG_SENTINEL`]
    BadSentinel { found: u32 },
    /// Stored checksum does not match the recomputed one
    ChecksumMismatch { stored: u32, computed: u32 },
}

/// A configuration image as stored in flash
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigImage {
    words: [u32; IMAGE_WORDS],
}

impl ConfigImage {
    /// Build a sealed image (sentinel and checksum filled in) from a config
    pub fn from_config(config: &ActiveConfig) -> Self {
        let mut words = [0u32; IMAGE_WORDS];
        words[0] = CONFIG_SENTINEL;
        for (index, (_, value)) in config.iter().enumerate() {
            words[1 + index] = encode_field(value);
        }

        let mut image = Self { words };
        image.words[CHECKSUM_WORD] = image.calculate_checksum();
        image
    }

    /// Interpret raw bytes read from flash
    pub fn from_bytes(bytes: &[u8; IMAGE_SIZE]) -> Self {
        let mut words = [0u32; IMAGE_WORDS];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(WORD_SIZE)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self { words }
    }

    /// Serialize to the on-flash byte layout
    pub fn to_bytes(&self) -> [u8; IMAGE_SIZE] {
        let mut bytes = [0u8; IMAGE_SIZE];
        for (chunk, word) in bytes.chunks_exact_mut(WORD_SIZE).zip(self.words.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    /// All words in program order
    pub fn words(&self) -> &[u32; IMAGE_WORDS] {
        &self.words
    }

    pub fn sentinel(&self) -> u32 {
        self.words[0]
    }

    /// Stored checksum
    pub fn checksum(&self) -> u32 {
        self.words[CHECKSUM_WORD]
    }

    /// Raw stored word for one parameter
    pub fn field(&self, id: ParamId) -> u32 {
        self.words[1 + id.index()]
    }

    /// CRC-32 over every word before the checksum
    pub fn calculate_checksum(&self) -> u32 {
        let mut digest = CRC32.digest();
        for word in &self.words[..CHECKSUM_WORD] {
            digest.update(&word.to_le_bytes());
        }
        digest.finalize()
    }

    /// Check sentinel and checksum
    pub fn verify(&self) -> Result<(), ImageError> {
        match self.sentinel() {
            CONFIG_SENTINEL => {}
            ERASED_WORD => return Err(ImageError::Blank),
            found => return Err(ImageError::BadSentinel { found }),
        }

        let computed = self.calculate_checksum();
        let stored = self.checksum();
        if stored != computed {
            return Err(ImageError::ChecksumMismatch { stored, computed });
        }
        Ok(())
    }

    /// Verify the image and rebuild the configuration it holds
    ///
    /// Each field goes back through the validator, so a value outside the
    /// current bounds (an image written by firmware with wider bounds) is
    /// replaced by its default. Returns the config and the number of fields
    /// that had to be defaulted.
    pub fn decode(&self) -> Result<(ActiveConfig, usize), ImageError> {
        self.verify()?;

        let mut config = ActiveConfig::defaults();
        let mut defaulted = 0;
        for id in ParamId::ALL {
            let raw = decode_field(id.definition().kind, self.field(id));
            if validator::restore(&mut config, id, raw).is_some() {
                defaulted += 1;
            }
        }
        Ok((config, defaulted))
    }
}

fn encode_field(value: ParamValue) -> u32 {
    match value {
        ParamValue::Float(v) => v.to_bits(),
        ParamValue::Unsigned(v) => v,
        ParamValue::Flag(v) => v as u32,
    }
}

fn decode_field(kind: ParamKind, word: u32) -> f64 {
    match kind {
        ParamKind::Float => f32::from_bits(word) as f64,
        ParamKind::Unsigned | ParamKind::Flag => word as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validator::set_value;

    #[test]
    fn test_layout() {
        let config = ActiveConfig::defaults();
        let image = ConfigImage::from_config(&config);

        assert_eq!(image.sentinel(), CONFIG_SENTINEL);
        assert_eq!(image.field(ParamId::MaxChargeCurrent), 1.0f32.to_bits());
        assert_eq!(image.field(ParamId::WheelBase), 0.325f32.to_bits());
        assert_eq!(image.field(ParamId::OneWheelLiftEmergencyMillis), 10_000);
        assert_eq!(image.field(ParamId::ImuOnboardInclinationThreshold), 0x38);
        assert_eq!(image.field(ParamId::OptionUltrasonic), 0);
        assert_eq!(image.checksum(), image.calculate_checksum());
        assert_eq!(IMAGE_SIZE, 88);
    }

    #[test]
    fn test_bytes_are_little_endian() {
        let image = ConfigImage::from_config(&ActiveConfig::defaults());
        let bytes = image.to_bytes();
        assert_eq!(&bytes[..4], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(ConfigImage::from_bytes(&bytes), image);
    }

    #[test]
    fn test_decode_restores_config() {
        let mut config = ActiveConfig::defaults();
        set_value(&mut config, "OM_MAX_MPS", "0.75");
        set_value(&mut config, "OM_TILT_TIMEOUT", "1200");
        set_value(&mut config, "OM_OPTION_BUMPER", "1");

        let (decoded, defaulted) = ConfigImage::from_config(&config).decode().unwrap();
        assert_eq!(decoded, config);
        assert_eq!(defaulted, 0);
    }

    #[test]
    fn test_blank_image() {
        let image = ConfigImage::from_bytes(&[0xFF; IMAGE_SIZE]);
        assert_eq!(image.verify(), Err(ImageError::Blank));
    }

    #[test]
    fn test_bad_sentinel() {
        let mut bytes = ConfigImage::from_config(&ActiveConfig::defaults()).to_bytes();
        bytes[0] = 0x00;
        let image = ConfigImage::from_bytes(&bytes);
        assert!(matches!(image.verify(), Err(ImageError::BadSentinel { .. })));
    }

    #[test]
    fn test_checksum_covers_fields() {
        let mut bytes = ConfigImage::from_config(&ActiveConfig::defaults()).to_bytes();
        // Nudge MAX_MPS to a different, still in-range value
        let offset = (1 + ParamId::MaxMps.index()) * WORD_SIZE;
        bytes[offset..offset + 4].copy_from_slice(&0.6f32.to_bits().to_le_bytes());

        let image = ConfigImage::from_bytes(&bytes);
        assert!(matches!(
            image.verify(),
            Err(ImageError::ChecksumMismatch { .. })
        ));
        assert!(image.decode().is_err());
    }

    #[test]
    fn test_sealed_out_of_range_field_is_defaulted() {
        let mut image = ConfigImage::from_config(&ActiveConfig::defaults());
        image.words[1 + ParamId::MaxChargeCurrent.index()] = 3.0f32.to_bits();
        image.words[1 + ParamId::TiltEmergencyMillis.index()] = u32::MAX;
        image.words[CHECKSUM_WORD] = image.calculate_checksum();

        let (config, defaulted) = image.decode().unwrap();
        assert_eq!(defaulted, 2);
        assert_eq!(config.max_charge_current(), 1.0);
        assert_eq!(config.tilt_emergency_ms(), 500);
    }

    #[test]
    fn test_sealed_nan_field_is_defaulted() {
        let mut image = ConfigImage::from_config(&ActiveConfig::defaults());
        image.words[1 + ParamId::WheelBase.index()] = f32::NAN.to_bits();
        image.words[CHECKSUM_WORD] = image.calculate_checksum();

        let (config, defaulted) = image.decode().unwrap();
        assert_eq!(defaulted, 1);
        assert_eq!(config.wheel_base(), 0.325);
    }
}

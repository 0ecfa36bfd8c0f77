//! Configuration manager
//!
//! Ties the pieces together for the firmware: loads the stored image at
//! boot (falling back to catalog defaults), routes key/value writes through
//! the validator, and saves on request.

use mowgli_hal::NvStorage;

use super::active::{ActiveConfig, ParamValue};
use super::shared::SharedConfig;
use super::store::{LoadError, PersistenceStore, SaveError};
use super::validator::{self, SetOutcome};

/// Where the active configuration came from at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootSource {
    /// A verified flash image
    Flash,
    /// Catalog defaults, because the stored image was unusable
    Defaults(LoadError),
}

/// Owner of the active configuration and its persistence
pub struct ConfigManager<D: NvStorage> {
    store: PersistenceStore<D>,
    config: ActiveConfig,
    boot_source: BootSource,
    dirty: bool,
}

impl<D: NvStorage> ConfigManager<D> {
    /// Load configuration from flash, or use defaults if there is no valid image
    ///
    /// Never fails: the controller must come up even with a corrupt or
    /// missing configuration store.
    pub fn boot(device: D, base: u32) -> Self {
        let mut store = PersistenceStore::new(device, base);

        info!("Loading configuration from flash...");
        let (config, boot_source) = match store.load() {
            Ok(config) => {
                info!("Loaded configuration from flash");
                (config, BootSource::Flash)
            }
            Err(e @ LoadError::InvalidImage(super::image::ImageError::Blank)) => {
                info!("No configuration in flash, using defaults");
                (ActiveConfig::defaults(), BootSource::Defaults(e))
            }
            Err(e) => {
                warn!("Stored configuration invalid: {:?}, using defaults", e);
                (ActiveConfig::defaults(), BootSource::Defaults(e))
            }
        };

        log_config_summary(&config);
        Self {
            store,
            config,
            boot_source,
            dirty: false,
        }
    }

    /// Where the configuration came from at boot
    pub fn boot_source(&self) -> BootSource {
        self.boot_source
    }

    /// Read-only view of the active configuration
    pub fn config(&self) -> &ActiveConfig {
        &self.config
    }

    /// Current value of the parameter named `key`
    pub fn get(&self, key: &str) -> Option<ParamValue> {
        self.config.get_by_key(key)
    }

    /// Apply a key/value pair from the command source
    ///
    /// Validated in memory only; call [`save`](Self::save) to persist.
    pub fn set_value(&mut self, key: &str, raw: &str) -> SetOutcome {
        let outcome = validator::set_value(&mut self.config, key, raw);
        self.dirty |= outcome.is_applied();
        outcome
    }

    /// Apply an already-numeric value
    pub fn set_numeric(&mut self, key: &str, value: f64) -> SetOutcome {
        let outcome = validator::set_numeric(&mut self.config, key, value);
        self.dirty |= outcome.is_applied();
        outcome
    }

    /// Whether the active configuration has changed since boot or the last save
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist the active configuration
    ///
    /// On failure the active configuration is untouched and stays dirty.
    pub fn save(&mut self) -> Result<(), SaveError> {
        self.store.save(&self.config)?;
        self.dirty = false;
        Ok(())
    }

    /// Put every parameter back to its default (in memory only)
    pub fn reset_to_defaults(&mut self) {
        info!("Resetting configuration to defaults");
        validator::reset(&mut self.config);
        self.dirty = true;
    }

    /// Erase the stored image and reset to defaults
    ///
    /// The next boot starts from defaults unless something is saved first.
    pub fn factory_reset(&mut self) -> Result<(), SaveError> {
        self.store.erase()?;
        validator::reset(&mut self.config);
        self.dirty = false;
        Ok(())
    }

    /// Publish a copy of the active configuration for other execution contexts
    pub fn publish(&self, shared: &SharedConfig) {
        shared.publish(&self.config);
    }

    /// Access the persistence store
    pub fn store(&mut self) -> &mut PersistenceStore<D> {
        &mut self.store
    }

    /// Consume the manager and return the storage device
    pub fn into_device(self) -> D {
        self.store.into_device()
    }
}

/// Log a summary of the active configuration
fn log_config_summary(config: &ActiveConfig) {
    debug!(
        "  charge: max {}A, cutoff {}V, end {}A",
        config.max_charge_current(),
        config.bat_charge_cutoff_voltage(),
        config.charge_end_limit_current()
    );
    debug!(
        "  drive: max {}m/s, wheel base {}m",
        config.max_mps(),
        config.wheel_base()
    );
    if config.emergency_disabled() {
        warn!("Emergency controller is DISABLED by configuration");
    }
}

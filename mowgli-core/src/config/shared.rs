//! Shared configuration view
//!
//! The command context owns the [`ConfigManager`](super::ConfigManager);
//! control loops running at higher priority read a published copy from here.
//! Each publish and each snapshot happens inside one critical section, so a
//! reader never sees a mix of two configurations (e.g. a new `PWM_PER_MPS`
//! with an old `TICKS_PER_M`).
//!
//! ```ignore
//! static CONFIG: SharedConfig = SharedConfig::new();
//!
//! // command task
//! manager.set_value(key, value);
//! manager.publish(&CONFIG);
//!
//! // control loop
//! let cfg = CONFIG.snapshot();
//! let pwm = speed * cfg.pwm_per_mps();
//! ```

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use super::active::ActiveConfig;

/// Critical-section protected copy of the active configuration
pub struct SharedConfig {
    inner: Mutex<CriticalSectionRawMutex, Cell<ActiveConfig>>,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedConfig {
    /// Create a shared view holding the catalog defaults
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(ActiveConfig::defaults())),
        }
    }

    /// Replace the published configuration
    pub fn publish(&self, config: &ActiveConfig) {
        self.inner.lock(|cell| cell.set(*config));
    }

    /// Copy of the whole published configuration
    pub fn snapshot(&self) -> ActiveConfig {
        self.inner.lock(|cell| cell.get())
    }

    /// Run `f` against the published configuration inside the critical section
    ///
    /// Keep `f` short; interrupts are masked while it runs.
    pub fn read<R>(&self, f: impl FnOnce(&ActiveConfig) -> R) -> R {
        self.inner.lock(|cell| f(&cell.get()))
    }
}

//! Configuration subsystem
//!
//! The parameter catalog is the safety contract; everything else exists to
//! make sure only catalog-approved values reach [`ActiveConfig`] and that a
//! torn or corrupted flash image is never mistaken for a real one.

pub mod active;
pub mod catalog;
pub mod image;
pub mod manager;
pub mod shared;
#[cfg(feature = "serde")]
pub mod snapshot;
pub mod store;
pub mod validator;

pub use active::{ActiveConfig, ParamValue};
pub use catalog::{definition_for, ParamId, ParamKind, ParameterDefinition, CATALOG, PARAM_COUNT};
pub use image::{ConfigImage, ImageError, CONFIG_SENTINEL, IMAGE_SIZE, IMAGE_WORDS};
pub use manager::{BootSource, ConfigManager};
pub use shared::SharedConfig;
#[cfg(feature = "serde")]
pub use snapshot::{ConfigSnapshot, SnapshotError};
pub use store::{LoadError, PersistenceStore, SaveError};
pub use validator::{ConfigWarning, SetOutcome};

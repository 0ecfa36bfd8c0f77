//! Mowgli Hardware Abstraction Layer
//!
//! This crate defines the storage-device contract the configuration core
//! needs from a chip's non-volatile memory. Chip-specific crates implement
//! it, and the `mock` feature provides an in-memory device for host tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  mowgli-core (config, validation, image)│
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  mowgli-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  mowgli-hal-  │       │ mock::Mock-   │
//! │    stm32f4    │       │   Storage     │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`flash::NvStorage`] - Block-erase, word-program non-volatile memory

#![no_std]
#![deny(unsafe_code)]

pub mod flash;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export key types at crate root for convenience
pub use flash::{FlashError, NvStorage, StorageRegion, ERASED_BYTE, WORD_SIZE};

//! Board-agnostic persistent configuration for the mower controller
//!
//! This crate contains everything about the tunable parameter set that does
//! not depend on a specific chip:
//!
//! - Parameter catalog (keys, kinds, safety bounds, defaults)
//! - Active configuration and the validator that guards every write to it
//! - Fixed-layout flash image with sentinel and CRC
//! - Persistence store driving erase/program against an [`NvStorage`] device
//! - Boot-time loading with fallback to defaults
//!
//! [`NvStorage`]: mowgli_hal::NvStorage

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod config;

pub use config::{
    ActiveConfig, ConfigManager, ConfigWarning, LoadError, ParamId, ParamValue, SaveError,
    SetOutcome, SharedConfig,
};

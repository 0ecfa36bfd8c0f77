//! STM32F4 implementation of the Mowgli storage traits
//!
//! Targets the STM32F401VC on the mower mainboard. The configuration image
//! lives in flash sector 3 (16KB at 0x0800_C000).

#![no_std]
#![deny(unsafe_code)]

pub mod flash;

pub use flash::Stm32f4Flash;

//! Configuration snapshots
//!
//! Compact postcard encoding of the whole parameter set, for handing the
//! configuration to a host tool or a companion computer. Unlike the flash
//! image this format carries no checksum; the transport is expected to
//! frame and check it. Importing a snapshot still goes through the
//! validator, so nothing out of bounds reaches the active configuration.

use serde::{Deserialize, Serialize};

use super::active::{ActiveConfig, ParamValue};
use super::catalog::{ParamId, PARAM_COUNT};
use super::validator;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u8 = 1;

/// Upper bound on an encoded snapshot
///
/// Version byte plus, per value, a variant tag and at most five bytes of
/// varint or four bytes of float.
pub const MAX_SNAPSHOT_SIZE: usize = 1 + PARAM_COUNT * 6;

/// Snapshot encode/decode failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SnapshotError {
    /// Output buffer too small
    Serialize,
    /// Malformed or truncated input
    Deserialize,
    /// Snapshot written by an incompatible format version
    VersionMismatch { found: u8 },
}

/// Serializable copy of every parameter value, in catalog order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub version: u8,
    pub values: [ParamValue; PARAM_COUNT],
}

impl ConfigSnapshot {
    /// Capture the current configuration
    pub fn capture(config: &ActiveConfig) -> Self {
        let mut values = [ParamValue::Flag(false); PARAM_COUNT];
        for (slot, (_, value)) in values.iter_mut().zip(config.iter()) {
            *slot = value;
        }
        Self {
            version: SNAPSHOT_VERSION,
            values,
        }
    }

    /// Encode into `buf`, returning the used prefix
    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], SnapshotError> {
        postcard::to_slice(self, buf).map_err(|_| SnapshotError::Serialize)
    }

    /// Decode a snapshot and check its version
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = postcard::from_bytes(bytes).map_err(|_| SnapshotError::Deserialize)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                found: snapshot.version,
            });
        }
        Ok(snapshot)
    }

    /// Rebuild a configuration from the snapshot
    ///
    /// Values of the wrong kind or outside bounds fall back to their
    /// defaults. Returns the config and how many values were defaulted.
    pub fn restore(&self) -> (ActiveConfig, usize) {
        let mut config = ActiveConfig::defaults();
        let mut defaulted = 0;
        for (id, value) in ParamId::ALL.iter().zip(self.values.iter()) {
            let def = id.definition();
            if !value.is_kind(def.kind) {
                warn!("Snapshot value for {} has the wrong kind", def.key);
                defaulted += 1;
                continue;
            }
            if validator::restore(&mut config, *id, value.as_f64()).is_some() {
                defaulted += 1;
            }
        }
        (config, defaulted)
    }
}

//! Configuration validator
//!
//! The only code path that writes to [`ActiveConfig`]. Every proposed value
//! is checked against its catalog entry; out-of-range values are replaced by
//! the entry's default, unknown keys and unparsable text are rejected.
//! Nothing here touches storage.

use heapless::String;

use super::active::{ActiveConfig, ParamValue};
use super::catalog::{definition_for, ParamId, ParamKind, ParameterDefinition, CATALOG};

/// Longest unknown key kept in a warning (longer keys are truncated)
pub const MAX_KEY_LEN: usize = 32;

/// Non-fatal problem found while applying a value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigWarning {
    /// Value outside `[min, max]`; the default was written instead
    OutOfBounds {
        id: ParamId,
        attempted: f64,
        min: f64,
        max: f64,
        default: ParamValue,
    },
    /// Key is not in the catalog; nothing was written
    UnknownKey { key: String<MAX_KEY_LEN> },
    /// Value text is not a finite number; prior value kept
    UnparsableValue { id: ParamId },
}

/// Result of a single `set_value` call
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetOutcome {
    /// Value written to the active config, if any
    pub applied: Option<ParamValue>,
    /// Warning raised while handling the call
    pub warning: Option<ConfigWarning>,
}

impl SetOutcome {
    fn rejected(warning: ConfigWarning) -> Self {
        Self {
            applied: None,
            warning: Some(warning),
        }
    }

    /// Whether a field was written
    pub fn is_applied(&self) -> bool {
        self.applied.is_some()
    }
}

/// A value that passed (or was forced into) its bounds
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub value: ParamValue,
    pub warning: Option<ConfigWarning>,
}

/// Bound-check `value` against `def` and narrow it to the parameter's kind
///
/// Out of bounds (including NaN) yields the default plus an
/// [`ConfigWarning::OutOfBounds`]. The check is made on the incoming `f64`
/// before any narrowing, so nothing strictly outside `[min, max]` is taken.
/// Integer values are then rounded to the nearest integer (500.6 becomes
/// 501, never wraps); a flag is set by any non-zero value.
pub fn validate_numeric(value: f64, def: &ParameterDefinition) -> Validated {
    narrow(value, def, def.in_bounds(value))
}

/// Like [`validate_numeric`], for values read back from a stored image
///
/// Floats are compared against the `f32` images of the bounds, since that is
/// all the image can hold.
fn validate_stored(value: f64, def: &ParameterDefinition) -> Validated {
    narrow(value, def, def.admits(value))
}

fn narrow(value: f64, def: &ParameterDefinition, accepted: bool) -> Validated {
    if !accepted {
        let default = ParamValue::default_for(def);
        warn!(
            "{}={} is out of bounds [{} - {}], defaulting to {}",
            def.key, value, def.min, def.max, default
        );
        return Validated {
            value: default,
            warning: Some(ConfigWarning::OutOfBounds {
                id: def.id,
                attempted: value,
                min: def.min,
                max: def.max,
                default,
            }),
        };
    }

    let value = match def.kind {
        ParamKind::Float => ParamValue::Float(value as f32),
        // In range and non-negative, so the cast cannot wrap
        ParamKind::Unsigned => ParamValue::Unsigned(libm::round(value) as u32),
        ParamKind::Flag => ParamValue::Flag(value != 0.0),
    };

    Validated {
        value,
        warning: None,
    }
}

/// Parse `raw` and apply it to the parameter named `key`
///
/// Surrounding whitespace is ignored. Text that is not a finite number is
/// rejected with [`ConfigWarning::UnparsableValue`]; it is never coerced to
/// zero. An unknown key is a no-op with [`ConfigWarning::UnknownKey`].
pub fn set_value(config: &mut ActiveConfig, key: &str, raw: &str) -> SetOutcome {
    let Some(def) = definition_for(key) else {
        return unknown_key(key);
    };

    match parse_numeric(raw) {
        Some(value) => apply(config, def, value),
        None => {
            warn!("{}: unparsable value {:?}, keeping previous value", def.key, raw);
            SetOutcome::rejected(ConfigWarning::UnparsableValue { id: def.id })
        }
    }
}

/// Apply an already-numeric value to the parameter named `key`
///
/// Non-finite values are treated like unparsable text.
pub fn set_numeric(config: &mut ActiveConfig, key: &str, value: f64) -> SetOutcome {
    let Some(def) = definition_for(key) else {
        return unknown_key(key);
    };

    if !value.is_finite() {
        warn!("{}: non-finite value, keeping previous value", def.key);
        return SetOutcome::rejected(ConfigWarning::UnparsableValue { id: def.id });
    }

    apply(config, def, value)
}

/// Validate and write a value for a known parameter
///
/// Used when restoring from flash or a snapshot, where the key is implied by
/// position. Returns the warning, if any.
pub(super) fn restore(config: &mut ActiveConfig, id: ParamId, value: f64) -> Option<ConfigWarning> {
    let def = id.definition();
    commit(config, def, validate_stored(value, def)).warning
}

/// Put every parameter back to its catalog default
pub(super) fn reset(config: &mut ActiveConfig) {
    for def in CATALOG.iter() {
        config.store(def.id, ParamValue::default_for(def));
    }
    debug!("All parameters reset to defaults");
}

fn apply(config: &mut ActiveConfig, def: &ParameterDefinition, value: f64) -> SetOutcome {
    commit(config, def, validate_numeric(value, def))
}

fn commit(config: &mut ActiveConfig, def: &ParameterDefinition, validated: Validated) -> SetOutcome {
    config.store(def.id, validated.value);
    debug!("{} <- {}", def.key, validated.value);

    SetOutcome {
        applied: Some(validated.value),
        warning: validated.warning,
    }
}

fn unknown_key(key: &str) -> SetOutcome {
    warn!("Unknown config key: {}", key);

    let mut truncated = String::new();
    for c in key.chars() {
        if truncated.push(c).is_err() {
            break;
        }
    }
    SetOutcome::rejected(ConfigWarning::UnknownKey { key: truncated })
}

fn parse_numeric(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

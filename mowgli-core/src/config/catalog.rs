//! Parameter catalog
//!
//! Static table of every recognized configuration key with its kind, safety
//! bounds and default. Declaration order is also the field order of the
//! flash image, so entries must only ever be appended.
//!
//! Bounds here are the single source of truth for what the charge
//! controller, drive loop and emergency monitor will ever see. Review
//! changes to this file as safety changes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of parameters in the catalog
pub const PARAM_COUNT: usize = 20;

/// Parameter identifier
///
/// The discriminant is the parameter's index in [`CATALOG`] and its field
/// position in the flash image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum ParamId {
    MaxChargeCurrent = 0,
    LimitVoltage150mA = 1,
    MaxChargeVoltage = 2,
    BatChargeCutoffVoltage = 3,
    ChargeEndLimitCurrent = 4,
    MinChargeCurrent = 5,
    MaxMps = 6,
    PwmPerMps = 7,
    TicksPerM = 8,
    WheelBase = 9,
    /// Disables the emergency controller (wheel lift, tilt, stop buttons)
    DisableEmergency = 10,
    OneWheelLiftEmergencyMillis = 11,
    BothWheelsLiftEmergencyMillis = 12,
    TiltEmergencyMillis = 13,
    StopButtonEmergencyMillis = 14,
    PlayButtonClearEmergencyMillis = 15,
    ImuOnboardInclinationThreshold = 16,
    EmergencyDebug = 17,
    OptionBumper = 18,
    OptionUltrasonic = 19,
}

impl ParamId {
    /// All identifiers in image order
    pub const ALL: [ParamId; PARAM_COUNT] = [
        ParamId::MaxChargeCurrent,
        ParamId::LimitVoltage150mA,
        ParamId::MaxChargeVoltage,
        ParamId::BatChargeCutoffVoltage,
        ParamId::ChargeEndLimitCurrent,
        ParamId::MinChargeCurrent,
        ParamId::MaxMps,
        ParamId::PwmPerMps,
        ParamId::TicksPerM,
        ParamId::WheelBase,
        ParamId::DisableEmergency,
        ParamId::OneWheelLiftEmergencyMillis,
        ParamId::BothWheelsLiftEmergencyMillis,
        ParamId::TiltEmergencyMillis,
        ParamId::StopButtonEmergencyMillis,
        ParamId::PlayButtonClearEmergencyMillis,
        ParamId::ImuOnboardInclinationThreshold,
        ParamId::EmergencyDebug,
        ParamId::OptionBumper,
        ParamId::OptionUltrasonic,
    ];

    /// Index into [`CATALOG`] and the image field list
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Create an identifier from its index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Catalog entry for this parameter
    pub fn definition(self) -> &'static ParameterDefinition {
        &CATALOG[self.index()]
    }
}

/// Semantic type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParamKind {
    /// 32-bit float
    Float,
    /// Unsigned 32-bit integer
    Unsigned,
    /// On/off flag (0 or 1)
    Flag,
}

/// Bounds and default for one parameter
///
/// Bounds and default are kept as `f64` so values can be compared in the
/// wider domain before they are narrowed to the parameter's own type.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParameterDefinition {
    /// Identifier (equal to the entry's catalog index)
    pub id: ParamId,
    /// Protocol key, case-sensitive
    pub key: &'static str,
    /// Controller-side name of the value
    pub name: &'static str,
    /// Semantic type
    pub kind: ParamKind,
    /// Smallest accepted value (inclusive)
    pub min: f64,
    /// Largest accepted value (inclusive)
    pub max: f64,
    /// Value used at first boot and when a proposed value is out of bounds
    pub default: f64,
}

impl ParameterDefinition {
    /// Check whether `value` lies in `[min, max]`
    ///
    /// NaN is never in bounds.
    pub fn in_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Check whether `value` is acceptable once narrowed to this kind
    ///
    /// Float parameters are stored as `f32` and compared against the `f32`
    /// images of the bounds, so a value accepted at a bound (0.02) is still
    /// accepted when it reads back from flash.
    pub fn admits(&self, value: f64) -> bool {
        match self.kind {
            ParamKind::Float => {
                let narrowed = value as f32;
                narrowed >= self.min as f32 && narrowed <= self.max as f32
            }
            ParamKind::Unsigned | ParamKind::Flag => self.in_bounds(value),
        }
    }
}

const fn float(id: ParamId, key: &'static str, name: &'static str, min: f64, max: f64, default: f64) -> ParameterDefinition {
    ParameterDefinition { id, key, name, kind: ParamKind::Float, min, max, default }
}

const fn unsigned(id: ParamId, key: &'static str, name: &'static str, min: u32, max: u32, default: u32) -> ParameterDefinition {
    ParameterDefinition {
        id,
        key,
        name,
        kind: ParamKind::Unsigned,
        min: min as f64,
        max: max as f64,
        default: default as f64,
    }
}

const fn flag(id: ParamId, key: &'static str, name: &'static str, default: bool) -> ParameterDefinition {
    ParameterDefinition {
        id,
        key,
        name,
        kind: ParamKind::Flag,
        min: 0.0,
        max: 1.0,
        default: if default { 1.0 } else { 0.0 },
    }
}

#[rustfmt::skip]
pub(super) const TABLE: [ParameterDefinition; PARAM_COUNT] = [
    // Charging (amps / volts)
    float(ParamId::MaxChargeCurrent,       "OM_MAX_CHARGE_CURRENT",  "MAX_CHARGE_CURRENT",        0.1,  1.5,  1.0),
    float(ParamId::LimitVoltage150mA,      "OM_LIMIT_VOLTAGE_150MA", "LIMIT_VOLTAGE_150MA",       25.0, 29.0, 28.0),
    float(ParamId::MaxChargeVoltage,       "OM_MAX_CHARGE_VOLTAGE",  "MAX_CHARGE_VOLTAGE",        25.0, 29.4, 29.0),
    float(ParamId::BatChargeCutoffVoltage, "OM_BAT_CUTOFF",          "BAT_CHARGE_CUTOFF_VOLTAGE", 25.0, 29.0, 28.0),
    float(ParamId::ChargeEndLimitCurrent,  "OM_CHARGE_END_CURRENT",  "CHARGE_END_LIMIT_CURRENT",  0.02, 0.5,  0.08),
    float(ParamId::MinChargeCurrent,       "OM_MIN_CHARGE_CURRENT",  "MIN_CHARGE_CURRENT",        0.05, 0.5,  0.1),
    // Drive calibration
    float(ParamId::MaxMps,    "OM_MAX_MPS",     "MAX_MPS",     0.1,   1.0,    0.5),
    float(ParamId::PwmPerMps, "OM_PWM_PER_MPS", "PWM_PER_MPS", 100.0, 500.0,  300.0),
    float(ParamId::TicksPerM, "OM_TICKS_PER_M", "TICKS_PER_M", 100.0, 1000.0, 300.0),
    float(ParamId::WheelBase, "OM_WHEEL_BASE",  "WHEEL_BASE",  0.2,   0.5,    0.325),
    // Emergency handling
    flag(ParamId::DisableEmergency, "OM_DISABLE_EMERGENCY", "DISABLE_EMERGENCY", false),
    unsigned(ParamId::OneWheelLiftEmergencyMillis,    "OM_ONE_WHEEL_TIMEOUT",         "ONE_WHEEL_LIFT_EMERGENCY_MILLIS",    100, 20_000, 10_000),
    unsigned(ParamId::BothWheelsLiftEmergencyMillis,  "OM_BOTH_WHEELS_TIMEOUT",       "BOTH_WHEELS_LIFT_EMERGENCY_MILLIS",  100, 5_000,  1_000),
    unsigned(ParamId::TiltEmergencyMillis,            "OM_TILT_TIMEOUT",              "TILT_EMERGENCY_MILLIS",              100, 2_000,  500),
    unsigned(ParamId::StopButtonEmergencyMillis,      "OM_STOP_BUTTON_TIMEOUT",       "STOP_BUTTON_EMERGENCY_MILLIS",       20,  1_000,  100),
    unsigned(ParamId::PlayButtonClearEmergencyMillis, "OM_PLAY_BUTTON_CLEAR_TIMEOUT", "PLAY_BUTTON_CLEAR_EMERGENCY_MILLIS", 500, 10_000, 2_000),
    unsigned(ParamId::ImuOnboardInclinationThreshold, "OM_IMU_THRESHOLD",             "IMU_ONBOARD_INCLINATION_THRESHOLD",  0x10, 0x7F, 0x38),
    flag(ParamId::EmergencyDebug, "OM_EMERGENCY_DEBUG", "EMERGENCY_DEBUG", false),
    // Optional sensors
    flag(ParamId::OptionBumper,     "OM_OPTION_BUMPER",     "OPTION_BUMPER",     false),
    flag(ParamId::OptionUltrasonic, "OM_OPTION_ULTRASONIC", "OPTION_ULTRASONIC", false),
];

/// The parameter table, in image order
pub static CATALOG: [ParameterDefinition; PARAM_COUNT] = TABLE;

/// Look up the definition for a protocol key
///
/// Keys are matched exactly (case-sensitive).
pub fn definition_for(key: &str) -> Option<&'static ParameterDefinition> {
    CATALOG.iter().find(|def| def.key == key)
}

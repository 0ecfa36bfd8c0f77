//! Active configuration
//!
//! The live parameter set read by the charge controller, drive loop and
//! emergency monitor. Fields are private and the only mutator is
//! crate-internal, so the validator is the single write path.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::catalog::{ParamId, ParamKind, ParameterDefinition, CATALOG, PARAM_COUNT, TABLE};

/// Typed value of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParamValue {
    Float(f32),
    Unsigned(u32),
    Flag(bool),
}

impl ParamValue {
    /// Value of a definition's default, narrowed to its kind
    pub const fn default_for(def: &ParameterDefinition) -> Self {
        match def.kind {
            ParamKind::Float => ParamValue::Float(def.default as f32),
            ParamKind::Unsigned => ParamValue::Unsigned(def.default as u32),
            ParamKind::Flag => ParamValue::Flag(def.default != 0.0),
        }
    }

    /// Widen to f64 for bounds comparison
    pub fn as_f64(self) -> f64 {
        match self {
            ParamValue::Float(v) => v as f64,
            ParamValue::Unsigned(v) => v as f64,
            ParamValue::Flag(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn as_f32(self) -> f32 {
        match self {
            ParamValue::Float(v) => v,
            other => other.as_f64() as f32,
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            ParamValue::Unsigned(v) => v,
            ParamValue::Flag(v) => v as u32,
            // Saturating cast, NaN becomes 0
            ParamValue::Float(v) => v as u32,
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            ParamValue::Flag(v) => v,
            ParamValue::Unsigned(v) => v != 0,
            ParamValue::Float(v) => v != 0.0,
        }
    }

    /// Check whether this value has the representation of `kind`
    pub fn is_kind(self, kind: ParamKind) -> bool {
        matches!(
            (self, kind),
            (ParamValue::Float(_), ParamKind::Float)
                | (ParamValue::Unsigned(_), ParamKind::Unsigned)
                | (ParamValue::Flag(_), ParamKind::Flag)
        )
    }
}

/// The live parameter set
///
/// Every value satisfies its catalog bounds. Readers get `&ActiveConfig` or
/// a copy; nothing outside this crate can obtain a mutable path to a field.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActiveConfig {
    values: [ParamValue; PARAM_COUNT],
}

impl Default for ActiveConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

impl ActiveConfig {
    /// Configuration with every parameter at its catalog default
    pub const fn defaults() -> Self {
        let mut values = [ParamValue::Flag(false); PARAM_COUNT];
        let mut i = 0;
        while i < PARAM_COUNT {
            values[i] = ParamValue::default_for(&TABLE[i]);
            i += 1;
        }
        Self { values }
    }

    /// Current value of a parameter
    pub fn get(&self, id: ParamId) -> ParamValue {
        self.values[id.index()]
    }

    /// Current value by protocol key
    pub fn get_by_key(&self, key: &str) -> Option<ParamValue> {
        super::catalog::definition_for(key).map(|def| self.get(def.id))
    }

    /// Iterate over every parameter in image order
    pub fn iter(&self) -> impl Iterator<Item = (&'static ParameterDefinition, ParamValue)> + '_ {
        CATALOG.iter().zip(self.values.iter().copied())
    }

    /// Replace one field. Only the validator calls this.
    pub(super) fn store(&mut self, id: ParamId, value: ParamValue) {
        self.values[id.index()] = value;
    }

    // Charging

    pub fn max_charge_current(&self) -> f32 {
        self.get(ParamId::MaxChargeCurrent).as_f32()
    }

    pub fn limit_voltage_150ma(&self) -> f32 {
        self.get(ParamId::LimitVoltage150mA).as_f32()
    }

    pub fn max_charge_voltage(&self) -> f32 {
        self.get(ParamId::MaxChargeVoltage).as_f32()
    }

    pub fn bat_charge_cutoff_voltage(&self) -> f32 {
        self.get(ParamId::BatChargeCutoffVoltage).as_f32()
    }

    pub fn charge_end_limit_current(&self) -> f32 {
        self.get(ParamId::ChargeEndLimitCurrent).as_f32()
    }

    pub fn min_charge_current(&self) -> f32 {
        self.get(ParamId::MinChargeCurrent).as_f32()
    }

    // Drive

    pub fn max_mps(&self) -> f32 {
        self.get(ParamId::MaxMps).as_f32()
    }

    pub fn pwm_per_mps(&self) -> f32 {
        self.get(ParamId::PwmPerMps).as_f32()
    }

    pub fn ticks_per_m(&self) -> f32 {
        self.get(ParamId::TicksPerM).as_f32()
    }

    pub fn wheel_base(&self) -> f32 {
        self.get(ParamId::WheelBase).as_f32()
    }

    // Emergency

    /// Emergency controller disabled (no lift, tilt or stop-button handling)
    pub fn emergency_disabled(&self) -> bool {
        self.get(ParamId::DisableEmergency).as_bool()
    }

    pub fn one_wheel_lift_emergency_ms(&self) -> u32 {
        self.get(ParamId::OneWheelLiftEmergencyMillis).as_u32()
    }

    pub fn both_wheels_lift_emergency_ms(&self) -> u32 {
        self.get(ParamId::BothWheelsLiftEmergencyMillis).as_u32()
    }

    pub fn tilt_emergency_ms(&self) -> u32 {
        self.get(ParamId::TiltEmergencyMillis).as_u32()
    }

    pub fn stop_button_emergency_ms(&self) -> u32 {
        self.get(ParamId::StopButtonEmergencyMillis).as_u32()
    }

    pub fn play_button_clear_emergency_ms(&self) -> u32 {
        self.get(ParamId::PlayButtonClearEmergencyMillis).as_u32()
    }

    /// Raw threshold register value for the onboard IMU tilt detection
    pub fn imu_onboard_inclination_threshold(&self) -> u8 {
        // Bounds keep this within 0x10..=0x7F
        self.get(ParamId::ImuOnboardInclinationThreshold).as_u32() as u8
    }

    pub fn emergency_debug(&self) -> bool {
        self.get(ParamId::EmergencyDebug).as_bool()
    }

    // Options

    pub fn option_bumper(&self) -> bool {
        self.get(ParamId::OptionBumper).as_bool()
    }

    pub fn option_ultrasonic(&self) -> bool {
        self.get(ParamId::OptionUltrasonic).as_bool()
    }
}

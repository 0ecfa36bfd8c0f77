//! Property tests for validation and flash persistence.
//!
//! Run on the host against the in-memory storage device.

use mowgli_core::config::{
    ActiveConfig, BootSource, ConfigManager, ConfigWarning, ParamId, ParamKind,
    ParameterDefinition, CATALOG, IMAGE_SIZE, IMAGE_WORDS,
};
use mowgli_hal::mock::MockStorage;
use mowgli_hal::FlashError;
use proptest::prelude::*;

const BASE: u32 = 0x0800_C000;
type Flash = MockStorage<128>;

/// Set every parameter to `min + f * (max - min)`
fn apply_fractions(manager: &mut ConfigManager<Flash>, fractions: &[f64]) {
    for (def, f) in CATALOG.iter().zip(fractions) {
        manager.set_numeric(def.key, def.min + f * (def.max - def.min));
    }
}

/// Device holding a saved image of the configuration built from `fractions`
fn saved_device(fractions: &[f64]) -> (Flash, ActiveConfig) {
    let mut manager = ConfigManager::boot(Flash::new(BASE), BASE);
    apply_fractions(&mut manager, fractions);
    manager.save().unwrap();
    let config = *manager.config();
    (manager.into_device(), config)
}

fn in_bounds(config: &ActiveConfig) -> bool {
    config.iter().all(|(def, value)| value.is_kind(def.kind) && def.admits(value.as_f64()))
}

/// Stored value is the accepted value narrowed to the parameter's kind
fn narrowed_from(def: &ParameterDefinition, accepted: f64, stored: f64) -> bool {
    match def.kind {
        ParamKind::Float => stored == accepted as f32 as f64,
        ParamKind::Unsigned | ParamKind::Flag => def.in_bounds(stored),
    }
}

proptest! {
    /// Whatever is saved comes back unchanged after a reboot.
    #[test]
    fn saved_config_survives_reboot(
        fractions in proptest::collection::vec(0.0f64..=1.0, CATALOG.len()),
    ) {
        let (flash, config) = saved_device(&fractions);
        let manager = ConfigManager::boot(flash, BASE);

        prop_assert_eq!(manager.boot_source(), BootSource::Flash);
        prop_assert_eq!(manager.config(), &config);
    }

    /// No numeric input can push a field outside its bounds.
    #[test]
    fn any_value_stays_in_bounds(
        index in 0usize..CATALOG.len(),
        value in any::<f64>(),
    ) {
        let mut manager = ConfigManager::boot(Flash::new(BASE), BASE);
        let def = &CATALOG[index];
        let outcome = manager.set_numeric(def.key, value);

        prop_assert!(in_bounds(manager.config()));
        if outcome.warning.is_none() {
            prop_assert!(def.in_bounds(value));
            let stored = manager.config().get(def.id).as_f64();
            prop_assert!(narrowed_from(def, value, stored));
        }
    }

    /// Text that is not a number never changes the configuration.
    #[test]
    fn garbage_text_is_rejected(
        index in 0usize..CATALOG.len(),
        raw in "[a-zA-Z_ ]{1,12}",
    ) {
        prop_assume!(raw.trim().parse::<f64>().is_err());

        let mut manager = ConfigManager::boot(Flash::new(BASE), BASE);
        let outcome = manager.set_value(CATALOG[index].key, &raw);

        prop_assert!(!outcome.is_applied());
        prop_assert!(
            matches!(outcome.warning, Some(ConfigWarning::UnparsableValue { .. })),
            "expected UnparsableValue warning"
        );
        prop_assert_eq!(manager.config(), &ActiveConfig::defaults());
    }

    /// Keys outside the catalog never change the configuration.
    #[test]
    fn unknown_keys_are_ignored(key in "[A-Z_]{1,48}", raw in "-?[0-9]{1,5}") {
        prop_assume!(CATALOG.iter().all(|def| def.key != key));

        let mut manager = ConfigManager::boot(Flash::new(BASE), BASE);
        let outcome = manager.set_value(&key, &raw);

        prop_assert!(!outcome.is_applied());
        prop_assert_eq!(manager.config(), &ActiveConfig::defaults());
        match outcome.warning {
            Some(ConfigWarning::UnknownKey { key: kept }) => {
                prop_assert!(key.starts_with(kept.as_str()));
                prop_assert!(kept.len() <= 32);
            }
            other => prop_assert!(false, "unexpected warning {:?}", other),
        }
    }

    /// Corrupting any byte of a saved image makes the next boot use defaults.
    #[test]
    fn corrupted_byte_falls_back_to_defaults(
        fractions in proptest::collection::vec(0.0f64..=1.0, CATALOG.len()),
        offset in 0u32..IMAGE_SIZE as u32,
        mask in 1u8..=255,
    ) {
        let (mut flash, _) = saved_device(&fractions);
        let original = flash.contents(BASE + offset, 1)[0];
        flash.poke(BASE + offset, &[original ^ mask]);

        let manager = ConfigManager::boot(flash, BASE);
        prop_assert!(matches!(manager.boot_source(), BootSource::Defaults(_)));
        prop_assert_eq!(manager.config(), &ActiveConfig::defaults());
    }

    /// Power loss after any number of programmed words leaves an image
    /// that is rejected at boot.
    #[test]
    fn interrupted_save_falls_back_to_defaults(
        fractions in proptest::collection::vec(0.0f64..=1.0, CATALOG.len()),
        written in 0usize..IMAGE_WORDS,
    ) {
        let (mut flash, _) = saved_device(&[]);
        flash.fail_program_after(written, FlashError::Timeout);

        let mut manager = ConfigManager::boot(flash, BASE);
        apply_fractions(&mut manager, &fractions);
        prop_assert!(manager.save().is_err());

        let manager = ConfigManager::boot(manager.into_device(), BASE);
        prop_assert!(matches!(manager.boot_source(), BootSource::Defaults(_)));
    }
}

#[test]
fn integer_fields_round_to_nearest() {
    let mut manager = ConfigManager::boot(Flash::new(BASE), BASE);
    manager.set_value("OM_TILT_TIMEOUT", "500.6");
    manager.set_value("OM_STOP_BUTTON_TIMEOUT", " 99.4 ");

    assert_eq!(manager.config().tilt_emergency_ms(), 501);
    assert_eq!(manager.config().stop_button_emergency_ms(), 99);
}

#[test]
fn every_catalog_key_is_settable() {
    let mut manager = ConfigManager::boot(Flash::new(BASE), BASE);
    for def in CATALOG.iter() {
        let outcome = manager.set_numeric(def.key, def.max);
        assert!(outcome.warning.is_none(), "{} rejected its own max", def.key);
    }

    let expected = *manager.config();
    manager.save().unwrap();
    let manager = ConfigManager::boot(manager.into_device(), BASE);
    assert_eq!(manager.config(), &expected);

    for id in ParamId::ALL {
        let def = id.definition();
        let stored = manager.config().get(id).as_f64();
        match def.kind {
            ParamKind::Float => assert_eq!(stored, def.max as f32 as f64, "{}", def.key),
            ParamKind::Unsigned | ParamKind::Flag => assert_eq!(stored, def.max, "{}", def.key),
        }
    }
}

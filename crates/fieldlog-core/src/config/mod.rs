//! Static and dynamic configuration trees.
//!
//! The static tree (identity, pinout, credentials) is supplied once at boot and never
//! written. The dynamic tree holds operational parameters, is changed by downlink
//! commands and is rewritten to storage after every applied batch.
//!
//! Every update works on a clone of the dynamic tree: a command that fails half way
//! down its path leaves the live tree untouched.

mod defaults;
mod routes;
mod storage;
mod value;

use alloc::format;
use alloc::string::{String, ToString};

use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use crate::codec::{ConfigCommand, DecodedCommand, WireValue};

pub use defaults::{
    ANALOG_INPUTS, DEFAULT_ACCUMULATION_TARGET, DEFAULT_LATENCY_MINUTES, DEFAULT_MAX_PAYLOAD_SIZE,
    ISURNODE_ANALOG_INPUTS, ISURNODE_OUTPUTS, MAX_CADENCE_MINUTES, MODBUS_INPUTS,
    OUTPUT_CONDITIONS, default_dynamic_tree,
};
pub use routes::{Converter, PathSegment, Route};
pub use storage::{ConfigStorage, RamConfigStorage, StorageError};
pub use value::ConfigValue;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown config command: {0}")]
    UnknownCommand(String),
    #[error("{command}: path segment {depth} is not a map or list")]
    InvalidPath { command: &'static str, depth: usize },
    #[error("{command}: index {index} out of bounds (len {len})")]
    IndexOutOfRange {
        command: &'static str,
        index: usize,
        len: usize,
    },
    #[error("{command}: value cannot be stored")]
    UnrepresentableValue { command: &'static str },
    #[error("Config serialization failed: {0}")]
    Serialize(postcard::Error),
    #[error("Config persist failed: {0}")]
    Persist(StorageError),
}

/// Outcome of one downlink batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub applied: usize,
    pub rejected: usize,
    /// Whether the tree reached storage after the batch.
    pub persisted: bool,
}

/// Owner of both configuration trees and of their storage.
pub struct ConfigStore<S: ConfigStorage> {
    static_tree: ConfigValue,
    dynamic: ConfigValue,
    storage: S,
}

impl<S: ConfigStorage> ConfigStore<S> {
    /// Load the dynamic tree from `storage`, falling back to factory defaults when nothing
    /// usable was saved.
    pub fn open(static_tree: ConfigValue, mut storage: S) -> Self {
        let dynamic = match storage.load() {
            Ok(Some(bytes)) => match postcard::from_bytes::<ConfigValue>(&bytes) {
                Ok(tree @ ConfigValue::Map(_)) => {
                    info!("Loaded dynamic config ({} bytes)", bytes.len());
                    tree
                }
                Ok(_) => {
                    warn!("Stored dynamic config is not a document, using defaults");
                    default_dynamic_tree()
                }
                Err(e) => {
                    warn!("Stored dynamic config is unreadable ({}), using defaults", e);
                    default_dynamic_tree()
                }
            },
            Ok(None) => {
                info!("No dynamic config stored, using defaults");
                default_dynamic_tree()
            }
            Err(e) => {
                error!("Error loading dynamic config: {}", e);
                default_dynamic_tree()
            }
        };

        Self {
            static_tree,
            dynamic,
            storage,
        }
    }

    pub fn dynamic(&self) -> &ConfigValue {
        &self.dynamic
    }

    /// Value in the static tree at a `/`-separated path.
    pub fn static_value(&self, path: &str) -> Option<&ConfigValue> {
        self.static_tree.lookup(path)
    }

    /// Value in the dynamic tree at a `/`-separated path.
    pub fn dynamic_value(&self, path: &str) -> Option<&ConfigValue> {
        self.dynamic.lookup(path)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Apply one command to a copy of the dynamic tree and return the copy.
    ///
    /// The live tree is never touched; committing the result is the caller's call.
    pub fn apply_single_update(
        &self,
        channel: u8,
        command: ConfigCommand,
        value: WireValue,
    ) -> Result<ConfigValue, ConfigError> {
        let route = command.route();
        let converted = convert(command, route.converter, value)?;

        let mut copy = self.dynamic.clone();
        set_path(&mut copy, command.name(), route.path, channel, converted)?;
        Ok(copy)
    }

    /// [`apply_single_update`](Self::apply_single_update) addressed by legacy command name.
    pub fn apply_named_update(
        &self,
        channel: u8,
        name: &str,
        value: WireValue,
    ) -> Result<ConfigValue, ConfigError> {
        let Some(command) = ConfigCommand::from_name(name) else {
            error!("Unknown config type: {}", name);
            return Err(ConfigError::UnknownCommand(name.to_string()));
        };
        self.apply_single_update(channel, command, value)
    }

    /// Apply decoded commands in order, then persist once.
    ///
    /// A failing command is logged and skipped. Later commands see the effect of earlier
    /// ones. The tree is written even if every command failed.
    pub fn apply_batch(&mut self, commands: &[DecodedCommand]) -> BatchReport {
        let mut report = BatchReport::default();

        for command in commands {
            debug!(
                "Applying {} on channel {}: {:?}",
                command.name(),
                command.channel,
                command.value
            );

            match self.apply_single_update(command.channel, command.command, command.value) {
                Ok(updated) => {
                    self.dynamic = updated;
                    report.applied += 1;
                    info!("Config updated: {}", command.name());
                }
                Err(e) => {
                    error!("Failed to apply {}: {}", command.name(), e);
                    report.rejected += 1;
                }
            }
        }

        report.persisted = match self.persist() {
            Ok(()) => true,
            Err(e) => {
                error!("{}", e);
                false
            }
        };

        report
    }

    /// Write the whole dynamic tree to storage.
    pub fn persist(&mut self) -> Result<(), ConfigError> {
        let bytes = postcard::to_allocvec(&self.dynamic).map_err(ConfigError::Serialize)?;
        self.storage.save(&bytes).map_err(ConfigError::Persist)?;
        info!("Dynamic config saved ({} bytes)", bytes.len());
        Ok(())
    }

    fn general_i64(&self, key: &str, default: i64) -> i64 {
        self.dynamic
            .get("general")
            .and_then(|general| general.get(key))
            .and_then(ConfigValue::as_i64)
            .unwrap_or(default)
    }

    fn general_bool(&self, key: &str, default: bool) -> bool {
        self.dynamic
            .get("general")
            .and_then(|general| general.get(key))
            .and_then(ConfigValue::as_bool)
            .unwrap_or(default)
    }

    /// Minutes between wake cycles, within `1..=MAX_CADENCE_MINUTES`.
    pub fn cadence_minutes(&self) -> u32 {
        self.general_i64("latency_time", DEFAULT_LATENCY_MINUTES)
            .clamp(1, MAX_CADENCE_MINUTES as i64) as u32
    }

    /// Whether wake-ups should align to wall-clock boundaries.
    pub fn align_to_clock(&self) -> bool {
        self.general_bool("rtc_sync", false)
    }

    /// Non-negative `general` integer as a `usize`, saturating where `usize` is narrower.
    fn general_usize(&self, key: &str, default: i64) -> usize {
        usize::try_from(self.general_i64(key, default).max(0)).unwrap_or(usize::MAX)
    }

    /// Cycles to batch before a mandatory transmit, at least 1.
    pub fn accumulation_target(&self) -> usize {
        self.general_usize("register_acumulator", DEFAULT_ACCUMULATION_TARGET)
            .max(1)
    }

    /// Retained-memory slot size in bytes.
    pub fn slot_size(&self) -> usize {
        self.general_usize("max_payload_size", DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// 0 for normal logging, 1 for conditional (alarm-driven) logging.
    pub fn register_mode(&self) -> i64 {
        self.general_i64("register_mode", 0)
    }

    pub fn compact_register(&self) -> bool {
        self.general_bool("compact_register", false)
    }

    pub fn alarm_carryover(&self) -> bool {
        self.general_bool("alarm_carryover", true)
    }
}

fn convert(
    command: ConfigCommand,
    converter: Option<Converter>,
    value: WireValue,
) -> Result<ConfigValue, ConfigError> {
    let unrepresentable = || ConfigError::UnrepresentableValue {
        command: command.name(),
    };

    match (converter, value) {
        (Some(Converter::Bool), value) => Ok(ConfigValue::Bool(value.is_truthy())),
        (Some(Converter::Hex { digits }), WireValue::Unsigned(raw)) => {
            Ok(ConfigValue::Text(format!("{:0digits$X}", raw)))
        }
        (Some(Converter::Hex { .. }), _) => Err(unrepresentable()),
        (None, WireValue::Unsigned(raw)) => i64::try_from(raw)
            .map(ConfigValue::Int)
            .map_err(|_| unrepresentable()),
        (None, WireValue::Signed(raw)) => Ok(ConfigValue::Int(raw)),
        (None, WireValue::Scaled(raw)) => Ok(ConfigValue::Float(raw)),
    }
}

fn segment_key(segment: PathSegment, channel: u8) -> String {
    match segment {
        PathSegment::Key(key) => key.to_string(),
        PathSegment::Index(index) => index.to_string(),
        PathSegment::Channel => channel.to_string(),
    }
}

fn segment_index(segment: PathSegment, channel: u8) -> Option<usize> {
    match segment {
        PathSegment::Key(_) => None,
        PathSegment::Index(index) => Some(index),
        PathSegment::Channel => Some(channel as usize),
    }
}

/// Step one level down, creating a map under a missing key. List slots are never created.
fn descend<'a>(
    node: &'a mut ConfigValue,
    command: &'static str,
    segment: PathSegment,
    depth: usize,
    channel: u8,
) -> Result<&'a mut ConfigValue, ConfigError> {
    match node {
        ConfigValue::Map(entries) => Ok(entries
            .entry(segment_key(segment, channel))
            .or_insert_with(ConfigValue::map)),
        ConfigValue::List(items) => {
            let index =
                segment_index(segment, channel).ok_or(ConfigError::InvalidPath { command, depth })?;
            let len = items.len();
            items
                .get_mut(index)
                .ok_or(ConfigError::IndexOutOfRange { command, index, len })
        }
        _ => Err(ConfigError::InvalidPath { command, depth }),
    }
}

fn set_path(
    root: &mut ConfigValue,
    command: &'static str,
    path: &[PathSegment],
    channel: u8,
    value: ConfigValue,
) -> Result<(), ConfigError> {
    let Some((&last, parents)) = path.split_last() else {
        return Err(ConfigError::InvalidPath { command, depth: 0 });
    };

    let mut node = root;
    for (depth, &segment) in parents.iter().enumerate() {
        node = descend(node, command, segment, depth, channel)?;
    }

    let depth = parents.len();
    match node {
        ConfigValue::Map(entries) => {
            entries.insert(segment_key(last, channel), value);
            Ok(())
        }
        ConfigValue::List(items) => {
            let index =
                segment_index(last, channel).ok_or(ConfigError::InvalidPath { command, depth })?;
            let len = items.len();
            let slot = items
                .get_mut(index)
                .ok_or(ConfigError::IndexOutOfRange { command, index, len })?;
            *slot = value;
            Ok(())
        }
        _ => Err(ConfigError::InvalidPath { command, depth }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CONFIG_DESCRIPTORS, decode};
    use alloc::vec;
    use alloc::vec::Vec;

    fn store() -> ConfigStore<RamConfigStorage> {
        ConfigStore::open(
            ConfigValue::map().with("serial", "c-000"),
            RamConfigStorage::new(),
        )
    }

    fn command(channel: u8, command: ConfigCommand, value: WireValue) -> DecodedCommand {
        DecodedCommand {
            channel,
            command,
            value,
        }
    }

    #[test]
    fn test_open_without_storage_uses_defaults() {
        let store = store();
        assert_eq!(store.cadence_minutes(), 10);
        assert_eq!(store.accumulation_target(), 5);
        assert_eq!(store.slot_size(), 256);
        assert!(!store.align_to_clock());
        assert!(!store.compact_register());
        assert!(store.alarm_carryover());
        assert_eq!(store.register_mode(), 0);
        assert_eq!(
            store.static_value("serial").and_then(ConfigValue::as_str),
            Some("c-000")
        );
    }

    #[test]
    fn test_open_falls_back_on_garbage() {
        let store = ConfigStore::open(
            ConfigValue::map(),
            RamConfigStorage::with_bytes(vec![0xff, 0xff, 0xff]),
        );
        assert_eq!(store.dynamic(), &default_dynamic_tree());
    }

    #[test]
    fn test_single_update_does_not_touch_live_tree() {
        let store = store();
        let updated = store
            .apply_single_update(0, ConfigCommand::LatencyTime, WireValue::Unsigned(15))
            .unwrap();

        assert_eq!(
            updated.lookup("general/latency_time"),
            Some(&ConfigValue::Int(15))
        );
        assert_eq!(store.cadence_minutes(), 10);
    }

    #[test]
    fn test_channel_placeholder_indexes_list() {
        let store = store();
        let updated = store
            .apply_single_update(1, ConfigCommand::AnalogInputLow, WireValue::Scaled(-1.5))
            .unwrap();

        assert_eq!(
            updated.lookup("analog_config/inputs/1/low"),
            Some(&ConfigValue::Float(-1.5))
        );
        assert_eq!(
            updated.lookup("analog_config/inputs/0/low"),
            Some(&ConfigValue::Float(0.0))
        );
    }

    #[test]
    fn test_out_of_range_channel_is_rejected() {
        let store = store();
        let result = store.apply_single_update(
            ANALOG_INPUTS as u8,
            ConfigCommand::AnalogInputEnable,
            WireValue::Unsigned(1),
        );

        assert!(matches!(
            result,
            Err(ConfigError::IndexOutOfRange { index, len, .. }) if index == ANALOG_INPUTS && len == ANALOG_INPUTS
        ));
    }

    #[test]
    fn test_missing_maps_are_created() {
        let store = ConfigStore::open(ConfigValue::map(), RamConfigStorage::with_bytes(
            postcard::to_allocvec(&ConfigValue::map()).unwrap(),
        ));

        let updated = store
            .apply_single_update(0, ConfigCommand::NbIotEdrx, WireValue::Unsigned(1))
            .unwrap();
        assert_eq!(
            updated.lookup("communications/nb_iot/edrx"),
            Some(&ConfigValue::Bool(true))
        );
    }

    #[test]
    fn test_channel_on_map_uses_decimal_key() {
        // Nothing stored under analog_config, so `inputs` is created as a map.
        let store = ConfigStore::open(ConfigValue::map(), RamConfigStorage::with_bytes(
            postcard::to_allocvec(&ConfigValue::map()).unwrap(),
        ));

        let updated = store
            .apply_single_update(7, ConfigCommand::AnalogInputHigh, WireValue::Scaled(3.25))
            .unwrap();
        assert_eq!(
            updated.lookup("analog_config/inputs/7/high"),
            Some(&ConfigValue::Float(3.25))
        );
    }

    #[test]
    fn test_scalar_in_path_is_rejected() {
        let mut store = store();
        store.dynamic = ConfigValue::map().with("general", 5i64);

        let result =
            store.apply_single_update(0, ConfigCommand::LatencyTime, WireValue::Unsigned(1));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidPath { depth: 1, .. })
        ));
    }

    #[test]
    fn test_converters() {
        let store = store();

        let key = store
            .apply_single_update(
                0,
                ConfigCommand::LorawanAppKey,
                WireValue::Unsigned(0x000102030405060708090a0b0c0d0e0f),
            )
            .unwrap();
        assert_eq!(
            key.lookup("communications/lorawan/app_key").and_then(ConfigValue::as_str),
            Some("000102030405060708090A0B0C0D0E0F")
        );

        let eui = store
            .apply_single_update(0, ConfigCommand::LorawanDevEui, WireValue::Unsigned(0xab))
            .unwrap();
        assert_eq!(
            eui.lookup("communications/lorawan/dev_eui").and_then(ConfigValue::as_str),
            Some("00000000000000AB")
        );

        let flag = store
            .apply_single_update(0, ConfigCommand::RtcSync, WireValue::Unsigned(2))
            .unwrap();
        assert_eq!(flag.lookup("general/rtc_sync"), Some(&ConfigValue::Bool(true)));
    }

    #[test]
    fn test_named_update() {
        let store = store();
        let updated = store
            .apply_named_update(0, "setRegisterMode", WireValue::Unsigned(1))
            .unwrap();
        assert_eq!(updated.lookup("general/register_mode"), Some(&ConfigValue::Int(1)));

        let unknown = store.apply_named_update(0, "setNothing", WireValue::Unsigned(1));
        assert!(matches!(unknown, Err(ConfigError::UnknownCommand(_))));
    }

    #[test]
    fn test_condition_routes_resolve() {
        let store = store();
        let updated = store
            .apply_single_update(
                ISURNODE_OUTPUTS as u8 - 1,
                ConfigCommand::IsurnodeDigOutCond2HighCond,
                WireValue::Unsigned(1),
            )
            .unwrap();

        let path = format!(
            "isurnode_config/digital_outputs/outputs/{}/conditions/1/high_cond",
            ISURNODE_OUTPUTS - 1
        );
        assert_eq!(updated.lookup(&path), Some(&ConfigValue::Bool(true)));
    }

    #[test]
    fn test_every_command_resolves_on_channel_zero() {
        let store = store();
        for descriptor in CONFIG_DESCRIPTORS {
            let result =
                store.apply_single_update(0, descriptor.command, WireValue::Unsigned(1));
            assert!(result.is_ok(), "{} did not resolve", descriptor.command.name());
        }
    }

    #[test]
    fn test_batch_continues_and_persists_once() {
        let mut store = store();
        let commands = [
            command(0, ConfigCommand::LatencyTime, WireValue::Unsigned(15)),
            command(200, ConfigCommand::ModbusInputEnable, WireValue::Unsigned(1)),
            command(0, ConfigCommand::RegisterAccumulator, WireValue::Unsigned(3)),
        ];

        let report = store.apply_batch(&commands);

        assert_eq!(
            report,
            BatchReport {
                applied: 2,
                rejected: 1,
                persisted: true,
            }
        );
        assert_eq!(store.cadence_minutes(), 15);
        assert_eq!(store.accumulation_target(), 3);
        assert_eq!(store.storage().save_count(), 1);

        // The rejected command left no trace between the two applied ones.
        let mut expected = self::store();
        expected.dynamic = expected
            .apply_single_update(0, ConfigCommand::LatencyTime, WireValue::Unsigned(15))
            .unwrap();
        expected.dynamic = expected
            .apply_single_update(0, ConfigCommand::RegisterAccumulator, WireValue::Unsigned(3))
            .unwrap();
        assert_eq!(store.dynamic(), expected.dynamic());

        let saved: ConfigValue = postcard::from_bytes(store.storage().bytes().unwrap()).unwrap();
        assert_eq!(&saved, store.dynamic());
    }

    #[test]
    fn test_later_commands_see_earlier_effects() {
        let mut store = ConfigStore::open(ConfigValue::map(), RamConfigStorage::with_bytes(
            postcard::to_allocvec(&ConfigValue::map()).unwrap(),
        ));

        store.apply_batch(&[
            command(3, ConfigCommand::ModbusInputLow, WireValue::Scaled(1.0)),
            command(3, ConfigCommand::ModbusInputHigh, WireValue::Scaled(2.0)),
        ]);

        assert_eq!(
            store.dynamic_value("modbus_config/inputs/3/low"),
            Some(&ConfigValue::Float(1.0))
        );
        assert_eq!(
            store.dynamic_value("modbus_config/inputs/3/high"),
            Some(&ConfigValue::Float(2.0))
        );
    }

    #[test]
    fn test_batch_from_downlink_reload() {
        let mut store = store();
        let outcome = decode("00A00F00A10100A201");
        assert!(outcome.is_complete());
        store.apply_batch(&outcome.commands);

        let bytes: Vec<u8> = store.storage().bytes().unwrap().to_vec();
        let reopened = ConfigStore::open(ConfigValue::map(), RamConfigStorage::with_bytes(bytes));
        assert_eq!(reopened.cadence_minutes(), 15);
        assert!(reopened.align_to_clock());
        assert_eq!(reopened.register_mode(), 1);
    }

    #[test]
    fn test_size_accessors_do_not_truncate() {
        let mut store = store();
        store.dynamic = ConfigValue::map().with(
            "general",
            ConfigValue::map()
                .with("max_payload_size", (1i64 << 32) + 16)
                .with("register_acumulator", -4i64),
        );

        assert!(store.slot_size() > crate::storage::RETAINED_CAPACITY);
        assert_eq!(store.accumulation_target(), 1);

        store.dynamic = ConfigValue::map().with(
            "general",
            ConfigValue::map().with("max_payload_size", -1i64),
        );
        assert_eq!(store.slot_size(), 0);
    }

    #[test]
    fn test_persist_failure_is_reported() {
        let mut store = store();
        store.storage_mut().fail_writes(true);

        let report = store.apply_batch(&[command(
            0,
            ConfigCommand::LatencyTime,
            WireValue::Unsigned(20),
        )]);

        assert_eq!(report.applied, 1);
        assert!(!report.persisted);
        assert_eq!(store.cadence_minutes(), 20);
    }
}

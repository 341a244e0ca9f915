//! Factory defaults for the dynamic configuration tree.

use alloc::format;
use alloc::vec::Vec;

use super::ConfigValue;

pub const DEFAULT_LATENCY_MINUTES: i64 = 10;
pub const DEFAULT_ACCUMULATION_TARGET: i64 = 5;
pub const DEFAULT_MAX_PAYLOAD_SIZE: i64 = 256;

/// Longest cadence whose interval still fits a `u32` count of seconds.
pub const MAX_CADENCE_MINUTES: u32 = u32::MAX / 60;

/// Analog input channels on the main board.
pub const ANALOG_INPUTS: usize = 2;
/// Modbus input slots.
pub const MODBUS_INPUTS: usize = 8;
/// Analog inputs on an attached Isurnode.
pub const ISURNODE_ANALOG_INPUTS: usize = 4;
/// Digital outputs on an attached Isurnode.
pub const ISURNODE_OUTPUTS: usize = 4;
/// Conditions per Isurnode digital output.
pub const OUTPUT_CONDITIONS: usize = 2;

fn thresholds(prefix: &str, node: ConfigValue) -> ConfigValue {
    node.with(&format!("{prefix}low"), 0.0)
        .with(&format!("{prefix}high"), 0.0)
        .with(&format!("{prefix}low_cond"), false)
        .with(&format!("{prefix}high_cond"), false)
}

fn channel_list(count: usize, entry: impl Fn(usize) -> ConfigValue) -> ConfigValue {
    ConfigValue::List((0..count).map(entry).collect::<Vec<_>>())
}

fn analog_input(channel: usize) -> ConfigValue {
    thresholds(
        "",
        ConfigValue::map()
            .with("channel", channel as i64)
            .with("enable", false)
            .with("zero", 0.0)
            .with("full_scale", 0.0),
    )
}

fn modbus_input(channel: usize) -> ConfigValue {
    thresholds(
        "",
        ConfigValue::map()
            .with("channel", channel as i64)
            .with("enable", false)
            .with("slave_address", 1i64)
            .with("register_address", 0i64)
            .with("fc", 3i64)
            .with("number_of_decimals", 0i64)
            .with("is_FP", false)
            .with("invert", false)
            .with("long_int", false)
            .with("offset", 0.0),
    )
}

fn isurnode_output(_: usize) -> ConfigValue {
    let condition = |_: usize| thresholds("", ConfigValue::map().with("sensor", 0i64));

    ConfigValue::map()
        .with("enable", false)
        .with("type", 0i64)
        .with("address", 0i64)
        .with("logic_operator", 0i64)
        .with("retry", 0i64)
        .with("retry_sleep", 0i64)
        .with("on_time", 0i64)
        .with("conditions", channel_list(OUTPUT_CONDITIONS, condition))
}

/// Dynamic tree a device boots with when nothing valid has been persisted.
///
/// Every list a downlink route indexes into is pre-sized, so all registered commands
/// resolve for the channels the hardware has.
pub fn default_dynamic_tree() -> ConfigValue {
    let general = ConfigValue::map()
        .with("latency_time", DEFAULT_LATENCY_MINUTES)
        .with("rtc_sync", false)
        .with("register_mode", 0i64)
        .with("register_acumulator", DEFAULT_ACCUMULATION_TARGET)
        .with("max_payload_size", DEFAULT_MAX_PAYLOAD_SIZE)
        .with("compact_register", false)
        .with("alarm_carryover", true)
        .with("magnet_wakeup", true)
        .with("debug_led", false);

    let communications = ConfigValue::map()
        .with(
            "lorawan",
            ConfigValue::map()
                .with("dev_eui", "")
                .with("app_eui", "")
                .with("app_key", ""),
        )
        .with(
            "nb_iot",
            ConfigValue::map()
                .with("edrx", false)
                .with("sim", "eSIM")
                .with("mode", "LTE-M"),
        );

    let digital = thresholds(
        "",
        ConfigValue::map()
            .with("enable", false)
            .with("counter", true)
            .with("pulse_weight", 1i64)
            .with("wake", 0i64),
    );

    let pt100 = thresholds(
        "",
        ConfigValue::map().with("enable", false).with("wires", 3i64),
    );

    let bme680 = thresholds(
        "humidity_",
        thresholds("temperature_", ConfigValue::map().with("enable", false)),
    );

    let sht30 = thresholds(
        "humidity_",
        thresholds(
            "temperature_",
            ConfigValue::map()
                .with("enable", false)
                .with("trigger_address", 0i64)
                .with("address", 0i64),
        ),
    );

    let isurnode = ConfigValue::map()
        .with("enable", false)
        .with("slave_address", 1i64)
        .with(
            "analog_config",
            ConfigValue::map()
                .with("pre_acquisition", 0i64)
                .with("trigger_address", 0i64)
                .with("inputs", channel_list(ISURNODE_ANALOG_INPUTS, analog_input)),
        )
        .with("SHT30_sensor", sht30)
        .with(
            "digital_outputs",
            ConfigValue::map().with("outputs", channel_list(ISURNODE_OUTPUTS, isurnode_output)),
        );

    ConfigValue::map()
        .with("general", general)
        .with("communications", communications)
        .with(
            "analog_config",
            ConfigValue::map()
                .with("pre_acquisition", 0i64)
                .with("inputs", channel_list(ANALOG_INPUTS, analog_input)),
        )
        .with("digital_config", digital)
        .with(
            "modbus_config",
            ConfigValue::map()
                .with("pre_acquisition", 0i64)
                .with("inputs", channel_list(MODBUS_INPUTS, modbus_input)),
        )
        .with("pt100_config", pt100)
        .with("BME680_sensor", bme680)
        .with("isurnode_config", isurnode)
}

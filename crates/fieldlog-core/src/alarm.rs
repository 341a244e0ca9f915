//! Threshold alarms evaluated against the dynamic configuration.
//!
//! Alarms only exist in conditional register mode (`general/register_mode == 1`).
//! In normal mode the monitor never raises.

use alloc::format;
use alloc::string::String;

use log::info;

use crate::config::ConfigValue;

/// Where a checked value came from, which selects its threshold rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmSource {
    /// Pulse count; compared after multiplying by `pulse_weight`.
    Digital,
    Pt100,
    Bme680Temperature,
    Bme680Humidity,
    AnalogInput(u8),
    ModbusInput(u8),
    IsurnodeAnalogInput(u8),
    Sht30Temperature,
    Sht30Humidity,
}

impl AlarmSource {
    /// Path of the config node holding the rule, and the key prefix inside it.
    fn rule_location(self) -> (String, &'static str) {
        match self {
            Self::Digital => ("digital_config".into(), ""),
            Self::Pt100 => ("pt100_config".into(), ""),
            Self::Bme680Temperature => ("BME680_sensor".into(), "temperature_"),
            Self::Bme680Humidity => ("BME680_sensor".into(), "humidity_"),
            Self::AnalogInput(channel) => (format!("analog_config/inputs/{channel}"), ""),
            Self::ModbusInput(channel) => (format!("modbus_config/inputs/{channel}"), ""),
            Self::IsurnodeAnalogInput(channel) => (
                format!("isurnode_config/analog_config/inputs/{channel}"),
                "",
            ),
            Self::Sht30Temperature => ("isurnode_config/SHT30_sensor".into(), "temperature_"),
            Self::Sht30Humidity => ("isurnode_config/SHT30_sensor".into(), "humidity_"),
        }
    }
}

/// Low/high thresholds, each active only when its condition flag is set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThresholdRule {
    pub low: f64,
    pub high: f64,
    pub low_cond: bool,
    pub high_cond: bool,
}

impl ThresholdRule {
    /// Read a rule from `node`; missing fields default to 0 / disabled.
    pub fn from_node(node: &ConfigValue, prefix: &str) -> Self {
        let number = |key: &str| {
            node.get(&format!("{prefix}{key}"))
                .and_then(ConfigValue::as_f64)
                .unwrap_or(0.0)
        };
        let flag = |key: &str| {
            node.get(&format!("{prefix}{key}"))
                .and_then(ConfigValue::as_bool)
                .unwrap_or(false)
        };

        Self {
            low: number("low"),
            high: number("high"),
            low_cond: flag("low_cond"),
            high_cond: flag("high_cond"),
        }
    }

    /// Strictly below an enabled low, or strictly above an enabled high.
    pub fn is_violated(&self, value: f64) -> bool {
        (self.low_cond && value < self.low) || (self.high_cond && value > self.high)
    }
}

/// Accumulates the alarm condition of one wake cycle.
pub struct AlarmMonitor<'a> {
    tree: &'a ConfigValue,
    enabled: bool,
    raised: bool,
}

impl<'a> AlarmMonitor<'a> {
    pub fn new(tree: &'a ConfigValue) -> Self {
        let enabled = tree
            .lookup("general/register_mode")
            .and_then(ConfigValue::as_i64)
            == Some(1);

        Self {
            tree,
            enabled,
            raised: false,
        }
    }

    /// Check one value against its rule. Returns whether this value is in alarm.
    pub fn check(&mut self, source: AlarmSource, value: f64) -> bool {
        if !self.enabled {
            return false;
        }

        let (path, prefix) = source.rule_location();
        let Some(node) = self.tree.lookup(&path) else {
            return false;
        };

        let value = match source {
            AlarmSource::Digital => {
                let weight = node
                    .get("pulse_weight")
                    .and_then(ConfigValue::as_f64)
                    .unwrap_or(1.0);
                value * weight
            }
            _ => value,
        };

        let violated = ThresholdRule::from_node(node, prefix).is_violated(value);
        if violated {
            info!("Alarm on {:?}: {}", source, value);
            self.raised = true;
        }
        violated
    }

    /// Whether any checked value was in alarm this cycle.
    pub fn alarm(&self) -> bool {
        self.raised
    }
}

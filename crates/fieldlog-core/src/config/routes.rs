//! Where each downlink command lands in the dynamic configuration tree.

use crate::codec::ConfigCommand;

/// One step of a configuration path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSegment {
    Key(&'static str),
    /// Fixed list position.
    Index(usize),
    /// Replaced by the decoded channel number at apply time.
    Channel,
}

/// Transformation applied to a decoded value before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// Zero is false, anything else true.
    Bool,
    /// Fixed-width upper-case hex text, for LoRaWAN identifiers and keys.
    Hex { digits: usize },
}

/// Destination of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path: &'static [PathSegment],
    pub converter: Option<Converter>,
}

const fn plain(path: &'static [PathSegment]) -> Route {
    Route {
        path,
        converter: None,
    }
}

const fn flag(path: &'static [PathSegment]) -> Route {
    Route {
        path,
        converter: Some(Converter::Bool),
    }
}

const fn hex(path: &'static [PathSegment], digits: usize) -> Route {
    Route {
        path,
        converter: Some(Converter::Hex { digits }),
    }
}

use PathSegment::{Channel as Ch, Index as Idx, Key as K};

const GENERAL: PathSegment = K("general");
const COMMS: PathSegment = K("communications");
const LORAWAN: PathSegment = K("lorawan");
const ANALOG: PathSegment = K("analog_config");
const DIGITAL: PathSegment = K("digital_config");
const MODBUS: PathSegment = K("modbus_config");
const PT100: PathSegment = K("pt100_config");
const BME680: PathSegment = K("BME680_sensor");
const ISURNODE: PathSegment = K("isurnode_config");
const INPUTS: PathSegment = K("inputs");
const SHT30: PathSegment = K("SHT30_sensor");
const DIGITAL_OUTPUTS: PathSegment = K("digital_outputs");
const OUTPUTS: PathSegment = K("outputs");
const CONDITIONS: PathSegment = K("conditions");

impl ConfigCommand {
    /// Path and converter of this command inside the dynamic tree.
    pub fn route(self) -> Route {
        use ConfigCommand::*;

        match self {
            LatencyTime => plain(&[GENERAL, K("latency_time")]),
            RtcSync => flag(&[GENERAL, K("rtc_sync")]),
            RegisterMode => plain(&[GENERAL, K("register_mode")]),
            RegisterAccumulator => plain(&[GENERAL, K("register_acumulator")]),
            MagnetWakeup => flag(&[GENERAL, K("magnet_wakeup")]),
            DebugLed => flag(&[GENERAL, K("debug_led")]),

            LorawanDevEui => hex(&[COMMS, LORAWAN, K("dev_eui")], 16),
            LorawanAppEui => hex(&[COMMS, LORAWAN, K("app_eui")], 16),
            LorawanAppKey => hex(&[COMMS, LORAWAN, K("app_key")], 32),
            NbIotEdrx => flag(&[COMMS, K("nb_iot"), K("edrx")]),

            AnalogPreAcquisition => plain(&[ANALOG, K("pre_acquisition")]),
            AnalogInputEnable => flag(&[ANALOG, INPUTS, Ch, K("enable")]),
            AnalogInputZero => plain(&[ANALOG, INPUTS, Ch, K("zero")]),
            AnalogInputFullScale => plain(&[ANALOG, INPUTS, Ch, K("full_scale")]),
            AnalogInputLow => plain(&[ANALOG, INPUTS, Ch, K("low")]),
            AnalogInputHigh => plain(&[ANALOG, INPUTS, Ch, K("high")]),
            AnalogInputLowCond => flag(&[ANALOG, INPUTS, Ch, K("low_cond")]),
            AnalogInputHighCond => flag(&[ANALOG, INPUTS, Ch, K("high_cond")]),

            DigitalEnable => flag(&[DIGITAL, K("enable")]),
            DigitalCounter => flag(&[DIGITAL, K("counter")]),
            DigitalPulseWeight => plain(&[DIGITAL, K("pulse_weight")]),
            DigitalWake => plain(&[DIGITAL, K("wake")]),
            DigitalLow => plain(&[DIGITAL, K("low")]),
            DigitalHigh => plain(&[DIGITAL, K("high")]),
            DigitalLowCond => flag(&[DIGITAL, K("low_cond")]),
            DigitalHighCond => flag(&[DIGITAL, K("high_cond")]),

            ModbusPreAcquisition => plain(&[MODBUS, K("pre_acquisition")]),
            ModbusInputEnable => flag(&[MODBUS, INPUTS, Ch, K("enable")]),
            ModbusInputSlaveAddress => plain(&[MODBUS, INPUTS, Ch, K("slave_address")]),
            ModbusInputRegisterAddress => plain(&[MODBUS, INPUTS, Ch, K("register_address")]),
            ModbusInputFc => plain(&[MODBUS, INPUTS, Ch, K("fc")]),
            ModbusInputNumberOfDecimals => {
                plain(&[MODBUS, INPUTS, Ch, K("number_of_decimals")])
            }
            ModbusInputIsFp => flag(&[MODBUS, INPUTS, Ch, K("is_FP")]),
            ModbusInputInvert => flag(&[MODBUS, INPUTS, Ch, K("invert")]),
            ModbusInputOffset => plain(&[MODBUS, INPUTS, Ch, K("offset")]),
            ModbusInputLow => plain(&[MODBUS, INPUTS, Ch, K("low")]),
            ModbusInputHigh => plain(&[MODBUS, INPUTS, Ch, K("high")]),
            ModbusInputLowCond => flag(&[MODBUS, INPUTS, Ch, K("low_cond")]),
            ModbusInputHighCond => flag(&[MODBUS, INPUTS, Ch, K("high_cond")]),
            ModbusInputLongInt => flag(&[MODBUS, INPUTS, Ch, K("long_int")]),

            Pt100Enable => flag(&[PT100, K("enable")]),
            Pt100Wires => plain(&[PT100, K("wires")]),
            Pt100Low => plain(&[PT100, K("low")]),
            Pt100High => plain(&[PT100, K("high")]),
            Pt100LowCond => flag(&[PT100, K("low_cond")]),
            Pt100HighCond => flag(&[PT100, K("high_cond")]),

            Bme680Enable => flag(&[BME680, K("enable")]),
            Bme680TemperatureLow => plain(&[BME680, K("temperature_low")]),
            Bme680TemperatureHigh => plain(&[BME680, K("temperature_high")]),
            Bme680TemperatureLowCond => flag(&[BME680, K("temperature_low_cond")]),
            Bme680TemperatureHighCond => flag(&[BME680, K("temperature_high_cond")]),
            Bme680HumidityLow => plain(&[BME680, K("humidity_low")]),
            Bme680HumidityHigh => plain(&[BME680, K("humidity_high")]),
            Bme680HumidityLowCond => flag(&[BME680, K("humidity_low_cond")]),
            Bme680HumidityHighCond => flag(&[BME680, K("humidity_high_cond")]),

            IsurnodeEnable => flag(&[ISURNODE, K("enable")]),
            IsurnodeSlaveAddress => plain(&[ISURNODE, K("slave_address")]),
            IsurnodeAnalogPreAcquisition => plain(&[ISURNODE, ANALOG, K("pre_acquisition")]),
            IsurnodeAnalogTriggerAddress => plain(&[ISURNODE, ANALOG, K("trigger_address")]),
            IsurnodeAnalogInputEnable => flag(&[ISURNODE, ANALOG, INPUTS, Ch, K("enable")]),
            IsurnodeAnalogInputZero => plain(&[ISURNODE, ANALOG, INPUTS, Ch, K("zero")]),
            IsurnodeAnalogInputFullScale => {
                plain(&[ISURNODE, ANALOG, INPUTS, Ch, K("full_scale")])
            }
            IsurnodeAnalogInputLow => plain(&[ISURNODE, ANALOG, INPUTS, Ch, K("low")]),
            IsurnodeAnalogInputHigh => plain(&[ISURNODE, ANALOG, INPUTS, Ch, K("high")]),
            IsurnodeAnalogInputLowCond => flag(&[ISURNODE, ANALOG, INPUTS, Ch, K("low_cond")]),
            IsurnodeAnalogInputHighCond => flag(&[ISURNODE, ANALOG, INPUTS, Ch, K("high_cond")]),
            IsurnodeAnalogInputAddress => plain(&[ISURNODE, ANALOG, INPUTS, Ch, K("address")]),

            IsurnodeSht30Enable => flag(&[ISURNODE, SHT30, K("enable")]),
            IsurnodeSht30TriggerAddress => plain(&[ISURNODE, SHT30, K("trigger_address")]),
            IsurnodeSht30Address => plain(&[ISURNODE, SHT30, K("address")]),
            IsurnodeSht30TempLow => plain(&[ISURNODE, SHT30, K("temperature_low")]),
            IsurnodeSht30TempHigh => plain(&[ISURNODE, SHT30, K("temperature_high")]),
            IsurnodeSht30TempLowCond => flag(&[ISURNODE, SHT30, K("temperature_low_cond")]),
            IsurnodeSht30TempHighCond => flag(&[ISURNODE, SHT30, K("temperature_high_cond")]),
            IsurnodeSht30HumLow => plain(&[ISURNODE, SHT30, K("humidity_low")]),
            IsurnodeSht30HumHigh => plain(&[ISURNODE, SHT30, K("humidity_high")]),
            IsurnodeSht30HumLowCond => flag(&[ISURNODE, SHT30, K("humidity_low_cond")]),
            IsurnodeSht30HumHighCond => flag(&[ISURNODE, SHT30, K("humidity_high_cond")]),

            IsurnodeDigitalOutputEnable => flag(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, K("enable")]),
            IsurnodeDigitalOutputType => plain(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, K("type")]),
            IsurnodeDigitalOutputAddress => {
                plain(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, K("address")])
            }
            IsurnodeDigitalOutputLogicOp => {
                plain(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, K("logic_operator")])
            }
            IsurnodeDigOutCond1Sensor => {
                plain(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, CONDITIONS, Idx(0), K("sensor")])
            }
            IsurnodeDigOutCond1Low => {
                plain(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, CONDITIONS, Idx(0), K("low")])
            }
            IsurnodeDigOutCond1High => {
                plain(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, CONDITIONS, Idx(0), K("high")])
            }
            IsurnodeDigOutCond1LowCond => {
                flag(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, CONDITIONS, Idx(0), K("low_cond")])
            }
            IsurnodeDigOutCond1HighCond => {
                flag(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, CONDITIONS, Idx(0), K("high_cond")])
            }
            IsurnodeDigOutCond2Sensor => {
                plain(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, CONDITIONS, Idx(1), K("sensor")])
            }
            IsurnodeDigOutCond2Low => {
                plain(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, CONDITIONS, Idx(1), K("low")])
            }
            IsurnodeDigOutCond2High => {
                plain(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, CONDITIONS, Idx(1), K("high")])
            }
            IsurnodeDigOutCond2LowCond => {
                flag(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, CONDITIONS, Idx(1), K("low_cond")])
            }
            IsurnodeDigOutCond2HighCond => {
                flag(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, CONDITIONS, Idx(1), K("high_cond")])
            }
            IsurnodeDigitalOutputRetry => {
                plain(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, K("retry")])
            }
            IsurnodeDigitalOutputRetrySleep => {
                plain(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, K("retry_sleep")])
            }
            IsurnodeDigitalOutputOnTime => {
                plain(&[ISURNODE, DIGITAL_OUTPUTS, OUTPUTS, Ch, K("on_time")])
            }
        }
    }
}

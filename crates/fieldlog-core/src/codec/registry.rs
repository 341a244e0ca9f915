//! Compile-time type registries for the wire format.
//!
//! Two disjoint code spaces share the same `[channel][type][value]` record layout:
//! - measurement codes (`0x00..=0x75`) describe uplink readings,
//! - configuration codes (`0xA0..=0xFE`) describe downlink commands.
//!
//! Both tables are fixed compatibility tables. Deployed server-side encoders depend on
//! every code, width, scale and signedness listed here, so entries must never be
//! renumbered.

/// Number of bytes a value occupies on the wire.
///
/// Only widths that a live descriptor uses exist. The legacy format also declared
/// widths of 6 and 9 bytes, which were never used and are not representable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteWidth {
    One,
    Two,
    Four,
    Eight,
    Sixteen,
}

impl ByteWidth {
    /// Width in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
            Self::Sixteen => 16,
        }
    }

    /// Width in hex digits.
    pub const fn hex_digits(self) -> usize {
        self.bytes() * 2
    }

    /// Mask keeping the low `bytes() * 8` bits of a value.
    pub const fn mask(self) -> u128 {
        match self {
            Self::Sixteen => u128::MAX,
            _ => (1u128 << (self.bytes() * 8)) - 1,
        }
    }
}

/// Kind of reading a sensor collaborator can hand to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MeasurementKind {
    DigitalInput = 0,
    DigitalOutput = 1,
    AnalogInput = 2,
    AnalogOutput = 3,
    ModbusInput = 4,
    ModbusGenericInput = 5,
    TemperatureInput = 6,
    TemperatureSensor = 7,
    HumiditySensor = 8,
    VoltageInput = 9,
    UnixTime = 10,
}

impl MeasurementKind {
    /// Every kind, in registry order.
    pub const ALL: [MeasurementKind; 11] = [
        Self::DigitalInput,
        Self::DigitalOutput,
        Self::AnalogInput,
        Self::AnalogOutput,
        Self::ModbusInput,
        Self::ModbusGenericInput,
        Self::TemperatureInput,
        Self::TemperatureSensor,
        Self::HumiditySensor,
        Self::VoltageInput,
        Self::UnixTime,
    ];

    /// Registry entry describing how this kind is laid out on the wire.
    pub fn descriptor(self) -> &'static MeasurementDescriptor {
        &MEASUREMENT_DESCRIPTORS[self as usize]
    }

    /// Short name used in log output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::DigitalInput => "digitalInput",
            Self::DigitalOutput => "digitalOutput",
            Self::AnalogInput => "analogInput",
            Self::AnalogOutput => "analogOutput",
            Self::ModbusInput => "modbusInput",
            Self::ModbusGenericInput => "modbusGenericInput",
            Self::TemperatureInput => "temperatureInput",
            Self::TemperatureSensor => "temperatureSensor",
            Self::HumiditySensor => "humiditySensor",
            Self::VoltageInput => "voltageInput",
            Self::UnixTime => "unixTime",
        }
    }

    /// Reverse lookup from a wire type code.
    pub fn from_type_code(code: u8) -> Option<Self> {
        MEASUREMENT_DESCRIPTORS
            .iter()
            .find(|descriptor| descriptor.type_code == code)
            .map(|descriptor| descriptor.kind)
    }
}

/// Layout and validation rules for one measurement kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementDescriptor {
    pub kind: MeasurementKind,
    pub type_code: u8,
    pub width: ByteWidth,
    /// Engineering value is multiplied by this before truncation.
    pub scale: u32,
    pub signed: bool,
    /// Inclusive lower bound, in engineering units (before scaling).
    pub min: f64,
    /// Inclusive upper bound, in engineering units (before scaling).
    pub max: f64,
    /// Number of scalar values a reading of this kind carries besides channel and kind.
    pub arity: u8,
}

impl MeasurementDescriptor {
    const fn new(
        kind: MeasurementKind,
        type_code: u8,
        width: ByteWidth,
        scale: u32,
        signed: bool,
        min: f64,
        max: f64,
    ) -> Self {
        Self {
            kind,
            type_code,
            width,
            scale,
            signed,
            min,
            max,
            arity: 1,
        }
    }
}

/// Measurement registry, indexed by `MeasurementKind as usize`.
pub static MEASUREMENT_DESCRIPTORS: [MeasurementDescriptor; 11] = {
    use ByteWidth::*;
    use MeasurementKind::*;
    [
        MeasurementDescriptor::new(DigitalInput, 0x00, One, 1, false, 0.0, 255.0),
        MeasurementDescriptor::new(DigitalOutput, 0x01, One, 1, false, 0.0, 255.0),
        MeasurementDescriptor::new(AnalogInput, 0x02, Two, 100, true, -327.67, 327.67),
        MeasurementDescriptor::new(AnalogOutput, 0x03, Two, 100, true, -327.67, 327.67),
        MeasurementDescriptor::new(ModbusInput, 0x04, Two, 100, true, -327.67, 327.67),
        MeasurementDescriptor::new(ModbusGenericInput, 0x05, Two, 1, false, 0.0, 65534.0),
        MeasurementDescriptor::new(TemperatureInput, 0x66, Two, 10, true, -3276.7, 3276.7),
        MeasurementDescriptor::new(TemperatureSensor, 0x67, Two, 10, true, -3276.7, 3276.7),
        MeasurementDescriptor::new(HumiditySensor, 0x68, One, 2, false, 0.0, 100.0),
        MeasurementDescriptor::new(VoltageInput, 0x74, Two, 1, false, 0.0, 65534.0),
        MeasurementDescriptor::new(UnixTime, 0x75, Four, 1, false, 0.0, 4294967295.0),
    ]
};

/// Layout of one downlink configuration command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigCommandDescriptor {
    pub command: ConfigCommand,
    pub type_code: u8,
    pub width: ByteWidth,
    /// Decoded integer is divided by this when it is not 1.
    pub scale: u32,
    pub signed: bool,
}

macro_rules! config_commands {
    ($($variant:ident = $code:literal, $name:literal, $width:ident, $scale:literal, $signed:literal;)*) => {
        /// Every configuration command a downlink can carry.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum ConfigCommand {
            $($variant,)*
        }

        impl ConfigCommand {
            /// Legacy command name, as used by server-side tooling.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }

        /// Configuration registry, sorted by type code.
        pub static CONFIG_DESCRIPTORS: &[ConfigCommandDescriptor] = &[
            $(ConfigCommandDescriptor {
                command: ConfigCommand::$variant,
                type_code: $code,
                width: ByteWidth::$width,
                scale: $scale,
                signed: $signed,
            },)*
        ];
    };
}

config_commands! {
    LatencyTime = 0xA0, "setLatencyTime", One, 1, false;
    RtcSync = 0xA1, "setRtcSync", One, 1, false;
    RegisterMode = 0xA2, "setRegisterMode", One, 1, false;
    RegisterAccumulator = 0xA3, "setRegisterAccumulator", One, 1, false;
    MagnetWakeup = 0xA4, "setMagnetWakeup", One, 1, false;
    DebugLed = 0xA5, "setDebugLED", One, 1, false;
    LorawanDevEui = 0xA6, "setLoRaWANDevEUI", Eight, 1, false;
    LorawanAppEui = 0xA7, "setLoRaWANAppEUI", Eight, 1, false;
    LorawanAppKey = 0xA8, "setLoRaWANAppKey", Sixteen, 1, false;
    NbIotEdrx = 0xA9, "setNB_IoTeDRX", One, 1, false;
    AnalogPreAcquisition = 0xAA, "setAnalogPreAcquisition", Two, 1, false;
    AnalogInputEnable = 0xAB, "setAnalogInputEnable", One, 1, false;
    AnalogInputZero = 0xAC, "setAnalogInputZero", Two, 100, true;
    AnalogInputFullScale = 0xAD, "setAnalogInputFullScale", Two, 100, true;
    AnalogInputLow = 0xAE, "setAnalogInputLow", Two, 100, true;
    AnalogInputHigh = 0xAF, "setAnalogInputHigh", Two, 100, true;
    AnalogInputLowCond = 0xB0, "setAnalogInputLowCond", One, 1, false;
    AnalogInputHighCond = 0xB1, "setAnalogInputHighCond", One, 1, false;
    DigitalEnable = 0xB2, "setDigitalEnable", One, 1, false;
    DigitalCounter = 0xB3, "setDigitalCounter", One, 1, false;
    DigitalPulseWeight = 0xB4, "setDigitalPulseWeight", One, 1, false;
    DigitalWake = 0xB5, "setDigitalWake", One, 1, false;
    DigitalLow = 0xB6, "setDigitalLow", One, 1, false;
    DigitalHigh = 0xB7, "setDigitalHigh", One, 1, false;
    DigitalLowCond = 0xB8, "setDigitalLowCond", One, 1, false;
    DigitalHighCond = 0xB9, "setDigitalHighCond", One, 1, false;
    ModbusPreAcquisition = 0xBA, "setModbusPreAcquisition", Two, 1, false;
    ModbusInputEnable = 0xBB, "setModbusInputEnable", One, 1, false;
    ModbusInputSlaveAddress = 0xBC, "setModbusInputSlaveAddress", One, 1, false;
    ModbusInputRegisterAddress = 0xBD, "setModbusInputRegisterAddress", Two, 1, false;
    ModbusInputFc = 0xBE, "setModbusInputFc", One, 1, false;
    ModbusInputNumberOfDecimals = 0xBF, "setModbusInputNumberOfDecimals", One, 1, false;
    ModbusInputIsFp = 0xC0, "setModbusInputIsFP", One, 1, false;
    ModbusInputInvert = 0xC1, "setModbusInputInvert", One, 1, false;
    ModbusInputOffset = 0xC2, "setModbusInputOffset", Two, 100, true;
    ModbusInputLow = 0xC3, "setModbusInputLow", Two, 100, true;
    ModbusInputHigh = 0xC4, "setModbusInputHigh", Two, 100, true;
    ModbusInputLowCond = 0xC5, "setModbusInputLowCond", One, 1, false;
    ModbusInputHighCond = 0xC6, "setModbusInputHighCond", One, 1, false;
    Pt100Enable = 0xC7, "setPT100Enable", One, 1, false;
    Pt100Wires = 0xC8, "setPT100Wires", One, 1, false;
    Pt100Low = 0xC9, "setPT100Low", Two, 100, true;
    Pt100High = 0xCA, "setPT100High", Two, 100, true;
    Pt100LowCond = 0xCB, "setPT100LowCond", One, 1, false;
    Pt100HighCond = 0xCC, "setPT100HighCond", One, 1, false;
    Bme680Enable = 0xCD, "setBME680Enable", One, 1, false;
    Bme680TemperatureLow = 0xCE, "setBME680TemperatureLow", Two, 100, true;
    Bme680TemperatureHigh = 0xCF, "setBME680TemperatureHigh", Two, 100, true;
    Bme680TemperatureLowCond = 0xD0, "setBME680TemperatureLowCond", One, 1, false;
    Bme680TemperatureHighCond = 0xD1, "setBME680TemperatureHighCond", One, 1, false;
    Bme680HumidityLow = 0xD2, "setBME680HumidityLow", Two, 100, true;
    Bme680HumidityHigh = 0xD3, "setBME680HumidityHigh", Two, 100, true;
    Bme680HumidityLowCond = 0xD4, "setBME680HumidityLowCond", One, 1, false;
    Bme680HumidityHighCond = 0xD5, "setBME680HumidityHighCond", One, 1, false;
    IsurnodeEnable = 0xD6, "setIsurnodeEnable", One, 1, false;
    IsurnodeSlaveAddress = 0xD7, "setIsurnodeSlaveAddress", One, 1, false;
    IsurnodeAnalogPreAcquisition = 0xD8, "setIsurnodeAnalogPreAcquisition", Two, 1, false;
    IsurnodeAnalogTriggerAddress = 0xD9, "setIsurnodeAnalogTriggerAddress", Two, 1, false;
    IsurnodeAnalogInputEnable = 0xDA, "setIsurnodeAnalogInputEnable", One, 1, false;
    IsurnodeAnalogInputZero = 0xDB, "setIsurnodeAnalogInputZero", Two, 100, true;
    IsurnodeAnalogInputFullScale = 0xDC, "setIsurnodeAnalogInputFullScale", Two, 100, true;
    IsurnodeAnalogInputLow = 0xDD, "setIsurnodeAnalogInputLow", Two, 100, true;
    IsurnodeAnalogInputHigh = 0xDE, "setIsurnodeAnalogInputHigh", Two, 100, true;
    IsurnodeAnalogInputLowCond = 0xDF, "setIsurnodeAnalogInputLowCond", One, 1, false;
    IsurnodeAnalogInputHighCond = 0xE0, "setIsurnodeAnalogInputHighCond", One, 1, false;
    IsurnodeAnalogInputAddress = 0xE1, "setIsurnodeAnalogInputAddress", Two, 1, false;
    IsurnodeSht30Enable = 0xE2, "setIsurnodeSHT30Enable", One, 1, false;
    IsurnodeSht30TriggerAddress = 0xE3, "setIsurnodeSHT30TriggerAddress", Two, 1, false;
    IsurnodeSht30Address = 0xE4, "setIsurnodeSHT30Address", Two, 1, false;
    IsurnodeSht30TempLow = 0xE5, "setIsurnodeSHT30TempLow", Two, 100, true;
    IsurnodeSht30TempHigh = 0xE6, "setIsurnodeSHT30TempHigh", Two, 100, true;
    IsurnodeSht30TempLowCond = 0xE7, "setIsurnodeSHT30TempLowCond", One, 1, false;
    IsurnodeSht30TempHighCond = 0xE8, "setIsurnodeSHT30TempHighCond", One, 1, false;
    IsurnodeSht30HumLow = 0xE9, "setIsurnodeSHT30HumLow", Two, 100, true;
    IsurnodeSht30HumHigh = 0xEA, "setIsurnodeSHT30HumHigh", Two, 100, true;
    IsurnodeSht30HumLowCond = 0xEB, "setIsurnodeSHT30HumLowCond", One, 1, false;
    IsurnodeSht30HumHighCond = 0xEC, "setIsurnodeSHT30HumHighCond", One, 1, false;
    IsurnodeDigitalOutputEnable = 0xED, "setIsurnodeDigitalOutputEnable", One, 1, false;
    IsurnodeDigitalOutputType = 0xEE, "setIsurnodeDigitalOutputType", One, 1, false;
    IsurnodeDigitalOutputAddress = 0xEF, "setIsurnodeDigitalOutputAddress", Two, 1, false;
    IsurnodeDigitalOutputLogicOp = 0xF0, "setIsurnodeDigitalOutputLogicOp", One, 1, false;
    IsurnodeDigOutCond1Sensor = 0xF1, "setIsurnodeDigOutCond1Sensor", One, 1, false;
    IsurnodeDigOutCond1Low = 0xF2, "setIsurnodeDigOutCond1Low", Two, 100, true;
    IsurnodeDigOutCond1High = 0xF3, "setIsurnodeDigOutCond1High", Two, 100, true;
    IsurnodeDigOutCond1LowCond = 0xF4, "setIsurnodeDigOutCond1LowCond", One, 1, false;
    IsurnodeDigOutCond1HighCond = 0xF5, "setIsurnodeDigOutCond1HighCond", One, 1, false;
    IsurnodeDigOutCond2Sensor = 0xF6, "setIsurnodeDigOutCond2Sensor", One, 1, false;
    IsurnodeDigOutCond2Low = 0xF7, "setIsurnodeDigOutCond2Low", Two, 100, true;
    IsurnodeDigOutCond2High = 0xF8, "setIsurnodeDigOutCond2High", Two, 100, true;
    IsurnodeDigOutCond2LowCond = 0xF9, "setIsurnodeDigOutCond2LowCond", One, 1, false;
    IsurnodeDigOutCond2HighCond = 0xFA, "setIsurnodeDigOutCond2HighCond", One, 1, false;
    IsurnodeDigitalOutputRetry = 0xFB, "setIsurnodeDigitalOutputRetry", One, 1, false;
    IsurnodeDigitalOutputRetrySleep = 0xFC, "setIsurnodeDigitalOutputRetrySleep", One, 1, false;
    IsurnodeDigitalOutputOnTime = 0xFD, "setIsurnodeDigitalOutputOnTime", Two, 1, false;
    ModbusInputLongInt = 0xFE, "setModbusInputLongInt", One, 1, false;
}

impl ConfigCommand {
    /// Registry entry for this command.
    pub fn descriptor(self) -> &'static ConfigCommandDescriptor {
        // Every variant is generated together with its table row, in declaration order.
        &CONFIG_DESCRIPTORS[self as usize]
    }

    /// Resolve a legacy command name such as `"setLatencyTime"`.
    pub fn from_name(name: &str) -> Option<Self> {
        CONFIG_DESCRIPTORS
            .iter()
            .find(|descriptor| descriptor.command.name() == name)
            .map(|descriptor| descriptor.command)
    }
}

/// Binary search of the configuration registry by wire type code.
pub fn config_descriptor(type_code: u8) -> Option<&'static ConfigCommandDescriptor> {
    CONFIG_DESCRIPTORS
        .binary_search_by_key(&type_code, |descriptor| descriptor.type_code)
        .ok()
        .map(|index| &CONFIG_DESCRIPTORS[index])
}

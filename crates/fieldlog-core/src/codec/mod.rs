//! Hex wire codec for uplink telemetry and downlink configuration.
//!
//! A payload is a concatenation of records with no delimiter:
//!
//! ```text
//! [1B channel][1B type code][W bytes value, big-endian]
//! ```
//!
//! hex-encoded. Uplink records resolve their type code against the measurement
//! registry; downlink records resolve it against the configuration registry only.

pub mod registry;

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use log::{debug, warn};
use thiserror_no_std::Error;

pub use registry::{
    ByteWidth, CONFIG_DESCRIPTORS, ConfigCommand, ConfigCommandDescriptor,
    MEASUREMENT_DESCRIPTORS, MeasurementDescriptor, MeasurementKind, config_descriptor,
};

/// Hex digits of the widest measurement record (channel + type + 4-byte value).
const MAX_RECORD_HEX: usize = 12;

/// One sensor reading, produced fresh every wake cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub channel: u8,
    pub kind: MeasurementKind,
    /// Engineering-unit value (e.g. °C, %, V).
    pub value: f64,
}

impl Reading {
    pub const fn new(channel: u8, kind: MeasurementKind, value: f64) -> Self {
        Self {
            channel,
            kind,
            value,
        }
    }
}

/// Why a single reading was left out of an encoded payload.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum EncodeError {
    #[error("channel {channel} ({kind}): value is not a number")]
    NotANumber { channel: u8, kind: &'static str },
    #[error("channel {channel} ({kind}): value {value} outside {min} - {max}")]
    OutOfRange {
        channel: u8,
        kind: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("channel {channel}: record does not fit the record buffer")]
    RecordOverflow { channel: u8 },
}

/// Value carried by a decoded downlink command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireValue {
    /// Unsigned, unscaled integer. Up to 128 bits for LoRaWAN keys.
    Unsigned(u128),
    /// Signed (two's-complement) unscaled integer.
    Signed(i64),
    /// Any value whose descriptor scale is not 1.
    Scaled(f64),
}

impl WireValue {
    /// Zero is false, anything else is true.
    pub fn is_truthy(&self) -> bool {
        match *self {
            Self::Unsigned(value) => value != 0,
            Self::Signed(value) => value != 0,
            Self::Scaled(value) => value != 0.0,
        }
    }
}

/// One configuration command parsed from a downlink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedCommand {
    pub channel: u8,
    pub command: ConfigCommand,
    pub value: WireValue,
}

impl DecodedCommand {
    /// Legacy command name.
    pub fn name(&self) -> &'static str {
        self.command.name()
    }
}

/// How decoding of a downlink ended.
///
/// Anything other than `Complete` means the returned command list is a prefix of the
/// payload: a misaligned record corrupts every offset after it, so decoding stops.
/// Every `offset` is the hex offset of the record that stopped decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    Complete,
    /// The record starting at `offset` has a type code that is not a configuration code.
    UnknownCode { offset: usize, code: u8 },
    /// The payload ended in the middle of the record starting at `offset`.
    Truncated { offset: usize },
    /// A non-hex character was found inside the record starting at `offset`.
    InvalidHex { offset: usize },
}

/// Commands decoded from a downlink, plus how decoding ended.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutcome {
    pub commands: Vec<DecodedCommand>,
    pub status: DecodeStatus,
}

impl DecodeOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == DecodeStatus::Complete
    }
}

/// Encode readings into a hex payload.
///
/// Readings that fail validation are logged and skipped; the rest are emitted in
/// their original order. Returns an empty string when nothing could be encoded.
pub fn encode(readings: &[Reading]) -> String {
    let mut payload = String::new();

    for reading in readings {
        match encode_record(reading) {
            Ok(record) => payload.push_str(&record),
            Err(e) => warn!("Skipping reading: {}", e),
        }
    }

    payload
}

/// Encode a single reading into its hex record.
///
/// The value is multiplied by the descriptor scale and truncated toward zero (not
/// rounded), which deployed decoders rely on. Negative values of signed kinds are
/// written in two's complement sized to the descriptor width.
pub fn encode_record(reading: &Reading) -> Result<heapless::String<MAX_RECORD_HEX>, EncodeError> {
    let descriptor = reading.kind.descriptor();
    let value = reading.value;

    if value.is_nan() {
        return Err(EncodeError::NotANumber {
            channel: reading.channel,
            kind: reading.kind.name(),
        });
    }

    if !(value >= descriptor.min && value <= descriptor.max) {
        return Err(EncodeError::OutOfRange {
            channel: reading.channel,
            kind: reading.kind.name(),
            value,
            min: descriptor.min,
            max: descriptor.max,
        });
    }

    // `as` truncates toward zero.
    let scaled = (value * descriptor.scale as f64) as i64;
    let raw = (scaled as i128 as u128) & descriptor.width.mask();

    let mut record = heapless::String::<MAX_RECORD_HEX>::new();
    write!(
        record,
        "{:02x}{:02x}{:0width$x}",
        reading.channel,
        descriptor.type_code,
        raw,
        width = descriptor.width.hex_digits()
    )
    .map_err(|_| EncodeError::RecordOverflow {
        channel: reading.channel,
    })?;

    debug!(
        "Encoded channel {} {} = {} -> {}",
        reading.channel,
        reading.kind.name(),
        value,
        record
    );

    Ok(record)
}

/// Decode a downlink hex payload into configuration commands.
///
/// Parsing is strictly left to right and never fails outright: the first record that
/// cannot be parsed ends decoding, and everything decoded before it is returned with
/// a status describing why decoding stopped. Hex digits may be upper or lower case.
pub fn decode(payload: &str) -> DecodeOutcome {
    let bytes = payload.as_bytes();
    let mut commands = Vec::new();
    let mut cursor = 0;

    let status = loop {
        if cursor >= bytes.len() {
            break DecodeStatus::Complete;
        }

        let start = cursor;
        let channel = match read_hex_byte(bytes, cursor) {
            Ok(byte) => byte,
            Err(status) => break status.at(start),
        };
        cursor += 2;

        let code = match read_hex_byte(bytes, cursor) {
            Ok(byte) => byte,
            Err(status) => break status.at(start),
        };

        let Some(descriptor) = config_descriptor(code) else {
            warn!("Unknown configuration type 0x{:02X} in record at {}", code, start);
            break DecodeStatus::UnknownCode {
                offset: start,
                code,
            };
        };
        cursor += 2;

        let raw = match read_hex_value(bytes, cursor, descriptor.width) {
            Ok(raw) => raw,
            Err(status) => break status.at(start),
        };
        cursor += descriptor.width.hex_digits();

        let value = interpret(raw, descriptor);
        debug!(
            "Decoded channel {} {} = {:?}",
            channel,
            descriptor.command.name(),
            value
        );

        commands.push(DecodedCommand {
            channel,
            command: descriptor.command,
            value,
        });
    };

    if status != DecodeStatus::Complete {
        warn!(
            "Downlink decoding stopped after {} command(s): {:?}",
            commands.len(),
            status
        );
    }

    DecodeOutcome { commands, status }
}

/// Apply signedness and scale to a raw big-endian integer.
fn interpret(raw: u128, descriptor: &ConfigCommandDescriptor) -> WireValue {
    let bits = descriptor.width.bytes() * 8;

    let integer = if descriptor.signed {
        let signed = if bits < 128 && (raw >> (bits - 1)) & 1 == 1 {
            raw as i128 - (1i128 << bits)
        } else {
            raw as i128
        };
        Some(signed)
    } else {
        None
    };

    if descriptor.scale != 1 {
        let numerator = match integer {
            Some(signed) => signed as f64,
            None => raw as f64,
        };
        return WireValue::Scaled(numerator / descriptor.scale as f64);
    }

    match integer {
        Some(signed) => WireValue::Signed(signed as i64),
        None => WireValue::Unsigned(raw),
    }
}

/// Failure while reading hex digits, before the record offset is known.
enum HexFault {
    Short,
    NotHex,
}

impl HexFault {
    fn at(self, offset: usize) -> DecodeStatus {
        match self {
            Self::Short => DecodeStatus::Truncated { offset },
            Self::NotHex => DecodeStatus::InvalidHex { offset },
        }
    }
}

fn hex_nibble(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

fn read_hex_byte(bytes: &[u8], at: usize) -> Result<u8, HexFault> {
    let pair = bytes.get(at..at + 2).ok_or(HexFault::Short)?;
    let high = hex_nibble(pair[0]).ok_or(HexFault::NotHex)?;
    let low = hex_nibble(pair[1]).ok_or(HexFault::NotHex)?;
    Ok((high << 4) | low)
}

fn read_hex_value(bytes: &[u8], at: usize, width: ByteWidth) -> Result<u128, HexFault> {
    let mut value = 0u128;
    for index in 0..width.bytes() {
        value = (value << 8) | read_hex_byte(bytes, at + index * 2)? as u128;
    }
    Ok(value)
}

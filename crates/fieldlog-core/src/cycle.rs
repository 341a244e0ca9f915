//! One wake cycle, from fresh readings to the next sleep duration.
//!
//! ```text
//! readings -> encode -> compact filter -> store -> alarm carryover -> transmit?
//!                                                                       |
//!     sleep <- seconds_until_next_wake <- apply_downlink <- drain/clear <-+
//! ```
//!
//! The accumulator geometry (slot size, accumulation target) is fixed when the cycle is
//! built at boot; downlink changes to it take effect on the next boot.

use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, info, warn};

use crate::codec::{self, DecodeStatus, Reading};
use crate::config::{BatchReport, ConfigStorage, ConfigStore};
use crate::schedule::{AlarmCarryover, SchedulePolicy, keep_alive_secs};
use crate::storage::{AccumulatorError, CycleAccumulator, RetainedMemory};

/// Why the processor left deep sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    PowerOn,
    /// RTC GPIO: the service magnet was held to the case.
    MagnetWake,
    /// Watchdog reset, used to wake the modem.
    Watchdog,
    DeepSleepTimer,
    SoftReset,
    Unknown,
}

impl WakeReason {
    /// Map the ESP32 `wake_reason()` code.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::PowerOn,
            2 => Self::MagnetWake,
            3 => Self::Watchdog,
            4 => Self::DeepSleepTimer,
            5 => Self::SoftReset,
            _ => Self::Unknown,
        }
    }

    /// Wake-ups that always flush the accumulator.
    pub fn forces_transmit(self) -> bool {
        matches!(self, Self::MagnetWake | Self::Watchdog)
    }
}

/// What happened during [`WakeCycle::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Payload handed to the accumulator (empty if nothing encoded or compacted away).
    pub payload: String,
    pub compacted: bool,
    pub stored: bool,
    pub carryover: AlarmCarryover,
    pub transmit: bool,
    pub slot_count: usize,
}

/// Result of applying a downlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownlinkReport {
    pub status: DecodeStatus,
    pub batch: BatchReport,
}

/// The per-boot state of the logger: configuration plus the retained accumulator.
pub struct WakeCycle<M: RetainedMemory, S: ConfigStorage> {
    config: ConfigStore<S>,
    accumulator: CycleAccumulator<M>,
}

impl<M: RetainedMemory, S: ConfigStorage> WakeCycle<M, S> {
    pub fn new(config: ConfigStore<S>, memory: M) -> Result<Self, AccumulatorError> {
        let accumulator =
            CycleAccumulator::new(memory, config.slot_size(), config.accumulation_target())?;

        Ok(Self {
            config,
            accumulator,
        })
    }

    pub fn config(&self) -> &ConfigStore<S> {
        &self.config
    }

    pub fn accumulator(&self) -> &CycleAccumulator<M> {
        &self.accumulator
    }

    pub fn into_parts(self) -> (ConfigStore<S>, M) {
        (self.config, self.accumulator.into_memory())
    }

    fn policy(&self) -> SchedulePolicy {
        SchedulePolicy::from_config(&self.config)
    }

    /// Encode and store this cycle's readings and decide whether to transmit.
    ///
    /// `alarm` is this cycle's evaluated alarm condition (see [`crate::alarm::AlarmMonitor`]).
    pub fn run(&mut self, readings: &[Reading], alarm: bool, reason: WakeReason) -> CycleReport {
        let mut payload = codec::encode(readings);
        if payload.is_empty() {
            warn!("Nothing encoded this cycle, storing empty payload");
        }

        let mut compacted = false;
        if self.config.compact_register() {
            let is_last_cycle = self.accumulator.slot_count() + 1 >= self.accumulator.target();
            if !is_last_cycle && !alarm {
                debug!("Compact register: discarding intermediate reading");
                payload.clear();
                compacted = true;
            }
        }

        let stored = match self.accumulator.store(&payload) {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not store payload: {}", e);
                false
            }
        };

        let carryover = self.policy().carry_alarm(&mut self.accumulator, alarm);

        let transmit = self.accumulator.should_transmit()
            || carryover.force_transmit
            || reason.forces_transmit();

        let slot_count = self.accumulator.slot_count();
        info!(
            "Cycle {} of {}: alarm {} (previous {}), transmit {}",
            slot_count,
            self.accumulator.target(),
            alarm,
            carryover.previous_alarm,
            transmit
        );

        CycleReport {
            payload,
            compacted,
            stored,
            carryover,
            transmit,
            slot_count,
        }
    }

    /// Payloads waiting for the radio, oldest first.
    pub fn pending_payloads(&self) -> Vec<String> {
        self.accumulator.drain()
    }

    /// Called by the radio layer once every pending payload is sent.
    pub fn acknowledge_flush(&mut self) -> Result<(), AccumulatorError> {
        self.accumulator.clear()
    }

    /// Decode a configuration downlink and apply whatever decoded cleanly.
    pub fn apply_downlink(&mut self, hex: &str) -> DownlinkReport {
        let outcome = codec::decode(hex);
        let batch = self.config.apply_batch(&outcome.commands);

        info!(
            "Downlink: {} applied, {} rejected",
            batch.applied, batch.rejected
        );

        DownlinkReport {
            status: outcome.status,
            batch,
        }
    }

    /// Sleep duration, read from the current (possibly just updated) configuration.
    pub fn seconds_until_next_wake(&self, now: Option<u32>) -> u32 {
        self.policy().seconds_until_next_wake(now)
    }

    /// MQTT keep-alive for the current cadence and accumulation target.
    pub fn keep_alive_secs(&self) -> u32 {
        keep_alive_secs(self.config.cadence_minutes(), self.accumulator.target())
    }
}

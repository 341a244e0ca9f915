//! Duty-cycle scheduling: when to wake next, and when an alarm forces an early flush.

pub mod clock;

use log::{debug, error};

use crate::config::{ConfigStorage, ConfigStore};
use crate::storage::{CycleAccumulator, RetainedMemory};

pub use clock::{
    CivilTime, ClockError, MIN_TRUSTED_UNIX_TIME, ManualClock, RealTimeClock, parse_lorawan_time,
    parse_nb_iot_time, trusted_now,
};

/// Extra seconds of slack the broker gets on top of each wake interval.
const KEEP_ALIVE_SLACK_SECS: u32 = 20;

/// Scheduling parameters read from the dynamic configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// Minutes between wake cycles, at least 1.
    pub cadence_minutes: u32,
    /// Align wake-ups to wall-clock multiples of the cadence when a trusted time is known.
    pub align_to_clock: bool,
    pub alarm_carryover: bool,
}

impl SchedulePolicy {
    pub fn from_config<S: ConfigStorage>(config: &ConfigStore<S>) -> Self {
        Self {
            cadence_minutes: config.cadence_minutes(),
            align_to_clock: config.align_to_clock(),
            alarm_carryover: config.alarm_carryover(),
        }
    }

    /// Seconds to sleep before the next cycle.
    ///
    /// `now` is a trusted Unix time, or `None` when no trustworthy clock is available,
    /// in which case the cadence is used verbatim.
    pub fn seconds_until_next_wake(&self, now: Option<u32>) -> u32 {
        let cadence = self.cadence_minutes.max(1);

        let interval = cadence.saturating_mul(60);

        let Some(now) = now.filter(|_| self.align_to_clock) else {
            return interval;
        };

        let second = now % 60;
        let minute = (now / 60) % 60;
        let hour = (now / 3_600) % 24;

        let mut delay = if cadence < 60 {
            // Past minute 59 the next boundary is the top of the hour.
            let next_minute = ((minute / cadence + 1) * cadence).min(60);
            (next_minute - minute) * 60 - second
        } else {
            let step = cadence / 60;
            let next_hour = ((hour / step + 1) * step).min(24);
            ((next_hour - hour) * 60 - minute) * 60 - second
        };

        if delay < 60 {
            delay = delay.saturating_add(interval);
        }

        debug!(
            "Aligned wake at {:02}:{:02}:{:02} + {}s (cadence {} min)",
            hour, minute, second, delay, cadence
        );
        delay
    }

    /// Alarm bookkeeping for this cycle, honouring the carryover setting.
    ///
    /// With carryover disabled only the current alarm forces a transmit, but the flag is
    /// still recorded so re-enabling carryover sees the right history.
    pub fn carry_alarm<M: RetainedMemory>(
        &self,
        accumulator: &mut CycleAccumulator<M>,
        current_alarm: bool,
    ) -> AlarmCarryover {
        let outcome = evaluate_alarm_carryover(accumulator, current_alarm);
        if self.alarm_carryover {
            outcome
        } else {
            AlarmCarryover {
                force_transmit: current_alarm,
                ..outcome
            }
        }
    }
}

/// Result of comparing this cycle's alarm to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmCarryover {
    pub force_transmit: bool,
    pub previous_alarm: bool,
}

/// Record `current_alarm` and report whether it or the previous cycle's alarm forces a
/// transmit now.
///
/// The previous flag is read before it is overwritten, so both the onset and the
/// clearing of an alarm are reported within one cycle.
pub fn evaluate_alarm_carryover<M: RetainedMemory>(
    accumulator: &mut CycleAccumulator<M>,
    current_alarm: bool,
) -> AlarmCarryover {
    let previous_alarm = accumulator.get_alarm_flag();

    if let Err(e) = accumulator.set_alarm_flag(current_alarm) {
        error!("Failed to record alarm flag: {}", e);
    }

    AlarmCarryover {
        force_transmit: current_alarm || previous_alarm,
        previous_alarm,
    }
}

/// MQTT keep-alive long enough to span a whole accumulation window.
pub fn keep_alive_secs(cadence_minutes: u32, accumulation_target: usize) -> u32 {
    let target = u32::try_from(accumulation_target).unwrap_or(u32::MAX);
    cadence_minutes
        .max(1)
        .saturating_mul(60)
        .saturating_add(KEEP_ALIVE_SLACK_SECS)
        .saturating_mul(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WireValue;
    use crate::config::{ConfigValue, MAX_CADENCE_MINUTES, RamConfigStorage};
    use crate::storage::RamRetainedMemory;

    /// 2025-11-20 00:00:00 UTC
    const MIDNIGHT: u32 = 1_763_596_800;

    fn at(hour: u32, minute: u32, second: u32) -> Option<u32> {
        Some(MIDNIGHT + hour * 3_600 + minute * 60 + second)
    }

    fn aligned(cadence_minutes: u32) -> SchedulePolicy {
        SchedulePolicy {
            cadence_minutes,
            align_to_clock: true,
            alarm_carryover: true,
        }
    }

    #[test]
    fn test_unaligned_uses_cadence() {
        let policy = SchedulePolicy {
            cadence_minutes: 10,
            align_to_clock: false,
            alarm_carryover: true,
        };
        assert_eq!(policy.seconds_until_next_wake(at(3, 7, 12)), 600);
        assert_eq!(aligned(10).seconds_until_next_wake(None), 600);
    }

    #[test]
    fn test_aligned_to_next_quarter_hour() {
        assert_eq!(aligned(15).seconds_until_next_wake(at(9, 7, 0)), 8 * 60);
    }

    #[test]
    fn test_aligned_wraps_to_top_of_hour() {
        assert_eq!(aligned(15).seconds_until_next_wake(at(9, 58, 0)), 2 * 60);
        // 25 does not divide 60: minute 55 rounds to 75, clamped to the hour.
        assert_eq!(aligned(25).seconds_until_next_wake(at(9, 55, 0)), 5 * 60);
    }

    #[test]
    fn test_aligned_near_boundary_adds_a_cadence() {
        assert_eq!(aligned(15).seconds_until_next_wake(at(9, 14, 30)), 30 + 15 * 60);
    }

    #[test]
    fn test_aligned_hours() {
        assert_eq!(aligned(120).seconds_until_next_wake(at(3, 30, 0)), 30 * 60);
        assert_eq!(aligned(60).seconds_until_next_wake(at(3, 59, 59)), 1 + 3_600);
        assert_eq!(aligned(180).seconds_until_next_wake(at(23, 10, 0)), 50 * 60);
    }

    #[test]
    fn test_zero_cadence_is_one_minute() {
        let policy = SchedulePolicy {
            cadence_minutes: 0,
            align_to_clock: false,
            alarm_carryover: true,
        };
        assert_eq!(policy.seconds_until_next_wake(None), 60);
    }

    #[test]
    fn test_alarm_carryover_sequence() {
        let mut accumulator = CycleAccumulator::new(RamRetainedMemory::new(), 256, 5).unwrap();

        let first = evaluate_alarm_carryover(&mut accumulator, true);
        assert!(first.force_transmit);
        assert!(accumulator.get_alarm_flag());

        let second = evaluate_alarm_carryover(&mut accumulator, false);
        assert!(second.force_transmit);
        assert!(second.previous_alarm);
        assert!(!accumulator.get_alarm_flag());

        let third = evaluate_alarm_carryover(&mut accumulator, false);
        assert!(!third.force_transmit);
    }

    #[test]
    fn test_carryover_disabled_only_forces_on_current() {
        let mut accumulator = CycleAccumulator::new(RamRetainedMemory::new(), 256, 5).unwrap();
        let policy = SchedulePolicy {
            cadence_minutes: 10,
            align_to_clock: false,
            alarm_carryover: false,
        };

        assert!(policy.carry_alarm(&mut accumulator, true).force_transmit);
        let cleared = policy.carry_alarm(&mut accumulator, false);
        assert!(!cleared.force_transmit);
        assert!(cleared.previous_alarm);
    }

    #[test]
    fn test_keep_alive() {
        assert_eq!(keep_alive_secs(10, 5), (600 + 20) * 5);
        assert_eq!(keep_alive_secs(1, 1), 80);
    }

    #[test]
    fn test_huge_cadence_saturates() {
        let unaligned = SchedulePolicy {
            cadence_minutes: u32::MAX,
            align_to_clock: false,
            alarm_carryover: true,
        };
        assert_eq!(unaligned.seconds_until_next_wake(None), u32::MAX);

        let aligned = aligned(u32::MAX);
        assert!(aligned.seconds_until_next_wake(at(23, 59, 59)) >= 60);

        assert_eq!(keep_alive_secs(u32::MAX, 7), u32::MAX);
        assert_eq!(keep_alive_secs(10, usize::MAX), u32::MAX);
    }

    #[test]
    fn test_oversized_latency_from_named_update() {
        let mut config = ConfigStore::open(ConfigValue::map(), RamConfigStorage::new());
        let updated = config
            .apply_named_update(0, "setLatencyTime", WireValue::Unsigned(100_000_000))
            .unwrap();
        let bytes = postcard::to_allocvec(&updated).unwrap();
        config.storage_mut().save(&bytes).unwrap();

        let reopened = ConfigStore::open(ConfigValue::map(), config.storage().clone());
        assert_eq!(reopened.cadence_minutes(), MAX_CADENCE_MINUTES);

        let policy = SchedulePolicy::from_config(&reopened);
        assert_eq!(policy.seconds_until_next_wake(None), MAX_CADENCE_MINUTES * 60);
    }
}

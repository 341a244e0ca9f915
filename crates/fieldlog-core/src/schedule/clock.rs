//! Real-time clock seam and the modem time formats used to set it.

use log::warn;
use thiserror_no_std::Error;

/// Earliest Unix time a clock reading is believed at. Anything before it means the
/// clock was never set since it lost power.
pub const MIN_TRUSTED_UNIX_TIME: u32 = 1_763_628_870;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    #[error("Clock not available")]
    Unavailable,
    #[error("Malformed {format} time string")]
    Malformed { format: &'static str },
    #[error("Time field out of range: {field}")]
    OutOfRange { field: &'static str },
}

/// Battery-backed real-time clock (DS3231 on the reference board).
pub trait RealTimeClock {
    /// Seconds since the Unix epoch.
    fn unix_time(&mut self) -> Result<u32, ClockError>;

    /// Whether the oscillator stopped since the time was last set.
    fn lost_power(&mut self) -> bool;

    fn set_unix_time(&mut self, unix: u32) -> Result<(), ClockError>;
}

/// Current time, if the clock can be trusted for wall-clock alignment.
pub fn trusted_now<C: RealTimeClock + ?Sized>(clock: &mut C) -> Option<u32> {
    if clock.lost_power() {
        warn!("RTC lost power, time not trusted");
        return None;
    }

    match clock.unix_time() {
        Ok(now) if now >= MIN_TRUSTED_UNIX_TIME => Some(now),
        Ok(now) => {
            warn!("RTC reads {}, earlier than any valid time", now);
            None
        }
        Err(e) => {
            warn!("RTC read failed: {}", e);
            None
        }
    }
}

/// Clock driven by hand, for the simulator and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualClock {
    now: u32,
    lost_power: bool,
}

impl ManualClock {
    pub const fn new(now: u32) -> Self {
        Self {
            now,
            lost_power: false,
        }
    }

    /// A clock that stopped and has not been set since.
    pub const fn unset() -> Self {
        Self {
            now: 0,
            lost_power: true,
        }
    }

    pub fn advance(&mut self, secs: u32) {
        self.now = self.now.saturating_add(secs);
    }
}

impl RealTimeClock for ManualClock {
    fn unix_time(&mut self) -> Result<u32, ClockError> {
        Ok(self.now)
    }

    fn lost_power(&mut self) -> bool {
        self.lost_power
    }

    fn set_unix_time(&mut self, unix: u32) -> Result<(), ClockError> {
        self.now = unix;
        self.lost_power = false;
        Ok(())
    }
}

/// Broken-down UTC-agnostic wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CivilTime {
    fn validated(self) -> Result<Self, ClockError> {
        if !(1..=12).contains(&self.month) {
            return Err(ClockError::OutOfRange { field: "month" });
        }
        if self.day == 0 || self.day > days_in_month(self.year, self.month) {
            return Err(ClockError::OutOfRange { field: "day" });
        }
        if self.hour > 23 {
            return Err(ClockError::OutOfRange { field: "hour" });
        }
        if self.minute > 59 {
            return Err(ClockError::OutOfRange { field: "minute" });
        }
        if self.second > 59 {
            return Err(ClockError::OutOfRange { field: "second" });
        }
        Ok(self)
    }

    /// Seconds since the Unix epoch, treating this time as UTC.
    pub fn to_unix(&self) -> Result<u32, ClockError> {
        let days = days_from_civil(self.year as i64, self.month as i64, self.day as i64);
        let secs = days * 86_400
            + self.hour as i64 * 3_600
            + self.minute as i64 * 60
            + self.second as i64;

        u32::try_from(secs).map_err(|_| ClockError::OutOfRange { field: "year" })
    }
}

fn is_leap(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 if is_leap(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Days since 1970-01-01 of a proleptic Gregorian date.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let month_index = (month + 9) % 12;
    let day_of_year = (153 * month_index + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}

fn digits<T: TryFrom<u32>>(text: &str, format: &'static str) -> Result<T, ClockError> {
    let malformed = ClockError::Malformed { format };
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed);
    }
    text.parse::<u32>()
        .ok()
        .and_then(|value| T::try_from(value).ok())
        .ok_or(malformed)
}

/// Parse the NB-IoT modem clock, `"yy/MM/dd,hh:mm:ss±zz"`.
///
/// `zz` is the zone offset in quarter hours. It is checked but not applied: the RTC
/// keeps the modem's wall-clock time.
pub fn parse_nb_iot_time(text: &str) -> Result<CivilTime, ClockError> {
    const FORMAT: &str = "NB-IoT";
    let malformed = ClockError::Malformed { format: FORMAT };

    let text = text.trim().trim_matches('"');
    let (date, time) = text.split_once(',').ok_or(malformed)?;

    let mut date_parts = date.split('/');
    let (Some(yy), Some(mm), Some(dd), None) = (
        date_parts.next(),
        date_parts.next(),
        date_parts.next(),
        date_parts.next(),
    ) else {
        return Err(malformed);
    };

    let zone_at = time.find(['+', '-']).ok_or(malformed)?;
    let (clock, zone) = time.split_at(zone_at);
    let quarters: u8 = digits(&zone[1..], FORMAT)?;
    if quarters > 96 {
        return Err(ClockError::OutOfRange { field: "zone" });
    }

    let mut clock_parts = clock.split(':');
    let (Some(hh), Some(mi), Some(ss), None) = (
        clock_parts.next(),
        clock_parts.next(),
        clock_parts.next(),
        clock_parts.next(),
    ) else {
        return Err(malformed);
    };

    let year: u16 = digits(yy, FORMAT)?;
    if year > 99 {
        return Err(malformed);
    }

    CivilTime {
        year: 2000 + year,
        month: digits(mm, FORMAT)?,
        day: digits(dd, FORMAT)?,
        hour: digits(hh, FORMAT)?,
        minute: digits(mi, FORMAT)?,
        second: digits(ss, FORMAT)?,
    }
    .validated()
}

/// Parse the LoRaWAN modem clock, `"HHhMMmSSs on MM/DD/YYYY"`.
pub fn parse_lorawan_time(text: &str) -> Result<CivilTime, ClockError> {
    const FORMAT: &str = "LoRaWAN";
    let malformed = ClockError::Malformed { format: FORMAT };

    let (time, date) = text.trim().split_once(" on ").ok_or(malformed)?;

    let time = time.strip_suffix('s').ok_or(malformed)?;
    let (hh, rest) = time.split_once('h').ok_or(malformed)?;
    let (mi, ss) = rest.split_once('m').ok_or(malformed)?;

    let mut date_parts = date.split('/');
    let (Some(mm), Some(dd), Some(yyyy), None) = (
        date_parts.next(),
        date_parts.next(),
        date_parts.next(),
        date_parts.next(),
    ) else {
        return Err(malformed);
    };

    CivilTime {
        year: digits(yyyy, FORMAT)?,
        month: digits(mm, FORMAT)?,
        day: digits(dd, FORMAT)?,
        hour: digits(hh, FORMAT)?,
        minute: digits(mi, FORMAT)?,
        second: digits(ss, FORMAT)?,
    }
    .validated()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_from_civil() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(2000, 3, 1), 11_017);
        assert_eq!(days_from_civil(2024, 2, 29), 19_782);
    }

    #[test]
    fn test_parse_nb_iot() {
        let time = parse_nb_iot_time("\"25/11/20,08:54:30+04\"").unwrap();
        assert_eq!(
            time,
            CivilTime {
                year: 2025,
                month: 11,
                day: 20,
                hour: 8,
                minute: 54,
                second: 30,
            }
        );
        assert_eq!(time.to_unix(), Ok(1_763_628_870));

        assert!(parse_nb_iot_time("25/11/20,08:54:30-08").is_ok());
    }

    #[test]
    fn test_parse_nb_iot_rejects_bad_input() {
        assert_eq!(
            parse_nb_iot_time("25/11/20 08:54:30+04"),
            Err(ClockError::Malformed { format: "NB-IoT" })
        );
        assert_eq!(
            parse_nb_iot_time("25/11/20,08:54:30"),
            Err(ClockError::Malformed { format: "NB-IoT" })
        );
        assert_eq!(
            parse_nb_iot_time("25/13/20,08:54:30+00"),
            Err(ClockError::OutOfRange { field: "month" })
        );
        assert_eq!(
            parse_nb_iot_time("25/02/29,08:54:30+00"),
            Err(ClockError::OutOfRange { field: "day" })
        );
        assert_eq!(
            parse_nb_iot_time("25/11/20,08:54:30+99"),
            Err(ClockError::OutOfRange { field: "zone" })
        );
    }

    #[test]
    fn test_parse_lorawan() {
        let time = parse_lorawan_time("04h36m00s on 11/27/2023").unwrap();
        assert_eq!(
            time,
            CivilTime {
                year: 2023,
                month: 11,
                day: 27,
                hour: 4,
                minute: 36,
                second: 0,
            }
        );
        assert_eq!(time.to_unix(), Ok(1_701_059_760));

        assert_eq!(
            parse_lorawan_time("04:36:00 on 11/27/2023"),
            Err(ClockError::Malformed { format: "LoRaWAN" })
        );
        assert_eq!(
            parse_lorawan_time("24h00m00s on 11/27/2023"),
            Err(ClockError::OutOfRange { field: "hour" })
        );
    }

    #[test]
    fn test_trusted_now() {
        let mut clock = ManualClock::new(MIN_TRUSTED_UNIX_TIME + 10);
        assert_eq!(trusted_now(&mut clock), Some(MIN_TRUSTED_UNIX_TIME + 10));

        let mut stale = ManualClock::new(1_000);
        assert_eq!(trusted_now(&mut stale), None);

        let mut unset = ManualClock::unset();
        assert_eq!(trusted_now(&mut unset), None);
        unset.set_unix_time(MIN_TRUSTED_UNIX_TIME).unwrap();
        assert_eq!(trusted_now(&mut unset), Some(MIN_TRUSTED_UNIX_TIME));
    }
}

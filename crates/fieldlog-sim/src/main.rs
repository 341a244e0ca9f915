//! Desktop simulator for the fieldlog datalogger.
//!
//! Runs a sequence of wake cycles through fieldlog-core with synthetic sensor data.
//! Every cycle is a fresh "boot": the configuration is reopened from a file and the
//! accumulator re-attached to retained memory that survives between cycles, the way
//! RTC slow memory survives deep sleep on the device.
//!
//! ```text
//! RUST_LOG=debug cargo run -p fieldlog-sim -- 12
//! ```
//!
//! The optional argument is the number of cycles to run (default 10). A configuration
//! downlink is delivered on the first transmit, and the service magnet is "applied"
//! once to show a forced flush.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use fieldlog_core::alarm::{AlarmMonitor, AlarmSource};
use fieldlog_core::codec::{MeasurementKind, Reading};
use fieldlog_core::config::{ConfigStorage, ConfigStore, ConfigValue, StorageError};
use fieldlog_core::cycle::{WakeCycle, WakeReason};
use fieldlog_core::schedule::{ManualClock, RealTimeClock, parse_nb_iot_time, trusted_now};
use fieldlog_core::storage::RamRetainedMemory;

/// Cycles run when no count is given.
const DEFAULT_CYCLES: u32 = 10;

/// Cycle on which the magnet wake is simulated.
const MAGNET_CYCLE: u32 = 7;

/// What the NB-IoT modem reports as network time once attached.
const NETWORK_TIME: &str = "\"25/11/20,08:54:30+04\"";

/// Downlink delivered on the first transmit:
/// latency 15 min, accumulate 3 cycles, align to RTC, conditional register mode,
/// BME680 high temperature alarm at 24.00 °C.
const DOWNLINK: &str = "00A00F00A30300A10100A20100CF096000D101";

// ---------------------------------------------------------------------------
// Hardware doubles
// ---------------------------------------------------------------------------

/// Dynamic configuration persisted as a postcard file, standing in for flash.
struct FileConfigStorage {
    path: PathBuf,
}

impl ConfigStorage for FileConfigStorage {
    fn load(&mut self) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                error!("Reading {}: {}", self.path.display(), e);
                Err(StorageError::Read("config file unreadable"))
            }
        }
    }

    fn save(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        fs::write(&self.path, bytes).map_err(|e| {
            error!("Writing {}: {}", self.path.display(), e);
            StorageError::Write("config file not writable")
        })
    }
}

/// Generates synthetic readings that vary over simulated time.
struct MockSensorGenerator;

impl MockSensorGenerator {
    /// One cycle of sensor output at simulated time `t` (seconds since start).
    fn sample(&self, t: f64, unix_time: Option<u32>) -> (Vec<Reading>, f64) {
        // Temperature: 18-27 °C with a slow swing
        let temperature = 22.5 + 4.5 * (t / 5_400.0).sin();
        // Humidity: 45-65 %
        let humidity = 55.0 + 10.0 * (t / 7_200.0).cos();
        // Battery slowly draining from 3.9 V
        let battery_mv = 3_900.0 - t / 600.0;

        let mut readings = vec![Reading::new(
            0,
            MeasurementKind::UnixTime,
            unix_time.unwrap_or(0) as f64,
        )];
        readings.push(Reading::new(0, MeasurementKind::VoltageInput, battery_mv.round()));
        readings.push(Reading::new(0, MeasurementKind::TemperatureSensor, temperature));
        readings.push(Reading::new(0, MeasurementKind::HumiditySensor, humidity));

        (readings, temperature)
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

/// Delete the config file left by a previous run. Returns whether the run starts from
/// factory defaults.
fn remove_stale_config(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            warn!(
                "Could not remove {}: {}, reusing stored config",
                path.display(),
                e
            );
            false
        }
    }
}

fn static_tree() -> ConfigValue {
    ConfigValue::map()
        .with("serial", "c-000")
        .with("modem", "nb-iot")
        .with(
            "mqtt",
            ConfigValue::map().with("ip", "127.0.0.1").with("port", 1883i64),
        )
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cycles = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<u32>().ok())
        .unwrap_or(DEFAULT_CYCLES);

    let config_path = std::env::temp_dir().join("fieldlog-sim-dynamic.bin");
    // Start from factory defaults every run.
    let fresh = remove_stale_config(&config_path);

    info!("Starting fieldlog simulator: {} cycles", cycles);
    info!(
        "Dynamic config at {} ({})",
        config_path.display(),
        if fresh { "factory defaults" } else { "stored" }
    );

    let sensors = MockSensorGenerator;
    let mut retained = RamRetainedMemory::new();
    let mut clock = ManualClock::unset();
    let mut elapsed_secs = 0u32;
    let mut downlink_pending = true;

    for boot in 1..=cycles {
        let reason = match boot {
            1 => WakeReason::PowerOn,
            MAGNET_CYCLE => WakeReason::MagnetWake,
            _ => WakeReason::DeepSleepTimer,
        };
        info!("--- Boot {} ({:?}) ---", boot, reason);

        let storage = FileConfigStorage {
            path: config_path.clone(),
        };
        let config = ConfigStore::open(static_tree(), storage);
        let serial = config
            .static_value("serial")
            .and_then(ConfigValue::as_str)
            .unwrap_or("c-000")
            .to_owned();

        let mut cycle = match WakeCycle::new(config, &mut retained) {
            Ok(cycle) => cycle,
            Err(e) => {
                error!("Cannot attach accumulator: {}", e);
                std::process::exit(1);
            }
        };

        if reason == WakeReason::PowerOn {
            info!("MQTT keep-alive {}s", cycle.keep_alive_secs());
        }

        let now = trusted_now(&mut clock);
        let (readings, temperature) = sensors.sample(elapsed_secs as f64, now);

        let mut monitor = AlarmMonitor::new(cycle.config().dynamic());
        monitor.check(AlarmSource::Bme680Temperature, temperature);
        let alarm = monitor.alarm();

        let report = cycle.run(&readings, alarm, reason);

        if report.transmit {
            for (index, payload) in cycle.pending_payloads().iter().enumerate() {
                if payload.is_empty() {
                    info!("Skipping empty payload {}", index + 1);
                } else {
                    info!("Publish dataloggers/datos/{}: {}", serial, payload);
                }
            }
            if let Err(e) = cycle.acknowledge_flush() {
                warn!("Flush not acknowledged: {}", e);
            }

            if now.is_none() {
                match parse_nb_iot_time(NETWORK_TIME).and_then(|time| time.to_unix()) {
                    Ok(unix) => {
                        if let Err(e) = clock.set_unix_time(unix + elapsed_secs) {
                            warn!("Setting RTC failed: {}", e);
                        }
                    }
                    Err(e) => warn!("Network time unusable: {}", e),
                }
            }

            if downlink_pending {
                downlink_pending = false;
                info!("Downlink on isurlog/config/{}: {}", serial, DOWNLINK);
                let downlink = cycle.apply_downlink(DOWNLINK);
                info!("Downlink result: {:?}", downlink);
            }
        }

        let sleep_secs = cycle.seconds_until_next_wake(trusted_now(&mut clock));
        info!("Sleeping {}s", sleep_secs);

        clock.advance(sleep_secs);
        elapsed_secs += sleep_secs;
    }

    info!("Simulation finished after {} simulated seconds", elapsed_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fieldlog-sim-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_remove_stale_config() {
        let missing = scratch("missing.bin");
        assert!(remove_stale_config(&missing));

        let stale = scratch("stale.bin");
        fs::write(&stale, [1, 2, 3]).unwrap();
        assert!(remove_stale_config(&stale));
        assert!(!stale.exists());
    }

    #[test]
    fn test_remove_stale_config_reports_other_errors() {
        let directory = scratch("dir");
        fs::create_dir_all(&directory).unwrap();

        assert!(!remove_stale_config(&directory));
        assert!(directory.exists());

        fs::remove_dir(&directory).unwrap();
    }
}

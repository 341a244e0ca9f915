//! Hardware-independent core of the fieldlog datalogger firmware
//!
//! A deep-sleeping logger wakes on a cadence, samples its sensors and batches the
//! encoded readings in reset-surviving memory until it is worth paying for a radio
//! transmission. This crate holds the parts of that loop that do not touch hardware:
//! the hex wire codec, the configuration store driven by downlink commands, the
//! retained-memory accumulator, alarm evaluation and the wake scheduler.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod alarm;
pub mod codec;
pub mod config;
pub mod cycle;
pub mod schedule;
pub mod storage;

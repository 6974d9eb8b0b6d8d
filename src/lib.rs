//! Drives a six-channel serial LED peripheral from Linux `/proc` counters.
//!
//! [`system`] turns `/proc/stat` and `/proc/meminfo` into busy fractions,
//! [`device`] speaks the peripheral's line protocol, and [`app`] ties the two
//! together once per tick.

pub mod app;
pub mod config;
pub mod device;
mod error;
pub mod event;
pub mod format;
pub mod logging;
pub mod system;

pub use error::Error;

#[cfg(not(unix))]
compile_error!("statusled talks to a termios serial device and only builds on Unix");

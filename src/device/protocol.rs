//! Wire protocol spoken by the LED peripheral firmware.
//!
//! Commands are newline-terminated ASCII lines. The only thing the
//! peripheral ever sends back is its identity reply.

use std::fmt;
use std::time::Duration;

/// Number of PWM channels on the peripheral.
pub const CHANNEL_COUNT: usize = 6;

/// Highest duty cycle a channel accepts.
pub const MAX_DUTY: u8 = u8::MAX;

pub const BAUD_RATE: u32 = 115_200;

/// Opening the port asserts DTR, which resets the microcontroller. It
/// needs about 1.5 s to boot before it will listen.
pub const OPEN_SETTLE: Duration = Duration::from_secs(2);

/// Time the firmware gets to answer an identity query.
pub const QUERY_SETTLE: Duration = Duration::from_millis(250);

/// A `?` at the start of a line asks the firmware to identify itself.
pub const IDENTITY_QUERY: &[u8] = b"\n?";

pub const IDENTITY_REPLY: &[u8] = b"rgblinky\n";

/// The two on/off indicators next to the PWM channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// Red debug LED.
    Primary,
    /// Yellow debug LED.
    Secondary,
}

impl Indicator {
    pub fn label(self) -> &'static str {
        match self {
            Indicator::Primary => "red",
            Indicator::Secondary => "yellow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Duty { channel: usize, duty: u8 },
    IdleTimeout(bool),
    Indicator(Indicator, bool),
}

impl Command {
    /// Builds a duty command, clamping `duty` to [`MAX_DUTY`].
    ///
    /// Returns `None` for a channel the peripheral does not have.
    pub fn duty(channel: usize, duty: u32) -> Option<Self> {
        if channel >= CHANNEL_COUNT {
            return None;
        }
        let duty = duty.min(u32::from(MAX_DUTY)) as u8;
        Some(Command::Duty { channel, duty })
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Duty { channel, duty } => writeln!(f, "led{channel} {duty}"),
            Command::IdleTimeout(enable) => writeln!(f, "timeout {}", on_off(*enable)),
            Command::Indicator(which, on) => writeln!(f, "{} {}", which.label(), on_off(*on)),
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

/// Maps perceived brightness in `[0, 1]` to a duty cycle.
///
/// Perceived brightness is roughly logarithmic in duty, so the intensity is
/// used as an exponent: `2^(8i) - 1` spans 0..=255 over the unit interval.
/// Inputs outside it are not clamped here; the result saturates instead and
/// [`Command::duty`] clamps it.
pub fn intensity_to_duty(intensity: f64) -> u32 {
    let duty = (2f64.powf(intensity * 8.0) - 1.0).round();
    // `as` saturates: negatives and NaN become 0, huge values u32::MAX.
    duty as u32
}

pub fn is_identity_reply(bytes: &[u8]) -> bool {
    bytes == IDENTITY_REPLY
}

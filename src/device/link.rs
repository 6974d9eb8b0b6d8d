//! Connection management for the LED peripheral.
//!
//! A [`Link`] is either closed (no port) or open. Every command first makes
//! sure the link is open, reconnecting if needed, and any I/O failure drops
//! the port so the next command starts from a fresh connection. Nothing is
//! retried within a single call; the display is best effort.

use std::fmt;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::protocol::{
    CHANNEL_COUNT, Command, IDENTITY_QUERY, IDENTITY_REPLY, Indicator, OPEN_SETTLE,
    QUERY_SETTLE, intensity_to_duty, is_identity_reply,
};
use crate::Error;

/// Opens the byte channel to the peripheral.
pub trait Connector {
    type Port: Read + Write;

    fn connect(&mut self, path: &Path) -> Result<Self::Port, Error>;
}

/// Blocking wait used for the protocol's settle delays.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// What happened to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Written to the port.
    Sent,
    /// Invalid channel; nothing was transmitted.
    Ignored,
    /// The link is closed and could not be opened.
    Unavailable,
    /// The write failed and the link was closed.
    Dropped,
}

impl Dispatch {
    pub fn is_sent(self) -> bool {
        self == Dispatch::Sent
    }
}

pub struct Link<C: Connector, S: Sleeper = ThreadSleeper> {
    path: PathBuf,
    connector: C,
    sleeper: S,
    port: Option<C::Port>,
}

impl<C: Connector, S: Sleeper> fmt::Debug for Link<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

impl<C: Connector, S: Sleeper> Link<C, S> {
    /// Creates a closed link. Nothing is opened until the first command
    /// or an explicit [`acquire`](Self::acquire).
    pub fn new(path: impl Into<PathBuf>, connector: C, sleeper: S) -> Self {
        Self {
            path: path.into(),
            connector,
            sleeper,
            port: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Opens the port if it is closed, then waits out the peripheral's reset.
    pub fn acquire(&mut self) -> Result<(), Error> {
        self.open_port().map(|_| ())
    }

    /// Closes the port. Harmless when already closed.
    pub fn release(&mut self) {
        if self.port.take().is_some() {
            tracing::info!(path = %self.path.display(), "closed LED peripheral");
        }
    }

    /// Returns whether the link is open, trying to open it first if not.
    pub fn ready(&mut self) -> bool {
        match self.acquire() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "LED peripheral unavailable");
                false
            }
        }
    }

    fn open_port(&mut self) -> Result<&mut C::Port, Error> {
        let port = match self.port.take() {
            Some(port) => port,
            None => {
                let port = self.connector.connect(&self.path)?;
                self.sleeper.sleep(OPEN_SETTLE);
                tracing::info!(path = %self.path.display(), "opened LED peripheral");
                port
            }
        };
        Ok(self.port.insert(port))
    }

    fn send(&mut self, command: Command) -> Dispatch {
        let port = match self.open_port() {
            Ok(port) => port,
            Err(err) => {
                tracing::warn!(%err, ?command, "LED peripheral unavailable, dropping command");
                return Dispatch::Unavailable;
            }
        };

        match port.write_all(&command.encode()) {
            Ok(()) => {
                tracing::trace!(?command, "sent");
                Dispatch::Sent
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "write failed");
                self.release();
                Dispatch::Dropped
            }
        }
    }

    /// Sets one channel's PWM duty cycle. Duty above 255 is clamped; an
    /// unknown channel is ignored without touching the port.
    pub fn set_channel_duty(&mut self, channel: usize, duty: u32) -> Dispatch {
        match Command::duty(channel, duty) {
            Some(command) => self.send(command),
            None => {
                tracing::debug!(channel, "no such channel");
                Dispatch::Ignored
            }
        }
    }

    /// Sets every channel in turn, stopping at the first one that is not sent.
    pub fn set_all_channels_duty(&mut self, duty: u32) -> Dispatch {
        for channel in 0..CHANNEL_COUNT {
            let status = self.set_channel_duty(channel, duty);
            if !status.is_sent() {
                return status;
            }
        }
        Dispatch::Sent
    }

    /// Sets a channel by perceived brightness in `[0, 1]`.
    pub fn set_channel_intensity(&mut self, channel: usize, intensity: f64) -> Dispatch {
        self.set_channel_duty(channel, intensity_to_duty(intensity))
    }

    /// Turns the firmware's own command watchdog on or off.
    pub fn set_idle_timeout(&mut self, enable: bool) -> Dispatch {
        self.send(Command::IdleTimeout(enable))
    }

    /// Switches one of the two status indicators on or off.
    pub fn set_indicator(&mut self, which: Indicator, on: bool) -> Dispatch {
        self.send(Command::Indicator(which, on))
    }

    /// Runs the identity handshake and reports only whether it passed.
    pub fn verify_identity(&mut self) -> bool {
        match self.identify() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "identity check failed");
                false
            }
        }
    }

    /// Checks that the device on the other end is the LED peripheral.
    ///
    /// Stale input is drained, the query is sent, and after
    /// [`QUERY_SETTLE`] a single read must return exactly
    /// [`IDENTITY_REPLY`]. I/O errors close the link; a wrong or missing
    /// reply does not.
    pub fn identify(&mut self) -> Result<(), Error> {
        self.acquire()?;

        let Link {
            path, sleeper, port, ..
        } = self;
        let Some(channel) = port.as_mut() else {
            return Err(Error::io(path.as_path(), ErrorKind::NotConnected.into()));
        };

        match handshake(channel, sleeper) {
            Ok(reply) if is_identity_reply(&reply) => {
                tracing::info!(path = %path.display(), "identity verified");
                Ok(())
            }
            Ok(reply) => Err(Error::ProtocolMismatch {
                path: path.display().to_string(),
                received: String::from_utf8_lossy(&reply).into_owned(),
            }),
            Err(err) => {
                *port = None;
                tracing::info!(path = %path.display(), "closed LED peripheral");
                Err(Error::io(path.as_path(), err))
            }
        }
    }
}

fn handshake<P: Read + Write, S: Sleeper>(port: &mut P, sleeper: &mut S) -> io::Result<Vec<u8>> {
    let stale = drain(port)?;
    if stale > 0 {
        tracing::debug!(bytes = stale, "discarded stale input");
    }

    port.write_all(IDENTITY_QUERY)?;
    sleeper.sleep(QUERY_SETTLE);

    // Room for more than the reply, so trailing bytes show up as a mismatch.
    let mut buf = [0u8; IDENTITY_REPLY.len() * 2];
    match port.read(&mut buf) {
        Ok(n) => Ok(buf[..n].to_vec()),
        Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(Vec::new()),
        Err(err) => Err(err),
    }
}

/// Reads until the non-blocking port has nothing left.
fn drain<P: Read>(port: &mut P) -> io::Result<usize> {
    let mut scratch = [0u8; 64];
    let mut drained = 0;
    loop {
        match port.read(&mut scratch) {
            Ok(0) => return Ok(drained),
            Ok(n) => drained += n,
            Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(drained),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

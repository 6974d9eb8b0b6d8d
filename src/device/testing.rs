//! In-memory stand-ins for the serial port and the settle delays.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use super::link::{Connector, Sleeper};
use super::protocol::IDENTITY_QUERY;
use crate::Error;

#[derive(Debug, Default)]
struct DeviceState {
    written: Vec<u8>,
    input: VecDeque<u8>,
    reply: Option<Vec<u8>>,
    refuse_connections: bool,
    fail_writes: bool,
    writes_left: Option<usize>,
    fail_reads: bool,
    fail_reply_read: bool,
    query_seen: bool,
    connects: usize,
}

/// Scriptable peripheral shared between a test and the ports it hands out.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeDevice {
    state: Rc<RefCell<DeviceState>>,
}

impl FakeDevice {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn connector(&self) -> FakeConnector {
        FakeConnector {
            device: self.clone(),
        }
    }

    pub(crate) fn written(&self) -> Vec<u8> {
        self.state.borrow().written.clone()
    }

    pub(crate) fn clear_written(&self) {
        self.state.borrow_mut().written.clear();
    }

    pub(crate) fn connects(&self) -> usize {
        self.state.borrow().connects
    }

    pub(crate) fn refuse_connections(&self, refuse: bool) {
        self.state.borrow_mut().refuse_connections = refuse;
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        let mut state = self.state.borrow_mut();
        state.fail_writes = fail;
        state.writes_left = None;
    }

    /// Lets `count` writes through, then fails every write after.
    pub(crate) fn fail_writes_after(&self, count: usize) {
        self.state.borrow_mut().writes_left = Some(count);
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    /// Lets reads through until the identity query is written, then fails them.
    pub(crate) fn fail_reads_after_query(&self, fail: bool) {
        self.state.borrow_mut().fail_reply_read = fail;
    }

    /// Bytes that become readable whenever the identity query is written.
    pub(crate) fn reply_with(&self, reply: &[u8]) {
        self.state.borrow_mut().reply = Some(reply.to_vec());
    }

    pub(crate) fn push_input(&self, bytes: &[u8]) {
        self.state.borrow_mut().input.extend(bytes);
    }
}

#[derive(Debug)]
pub(crate) struct FakeConnector {
    device: FakeDevice,
}

impl Connector for FakeConnector {
    type Port = FakePort;

    fn connect(&mut self, path: &Path) -> Result<FakePort, Error> {
        let mut state = self.device.state.borrow_mut();
        if state.refuse_connections {
            return Err(Error::io(path, ErrorKind::NotFound.into()));
        }
        state.connects += 1;
        Ok(FakePort {
            device: self.device.clone(),
        })
    }
}

#[derive(Debug)]
pub(crate) struct FakePort {
    device: FakeDevice,
}

impl Read for FakePort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.device.state.borrow_mut();
        if state.fail_reads || (state.fail_reply_read && state.query_seen) {
            return Err(io::Error::other("read failed"));
        }
        if state.input.is_empty() {
            return Err(ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(state.input.len());
        for (slot, byte) in buf.iter_mut().zip(state.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for FakePort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.device.state.borrow_mut();
        if state.fail_writes {
            return Err(ErrorKind::BrokenPipe.into());
        }
        if let Some(left) = state.writes_left.as_mut() {
            if *left == 0 {
                return Err(ErrorKind::BrokenPipe.into());
            }
            *left -= 1;
        }
        state.written.extend_from_slice(buf);
        if buf == IDENTITY_QUERY {
            state.query_seen = true;
            if let Some(reply) = state.reply.clone() {
                state.input.extend(reply);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Records requested delays instead of sleeping.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingSleeper {
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

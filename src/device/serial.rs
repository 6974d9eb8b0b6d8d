//! termios-backed serial port.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::mem::MaybeUninit;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use super::link::Connector;
use super::protocol::BAUD_RATE;
use crate::Error;

/// A raw, non-blocking 115200 8N1 serial line.
#[derive(Debug)]
pub struct SerialPort {
    file: File,
}

impl SerialPort {
    /// Opens `path` read/write without making it the controlling terminal,
    /// checks it is a TTY and switches it to raw mode.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| Error::io(path, e))?;

        let fd = file.as_raw_fd();
        // SAFETY: `fd` is owned by `file`, which outlives the call.
        if unsafe { libc::isatty(fd) } != 1 {
            return Err(Error::NotATerminal {
                path: path.display().to_string(),
            });
        }

        configure_raw(fd).map_err(|e| Error::io(path, e))?;
        tracing::debug!(path = %path.display(), baud = BAUD_RATE, "serial line in raw mode");
        Ok(Self { file })
    }
}

fn configure_raw(fd: libc::c_int) -> io::Result<()> {
    let mut term = MaybeUninit::<libc::termios>::uninit();
    // SAFETY: tcgetattr fully initialises `term` when it returns 0.
    if unsafe { libc::tcgetattr(fd, term.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: checked above.
    let mut term = unsafe { term.assume_init() };

    term.c_iflag = 0;
    term.c_oflag = 0;
    // Receiver on, modem control lines ignored, 8 data bits, no parity,
    // one stop bit, no hardware flow control.
    term.c_cflag = libc::CREAD | libc::CLOCAL | libc::CS8;
    term.c_lflag = 0;

    // SAFETY: `term` is a valid termios obtained from tcgetattr above.
    unsafe {
        if libc::cfsetispeed(&mut term, libc::B115200) != 0
            || libc::cfsetospeed(&mut term, libc::B115200) != 0
        {
            return Err(io::Error::last_os_error());
        }
        if libc::tcsetattr(fd, libc::TCSANOW, &term) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Connects a [`Link`](super::Link) to a real serial device.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    type Port = SerialPort;

    fn connect(&mut self, path: &Path) -> Result<SerialPort, Error> {
        SerialPort::open(path)
    }
}

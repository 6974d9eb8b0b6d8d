use std::path::Path;

/// Errors raised by the counter readers and the peripheral link.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A counter source or the serial device could not be opened, read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A counter source did not match the expected grammar.
    #[error("failed to parse {path}: {detail}")]
    Parse { path: String, detail: String },

    /// The device path opened but is not a serial terminal.
    #[error("{path} is not a TTY")]
    NotATerminal { path: String },

    /// The identity handshake got no reply, or the wrong one.
    #[error("{path} did not identify as a status LED peripheral (got {received:?})")]
    ProtocolMismatch { path: String, received: String },
}

impl Error {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Error::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn parse(path: &Path, detail: impl Into<String>) -> Self {
        Error::Parse {
            path: path.display().to_string(),
            detail: detail.into(),
        }
    }
}

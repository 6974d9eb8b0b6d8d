pub mod link;
pub mod protocol;
#[cfg(unix)]
pub mod serial;
#[cfg(test)]
pub(crate) mod testing;

pub use link::{Connector, Dispatch, Link, Sleeper, ThreadSleeper};
pub use protocol::Indicator;
#[cfg(unix)]
pub use serial::{SerialConnector, SerialPort};

#![forbid(unsafe_code)]

//! Reliable ordered substream multiplexing over a duplex byte pipe.
//!
//! A session owns one pipe and carries any number of independent
//! substreams over it. Frames are typed and length-prefixed; each
//! substream delivers bytes in order with half-close in each direction,
//! and inbound data for one substream never blocks delivery for another.
//! The initiator opens substreams with odd ids, the responder accepts
//! them; both roles are symmetric on the wire.

use std::{error, fmt, io};

mod frame;
mod session;
mod stream;

pub use self::session::Session;
pub use self::stream::Stream;

#[cfg(test)]
mod test_session;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Closed,
    Session(String),
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io error: {}", e),
            Error::Closed => write!(f, "session closed"),
            Error::Session(reason) => write!(f, "session terminated: {}", reason),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

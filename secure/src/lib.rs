#![forbid(unsafe_code)]

//! Password-authenticated stream encryption for tunnel connections.
//!
//! A connection starts with an 80 byte plaintext header carrying a random
//! iv and salt together with an HMAC of both under a key derived from the
//! pre-shared password. Everything after the header is the raw byte stream
//! XOR-ed with an AES-256-CFB keystream. The handshake happens lazily
//! inside the first read or write, so upper layers only ever see a plain
//! duplex byte pipe.

use std::{error, fmt, io};

mod handshake;
mod connection;

pub use self::handshake::{
    receive_handshake, send_handshake, Decrypter, Encrypter, BLOCK_SIZE, HEADER_SIZE, KEY_ITERATIONS,
    KEY_SIZE,
};
pub use self::connection::{EncryptedReader, EncryptedWriter};

#[cfg(test)]
mod test_handshake;
#[cfg(test)]
mod test_connection;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    InvalidPassword,
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::InvalidPassword => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io error: {}", e),
            Error::InvalidPassword => write!(f, "invalid password"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::InvalidPassword => {
                io::Error::new(io::ErrorKind::PermissionDenied, "invalid password")
            }
        }
    }
}

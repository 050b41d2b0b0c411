use std::io::{self, Read, Write};

use crate::handshake::{receive_handshake, send_handshake, Decrypter, Encrypter};

// A handshake error, persisted so that every call after the failure keeps
// failing without touching the socket. io::Error is not Clone, so the kind
// and message are kept and re-emitted on each call.
struct Sticky {
    kind: io::ErrorKind,
    message: String,
}

impl Sticky {
    fn new(e: &io::Error) -> Self {
        Sticky {
            kind: e.kind(),
            message: e.to_string(),
        }
    }

    fn emit(&self) -> io::Error {
        io::Error::new(self.kind, self.message.clone())
    }
}

/// Read half of an encrypted connection. The handshake with the peer is
/// performed inside the first `read`; a handshake failure (including an
/// invalid password) is sticky and fails every later read immediately.
pub struct EncryptedReader<R> {
    inner: R,
    password: Vec<u8>,
    decrypter: Option<Decrypter>,
    err: Option<Sticky>,
}

impl<R> EncryptedReader<R> {
    pub fn new(inner: R, password: &[u8]) -> Self {
        EncryptedReader {
            inner,
            password: password.to_vec(),
            decrypter: None,
            err: None,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

impl<R: Read> Read for EncryptedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = &self.err {
            return Err(err.emit());
        }

        if self.decrypter.is_none() {
            match receive_handshake(&mut self.inner, &self.password) {
                Ok(decrypter) => self.decrypter = Some(decrypter),
                Err(e) => {
                    let e = io::Error::from(e);
                    self.err = Some(Sticky::new(&e));
                    return Err(e);
                }
            }
        }

        let n = self.inner.read(buf)?;
        if let Some(decrypter) = &mut self.decrypter {
            decrypter.xor(&mut buf[..n]);
        }
        log::trace!("received and decrypted {} bytes", n);
        Ok(n)
    }
}

/// Write half of an encrypted connection. The handshake header goes out
/// inside the first `write`; a handshake failure is sticky. Plaintext is
/// encrypted in a scratch buffer and flushed with complete-write
/// semantics, so the caller's buffer is never mutated and the keystream
/// never runs ahead of the wire.
pub struct EncryptedWriter<W> {
    inner: W,
    password: Vec<u8>,
    encrypter: Option<Encrypter>,
    scratch: Vec<u8>,
    err: Option<Sticky>,
}

impl<W> EncryptedWriter<W> {
    pub fn new(inner: W, password: &[u8]) -> Self {
        EncryptedWriter {
            inner,
            password: password.to_vec(),
            encrypter: None,
            scratch: Vec::new(),
            err: None,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write> Write for EncryptedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(err) = &self.err {
            return Err(err.emit());
        }

        if self.encrypter.is_none() {
            match send_handshake(&mut self.inner, &self.password) {
                Ok(encrypter) => self.encrypter = Some(encrypter),
                Err(e) => {
                    let e = io::Error::from(e);
                    self.err = Some(Sticky::new(&e));
                    return Err(e);
                }
            }
        }

        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        if let Some(encrypter) = &mut self.encrypter {
            encrypter.xor(&mut self.scratch);
        }

        self.inner.write_all(&self.scratch)?;
        log::trace!("encrypted and sent {} bytes", buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

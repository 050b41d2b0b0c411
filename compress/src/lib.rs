#![forbid(unsafe_code)]

//! Transparent snappy framing over a duplex byte pipe.

use std::io::{self, Read, Write};

use snap::read::FrameDecoder;
use snap::write::FrameEncoder;

/// Read half of a compressed connection, decoding the peer's snappy
/// frames into the plain byte stream.
pub struct CompressedReader<R: Read> {
    inner: FrameDecoder<R>,
}

impl<R: Read> CompressedReader<R> {
    pub fn new(inner: R) -> Self {
        CompressedReader {
            inner: FrameDecoder::new(inner),
        }
    }
}

impl<R: Read> Read for CompressedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Write half of a compressed connection. The encoder is flushed after
/// every write call so a frame never lingers in its buffer while the
/// layer above is waiting for the bytes to reach the wire.
pub struct CompressedWriter<W: Write> {
    inner: FrameEncoder<W>,
}

impl<W: Write> CompressedWriter<W> {
    pub fn new(inner: W) -> Self {
        CompressedWriter {
            inner: FrameEncoder::new(inner),
        }
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.inner.flush()?;
        Ok(size)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use super::{EncryptedReader, EncryptedWriter};

fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let connected = TcpStream::connect(addr).unwrap();
    let (accepted, _) = listener.accept().unwrap();
    (connected, accepted)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

#[test]
fn round_trips_a_mebibyte_in_both_directions() {
    const LEN: usize = 1 << 20;
    let password = b"hunter2";
    let (near, far) = tcp_pair();

    // the peer echoes everything it reads back to the sender
    let echo = thread::spawn(move || {
        let mut reader = EncryptedReader::new(far.try_clone().unwrap(), password);
        let mut writer = EncryptedWriter::new(far, password);
        let mut buf = [0u8; 8192];
        let mut total = 0;
        while total < LEN {
            let n = reader.read(&mut buf).unwrap();
            assert!(n > 0, "unexpected eof after {} bytes", total);
            writer.write_all(&buf[..n]).unwrap();
            total += n;
        }
    });

    let data = pattern(LEN);
    let sent = data.clone();
    let mut writer = EncryptedWriter::new(near.try_clone().unwrap(), password);
    let sender = thread::spawn(move || {
        writer.write_all(&sent).unwrap();
    });

    let mut reader = EncryptedReader::new(near, password);
    let mut received = vec![0u8; LEN];
    reader.read_exact(&mut received).unwrap();

    sender.join().unwrap();
    echo.join().unwrap();
    assert_eq!(received, data);
}

#[test]
fn wrong_password_fails_before_any_plaintext_and_stays_failed() {
    let (near, far) = tcp_pair();

    let sender = thread::spawn(move || {
        let mut writer = EncryptedWriter::new(near, b"hunter2");
        // ignore the result, the peer may close early
        let _ = writer.write_all(b"secret payload");
    });

    let mut reader = EncryptedReader::new(far, b"hunter3");
    let mut buf = [0u8; 64];

    let err = reader.read(&mut buf).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    assert!(err.to_string().contains("invalid password"));

    // sticky: the second read fails identically without touching the socket
    let err = reader.read(&mut buf).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

    sender.join().unwrap();
}

struct FailingWriter {
    calls: usize,
}

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        self.calls += 1;
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "wire is down"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn failed_send_handshake_is_sticky() {
    let mut writer = EncryptedWriter::new(FailingWriter { calls: 0 }, b"hunter2");

    let err = writer.write(b"data").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

    let err = writer.write(b"data").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

    // the handshake was attempted exactly once
    assert_eq!(writer.get_ref().calls, 1);
}

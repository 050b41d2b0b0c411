//! The forwarding loop gluing a TCP connection to a tunnel substream.

use std::io;
use std::net::{Shutdown, TcpStream};
use std::thread;

use mux::Stream;

/// Copies bytes between `socket` and `stream` in both directions until
/// both are done. A clean end of stream in one direction is propagated
/// as a write-side close so the other direction keeps flowing; an error
/// tears both ends down, which makes the sibling copy fail and return.
pub(crate) fn relay(socket: TcpStream, stream: Stream) {
    let socket_reader = match socket.try_clone() {
        Ok(s) => s,
        Err(e) => {
            log::warn!("failed to clone connection for forwarding: {}", e);
            stream.close();
            return;
        }
    };

    let inbound = {
        let mut src = stream.clone();
        let dst = match socket.try_clone() {
            Ok(s) => s,
            Err(e) => {
                log::warn!("failed to clone connection for forwarding: {}", e);
                stream.close();
                return;
            }
        };
        let abort = stream.clone();
        thread::spawn(move || {
            let mut dst = dst;
            match io::copy(&mut src, &mut dst) {
                Ok(_) => {
                    let _ = dst.shutdown(Shutdown::Write);
                }
                Err(_) => {
                    abort.close();
                    let _ = dst.shutdown(Shutdown::Both);
                }
            }
        })
    };

    let mut src = socket_reader;
    let mut dst = stream.clone();
    match io::copy(&mut src, &mut dst) {
        Ok(_) => {
            let _ = dst.close_write();
        }
        Err(_) => {
            dst.close();
            let _ = src.shutdown(Shutdown::Both);
        }
    }

    let _ = inbound.join();

    // both directions are finished, release whatever is left
    stream.close();
    let _ = socket.shutdown(Shutdown::Both);
}

//! Server endpoint: accepts tunnel connections from peers, demultiplexes
//! each one and opens an outgoing TCP connection per substream.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mux::{Session, Stream};

use crate::net;
use crate::relay;

struct Shared {
    password: Vec<u8>,
    connect: String,
    compress: bool,
    timeout: Duration,
    local_addr: SocketAddr,
    closing: AtomicBool,
}

pub struct Server {
    shared: Arc<Shared>,
    acceptor: Option<JoinHandle<()>>,
}

impl Server {
    pub fn new(
        password: &[u8],
        listen: &str,
        connect: &str,
        compress: bool,
        timeout: Duration,
    ) -> io::Result<Server> {
        let listener = TcpListener::bind(net::listen_address(listen))?;
        let local_addr = listener.local_addr()?;

        let shared = Arc::new(Shared {
            password: password.to_vec(),
            connect: connect.to_string(),
            compress,
            timeout,
            local_addr,
            closing: AtomicBool::new(false),
        });

        let acceptor = {
            let shared = shared.clone();
            thread::spawn(move || listen_loop(listener, shared))
        };

        Ok(Server {
            shared,
            acceptor: Some(acceptor),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    /// Stops accepting peer connections. Established sessions terminate
    /// when their peer goes away or their sockets do.
    pub fn close(&mut self) {
        self.shared.closing.store(true, Ordering::SeqCst);

        let _ = TcpStream::connect(net::wake_address(self.shared.local_addr));
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
    }
}

fn listen_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        match listener.accept() {
            Ok((conn, peer)) => {
                if shared.closing.load(Ordering::SeqCst) {
                    break;
                }
                log::debug!("accepted tunnel connection from {}", peer);
                let shared = shared.clone();
                thread::spawn(move || serve_connection(conn, shared));
            }
            Err(e) => {
                log::warn!("failed to accept tcp connection: {}", e);
                break;
            }
        }
    }
}

// one tunnel connection owns one session for its whole lifetime
fn serve_connection(conn: TcpStream, shared: Arc<Shared>) {
    let (reader, writer, control) = match net::pipe_pair(conn, &shared.password, shared.compress) {
        Ok(parts) => parts,
        Err(e) => {
            log::error!("failed to create server session: {}", e);
            return;
        }
    };
    let session = Session::server(reader, writer, control);

    loop {
        match session.accept_stream() {
            Ok(Some(stream)) => {
                let shared = shared.clone();
                thread::spawn(move || forward(stream, shared));
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("failed to accept stream: {}", e);
                break;
            }
        }
    }

    session.close();
}

fn forward(stream: Stream, shared: Arc<Shared>) {
    let upstream = match net::dial(&shared.connect, shared.timeout) {
        Ok(socket) => socket,
        Err(e) => {
            log::warn!("failed to connect to remote server {}: {}", shared.connect, e);
            stream.close();
            return;
        }
    };

    relay::relay(upstream, stream);
}

//! Client endpoint: terminates local TCP connections and forwards each
//! one as a substream of a lazily established, shared tunnel session.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mux::Session;

use crate::net;
use crate::relay;

struct Shared {
    password: Vec<u8>,
    connect: String,
    compress: bool,
    timeout: Duration,
    local_addr: SocketAddr,
    closing: AtomicBool,

    // at most one live session to the peer, shared by every forwarder;
    // the lock is held across dial and build so concurrent forwarders
    // never race to create two sessions
    session: Mutex<Option<Session>>,
}

pub struct Client {
    shared: Arc<Shared>,
    acceptor: Option<JoinHandle<()>>,
}

impl Client {
    pub fn new(
        password: &[u8],
        listen: &str,
        connect: &str,
        compress: bool,
        timeout: Duration,
    ) -> io::Result<Client> {
        let listener = TcpListener::bind(net::listen_address(listen))?;
        let local_addr = listener.local_addr()?;

        let shared = Arc::new(Shared {
            password: password.to_vec(),
            connect: connect.to_string(),
            compress,
            timeout,
            local_addr,
            closing: AtomicBool::new(false),
            session: Mutex::new(None),
        });

        let acceptor = {
            let shared = shared.clone();
            thread::spawn(move || listen_loop(listener, shared))
        };

        Ok(Client {
            shared,
            acceptor: Some(acceptor),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    /// Stops accepting local connections and tears the shared session
    /// down. In-flight forwards terminate through their own I/O errors.
    pub fn close(&mut self) {
        self.shared.closing.store(true, Ordering::SeqCst);

        // wake the acceptor so it can observe the flag and release the port
        let _ = TcpStream::connect(net::wake_address(self.shared.local_addr));
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }

        let session = self.shared.session.lock().unwrap().take();
        if let Some(session) = session {
            session.close();
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
                log::debug!("accepted local connection from {}", peer);
                let shared = shared.clone();
                thread::spawn(move || forward(conn, shared));
            }
            Err(e) => {
                log::warn!("failed to accept tcp connection: {}", e);
                break;
            }
        }
    }
}

fn forward(conn: TcpStream, shared: Arc<Shared>) {
    let session = match open_session(&shared) {
        Ok(session) => session,
        Err(e) => {
            log::error!("failed to create client session: {}", e);
            return;
        }
    };

    let stream = match session.open_stream() {
        Ok(stream) => stream,
        Err(e) => {
            log::error!("failed to create client stream: {}", e);
            session.close();
            return;
        }
    };

    relay::relay(conn, stream);
}

// returns the cached session, or dials the peer and builds a fresh one
// when there is none or the cached one has died
fn open_session(shared: &Shared) -> io::Result<Session> {
    let mut guard = shared.session.lock().unwrap();

    if let Some(session) = guard.as_ref() {
        if !session.is_closed() {
            return Ok(session.clone());
        }
    }

    let socket = net::dial(&shared.connect, shared.timeout)?;
    log::debug!("established tunnel connection to {}", shared.connect);

    let (reader, writer, control) = net::pipe_pair(socket, &shared.password, shared.compress)?;
    let session = Session::client(reader, writer, control);

    *guard = Some(session.clone());
    Ok(session)
}

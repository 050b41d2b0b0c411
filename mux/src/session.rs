use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::frame::{self, FrameType};
use crate::stream::{Stream, StreamState};
use crate::Error;

pub(crate) struct Shared {
    // all substream writes and control frames serialize over this half
    pub(crate) writer: Mutex<Box<dyn Write + Send>>,

    // live substreams by id; the receive loop dispatches into these
    pub(crate) streams: Mutex<HashMap<u32, Arc<StreamState>>>,

    accept_rx: Receiver<Stream>,
    next_id: AtomicU32,
    closed: AtomicBool,
    clean_eof: AtomicBool,
    fail_reason: Mutex<Option<String>>,

    // handle used to shut the connection down underneath every layer,
    // which is what unblocks the receive loop
    socket: TcpStream,
    peer: String,
}

impl Shared {
    // fail every live substream and release the underlying connection;
    // safe to call from both close() and the receive loop exit
    fn teardown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.socket.shutdown(Shutdown::Both);

        let streams: Vec<Arc<StreamState>> = self
            .streams
            .lock()
            .unwrap()
            .drain()
            .map(|(_, state)| state)
            .collect();
        for state in streams {
            state.set_session_closed();
        }
    }
}

/// One multiplexed transport over a duplex byte pipe. Handles are cheap
/// clones sharing the same session.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Starts a session as the initiator, the side that opens substreams.
    pub fn client(
        reader: Box<dyn Read + Send>,
        writer: Box<dyn Write + Send>,
        socket: TcpStream,
    ) -> Session {
        Session::new(reader, writer, socket, true)
    }

    /// Starts a session as the responder, the side that accepts substreams.
    pub fn server(
        reader: Box<dyn Read + Send>,
        writer: Box<dyn Write + Send>,
        socket: TcpStream,
    ) -> Session {
        Session::new(reader, writer, socket, false)
    }

    fn new(
        reader: Box<dyn Read + Send>,
        writer: Box<dyn Write + Send>,
        socket: TcpStream,
        initiator: bool,
    ) -> Session {
        let (accept_tx, accept_rx) = crossbeam_channel::unbounded();
        let peer = socket
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| String::from("unknown"));

        let shared = Arc::new(Shared {
            writer: Mutex::new(writer),
            streams: Mutex::new(HashMap::new()),
            accept_rx,
            next_id: AtomicU32::new(if initiator { 1 } else { 2 }),
            closed: AtomicBool::new(false),
            clean_eof: AtomicBool::new(false),
            fail_reason: Mutex::new(None),
            socket,
            peer,
        });

        let receiver = shared.clone();
        thread::spawn(move || run_receive_loop(receiver, reader, accept_tx));

        Session { shared }
    }

    /// Opens a new substream towards the peer.
    pub fn open_stream(&self) -> Result<Stream, Error> {
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let id = self.shared.next_id.fetch_add(2, Ordering::SeqCst);
        let state = Arc::new(StreamState::new());
        self.shared.streams.lock().unwrap().insert(id, state.clone());

        let result = {
            let mut writer = self.shared.writer.lock().unwrap();
            frame::write_frame(&mut **writer, FrameType::Syn, id, &[])
        };
        if let Err(e) = result {
            self.shared.streams.lock().unwrap().remove(&id);
            return Err(Error::Io(e));
        }

        // the session may have torn down between the first check and the
        // insert above, in which case nobody will ever fail this stream
        if self.is_closed() {
            self.shared.streams.lock().unwrap().remove(&id);
            return Err(self.closed_error());
        }

        Ok(Stream::new(id, state, self.shared.clone()))
    }

    /// Waits for the peer to open a substream. `Ok(None)` means the peer
    /// closed the session normally.
    pub fn accept_stream(&self) -> Result<Option<Stream>, Error> {
        match self.shared.accept_rx.recv() {
            Ok(stream) => Ok(Some(stream)),
            Err(_) => {
                if self.shared.clean_eof.load(Ordering::SeqCst) {
                    Ok(None)
                } else {
                    Err(self.closed_error())
                }
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Shuts the session down: tells the peer, closes the underlying
    /// connection and fails every substream. Idempotent.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            // best effort: a writer stuck mid-frame must not stall the
            // shutdown, the peer then simply sees the pipe drop instead
            if let Ok(mut writer) = self.shared.writer.try_lock() {
                let _ = frame::write_frame(&mut **writer, FrameType::GoAway, 0, &[]);
            }
        }
        self.shared.teardown();
    }

    fn closed_error(&self) -> Error {
        match self.shared.fail_reason.lock().unwrap().clone() {
            Some(reason) => Error::Session(reason),
            None => Error::Closed,
        }
    }
}

fn run_receive_loop(shared: Arc<Shared>, mut reader: Box<dyn Read + Send>, accept_tx: Sender<Stream>) {
    match receive_loop(&shared, &mut *reader, &accept_tx) {
        Ok(()) => {
            log::debug!("session {}: peer closed", shared.peer);
            shared.clean_eof.store(true, Ordering::SeqCst);
        }
        Err(e) => {
            // a read failure after a local close is just the shutdown
            if !shared.closed.load(Ordering::SeqCst) {
                log::warn!("session {}: terminated: {}", shared.peer, e);
                *shared.fail_reason.lock().unwrap() = Some(e.to_string());
            }
        }
    }
    shared.teardown();
    // accept_tx drops here, unblocking any pending accept_stream
}

fn receive_loop(
    shared: &Arc<Shared>,
    reader: &mut (dyn Read + Send),
    accept_tx: &Sender<Stream>,
) -> io::Result<()> {
    loop {
        let header = match frame::read_header(reader)? {
            Some(header) => header,
            None => return Ok(()),
        };

        match header.frame_type {
            FrameType::Syn => {
                let state = Arc::new(StreamState::new());
                {
                    let mut streams = shared.streams.lock().unwrap();
                    if streams.contains_key(&header.stream_id) {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("duplicate substream id {}", header.stream_id),
                        ));
                    }
                    streams.insert(header.stream_id, state.clone());
                }
                let stream = Stream::new(header.stream_id, state, shared.clone());
                // the only failure mode is a dropped session handle
                let _ = accept_tx.send(stream);
            }
            FrameType::Data => {
                let mut payload = vec![0u8; header.length];
                reader.read_exact(&mut payload)?;

                let state = shared.streams.lock().unwrap().get(&header.stream_id).cloned();
                match state {
                    Some(state) => state.push(&payload),
                    None => log::trace!(
                        "session {}: dropping {} bytes for unknown substream {}",
                        shared.peer,
                        header.length,
                        header.stream_id,
                    ),
                }
            }
            FrameType::Fin => {
                let state = shared.streams.lock().unwrap().get(&header.stream_id).cloned();
                if let Some(state) = state {
                    if state.set_remote_fin() {
                        // both directions are done, the id can be reused
                        shared.streams.lock().unwrap().remove(&header.stream_id);
                    }
                }
            }
            FrameType::Rst => {
                let state = shared.streams.lock().unwrap().remove(&header.stream_id);
                if let Some(state) = state {
                    state.set_reset();
                }
            }
            FrameType::GoAway => return Ok(()),
        }
    }
}

use std::cmp;
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex};

use bytes::{Buf, BytesMut};

use crate::frame::{self, FrameType};
use crate::session::Shared;

pub(crate) struct StreamState {
    inner: Mutex<StreamBuf>,
    cond: Condvar,
}

struct StreamBuf {
    // bytes received from the peer, waiting for a reader
    buf: BytesMut,
    remote_fin: bool,
    local_fin: bool,
    reset: bool,
    session_closed: bool,
}

impl StreamState {
    pub(crate) fn new() -> Self {
        StreamState {
            inner: Mutex::new(StreamBuf {
                buf: BytesMut::new(),
                remote_fin: false,
                local_fin: false,
                reset: false,
                session_closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn push(&self, payload: &[u8]) {
        let mut guard = self.inner.lock().unwrap();
        if guard.reset || guard.remote_fin {
            // late data for a substream that is already done
            return;
        }
        guard.buf.extend_from_slice(payload);
        self.cond.notify_all();
    }

    // returns true when the local side already sent its fin, meaning the
    // substream is complete in both directions
    pub(crate) fn set_remote_fin(&self) -> bool {
        let mut guard = self.inner.lock().unwrap();
        guard.remote_fin = true;
        self.cond.notify_all();
        guard.local_fin
    }

    pub(crate) fn set_reset(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.reset = true;
        self.cond.notify_all();
    }

    pub(crate) fn set_session_closed(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.session_closed = true;
        self.cond.notify_all();
    }
}

/// One reliable ordered byte stream inside a session. Handles are cheap
/// clones; a typical forwarder reads on one clone and writes on another.
#[derive(Clone)]
pub struct Stream {
    id: u32,
    state: Arc<StreamState>,
    shared: Arc<Shared>,
}

impl Stream {
    pub(crate) fn new(id: u32, state: Arc<StreamState>, shared: Arc<Shared>) -> Self {
        Stream { id, state, shared }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Closes the write direction: the peer sees end of stream once it
    /// drains what was already sent, while reads here keep working.
    pub fn close_write(&self) -> io::Result<()> {
        let send_fin = {
            let mut guard = self.state.inner.lock().unwrap();
            if guard.local_fin || guard.reset || guard.session_closed {
                false
            } else {
                guard.local_fin = true;
                true
            }
        };
        if send_fin {
            self.send_frame(FrameType::Fin, &[])?;
        }

        let complete = {
            let guard = self.state.inner.lock().unwrap();
            guard.local_fin && guard.remote_fin
        };
        if complete {
            self.shared.streams.lock().unwrap().remove(&self.id);
        }
        Ok(())
    }

    /// Closes the substream in both directions. If the peer could still
    /// be sending, it is told to abort; otherwise this is a plain fin.
    /// Idempotent, and safe to call on any clone.
    pub fn close(&self) {
        enum Action {
            Reset,
            Fin,
            Forget,
        }

        let action = {
            let mut guard = self.state.inner.lock().unwrap();
            if guard.reset || guard.session_closed {
                Action::Forget
            } else if !guard.remote_fin {
                // the peer may keep writing into the void otherwise
                guard.reset = true;
                self.state.cond.notify_all();
                Action::Reset
            } else if !guard.local_fin {
                guard.local_fin = true;
                Action::Fin
            } else {
                Action::Forget
            }
        };

        match action {
            Action::Reset => {
                let _ = self.send_frame(FrameType::Rst, &[]);
            }
            Action::Fin => {
                let _ = self.send_frame(FrameType::Fin, &[]);
            }
            Action::Forget => {}
        }

        self.shared.streams.lock().unwrap().remove(&self.id);
    }

    fn send_frame(&self, frame_type: FrameType, payload: &[u8]) -> io::Result<()> {
        let mut writer = self.shared.writer.lock().unwrap();
        frame::write_frame(&mut **writer, frame_type, self.id, payload)
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut guard = self.state.inner.lock().unwrap();
        loop {
            if !guard.buf.is_empty() {
                let n = cmp::min(buf.len(), guard.buf.len());
                buf[..n].copy_from_slice(&guard.buf[..n]);
                guard.buf.advance(n);
                return Ok(n);
            }
            if guard.reset {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "substream reset",
                ));
            }
            if guard.remote_fin {
                return Ok(0);
            }
            if guard.session_closed {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "session closed"));
            }
            guard = self.state.cond.wait(guard).unwrap();
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        {
            let guard = self.state.inner.lock().unwrap();
            if guard.reset {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "substream reset",
                ));
            }
            if guard.session_closed {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "session closed"));
            }
            if guard.local_fin {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "substream closed for writing",
                ));
            }
        }

        for chunk in buf.chunks(frame::MAX_PAYLOAD) {
            self.send_frame(FrameType::Data, chunk)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut writer = self.shared.writer.lock().unwrap();
        writer.flush()
    }
}

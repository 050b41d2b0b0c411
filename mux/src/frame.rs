use std::io::{self, Read, Write};

use byteorder::{BigEndian, ByteOrder};

// largest DATA payload carried by a single frame; larger writes are
// split into multiple frames
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

// type(1) + stream id(4) + payload length(2)
pub const HEADER_SIZE: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    // open a substream
    Syn = 1,
    // substream payload bytes
    Data = 2,
    // write side of a substream is done
    Fin = 3,
    // abort a substream in both directions
    Rst = 4,
    // the whole session is shutting down
    GoAway = 5,
}

pub struct Header {
    pub frame_type: FrameType,
    pub stream_id: u32,
    pub length: usize,
}

/// Reads the next frame header. `Ok(None)` means the pipe reached end of
/// stream on a frame boundary, which is how a peer that simply closes its
/// socket signals a normal shutdown.
pub fn read_header<R: Read + ?Sized>(r: &mut R) -> io::Result<Option<Header>> {
    let mut header = [0u8; HEADER_SIZE];

    let mut first = [0u8; 1];
    loop {
        match r.read(&mut first) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    header[0] = first[0];
    r.read_exact(&mut header[1..])?;

    let frame_type = match header[0] {
        1 => FrameType::Syn,
        2 => FrameType::Data,
        3 => FrameType::Fin,
        4 => FrameType::Rst,
        5 => FrameType::GoAway,
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown frame type {}", other),
            ))
        }
    };

    Ok(Some(Header {
        frame_type,
        stream_id: BigEndian::read_u32(&header[1..5]),
        length: BigEndian::read_u16(&header[5..7]) as usize,
    }))
}

/// Writes one frame as a single contiguous write so layers below see the
/// header and payload together.
pub fn write_frame<W: Write + ?Sized>(
    w: &mut W,
    frame_type: FrameType,
    stream_id: u32,
    payload: &[u8],
) -> io::Result<()> {
    debug_assert!(payload.len() <= MAX_PAYLOAD);

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.push(frame_type as u8);
    let mut id = [0u8; 4];
    BigEndian::write_u32(&mut id, stream_id);
    frame.extend_from_slice(&id);
    let mut length = [0u8; 2];
    BigEndian::write_u16(&mut length, payload.len() as u16);
    frame.extend_from_slice(&length);
    frame.extend_from_slice(payload);

    w.write_all(&frame)?;
    w.flush()
}

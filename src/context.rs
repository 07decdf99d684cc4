//! Per-connection state: buffered input, the outgoing frame queue,
//! the shared compression streams, and identifier allocation.

use std::collections::VecDeque;

use log::{trace, warn};

use crate::codec::{encode_frame, parse_frame, ParseOutcome};
use crate::error::SpdyError;
use crate::frame::{Frame, Version};
use crate::zlib::{HeaderDecoder, HeaderEncoder};

/// Which end of the connection this context represents. Clients
/// allocate odd stream and ping ids, servers even ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

/// One SPDY connection's codec state.
///
/// The context is sans-I/O: the transport pushes decrypted bytes in
/// through [`incoming`](Self::incoming) and pulls wire bytes out of
/// [`outgoing`](Self::outgoing); no call touches a socket. It is a
/// single mutable unit (buffer, queue, compression streams, counters)
/// and is deliberately single-threaded; callers that share one across
/// threads must serialize access themselves.
///
/// Both zlib streams live exactly as long as the context and see every
/// header block of the connection in wire order. After a protocol
/// error from [`get_frame`](Self::get_frame) the inflate stream is
/// unusable and the context is poisoned: parsing is over, and the
/// caller should send GOAWAY and drop the connection.
#[derive(Debug)]
pub struct Context {
    side: Side,
    version: Version,
    input_buffer: Vec<u8>,
    frame_queue: VecDeque<Frame>,
    decoder: HeaderDecoder,
    encoder: HeaderEncoder,
    stream_id: u32,
    ping_id: u32,
    poisoned: Option<SpdyError>,
}

impl Context {
    pub fn new(side: Side, version: Version) -> Self {
        let first_id = match side {
            Side::Client => 1,
            Side::Server => 2,
        };
        Context {
            side,
            version,
            input_buffer: Vec::new(),
            frame_queue: VecDeque::new(),
            decoder: HeaderDecoder::new(version),
            encoder: HeaderEncoder::new(version),
            stream_id: first_id,
            ping_id: first_id,
            poisoned: None,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Append transport bytes to the input buffer. Never fails; the
    /// chunk may start or end mid-frame.
    pub fn incoming(&mut self, chunk: &[u8]) {
        self.input_buffer.extend_from_slice(chunk);
    }

    /// Bytes buffered but not yet consumed by a parsed frame.
    pub fn pending_input(&self) -> usize {
        self.input_buffer.len()
    }

    /// Whether a previous `get_frame` hit a protocol error.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Parse one frame off the front of the input buffer.
    ///
    /// Returns `Ok(None)` while the buffer holds less than one
    /// complete frame. On success exactly `8 + length` bytes are
    /// removed from the buffer front. A protocol error poisons the
    /// context and is re-reported by every later call.
    pub fn get_frame(&mut self) -> Result<Option<Frame>, SpdyError> {
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }
        loop {
            match parse_frame(&self.input_buffer, self.version, &mut self.decoder) {
                Ok(ParseOutcome::Insufficient) => return Ok(None),
                Ok(ParseOutcome::Ignored { consumed }) => {
                    trace!("skipping NOOP frame ({consumed} bytes)");
                    self.input_buffer.drain(..consumed);
                }
                Ok(ParseOutcome::Parsed { frame, consumed }) => {
                    trace!("parsed {} frame ({consumed} bytes)", frame.kind());
                    self.input_buffer.drain(..consumed);
                    return Ok(Some(frame));
                }
                Err(err) => {
                    warn!("protocol error, context is now poisoned: {err}");
                    self.poisoned = Some(err.clone());
                    return Err(err);
                }
            }
        }
    }

    /// Queue a frame for the next [`outgoing`](Self::outgoing) call.
    pub fn put_frame(&mut self, frame: Frame) {
        self.frame_queue.push_back(frame);
    }

    /// Drain the outgoing queue, encoding each frame in FIFO order,
    /// and return the concatenated wire bytes. The queue is empty
    /// afterwards even if nothing was queued.
    ///
    /// Splitting the same frame sequence across several calls yields
    /// the same bytes as one call; the deflate stream advances once
    /// per header-bearing frame either way.
    pub fn outgoing(&mut self) -> Result<Vec<u8>, SpdyError> {
        let mut out = Vec::new();
        while let Some(frame) = self.frame_queue.pop_front() {
            let bytes = encode_frame(&frame, &mut self.encoder)?;
            trace!("encoded {} frame ({} bytes)", frame.kind(), bytes.len());
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }

    /// Allocate the next stream id for this side: 1, 3, 5, … for
    /// clients, 2, 4, 6, … for servers.
    pub fn next_stream_id(&mut self) -> u32 {
        let id = self.stream_id;
        self.stream_id += 2;
        id
    }

    /// Allocate the next ping id, on the same odd/even rule.
    pub fn next_ping_id(&mut self) -> u32 {
        let id = self.ping_id;
        self.ping_id += 2;
        id
    }
}

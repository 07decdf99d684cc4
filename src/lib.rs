//! spdy-sans-io: a sans-I/O SPDY/2 and SPDY/3 framing codec
//!
//! This crate implements the codec core of a SPDY endpoint: it turns
//! arbitrary byte chunks from a transport into fully parsed frames,
//! and frames back into their exact wire bytes, together with the
//! connection-scoped state SPDY ties to framing: the zlib header
//! compression streams and the odd/even stream and ping id counters.
//!
//! # Features
//!
//! - **Sans-I/O design**: no sockets, no async runtime; callers feed
//!   bytes in and write bytes out
//! - **SPDY/2 and SPDY/3**: both control-frame layout generations,
//!   including the v2 little-endian SETTINGS ids
//! - **Stateful header compression**: zlib with the version's preset
//!   dictionary, shared across all header blocks of a connection
//! - **Incremental parsing**: input may be split at any byte boundary
//!
//! # Quick start
//!
//! ```rust
//! use spdy_sans_io::{Context, Frame, Side, Version, flags};
//!
//! let mut client = Context::new(Side::Client, Version::V3);
//! let mut server = Context::new(Side::Server, Version::V3);
//!
//! let stream_id = client.next_stream_id();
//! client.put_frame(Frame::Ping { version: Version::V3, flags: 0, uniq_id: 1 });
//! client.put_frame(Frame::Data {
//!     stream_id,
//!     flags: flags::FLAG_FIN,
//!     data: b"hello".to_vec(),
//! });
//!
//! server.incoming(&client.outgoing().unwrap());
//! while let Some(frame) = server.get_frame().unwrap() {
//!     match frame {
//!         Frame::Ping { uniq_id, .. } => println!("ping {uniq_id}"),
//!         Frame::Data { stream_id, data, .. } => {
//!             println!("{} bytes on stream {stream_id}", data.len());
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is a single dependency chain, leaves first: bit-stream
//! primitives ([`bits`]), the header-block codec ([`zlib`]), the frame
//! model and its wire layout tables ([`frame`]), the frame codec
//! ([`codec`]), and the per-connection [`Context`].
//!
//! It does NOT provide:
//! - TLS or NPN/ALPN version negotiation (construct the `Context` with
//!   the negotiated [`Version`])
//! - request/response or stream semantics above frame level
//! - flow control or priority scheduling

pub mod bits;
pub mod codec;
pub mod context;
pub mod error;
pub mod frame;
pub mod zlib;

pub use codec::{encode_frame, parse_frame, ParseOutcome, MAX_PAYLOAD_LEN};
pub use context::{Context, Side};
pub use error::SpdyError;
pub use frame::{
    flags, frame_type, goaway_status, settings_flag, settings_id, status_code, Frame, Headers,
    SettingsEntry, Version, DEFAULT_VERSION,
};
pub use zlib::{HeaderDecoder, HeaderEncoder, MAX_HEADER_BLOCK_SIZE, ZLIB_DICT_V2, ZLIB_DICT_V3};

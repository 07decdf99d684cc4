//! Error taxonomy for the codec core.
//!
//! Everything that can go wrong while parsing or encoding frames is a
//! protocol error: the peer (or the caller's frame) violated the SPDY
//! framing rules. Insufficient input is not an error; `get_frame`
//! reports it as `Ok(None)`.

use thiserror::Error;

/// Errors surfaced by the codec and the per-connection [`Context`].
///
/// A `Protocol` error returned from `Context::get_frame` poisons the
/// context: the shared inflate stream may have consumed part of a
/// header block and cannot be trusted afterwards.
///
/// [`Context`]: crate::Context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpdyError {
    /// Malformed frame, unknown control type, version mismatch,
    /// duplicate header name, or a compression failure.
    #[error("SPDY protocol error: {0}")]
    Protocol(String),

    /// A SPDY version outside `{2, 3}` was requested.
    #[error("unsupported SPDY version: {0}")]
    UnsupportedVersion(u16),
}

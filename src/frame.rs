//! SPDY frame model: the frame sum type, protocol constant tables,
//! and the per-variant wire layout descriptors.
//!
//! Every control frame's payload shape is data, not code: an ordered
//! list of `(field, bit width)` pairs, version-specialized where the
//! drafts diverge. The codec in [`crate::codec`] walks these tables in
//! both directions, so a layout exists in exactly one place.

use std::collections::HashMap;

use crate::error::SpdyError;

/// Control frame type numbers (SPDY drafts 2 and 3).
#[allow(dead_code)]
pub mod frame_type {
    pub const SYN_STREAM: u16 = 1;
    pub const SYN_REPLY: u16 = 2;
    pub const RST_STREAM: u16 = 3;
    pub const SETTINGS: u16 = 4;
    /// v2 only; consumed and ignored.
    pub const NOOP: u16 = 5;
    pub const PING: u16 = 6;
    pub const GOAWAY: u16 = 7;
    pub const HEADERS: u16 = 8;
    /// v3 only.
    pub const WINDOW_UPDATE: u16 = 9;
    /// v3 only.
    pub const CREDENTIAL: u16 = 10;
}

/// Frame-level flag bits.
#[allow(dead_code)]
pub mod flags {
    /// Last frame this endpoint sends on the stream.
    pub const FLAG_FIN: u8 = 0x01;
    /// SYN_STREAM: the stream is one-directional.
    pub const FLAG_UNIDIRECTIONAL: u8 = 0x02;
    /// SETTINGS: clear previously persisted settings.
    pub const FLAG_SETTINGS_CLEAR_SETTINGS: u8 = 0x01;
}

/// Per-entry flag byte of a SETTINGS id/value pair.
#[allow(dead_code)]
pub mod settings_flag {
    pub const ID_FLAG_PERSIST_NONE: u8 = 0x00;
    pub const ID_FLAG_PERSIST_VALUE: u8 = 0x01;
    pub const ID_FLAG_PERSIST_PERSISTED: u8 = 0x02;
}

/// SETTINGS identifiers.
#[allow(dead_code)]
pub mod settings_id {
    pub const UPLOAD_BANDWIDTH: u32 = 1;
    pub const DOWNLOAD_BANDWIDTH: u32 = 2;
    pub const ROUND_TRIP_TIME: u32 = 3;
    pub const MAX_CONCURRENT_STREAMS: u32 = 4;
    pub const CURRENT_CWND: u32 = 5;
    pub const DOWNLOAD_RETRANS_RATE: u32 = 6;
    pub const INITIAL_WINDOW_SIZE: u32 = 7;
    /// v3 only.
    pub const CLIENT_CERTIFICATE_VECTOR_SIZE: u32 = 8;
}

/// RST_STREAM status codes.
#[allow(dead_code)]
pub mod status_code {
    pub const PROTOCOL_ERROR: u32 = 1;
    pub const INVALID_STREAM: u32 = 2;
    pub const REFUSED_STREAM: u32 = 3;
    pub const UNSUPPORTED_VERSION: u32 = 4;
    pub const CANCEL: u32 = 5;
    pub const INTERNAL_ERROR: u32 = 6;
    pub const FLOW_CONTROL_ERROR: u32 = 7;
    // v3 additions
    pub const STREAM_IN_USE: u32 = 8;
    pub const STREAM_ALREADY_CLOSED: u32 = 9;
    pub const INVALID_CREDENTIALS: u32 = 10;
    pub const FRAME_TOO_LARGE: u32 = 11;
}

/// GOAWAY status codes (the v3 layout carries one).
#[allow(dead_code)]
pub mod goaway_status {
    pub const OK: u32 = 0;
    pub const PROTOCOL_ERROR: u32 = 1;
    pub const INTERNAL_ERROR: u32 = 2;
}

/// A SPDY protocol version this codec speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    V2,
    V3,
}

/// The version used when none is specified, matching common deployments.
pub const DEFAULT_VERSION: Version = Version::V2;

impl Version {
    /// Validate a raw wire or negotiation value.
    pub fn from_u16(raw: u16) -> Result<Version, SpdyError> {
        match raw {
            2 => Ok(Version::V2),
            3 => Ok(Version::V3),
            other => Err(SpdyError::UnsupportedVersion(other)),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Version::V2 => 2,
            Version::V3 => 3,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// A decoded header map.
pub type Headers = HashMap<String, String>;

/// One SETTINGS id/value entry. Entry order is preserved on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsEntry {
    /// 24-bit settings identifier (see [`settings_id`]).
    pub id: u32,
    /// Persistence flag (see [`settings_flag`]).
    pub flag: u8,
    pub value: u32,
}

/// A single SPDY frame, parsed or awaiting encoding.
///
/// Control frames carry the version they are framed with; data frames
/// have no version on the wire. Stream identifiers are 31-bit values.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Data {
        stream_id: u32,
        flags: u8,
        data: Vec<u8>,
    },
    SynStream {
        version: Version,
        flags: u8,
        stream_id: u32,
        associated_stream_id: u32,
        /// 2 bits wide on v2, 3 on v3.
        priority: u8,
        /// Credential slot, v3 only; 0 on v2.
        slot: u8,
        headers: Headers,
    },
    SynReply {
        version: Version,
        flags: u8,
        stream_id: u32,
        headers: Headers,
    },
    RstStream {
        version: Version,
        flags: u8,
        stream_id: u32,
        status_code: u32,
    },
    Settings {
        version: Version,
        flags: u8,
        entries: Vec<SettingsEntry>,
    },
    Ping {
        version: Version,
        flags: u8,
        uniq_id: u32,
    },
    Goaway {
        version: Version,
        flags: u8,
        last_good_stream_id: u32,
        /// Present on the wire for v3 only; 0 on v2.
        status_code: u32,
    },
    Headers {
        version: Version,
        flags: u8,
        stream_id: u32,
        headers: Headers,
    },
    /// v3 only.
    WindowUpdate {
        version: Version,
        flags: u8,
        stream_id: u32,
        delta_window_size: u32,
    },
    /// v3 only; carried shape-only, no certificate semantics.
    Credential {
        version: Version,
        flags: u8,
        slot: u16,
        proof: Vec<u8>,
        certificates: Vec<Vec<u8>>,
    },
}

impl Frame {
    /// Control frames have the top bit set on the wire.
    pub fn is_control(&self) -> bool {
        !matches!(self, Frame::Data { .. })
    }

    /// The control frame type number, or `None` for data frames.
    pub fn frame_type(&self) -> Option<u16> {
        match self {
            Frame::Data { .. } => None,
            Frame::SynStream { .. } => Some(frame_type::SYN_STREAM),
            Frame::SynReply { .. } => Some(frame_type::SYN_REPLY),
            Frame::RstStream { .. } => Some(frame_type::RST_STREAM),
            Frame::Settings { .. } => Some(frame_type::SETTINGS),
            Frame::Ping { .. } => Some(frame_type::PING),
            Frame::Goaway { .. } => Some(frame_type::GOAWAY),
            Frame::Headers { .. } => Some(frame_type::HEADERS),
            Frame::WindowUpdate { .. } => Some(frame_type::WINDOW_UPDATE),
            Frame::Credential { .. } => Some(frame_type::CREDENTIAL),
        }
    }

    /// The SPDY version a control frame is framed with. Data frames
    /// carry none on the wire.
    pub fn version(&self) -> Option<Version> {
        match self {
            Frame::Data { .. } => None,
            Frame::SynStream { version, .. }
            | Frame::SynReply { version, .. }
            | Frame::RstStream { version, .. }
            | Frame::Settings { version, .. }
            | Frame::Ping { version, .. }
            | Frame::Goaway { version, .. }
            | Frame::Headers { version, .. }
            | Frame::WindowUpdate { version, .. }
            | Frame::Credential { version, .. } => Some(*version),
        }
    }

    pub fn flags(&self) -> u8 {
        match self {
            Frame::Data { flags, .. }
            | Frame::SynStream { flags, .. }
            | Frame::SynReply { flags, .. }
            | Frame::RstStream { flags, .. }
            | Frame::Settings { flags, .. }
            | Frame::Ping { flags, .. }
            | Frame::Goaway { flags, .. }
            | Frame::Headers { flags, .. }
            | Frame::WindowUpdate { flags, .. }
            | Frame::Credential { flags, .. } => *flags,
        }
    }

    /// Short name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Data { .. } => "DATA",
            Frame::SynStream { .. } => "SYN_STREAM",
            Frame::SynReply { .. } => "SYN_REPLY",
            Frame::RstStream { .. } => "RST_STREAM",
            Frame::Settings { .. } => "SETTINGS",
            Frame::Ping { .. } => "PING",
            Frame::Goaway { .. } => "GOAWAY",
            Frame::Headers { .. } => "HEADERS",
            Frame::WindowUpdate { .. } => "WINDOW_UPDATE",
            Frame::Credential { .. } => "CREDENTIAL",
        }
    }
}

/// Payload fields a layout descriptor can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldId {
    StreamId,
    AssociatedStreamId,
    Priority,
    Slot,
    StatusCode,
    NumberOfEntries,
    UniqId,
    LastGoodStreamId,
    DeltaWindowSize,
    /// Compressed name/value block; spans the rest of the payload.
    HeaderBlock,
    /// SETTINGS entry list; spans the rest of the payload.
    IdValuePairs,
    /// Credential proof + certificate list; spans the rest.
    CredentialBody,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Width {
    Bits(u32),
    /// Everything left in the payload.
    Rest,
}

/// One step of a payload layout: a field (or reserved padding when
/// `field` is `None`) and its width.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldSpec {
    pub field: Option<FieldId>,
    pub width: Width,
}

const fn bits(field: FieldId, n: u32) -> FieldSpec {
    FieldSpec {
        field: Some(field),
        width: Width::Bits(n),
    }
}

const fn reserved(n: u32) -> FieldSpec {
    FieldSpec {
        field: None,
        width: Width::Bits(n),
    }
}

const fn rest(field: FieldId) -> FieldSpec {
    FieldSpec {
        field: Some(field),
        width: Width::Rest,
    }
}

use FieldId::*;

static SYN_STREAM_V2: &[FieldSpec] = &[
    reserved(1),
    bits(StreamId, 31),
    reserved(1),
    bits(AssociatedStreamId, 31),
    bits(Priority, 2),
    reserved(14),
    rest(HeaderBlock),
];

static SYN_STREAM_V3: &[FieldSpec] = &[
    reserved(1),
    bits(StreamId, 31),
    reserved(1),
    bits(AssociatedStreamId, 31),
    bits(Priority, 3),
    reserved(5),
    bits(Slot, 8),
    rest(HeaderBlock),
];

static SYN_REPLY_V2: &[FieldSpec] = &[
    reserved(1),
    bits(StreamId, 31),
    reserved(16),
    rest(HeaderBlock),
];

static SYN_REPLY_V3: &[FieldSpec] = &[reserved(1), bits(StreamId, 31), rest(HeaderBlock)];

static RST_STREAM: &[FieldSpec] = &[reserved(1), bits(StreamId, 31), bits(StatusCode, 32)];

static SETTINGS: &[FieldSpec] = &[bits(NumberOfEntries, 32), rest(IdValuePairs)];

static PING: &[FieldSpec] = &[bits(UniqId, 32)];

static GOAWAY_V2: &[FieldSpec] = &[reserved(1), bits(LastGoodStreamId, 31)];

static GOAWAY_V3: &[FieldSpec] = &[
    reserved(1),
    bits(LastGoodStreamId, 31),
    bits(StatusCode, 32),
];

static HEADERS_V2: &[FieldSpec] = &[
    reserved(1),
    bits(StreamId, 31),
    reserved(16),
    rest(HeaderBlock),
];

static HEADERS_V3: &[FieldSpec] = &[reserved(1), bits(StreamId, 31), rest(HeaderBlock)];

static WINDOW_UPDATE: &[FieldSpec] = &[
    reserved(1),
    bits(StreamId, 31),
    reserved(1),
    bits(DeltaWindowSize, 31),
];

static CREDENTIAL: &[FieldSpec] = &[bits(Slot, 16), rest(CredentialBody)];

/// Layout for a control frame type under a given version, or `None`
/// when the type does not exist in that version. NOOP has no payload
/// layout at all; the codec skips it before looking here.
pub(crate) fn control_layout(ty: u16, version: Version) -> Option<&'static [FieldSpec]> {
    match (ty, version) {
        (frame_type::SYN_STREAM, Version::V2) => Some(SYN_STREAM_V2),
        (frame_type::SYN_STREAM, Version::V3) => Some(SYN_STREAM_V3),
        (frame_type::SYN_REPLY, Version::V2) => Some(SYN_REPLY_V2),
        (frame_type::SYN_REPLY, Version::V3) => Some(SYN_REPLY_V3),
        (frame_type::RST_STREAM, _) => Some(RST_STREAM),
        (frame_type::SETTINGS, _) => Some(SETTINGS),
        (frame_type::PING, _) => Some(PING),
        (frame_type::GOAWAY, Version::V2) => Some(GOAWAY_V2),
        (frame_type::GOAWAY, Version::V3) => Some(GOAWAY_V3),
        (frame_type::HEADERS, Version::V2) => Some(HEADERS_V2),
        (frame_type::HEADERS, Version::V3) => Some(HEADERS_V3),
        (frame_type::WINDOW_UPDATE, Version::V3) => Some(WINDOW_UPDATE),
        (frame_type::CREDENTIAL, Version::V3) => Some(CREDENTIAL),
        _ => None,
    }
}

//! Frame codec: raw bytes to [`Frame`] values and back.
//!
//! Parsing and encoding are both driven by the layout descriptors in
//! [`crate::frame`]; this module owns the 8-byte common header, the
//! SETTINGS entry format (the one little-endian corner of SPDY), and
//! the CREDENTIAL payload shape. Header blocks are delegated to the
//! connection's [`HeaderDecoder`]/[`HeaderEncoder`] because their
//! compression state spans frames.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::bits::{BitReader, BitWriter};
use crate::error::SpdyError;
use crate::frame::{
    control_layout, frame_type, FieldId, Frame, Headers, SettingsEntry, Version, Width,
};
use crate::zlib::{HeaderDecoder, HeaderEncoder};

/// Largest payload the 24-bit length field can announce.
pub const MAX_PAYLOAD_LEN: usize = 0xFF_FFFF;

/// Result of attempting to parse one frame from the front of a buffer.
#[derive(Debug)]
pub enum ParseOutcome {
    /// The buffer does not yet hold a complete frame.
    Insufficient,
    /// A complete frame was consumed but produces no value (v2 NOOP).
    Ignored { consumed: usize },
    /// One complete frame and the byte count it occupied.
    Parsed { frame: Frame, consumed: usize },
}

fn type_name(ty: u16) -> &'static str {
    match ty {
        frame_type::SYN_STREAM => "SYN_STREAM",
        frame_type::SYN_REPLY => "SYN_REPLY",
        frame_type::RST_STREAM => "RST_STREAM",
        frame_type::SETTINGS => "SETTINGS",
        frame_type::NOOP => "NOOP",
        frame_type::PING => "PING",
        frame_type::GOAWAY => "GOAWAY",
        frame_type::HEADERS => "HEADERS",
        frame_type::WINDOW_UPDATE => "WINDOW_UPDATE",
        frame_type::CREDENTIAL => "CREDENTIAL",
        _ => "unknown",
    }
}

/// Parse one frame from the front of `buf`.
///
/// `version` is the connection's negotiated version; a control frame
/// announcing any other version is a protocol error. The shared
/// `decoder` advances whenever the frame carries a header block.
pub fn parse_frame(
    buf: &[u8],
    version: Version,
    decoder: &mut HeaderDecoder,
) -> Result<ParseOutcome, SpdyError> {
    if buf.len() < 8 {
        return Ok(ParseOutcome::Insufficient);
    }
    if buf[0] & 0x80 != 0 {
        parse_control(buf, version, decoder)
    } else {
        Ok(parse_data(buf))
    }
}

fn parse_data(buf: &[u8]) -> ParseOutcome {
    let stream_id = BigEndian::read_u32(&buf[0..4]) & 0x7FFF_FFFF;
    let flags = buf[4];
    let length = BigEndian::read_u24(&buf[5..8]) as usize;
    let total = 8 + length;
    if buf.len() < total {
        return ParseOutcome::Insufficient;
    }
    ParseOutcome::Parsed {
        frame: Frame::Data {
            stream_id,
            flags,
            data: buf[8..total].to_vec(),
        },
        consumed: total,
    }
}

/// Integer fields collected while walking a layout descriptor.
#[derive(Default)]
struct ParsedFields {
    stream_id: u32,
    associated_stream_id: u32,
    priority: u32,
    slot: u32,
    status_code: u32,
    number_of_entries: u32,
    uniq_id: u32,
    last_good_stream_id: u32,
    delta_window_size: u32,
    headers: Headers,
    entries: Vec<SettingsEntry>,
    proof: Vec<u8>,
    certificates: Vec<Vec<u8>>,
}

impl ParsedFields {
    fn set(&mut self, id: FieldId, value: u32) {
        match id {
            FieldId::StreamId => self.stream_id = value,
            FieldId::AssociatedStreamId => self.associated_stream_id = value,
            FieldId::Priority => self.priority = value,
            FieldId::Slot => self.slot = value,
            FieldId::StatusCode => self.status_code = value,
            FieldId::NumberOfEntries => self.number_of_entries = value,
            FieldId::UniqId => self.uniq_id = value,
            FieldId::LastGoodStreamId => self.last_good_stream_id = value,
            FieldId::DeltaWindowSize => self.delta_window_size = value,
            FieldId::HeaderBlock | FieldId::IdValuePairs | FieldId::CredentialBody => {}
        }
    }
}

fn parse_control(
    buf: &[u8],
    version: Version,
    decoder: &mut HeaderDecoder,
) -> Result<ParseOutcome, SpdyError> {
    let wire_version = BigEndian::read_u16(&buf[0..2]) & 0x7FFF;
    if wire_version != version.as_u16() {
        return Err(SpdyError::Protocol(format!(
            "incorrect SPDY version: frame says {wire_version}, connection is {version}"
        )));
    }
    let ty = BigEndian::read_u16(&buf[2..4]);
    let flags = buf[4];
    let length = BigEndian::read_u24(&buf[5..8]) as usize;
    let total = 8 + length;

    if ty == frame_type::NOOP && version == Version::V2 {
        if buf.len() < total {
            return Ok(ParseOutcome::Insufficient);
        }
        return Ok(ParseOutcome::Ignored { consumed: total });
    }
    let layout = control_layout(ty, version)
        .ok_or_else(|| SpdyError::Protocol(format!("invalid frame type: {ty}")))?;
    if buf.len() < total {
        return Ok(ParseOutcome::Insufficient);
    }

    let payload = &buf[8..total];
    let mut reader = BitReader::new(payload);
    let mut fields = ParsedFields::default();
    let short =
        || SpdyError::Protocol(format!("{} payload too short", type_name(ty)));

    for spec in layout {
        match (spec.width, spec.field) {
            (Width::Bits(n), None) => {
                reader.skip(n).ok_or_else(short)?;
            }
            (Width::Bits(n), Some(id)) => {
                let value = reader.read_bits(n).ok_or_else(short)?;
                fields.set(id, value);
            }
            (Width::Rest, Some(id)) => {
                let remainder = reader.rest().ok_or_else(short)?;
                match id {
                    FieldId::HeaderBlock => fields.headers = decoder.decode(remainder)?,
                    FieldId::IdValuePairs => {
                        fields.entries =
                            parse_settings_entries(fields.number_of_entries, remainder, version)?;
                    }
                    FieldId::CredentialBody => {
                        let (proof, certificates) = parse_credential_body(remainder)?;
                        fields.proof = proof;
                        fields.certificates = certificates;
                    }
                    _ => {
                        return Err(SpdyError::Protocol(format!(
                            "{} layout names a non-remainder field as remainder",
                            type_name(ty)
                        )));
                    }
                }
            }
            (Width::Rest, None) => {
                reader.rest().ok_or_else(short)?;
            }
        }
    }

    let frame = build_control_frame(ty, version, flags, fields)?;
    Ok(ParseOutcome::Parsed {
        frame,
        consumed: total,
    })
}

fn build_control_frame(
    ty: u16,
    version: Version,
    flags: u8,
    f: ParsedFields,
) -> Result<Frame, SpdyError> {
    let frame = match ty {
        frame_type::SYN_STREAM => Frame::SynStream {
            version,
            flags,
            stream_id: f.stream_id,
            associated_stream_id: f.associated_stream_id,
            priority: f.priority as u8,
            slot: f.slot as u8,
            headers: f.headers,
        },
        frame_type::SYN_REPLY => Frame::SynReply {
            version,
            flags,
            stream_id: f.stream_id,
            headers: f.headers,
        },
        frame_type::RST_STREAM => Frame::RstStream {
            version,
            flags,
            stream_id: f.stream_id,
            status_code: f.status_code,
        },
        frame_type::SETTINGS => Frame::Settings {
            version,
            flags,
            entries: f.entries,
        },
        frame_type::PING => Frame::Ping {
            version,
            flags,
            uniq_id: f.uniq_id,
        },
        frame_type::GOAWAY => Frame::Goaway {
            version,
            flags,
            last_good_stream_id: f.last_good_stream_id,
            status_code: f.status_code,
        },
        frame_type::HEADERS => Frame::Headers {
            version,
            flags,
            stream_id: f.stream_id,
            headers: f.headers,
        },
        frame_type::WINDOW_UPDATE => Frame::WindowUpdate {
            version,
            flags,
            stream_id: f.stream_id,
            delta_window_size: f.delta_window_size,
        },
        frame_type::CREDENTIAL => Frame::Credential {
            version,
            flags,
            slot: f.slot as u16,
            proof: f.proof,
            certificates: f.certificates,
        },
        other => {
            return Err(SpdyError::Protocol(format!("invalid frame type: {other}")));
        }
    };
    Ok(frame)
}

/// Encode one frame to its exact wire bytes.
///
/// The shared `encoder` advances whenever the frame carries a header
/// block; callers must encode frames in the order the peer will parse
/// them.
pub fn encode_frame(frame: &Frame, encoder: &mut HeaderEncoder) -> Result<Vec<u8>, SpdyError> {
    match frame {
        Frame::Data {
            stream_id,
            flags,
            data,
        } => encode_data(*stream_id, *flags, data),
        _ => encode_control(frame, encoder),
    }
}

fn encode_data(stream_id: u32, flags: u8, data: &[u8]) -> Result<Vec<u8>, SpdyError> {
    if data.len() > MAX_PAYLOAD_LEN {
        return Err(SpdyError::Protocol(format!(
            "data frame payload of {} bytes exceeds the 24-bit length field",
            data.len()
        )));
    }
    let mut out = Vec::with_capacity(8 + data.len());
    out.extend_from_slice(&(stream_id & 0x7FFF_FFFF).to_be_bytes());
    out.push(flags);
    push_u24(&mut out, data.len() as u32);
    out.extend_from_slice(data);
    Ok(out)
}

fn encode_control(frame: &Frame, encoder: &mut HeaderEncoder) -> Result<Vec<u8>, SpdyError> {
    let (Some(ty), Some(version)) = (frame.frame_type(), frame.version()) else {
        return Err(SpdyError::Protocol(
            "data frame reached the control encoder".into(),
        ));
    };
    let layout = control_layout(ty, version).ok_or_else(|| {
        SpdyError::Protocol(format!(
            "{} frames are not defined for SPDY/{version}",
            type_name(ty)
        ))
    })?;

    let mut writer = BitWriter::new();
    for spec in layout {
        match (spec.width, spec.field) {
            (Width::Bits(n), None) => writer.write_bits(0, n),
            (Width::Bits(n), Some(id)) => writer.write_bits(int_field(frame, id), n),
            (Width::Rest, Some(FieldId::HeaderBlock)) => {
                let headers = match frame {
                    Frame::SynStream { headers, .. }
                    | Frame::SynReply { headers, .. }
                    | Frame::Headers { headers, .. } => headers,
                    _ => {
                        return Err(SpdyError::Protocol(format!(
                            "{} frame has no header block",
                            type_name(ty)
                        )));
                    }
                };
                writer.write_bytes(&encoder.encode(headers)?);
            }
            (Width::Rest, Some(FieldId::IdValuePairs)) => {
                let entries = match frame {
                    Frame::Settings { entries, .. } => entries,
                    _ => {
                        return Err(SpdyError::Protocol(format!(
                            "{} frame has no settings entries",
                            type_name(ty)
                        )));
                    }
                };
                writer.write_bytes(&encode_settings_entries(entries, version));
            }
            (Width::Rest, Some(FieldId::CredentialBody)) => {
                let (proof, certificates) = match frame {
                    Frame::Credential {
                        proof,
                        certificates,
                        ..
                    } => (proof, certificates),
                    _ => {
                        return Err(SpdyError::Protocol(format!(
                            "{} frame has no credential body",
                            type_name(ty)
                        )));
                    }
                };
                writer.write_bytes(&encode_credential_body(proof, certificates)?);
            }
            (Width::Rest, _) => {
                return Err(SpdyError::Protocol(format!(
                    "{} layout names a non-remainder field as remainder",
                    type_name(ty)
                )));
            }
        }
    }

    let payload = writer.into_bytes();
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(SpdyError::Protocol(format!(
            "{} payload of {} bytes exceeds the 24-bit length field",
            type_name(ty),
            payload.len()
        )));
    }

    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&(0x8000 | version.as_u16()).to_be_bytes());
    out.extend_from_slice(&ty.to_be_bytes());
    out.push(frame.flags());
    push_u24(&mut out, payload.len() as u32);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Integer payload field of an outgoing frame. Fields a variant does
/// not carry encode as zero; widths are masked by the bit writer.
fn int_field(frame: &Frame, id: FieldId) -> u32 {
    match id {
        FieldId::StreamId => match frame {
            Frame::SynStream { stream_id, .. }
            | Frame::SynReply { stream_id, .. }
            | Frame::Headers { stream_id, .. }
            | Frame::RstStream { stream_id, .. }
            | Frame::WindowUpdate { stream_id, .. } => *stream_id,
            _ => 0,
        },
        FieldId::AssociatedStreamId => match frame {
            Frame::SynStream {
                associated_stream_id,
                ..
            } => *associated_stream_id,
            _ => 0,
        },
        FieldId::Priority => match frame {
            Frame::SynStream { priority, .. } => u32::from(*priority),
            _ => 0,
        },
        FieldId::Slot => match frame {
            Frame::SynStream { slot, .. } => u32::from(*slot),
            Frame::Credential { slot, .. } => u32::from(*slot),
            _ => 0,
        },
        FieldId::StatusCode => match frame {
            Frame::RstStream { status_code, .. } | Frame::Goaway { status_code, .. } => {
                *status_code
            }
            _ => 0,
        },
        FieldId::NumberOfEntries => match frame {
            Frame::Settings { entries, .. } => entries.len() as u32,
            _ => 0,
        },
        FieldId::UniqId => match frame {
            Frame::Ping { uniq_id, .. } => *uniq_id,
            _ => 0,
        },
        FieldId::LastGoodStreamId => match frame {
            Frame::Goaway {
                last_good_stream_id,
                ..
            } => *last_good_stream_id,
            _ => 0,
        },
        FieldId::DeltaWindowSize => match frame {
            Frame::WindowUpdate {
                delta_window_size, ..
            } => *delta_window_size,
            _ => 0,
        },
        FieldId::HeaderBlock | FieldId::IdValuePairs | FieldId::CredentialBody => 0,
    }
}

fn push_u24(out: &mut Vec<u8>, value: u32) {
    let mut buf = [0u8; 3];
    BigEndian::write_u24(&mut buf, value);
    out.extend_from_slice(&buf);
}

/// Parse `count` 8-byte SETTINGS entries. v2 entries lead with a
/// little-endian 24-bit id; v3 entries lead with the flag byte and a
/// big-endian id. Trailing bytes beyond the declared count are
/// tolerated and ignored.
fn parse_settings_entries(
    count: u32,
    data: &[u8],
    version: Version,
) -> Result<Vec<SettingsEntry>, SpdyError> {
    let need = (count as usize).checked_mul(8).filter(|&n| n <= data.len());
    let Some(need) = need else {
        return Err(SpdyError::Protocol(format!(
            "SETTINGS declares {count} entries but carries only {} payload bytes",
            data.len()
        )));
    };
    let mut entries = Vec::with_capacity(count as usize);
    for chunk in data[..need].chunks_exact(8) {
        let entry = match version {
            Version::V2 => SettingsEntry {
                id: LittleEndian::read_u24(&chunk[0..3]),
                flag: chunk[3],
                value: BigEndian::read_u32(&chunk[4..8]),
            },
            Version::V3 => SettingsEntry {
                flag: chunk[0],
                id: BigEndian::read_u24(&chunk[1..4]),
                value: BigEndian::read_u32(&chunk[4..8]),
            },
        };
        entries.push(entry);
    }
    Ok(entries)
}

fn encode_settings_entries(entries: &[SettingsEntry], version: Version) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * 8);
    let mut id = [0u8; 3];
    for entry in entries {
        match version {
            Version::V2 => {
                LittleEndian::write_u24(&mut id, entry.id & 0xFF_FFFF);
                out.extend_from_slice(&id);
                out.push(entry.flag);
                out.extend_from_slice(&entry.value.to_be_bytes());
            }
            Version::V3 => {
                out.push(entry.flag);
                BigEndian::write_u24(&mut id, entry.id & 0xFF_FFFF);
                out.extend_from_slice(&id);
                out.extend_from_slice(&entry.value.to_be_bytes());
            }
        }
    }
    out
}

/// CREDENTIAL payload after the slot: a length-prefixed proof followed
/// by length-prefixed certificates to the end of the frame.
fn parse_credential_body(data: &[u8]) -> Result<(Vec<u8>, Vec<Vec<u8>>), SpdyError> {
    let mut cursor = 0usize;
    let proof = read_len_prefixed(data, &mut cursor)?;
    let mut certificates = Vec::new();
    while cursor < data.len() {
        certificates.push(read_len_prefixed(data, &mut cursor)?);
    }
    Ok((proof, certificates))
}

fn read_len_prefixed(data: &[u8], cursor: &mut usize) -> Result<Vec<u8>, SpdyError> {
    let truncated = || SpdyError::Protocol("truncated CREDENTIAL payload".into());
    let len_end = cursor
        .checked_add(4)
        .filter(|&end| end <= data.len())
        .ok_or_else(truncated)?;
    let len = BigEndian::read_u32(&data[*cursor..len_end]) as usize;
    let end = len_end
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or_else(truncated)?;
    let out = data[len_end..end].to_vec();
    *cursor = end;
    Ok(out)
}

fn encode_credential_body(proof: &[u8], certificates: &[Vec<u8>]) -> Result<Vec<u8>, SpdyError> {
    let mut out = Vec::with_capacity(4 + proof.len());
    push_len_prefixed(&mut out, proof)?;
    for certificate in certificates {
        push_len_prefixed(&mut out, certificate)?;
    }
    Ok(out)
}

fn push_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), SpdyError> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        SpdyError::Protocol("CREDENTIAL field exceeds the 32-bit length prefix".into())
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

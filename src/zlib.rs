//! Header-block compression for SPDY name/value blocks.
//!
//! SYN_STREAM, SYN_REPLY and HEADERS frames carry their header maps as
//! a length-prefixed name/value block, deflated through a zlib stream
//! primed with a version-specific preset dictionary. Both streams are
//! connection-scoped: every header block of a connection flows through
//! the same deflate (outgoing) and inflate (incoming) stream, in wire
//! order, without reinitialization. Each encoded block ends on a sync
//! flush so the receiving side can inflate it in isolation.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress};

use crate::error::SpdyError;
use crate::frame::{Headers, Version};

/// Maximum size one header block may inflate to (256 KB). Bounds
/// memory against a malicious or broken peer's compression bomb.
pub const MAX_HEADER_BLOCK_SIZE: usize = 256 * 1024;

/// Preset zlib dictionary for SPDY/2 header blocks (draft 2 §2.6.10),
/// including the trailing NUL that deployed implementations feed to
/// zlib. Both peers must prime their streams with these exact bytes.
pub const ZLIB_DICT_V2: &[u8] = b"\
    optionsgetheadpostputdeletetraceacceptaccept-charsetaccept-encodingaccep\
    t-languageauthorizationexpectfromhostif-modified-sinceif-matchif-none-ma\
    tchif-rangeif-unmodifiedsincemax-forwardsproxy-authorizationrangereferer\
    teuser-agent100101200201202203204205206300301302303304305306307400401402\
    403404405406407408409410411412413414415416417500501502503504505accept-ra\
    ngesageetaglocationproxy-authenticatepublicretry-afterservervarywarningw\
    ww-authenticateallowcontent-basecontent-encodingcache-controlconnectiond\
    atetrailertransfer-encodingupgradeviawarningcontent-languagecontent-leng\
    thcontent-locationcontent-md5content-rangecontent-typeetagexpireslast-mo\
    difiedset-cookieMondayTuesdayWednesdayThursdayFridaySaturdaySundayJanFeb\
    MarAprMayJunJulAugSepOctNovDecchunkedtext/htmlimage/pngimage/jpgimage/gi\
    fapplication/xmlapplication/xhtmltext/plainpublicmax-agecharset=iso-8859\
    -1utf-8gzipdeflateHTTP/1.1statusversionurl\x00";

/// Preset zlib dictionary for SPDY/3 header blocks (draft 3 §2.6.10),
/// with the trailing NUL, 1424 bytes.
pub const ZLIB_DICT_V3: &[u8] = b"\
    \x00\x00\x00\x07options\x00\x00\x00\x04head\x00\x00\x00\x04post\x00\x00\
    \x00\x03put\x00\x00\x00\x06delete\x00\x00\x00\x05trace\x00\x00\x00\x06ac\
    cept\x00\x00\x00\x0eaccept-charset\x00\x00\x00\x0faccept-encoding\x00\
    \x00\x00\x0faccept-language\x00\x00\x00\x0daccept-ranges\x00\x00\x00\x03\
    age\x00\x00\x00\x05allow\x00\x00\x00\x0dauthorization\x00\x00\x00\x0dcac\
    he-control\x00\x00\x00\x0aconnection\x00\x00\x00\x0ccontent-base\x00\x00\
    \x00\x10content-encoding\x00\x00\x00\x10content-language\x00\x00\x00\x0e\
    content-length\x00\x00\x00\x10content-location\x00\x00\x00\x0bcontent-md\
    5\x00\x00\x00\x0dcontent-range\x00\x00\x00\x0ccontent-type\x00\x00\x00\
    \x04date\x00\x00\x00\x04etag\x00\x00\x00\x06expect\x00\x00\x00\x07expire\
    s\x00\x00\x00\x04from\x00\x00\x00\x04host\x00\x00\x00\x08if-match\x00\
    \x00\x00\x11if-modified-since\x00\x00\x00\x0dif-none-match\x00\x00\x00\
    \x08if-range\x00\x00\x00\x13if-unmodified-since\x00\x00\x00\x0dlast-modi\
    fied\x00\x00\x00\x08location\x00\x00\x00\x0cmax-forwards\x00\x00\x00\x06\
    pragma\x00\x00\x00\x12proxy-authenticate\x00\x00\x00\x13proxy-authorizat\
    ion\x00\x00\x00\x05range\x00\x00\x00\x07referer\x00\x00\x00\x0bretry-aft\
    er\x00\x00\x00\x06server\x00\x00\x00\x02te\x00\x00\x00\x07trailer\x00\
    \x00\x00\x11transfer-encoding\x00\x00\x00\x07upgrade\x00\x00\x00\x0auser\
    -agent\x00\x00\x00\x04vary\x00\x00\x00\x03via\x00\x00\x00\x07warning\x00\
    \x00\x00\x10www-authenticate\x00\x00\x00\x06method\x00\x00\x00\x03get\
    \x00\x00\x00\x06status\x00\x00\x00\x06200\x20OK\x00\x00\x00\x07version\
    \x00\x00\x00\x08HTTP/1.1\x00\x00\x00\x03url\x00\x00\x00\x06public\x00\
    \x00\x00\x0aset-cookie\x00\x00\x00\x0akeep-alive\x00\x00\x00\x06origin10\
    010120120220520630030230330430530630740240540640740840941041141241341441\
    5416417502504505203\x20Non-Authoritative\x20Information204\x20No\x20Cont\
    ent301\x20Moved\x20Permanently400\x20Bad\x20Request401\x20Unauthorized40\
    3\x20Forbidden404\x20Not\x20Found500\x20Internal\x20Server\x20Error501\
    \x20Not\x20Implemented503\x20Service\x20UnavailableJan\x20Feb\x20Mar\x20\
    Apr\x20May\x20Jun\x20Jul\x20Aug\x20Sept\x20Oct\x20Nov\x20Dec\x2000:00:00\
    \x20Mon,\x20Tue,\x20Wed,\x20Thu,\x20Fri,\x20Sat,\x20Sun,\x20GMTchunked,t\
    ext/html,image/png,image/jpg,image/gif,application/xml,application/xhtml\
    +xml,text/plain,text/javascript,publicprivatemax-age=gzip,deflate,sdchch\
    arset=utf-8charset=iso-8859-1,utf-,*,enq=0.\x00";

fn dictionary(version: Version) -> &'static [u8] {
    match version {
        Version::V2 => ZLIB_DICT_V2,
        Version::V3 => ZLIB_DICT_V3,
    }
}

/// Deflate side of a connection's header compression.
///
/// Owns the connection-lifetime deflate stream. Each call to
/// [`encode`](Self::encode) serializes one name/value block and runs it
/// through the stream with a sync flush, so the stream state advances
/// once per header-bearing frame.
pub struct HeaderEncoder {
    version: Version,
    deflate: Compress,
    primed: bool,
}

impl std::fmt::Debug for HeaderEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderEncoder")
            .field("version", &self.version)
            .finish()
    }
}

impl HeaderEncoder {
    pub fn new(version: Version) -> Self {
        HeaderEncoder {
            version,
            deflate: Compress::new(Compression::default(), true),
            primed: false,
        }
    }

    /// Serialize and compress one header map.
    pub fn encode(&mut self, headers: &Headers) -> Result<Vec<u8>, SpdyError> {
        let block = serialize_nv_block(headers, self.version)?;
        self.compress_block(&block)
    }

    fn compress_block(&mut self, block: &[u8]) -> Result<Vec<u8>, SpdyError> {
        if !self.primed {
            // The preset dictionary must be installed before the first
            // byte of the stream.
            self.deflate
                .set_dictionary(dictionary(self.version))
                .map_err(|e| SpdyError::Protocol(format!("deflate dictionary rejected: {e}")))?;
            self.primed = true;
        }
        let mut out = Vec::with_capacity(block.len() + 32);
        let mut read = 0usize;
        loop {
            let before = self.deflate.total_in();
            self.deflate
                .compress_vec(&block[read..], &mut out, FlushCompress::Sync)
                .map_err(|e| SpdyError::Protocol(format!("header deflate failed: {e}")))?;
            read += (self.deflate.total_in() - before) as usize;
            // Spare output capacity after the call means the sync flush
            // completed; a full buffer means zlib wants more room.
            if read == block.len() && out.len() < out.capacity() {
                return Ok(out);
            }
            out.reserve(out.capacity().max(64));
        }
    }
}

/// Inflate side of a connection's header compression.
///
/// The stream is created once and fed every incoming header block in
/// wire order. A decode failure leaves it in an undefined state; the
/// owning context must be discarded.
pub struct HeaderDecoder {
    version: Version,
    inflate: Decompress,
}

impl std::fmt::Debug for HeaderDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderDecoder")
            .field("version", &self.version)
            .finish()
    }
}

impl HeaderDecoder {
    pub fn new(version: Version) -> Self {
        HeaderDecoder {
            version,
            inflate: Decompress::new(true),
        }
    }

    /// Decompress and parse one header block.
    pub fn decode(&mut self, compressed: &[u8]) -> Result<Headers, SpdyError> {
        let chunk = self.decompress_block(compressed)?;
        parse_nv_block(&chunk, self.version)
    }

    fn decompress_block(&mut self, data: &[u8]) -> Result<Vec<u8>, SpdyError> {
        let mut out = Vec::with_capacity(data.len() * 4 + 64);
        let mut read = 0usize;
        loop {
            let before = self.inflate.total_in();
            let result = self
                .inflate
                .decompress_vec(&data[read..], &mut out, FlushDecompress::Sync);
            // zlib consumes input up to the point of a NEED_DICT stop,
            // so account for it before looking at the outcome.
            read += (self.inflate.total_in() - before) as usize;
            match result {
                Ok(flate2::Status::StreamEnd) => return Ok(out),
                Ok(_) => {}
                Err(err) if err.needs_dictionary().is_some() => {
                    self.inflate
                        .set_dictionary(dictionary(self.version))
                        .map_err(|e| {
                            SpdyError::Protocol(format!("inflate dictionary rejected: {e}"))
                        })?;
                    continue;
                }
                Err(err) => {
                    return Err(SpdyError::Protocol(format!("header inflate failed: {err}")));
                }
            }
            if read == data.len() && out.len() < out.capacity() {
                return Ok(out);
            }
            if out.len() > MAX_HEADER_BLOCK_SIZE {
                return Err(SpdyError::Protocol(format!(
                    "header block inflated past {MAX_HEADER_BLOCK_SIZE} bytes"
                )));
            }
            out.reserve(out.capacity().max(64));
        }
    }
}

fn nv_length_size(version: Version) -> usize {
    match version {
        Version::V2 => 2,
        Version::V3 => 4,
    }
}

fn push_nv_length(out: &mut Vec<u8>, version: Version, n: usize) -> Result<(), SpdyError> {
    match version {
        Version::V2 => {
            if n > u16::MAX as usize {
                return Err(SpdyError::Protocol(format!(
                    "name/value field of {n} bytes exceeds the v2 length prefix"
                )));
            }
            out.extend_from_slice(&(n as u16).to_be_bytes());
        }
        Version::V3 => {
            if n > u32::MAX as usize {
                return Err(SpdyError::Protocol(format!(
                    "name/value field of {n} bytes exceeds the v3 length prefix"
                )));
            }
            out.extend_from_slice(&(n as u32).to_be_bytes());
        }
    }
    Ok(())
}

/// Serialize a header map into the uncompressed name/value block:
/// a pair count, then `len(name), name, len(value), value` per pair.
/// All integers are big-endian, 2 bytes wide on v2 and 4 on v3.
fn serialize_nv_block(headers: &Headers, version: Version) -> Result<Vec<u8>, SpdyError> {
    let mut block = Vec::with_capacity(64);
    push_nv_length(&mut block, version, headers.len())?;
    for (name, value) in headers {
        push_nv_length(&mut block, version, name.len())?;
        block.extend_from_slice(name.as_bytes());
        push_nv_length(&mut block, version, value.len())?;
        block.extend_from_slice(value.as_bytes());
    }
    Ok(block)
}

fn read_nv_length(chunk: &[u8], cursor: &mut usize, version: Version) -> Result<usize, SpdyError> {
    let size = nv_length_size(version);
    let end = cursor
        .checked_add(size)
        .filter(|&end| end <= chunk.len())
        .ok_or_else(|| SpdyError::Protocol("truncated name/value block".into()))?;
    let n = match version {
        Version::V2 => BigEndian::read_u16(&chunk[*cursor..end]) as usize,
        Version::V3 => BigEndian::read_u32(&chunk[*cursor..end]) as usize,
    };
    *cursor = end;
    Ok(n)
}

fn read_nv_string(chunk: &[u8], cursor: &mut usize, len: usize) -> Result<String, SpdyError> {
    let end = cursor
        .checked_add(len)
        .filter(|&end| end <= chunk.len())
        .ok_or_else(|| SpdyError::Protocol("truncated name/value block".into()))?;
    let s = std::str::from_utf8(&chunk[*cursor..end])
        .map_err(|_| SpdyError::Protocol("name/value entry is not valid UTF-8".into()))?;
    *cursor = end;
    Ok(s.to_owned())
}

/// Parse an uncompressed name/value block back into a header map.
///
/// Pairs with an empty name or value are skipped; real servers pad
/// blocks with trailing empty entries. A repeated name is a protocol
/// error.
fn parse_nv_block(chunk: &[u8], version: Version) -> Result<Headers, SpdyError> {
    let mut cursor = 0usize;
    let pair_count = read_nv_length(chunk, &mut cursor, version)?;
    // the count is attacker-controlled; do not pre-allocate from it
    let mut headers = HashMap::new();
    for _ in 0..pair_count {
        let name_len = read_nv_length(chunk, &mut cursor, version)?;
        let name = read_nv_string(chunk, &mut cursor, name_len)?;
        let value_len = read_nv_length(chunk, &mut cursor, version)?;
        let value = read_nv_string(chunk, &mut cursor, value_len)?;
        if name_len == 0 || value_len == 0 {
            continue;
        }
        if headers.contains_key(&name) {
            return Err(SpdyError::Protocol(format!(
                "duplicate name in name/value block: {name}"
            )));
        }
        headers.insert(name, value);
    }
    Ok(headers)
}

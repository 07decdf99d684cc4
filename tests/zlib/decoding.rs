//! Tests for header-block decoding edge cases.

use flate2::{Compress, Compression, FlushCompress};
use spdy_sans_io::{HeaderDecoder, SpdyError, Version, ZLIB_DICT_V2, ZLIB_DICT_V3};

/// Deflate a raw name/value block the way a peer's first block would
/// be: fresh stream, preset dictionary, sync flush.
fn deflate_block(block: &[u8], dict: &[u8]) -> Vec<u8> {
    let mut deflate = Compress::new(Compression::default(), true);
    deflate.set_dictionary(dict).unwrap();
    let mut out = Vec::with_capacity(block.len() + 64);
    let mut read = 0usize;
    loop {
        let before = deflate.total_in();
        deflate
            .compress_vec(&block[read..], &mut out, FlushCompress::Sync)
            .unwrap();
        read += (deflate.total_in() - before) as usize;
        if read == block.len() && out.len() < out.capacity() {
            return out;
        }
        out.reserve(64);
    }
}

#[test]
fn test_decode_simple_v2_block() {
    let block = b"\x00\x02\x00\x06method\x00\x03GET\x00\x03url\x00\x01/";
    let mut decoder = HeaderDecoder::new(Version::V2);
    let headers = decoder
        .decode(&deflate_block(block, ZLIB_DICT_V2))
        .unwrap();
    assert_eq!(headers.len(), 2);
    assert_eq!(headers.get("method").map(String::as_str), Some("GET"));
    assert_eq!(headers.get("url").map(String::as_str), Some("/"));
}

#[test]
fn test_duplicate_name_is_protocol_error() {
    let block = b"\x00\x02\x00\x01a\x00\x01b\x00\x01a\x00\x01c";
    let mut decoder = HeaderDecoder::new(Version::V2);
    let err = decoder
        .decode(&deflate_block(block, ZLIB_DICT_V2))
        .unwrap_err();
    match err {
        SpdyError::Protocol(msg) => assert!(msg.contains("duplicate"), "{msg}"),
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[test]
fn test_empty_name_and_empty_value_pairs_are_skipped() {
    // ("", "x"), ("a", ""), ("name", "value") -> only the last survives
    let block = b"\x00\x03\x00\x00\x00\x01x\x00\x01a\x00\x00\x00\x04name\x00\x05value";
    let mut decoder = HeaderDecoder::new(Version::V2);
    let headers = decoder
        .decode(&deflate_block(block, ZLIB_DICT_V2))
        .unwrap();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers.get("name").map(String::as_str), Some("value"));
}

#[test]
fn test_v3_block_with_empty_pair() {
    let block =
        b"\x00\x00\x00\x02\x00\x00\x00\x00\x00\x00\x00\x01x\x00\x00\x00\x01a\x00\x00\x00\x01b";
    let mut decoder = HeaderDecoder::new(Version::V3);
    let headers = decoder
        .decode(&deflate_block(block, ZLIB_DICT_V3))
        .unwrap();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers.get("a").map(String::as_str), Some("b"));
}

#[test]
fn test_truncated_block_is_protocol_error() {
    // declares 2 pairs but carries only one
    let block = b"\x00\x02\x00\x01a\x00\x01b";
    let mut decoder = HeaderDecoder::new(Version::V2);
    assert!(decoder.decode(&deflate_block(block, ZLIB_DICT_V2)).is_err());
}

#[test]
fn test_name_length_past_block_end_is_protocol_error() {
    let block = b"\x00\x01\xFF\xFFa\x00\x01b";
    let mut decoder = HeaderDecoder::new(Version::V2);
    assert!(decoder.decode(&deflate_block(block, ZLIB_DICT_V2)).is_err());
}

#[test]
fn test_invalid_utf8_name_is_protocol_error() {
    let block = b"\x00\x01\x00\x02\xC3\x28\x00\x01b";
    let mut decoder = HeaderDecoder::new(Version::V2);
    let err = decoder
        .decode(&deflate_block(block, ZLIB_DICT_V2))
        .unwrap_err();
    match err {
        SpdyError::Protocol(msg) => assert!(msg.contains("UTF-8"), "{msg}"),
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[test]
fn test_garbage_input_is_protocol_error() {
    let mut decoder = HeaderDecoder::new(Version::V2);
    assert!(decoder.decode(b"\xDE\xAD\xBE\xEF\xDE\xAD\xBE\xEF").is_err());
}

//! Tests for header-block encoding and the preset dictionaries.

use flate2::{Decompress, FlushDecompress};
use spdy_sans_io::{
    HeaderDecoder, HeaderEncoder, Headers, Version, ZLIB_DICT_V2, ZLIB_DICT_V3,
};

fn headers(pairs: &[(&str, &str)]) -> Headers {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_dictionary_bytes() {
    // draft 2 §2.6.10: the ASCII dictionary plus its trailing NUL
    assert_eq!(ZLIB_DICT_V2.len(), 907);
    assert!(ZLIB_DICT_V2.starts_with(b"optionsgetheadpostput"));
    assert!(ZLIB_DICT_V2.ends_with(b"statusversionurl\x00"));

    // draft 3 §2.6.10: length-prefixed words plus the trailing NUL
    assert_eq!(ZLIB_DICT_V3.len(), 1424);
    assert!(ZLIB_DICT_V3.starts_with(b"\x00\x00\x00\x07options\x00\x00\x00\x04head"));
    assert!(ZLIB_DICT_V3.ends_with(b"q=0.\x00"));
}

#[test]
fn test_encode_decode_round_trip() {
    for version in [Version::V2, Version::V3] {
        let mut encoder = HeaderEncoder::new(version);
        let mut decoder = HeaderDecoder::new(version);
        let map = headers(&[("method", "GET"), ("url", "/"), ("version", "HTTP/1.1")]);
        let compressed = encoder.encode(&map).unwrap();
        assert_eq!(decoder.decode(&compressed).unwrap(), map);
    }
}

#[test]
fn test_streams_are_stateful_across_blocks() {
    let mut encoder = HeaderEncoder::new(Version::V3);
    let mut decoder = HeaderDecoder::new(Version::V3);

    let first = headers(&[("method", "GET"), ("url", "/a")]);
    let second = headers(&[("method", "GET"), ("url", "/b")]);
    let third = headers(&[("status", "200 OK")]);

    let b1 = encoder.encode(&first).unwrap();
    let b2 = encoder.encode(&second).unwrap();
    let b3 = encoder.encode(&third).unwrap();

    // blocks after the first depend on deflate history, so they must
    // be fed to the same decoder in order
    assert_eq!(decoder.decode(&b1).unwrap(), first);
    assert_eq!(decoder.decode(&b2).unwrap(), second);
    assert_eq!(decoder.decode(&b3).unwrap(), third);
}

#[test]
fn test_repeated_blocks_shrink_with_shared_state() {
    let mut encoder = HeaderEncoder::new(Version::V2);
    let map = headers(&[("host", "a-reasonably-long-host-name.example.com")]);
    let first = encoder.encode(&map).unwrap();
    let second = encoder.encode(&map).unwrap();
    // the second block references the first through the shared window
    assert!(second.len() < first.len());
}

/// Inflate one sync-flushed block with the given preset dictionary.
fn inflate_block(data: &[u8], dict: &[u8]) -> Vec<u8> {
    let mut inflate = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 4 + 64);
    let mut read = 0usize;
    loop {
        let before = inflate.total_in();
        let result = inflate.decompress_vec(&data[read..], &mut out, FlushDecompress::Sync);
        read += (inflate.total_in() - before) as usize;
        match result {
            Ok(_) => {}
            Err(err) if err.needs_dictionary().is_some() => {
                inflate.set_dictionary(dict).unwrap();
                continue;
            }
            Err(err) => panic!("inflate failed: {err}"),
        }
        if read == data.len() && out.len() < out.capacity() {
            return out;
        }
        out.reserve(64);
    }
}

#[test]
fn test_v2_blocks_use_two_byte_length_prefixes() {
    let mut encoder = HeaderEncoder::new(Version::V2);
    let compressed = encoder.encode(&headers(&[("a", "b")])).unwrap();
    let raw = inflate_block(&compressed, ZLIB_DICT_V2);
    assert_eq!(raw, b"\x00\x01\x00\x01a\x00\x01b");
}

#[test]
fn test_v3_blocks_use_four_byte_length_prefixes() {
    let mut encoder = HeaderEncoder::new(Version::V3);
    let compressed = encoder.encode(&headers(&[("a", "b")])).unwrap();
    let raw = inflate_block(&compressed, ZLIB_DICT_V3);
    assert_eq!(
        raw,
        b"\x00\x00\x00\x01\x00\x00\x00\x01a\x00\x00\x00\x01b"
    );
}

#[test]
fn test_encode_empty_map() {
    let mut encoder = HeaderEncoder::new(Version::V3);
    let mut decoder = HeaderDecoder::new(Version::V3);
    let compressed = encoder.encode(&Headers::new()).unwrap();
    assert_eq!(decoder.decode(&compressed).unwrap(), Headers::new());
}

//! Tests for header-bearing frames across paired contexts.
//!
//! Header compression is stateful per connection, so these tests
//! always use a distinct client and server context and move whole
//! byte streams between them, the way a transport would.

use flate2::{Compress, Compression, FlushCompress};
use spdy_sans_io::{flags, Context, Frame, Headers, Side, Version, ZLIB_DICT_V2};

fn request_headers() -> Headers {
    [
        ("method", "GET"),
        ("url", "/"),
        ("version", "HTTP/1.1"),
        ("host", "example.com"),
        ("scheme", "https"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn response_headers() -> Headers {
    [("status", "200 OK"), ("version", "HTTP/1.1")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn exchange(version: Version) {
    let mut client = Context::new(Side::Client, version);
    let mut server = Context::new(Side::Server, version);

    let stream_id = client.next_stream_id();
    client.put_frame(Frame::SynStream {
        version,
        flags: flags::FLAG_FIN,
        stream_id,
        associated_stream_id: 0,
        priority: 0,
        slot: 0,
        headers: request_headers(),
    });
    server.incoming(&client.outgoing().unwrap());

    match server.get_frame().unwrap().unwrap() {
        Frame::SynStream {
            stream_id: got_id,
            headers,
            flags: got_flags,
            ..
        } => {
            assert_eq!(got_id, stream_id);
            assert_eq!(got_flags, flags::FLAG_FIN);
            assert_eq!(headers, request_headers());
        }
        other => panic!("expected SYN_STREAM, got {other:?}"),
    }

    server.put_frame(Frame::SynReply {
        version,
        flags: 0,
        stream_id,
        headers: response_headers(),
    });
    client.incoming(&server.outgoing().unwrap());

    match client.get_frame().unwrap().unwrap() {
        Frame::SynReply { headers, .. } => assert_eq!(headers, response_headers()),
        other => panic!("expected SYN_REPLY, got {other:?}"),
    }
}

#[test]
fn test_syn_stream_syn_reply_exchange_v2() {
    exchange(Version::V2);
}

#[test]
fn test_syn_stream_syn_reply_exchange_v3() {
    exchange(Version::V3);
}

#[test]
fn test_header_compression_is_stateful_across_frames() {
    let mut client = Context::new(Side::Client, Version::V3);
    let mut server = Context::new(Side::Server, Version::V3);

    // three header-bearing frames through the same deflate stream;
    // the inflate side must track every block in order
    for round in 0..3u32 {
        let stream_id = client.next_stream_id();
        let mut headers = request_headers();
        headers.insert("round".to_string(), round.to_string());
        client.put_frame(Frame::SynStream {
            version: Version::V3,
            flags: 0,
            stream_id,
            associated_stream_id: 0,
            priority: 0,
            slot: 0,
            headers: headers.clone(),
        });
        server.incoming(&client.outgoing().unwrap());
        match server.get_frame().unwrap().unwrap() {
            Frame::SynStream {
                headers: got_headers,
                ..
            } => assert_eq!(got_headers, headers),
            other => panic!("expected SYN_STREAM, got {other:?}"),
        }
    }
}

#[test]
fn test_headers_frame_round_trip() {
    let mut client = Context::new(Side::Client, Version::V2);
    let mut server = Context::new(Side::Server, Version::V2);

    let trailers: Headers = [("x-checksum".to_string(), "abc123".to_string())].into();
    client.put_frame(Frame::Headers {
        version: Version::V2,
        flags: 0,
        stream_id: 1,
        headers: trailers.clone(),
    });
    server.incoming(&client.outgoing().unwrap());
    match server.get_frame().unwrap().unwrap() {
        Frame::Headers { headers, .. } => assert_eq!(headers, trailers),
        other => panic!("expected HEADERS, got {other:?}"),
    }
}

#[test]
fn test_syn_stream_delivered_byte_by_byte() {
    let mut client = Context::new(Side::Client, Version::V2);
    let mut server = Context::new(Side::Server, Version::V2);

    client.put_frame(Frame::SynStream {
        version: Version::V2,
        flags: flags::FLAG_FIN,
        stream_id: 1,
        associated_stream_id: 0,
        priority: 0,
        slot: 0,
        headers: request_headers(),
    });
    let bytes = client.outgoing().unwrap();

    for byte in &bytes[..bytes.len() - 1] {
        server.incoming(&[*byte]);
        assert!(server.get_frame().unwrap().is_none());
    }
    server.incoming(&bytes[bytes.len() - 1..]);
    match server.get_frame().unwrap().unwrap() {
        Frame::SynStream { headers, .. } => assert_eq!(headers, request_headers()),
        other => panic!("expected SYN_STREAM, got {other:?}"),
    }
}

/// Deflate a raw name/value block with the v2 preset dictionary, the
/// way a peer's connection-lifetime stream would for its first block.
fn deflate_v2_block(block: &[u8]) -> Vec<u8> {
    let mut deflate = Compress::new(Compression::default(), true);
    deflate.set_dictionary(ZLIB_DICT_V2).unwrap();
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

fn syn_reply_v2_with_block(block: &[u8]) -> Vec<u8> {
    let compressed = deflate_v2_block(block);
    let payload_len = 6 + compressed.len();
    let mut frame = vec![0x80, 0x02, 0x00, 0x02, 0x00];
    frame.extend_from_slice(&(payload_len as u32).to_be_bytes()[1..]);
    frame.extend_from_slice(&[0, 0, 0, 1, 0, 0]); // stream id + reserved
    frame.extend_from_slice(&compressed);
    frame
}

#[test]
fn test_duplicate_header_name_poisons_the_context() {
    // count=2, both pairs named "a"
    let block = b"\x00\x02\x00\x01a\x00\x01b\x00\x01a\x00\x01c";
    let mut server = Context::new(Side::Server, Version::V2);
    server.incoming(&syn_reply_v2_with_block(block));

    assert!(server.get_frame().is_err());
    assert!(server.is_poisoned());
}

#[test]
fn test_empty_name_value_pairs_are_skipped() {
    // count=2: ("", "x") then ("name", "value")
    let block = b"\x00\x02\x00\x00\x00\x01x\x00\x04name\x00\x05value";
    let mut server = Context::new(Side::Server, Version::V2);
    server.incoming(&syn_reply_v2_with_block(block));

    match server.get_frame().unwrap().unwrap() {
        Frame::SynReply { headers, .. } => {
            assert_eq!(headers.len(), 1);
            assert_eq!(headers.get("name").map(String::as_str), Some("value"));
        }
        other => panic!("expected SYN_REPLY, got {other:?}"),
    }
}

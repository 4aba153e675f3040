//! RFC 7541 compliance tests.
//!
//! End-to-end checks over the public codec surface: the RFC appendix
//! examples, encoder/decoder round trips under every Huffman mode, and the
//! dynamic-table size-update protocol between peers.

use bytes::BytesMut;
use manifold_hpack::{
    CompressionHint, Decoded, Decoder, Encoder, HeaderField, Headers, HpackError, HuffmanMode,
};

fn decode_block(decoder: &mut Decoder, block: &[u8]) -> Vec<Decoded> {
    let mut input = block;
    let mut results = Vec::new();
    while !input.is_empty() {
        match decoder.decode(&mut input).expect("decode failed") {
            Decoded::Ongoing => unreachable!("complete block reported ongoing"),
            other => results.push(other),
        }
    }
    decoder.finish_header_block();
    results
}

fn fields(results: &[Decoded]) -> Vec<HeaderField> {
    results
        .iter()
        .filter_map(|r| match r {
            Decoded::HeaderField(f) => Some(f.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_static_index_decodes_to_method_get() {
    let mut decoder = Decoder::new();
    let results = decode_block(&mut decoder, &[0x82]);
    assert_eq!(
        results,
        vec![Decoded::HeaderField(HeaderField::new(":method", "GET"))]
    );
}

#[test]
fn test_indexed_name_literal_lands_at_index_62() {
    let mut block = vec![0x44, 0x0B];
    block.extend_from_slice(b"/path/hello");

    let mut decoder = Decoder::new();
    let results = decode_block(&mut decoder, &block);
    assert_eq!(
        fields(&results),
        vec![HeaderField::new(":path", "/path/hello")]
    );
    assert_eq!(
        decoder.dynamic_table().get(62).unwrap(),
        HeaderField::new(":path", "/path/hello")
    );
}

#[test]
fn test_multibyte_integer_on_the_wire() {
    // 1337 with a 5-bit prefix is 0x3F 0x9A 0x0A; exercised through a
    // dynamic table size update (5-bit prefix) of 1337.
    let mut decoder = Decoder::new();
    let results = decode_block(&mut decoder, &[0x20 | 0x1F, 0x9A, 0x0A]);
    assert_eq!(results, vec![Decoded::DynamicTableResize(1337)]);
}

#[test]
fn test_rfc_appendix_c_3_request_sequence() {
    // Three successive request header blocks without Huffman coding,
    // RFC 7541 Sections C.3.1 through C.3.3, checked against the literal
    // wire bytes from the RFC.
    let mut encoder = Encoder::new();
    encoder.set_huffman_mode(HuffmanMode::Never);
    let mut decoder = Decoder::new();

    let first: Headers = [
        HeaderField::new(":method", "GET"),
        HeaderField::new(":scheme", "http"),
        HeaderField::new(":path", "/"),
        HeaderField::new(":authority", "www.example.com"),
    ]
    .into_iter()
    .collect();

    let mut block = BytesMut::new();
    encoder.encode_header_block(&first, &mut block).unwrap();
    let mut expected = vec![0x82, 0x86, 0x84, 0x41, 0x0F];
    expected.extend_from_slice(b"www.example.com");
    assert_eq!(&block[..], &expected[..]);
    assert_eq!(fields(&decode_block(&mut decoder, &block)).len(), 4);

    let second: Headers = [
        HeaderField::new(":method", "GET"),
        HeaderField::new(":scheme", "http"),
        HeaderField::new(":path", "/"),
        HeaderField::new(":authority", "www.example.com"),
        HeaderField::new("cache-control", "no-cache"),
    ]
    .into_iter()
    .collect();

    let mut block = BytesMut::new();
    encoder.encode_header_block(&second, &mut block).unwrap();
    // :authority now hits the dynamic table at 62.
    let mut expected = vec![0x82, 0x86, 0x84, 0xBE, 0x58, 0x08];
    expected.extend_from_slice(b"no-cache");
    assert_eq!(&block[..], &expected[..]);
    assert_eq!(fields(&decode_block(&mut decoder, &block)).len(), 5);

    let third: Headers = [
        HeaderField::new(":method", "GET"),
        HeaderField::new(":scheme", "https"),
        HeaderField::new(":path", "/index.html"),
        HeaderField::new(":authority", "www.example.com"),
        HeaderField::new("custom-key", "custom-value"),
    ]
    .into_iter()
    .collect();

    let mut block = BytesMut::new();
    encoder.encode_header_block(&third, &mut block).unwrap();
    let mut expected = vec![0x82, 0x87, 0x85, 0xBF, 0x40, 0x0A];
    expected.extend_from_slice(b"custom-key");
    expected.push(0x0C);
    expected.extend_from_slice(b"custom-value");
    assert_eq!(&block[..], &expected[..]);

    let decoded = fields(&decode_block(&mut decoder, &block));
    assert_eq!(decoded.len(), 5);
    assert_eq!(decoded[4], HeaderField::new("custom-key", "custom-value"));

    // Both dynamic tables now hold cache-control and custom-key on top of
    // :authority, in the same order.
    assert_eq!(encoder.dynamic_table().len(), 3);
    assert_eq!(decoder.dynamic_table().len(), 3);
}

#[test]
fn test_round_trip_preserves_bytes_and_hints() {
    let lists: Vec<Vec<HeaderField>> = vec![
        vec![
            HeaderField::new(":method", "POST"),
            HeaderField::new(":path", "/submit?q=a%20b"),
            HeaderField::new("content-type", "application/json"),
        ],
        vec![
            HeaderField::with_compression("cookie", "id=31337", CompressionHint::NoCache),
            HeaderField::with_compression(
                "authorization",
                "Bearer 0xdeadbeef",
                CompressionHint::NoCacheNoIndex,
            ),
            HeaderField::new("x-binary", &b"\x00\x01\xFE\xFF"[..]),
        ],
        vec![HeaderField::new("", "")],
    ];

    for mode in [HuffmanMode::Smallest, HuffmanMode::Never, HuffmanMode::Always] {
        let mut encoder = Encoder::new();
        encoder.set_huffman_mode(mode);
        let mut decoder = Decoder::new();

        for list in &lists {
            let headers: Headers = list.iter().cloned().collect();
            let mut block = BytesMut::new();
            encoder.encode_header_block(&headers, &mut block).unwrap();

            let decoded = fields(&decode_block(&mut decoder, &block));
            assert_eq!(&decoded, list);
        }
    }
}

#[test]
fn test_byte_at_a_time_equals_whole_buffer() {
    let mut encoder = Encoder::new();
    let headers: Headers = [
        HeaderField::new(":status", "404"),
        HeaderField::new("server", "manifold"),
        HeaderField::new("x-trace", "0123456789abcdef0123456789abcdef"),
    ]
    .into_iter()
    .collect();
    let mut block = BytesMut::new();
    encoder.encode_header_block(&headers, &mut block).unwrap();

    let mut whole = Decoder::new();
    let expected = decode_block(&mut whole, &block);

    let mut bytewise = Decoder::new();
    let mut results = Vec::new();
    for &byte in block.iter() {
        let mut input: &[u8] = std::slice::from_ref(&byte);
        match bytewise.decode(&mut input).unwrap() {
            Decoded::Ongoing => {}
            other => results.push(other),
        }
        assert!(input.is_empty());
    }
    assert_eq!(results, expected);
}

#[test]
fn test_oversize_field_clears_peer_table_and_forgets_entries() {
    let mut decoder = Decoder::new();

    // Shrink the table to 64 octets, then insert a field bigger than that.
    let results = decode_block(&mut decoder, &[0x3F, 0x21]);
    assert_eq!(results, vec![Decoded::DynamicTableResize(64)]);

    let mut block = vec![0x40, 0x01, b'x', 80];
    block.extend_from_slice(&[b'y'; 80]);
    let results = decode_block(&mut decoder, &block);
    assert_eq!(fields(&results).len(), 1);

    assert_eq!(decoder.dynamic_table().len(), 0);
    assert_eq!(decoder.dynamic_table().size(), 0);
    assert_eq!(decoder.dynamic_table().find_name_only(b"x"), 0);
}

#[test]
fn test_size_update_after_field_poisons_decoder() {
    let mut decoder = Decoder::new();
    let mut input: &[u8] = &[0x82, 0x20];
    assert_eq!(
        decoder.decode(&mut input).unwrap(),
        Decoded::HeaderField(HeaderField::new(":method", "GET"))
    );
    assert_eq!(
        decoder.decode(&mut input).unwrap_err(),
        HpackError::SizeUpdateAfterHeader
    );

    // The decoder stays broken afterwards.
    let mut input: &[u8] = &[0x82];
    assert!(decoder.decode(&mut input).is_err());
}

#[test]
fn test_peer_observes_pending_size_updates_in_order() {
    // Settings move through 48, 32, then 128 between blocks; the next block
    // must announce the low-water mark and the final value, in that order.
    let mut encoder = Encoder::new();
    let mut decoder = Decoder::new();

    // Warm the table so the shrink actually evicts on both sides.
    let warm: Headers = [HeaderField::new("alpha", "beta")].into_iter().collect();
    let mut block = BytesMut::new();
    encoder.encode_header_block(&warm, &mut block).unwrap();
    decode_block(&mut decoder, &block);
    assert_eq!(decoder.dynamic_table().len(), 1);

    encoder.update_max_table_size(48);
    encoder.update_max_table_size(32);
    encoder.update_max_table_size(128);

    let next: Headers = [HeaderField::new(":method", "GET")].into_iter().collect();
    let mut block = BytesMut::new();
    encoder.encode_header_block(&next, &mut block).unwrap();

    let results = decode_block(&mut decoder, &block);
    assert_eq!(
        results,
        vec![
            Decoded::DynamicTableResize(32),
            Decoded::DynamicTableResize(128),
            Decoded::HeaderField(HeaderField::new(":method", "GET")),
        ]
    );

    // The 32-octet low-water mark evicted the warm entry everywhere.
    assert_eq!(encoder.dynamic_table().len(), 0);
    assert_eq!(decoder.dynamic_table().len(), 0);
    assert_eq!(decoder.dynamic_table().max_size(), 128);
}

#[test]
fn test_smallest_mode_output_never_longer_than_always() {
    let samples: &[&[u8]] = &[
        b"www.example.com",
        b"a",
        b"",
        b"\xF0\x9F\x8E\xB8 guitar",
        b"0123456789-0123456789-0123456789",
    ];

    for &sample in samples {
        let header = HeaderField::new("x-sample", sample.to_vec());
        let headers: Headers = [header].into_iter().collect();

        let mut smallest_out = BytesMut::new();
        let mut encoder = Encoder::new();
        encoder.set_huffman_mode(HuffmanMode::Smallest);
        encoder
            .encode_header_block(&headers.clone(), &mut smallest_out)
            .unwrap();

        let mut always_out = BytesMut::new();
        let mut encoder = Encoder::new();
        encoder.set_huffman_mode(HuffmanMode::Always);
        encoder
            .encode_header_block(&headers, &mut always_out)
            .unwrap();

        assert!(smallest_out.len() <= always_out.len());
    }
}

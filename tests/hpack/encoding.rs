//! Tests for HPACK encoding

use http12_parser::h2::hpack::{HpackDecoder, HpackEncoder};
use http12_parser::HttpHeaders;

fn fields(pairs: &[(&str, &str)]) -> HttpHeaders {
    let mut headers = HttpHeaders::new();
    for (name, value) in pairs {
        headers.add(*name, *value).unwrap();
    }
    headers
}

#[test]
fn test_encode_decode_comprehensive_roundtrip() {
    // Mixed pseudo + regular headers, repeated names kept in order
    let mut encoder = HpackEncoder::new();
    let mut decoder = HpackDecoder::new();

    let headers = fields(&[
        (":status", "200"),
        ("content-type", "application/json"),
        ("x-request-id", "abc-123-def"),
        ("set-cookie", "session=xyz"),
        ("set-cookie", "theme=dark"),
    ]);
    let decoded = decoder.decode(&encoder.encode(&headers)).unwrap();
    assert_eq!(decoded, headers);
}

#[test]
fn test_static_table_entry_is_compact() {
    let mut encoder = HpackEncoder::new();
    let encoded = encoder.encode(&fields(&[(":method", "GET")]));
    assert_eq!(encoded, [0x82]);
}

#[test]
fn test_pseudo_headers_moved_first() {
    let mut encoder = HpackEncoder::new();
    let mut decoder = HpackDecoder::new();
    let headers =
        fields(&[("accept", "*/*"), (":path", "/"), ("User-Agent", "t"), (":method", "GET")]);

    let decoded = decoder.decode(&encoder.encode(&headers)).unwrap();
    let names: Vec<_> = decoded.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, [":path", ":method", "accept", "user-agent"]);
}

#[test]
fn test_encoder_and_decoder_stay_in_sync_over_many_blocks() {
    let mut encoder = HpackEncoder::new();
    let mut decoder = HpackDecoder::new();
    for i in 0..50 {
        let value = format!("value-{}", i % 7);
        let headers = fields(&[(":status", "200"), ("x-rotating", &value), ("x-fixed", "same")]);
        assert_eq!(decoder.decode(&encoder.encode(&headers)).unwrap(), headers);
    }
}

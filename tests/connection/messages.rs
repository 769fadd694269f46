//! Tests for message objects moving through a connection

use http12_parser::{Direction, Http2Message, HttpMessage};

use crate::support::{h1_client, h1_server, recorder};

#[test]
fn test_serialized_request_parses_back() {
    let mut request = HttpMessage::request("POST", "/api/items?id=7").unwrap();
    request.add_header("Host", "example.com").unwrap();
    request.add_header("Content-Length", "11").unwrap();
    request.add_header("X-Tag", "a").unwrap();
    request.add_header("X-Tag", "b").unwrap();
    request.set_body("hello world");
    let wire = request.to_bytes().unwrap();
    assert_eq!(request.size_bytes().unwrap(), wire.len());

    let mut conn = h1_server();
    conn.input(Direction::Incoming, &wire).unwrap();

    let rec = recorder(&conn);
    let parsed = rec.h1_heads()[0];
    assert_eq!(parsed.method(), request.method());
    assert_eq!(parsed.url(), request.url());
    assert_eq!(parsed.headers(), request.headers());
    assert_eq!(rec.h1_body(), request.body());
}

#[test]
fn test_serialized_response_parses_back() {
    let mut response = HttpMessage::response(201, "Created").unwrap();
    response.add_header("Location", "/items/7").unwrap();
    response.add_header("Content-Length", "0").unwrap();

    let mut conn = h1_client();
    conn.input(Direction::Incoming, &response.to_bytes().unwrap()).unwrap();
    let parsed = recorder(&conn).h1_heads()[0].clone();
    assert_eq!(parsed.status_code(), Some(201));
    assert_eq!(parsed.status(), Some("Created"));
    assert_eq!(parsed.header("location"), Some("/items/7"));
}

#[test]
fn test_delivered_message_clone_is_independent() {
    let mut conn = h1_server();
    conn.input(Direction::Incoming, b"GET /orig HTTP/1.1\r\nHost: a\r\n\r\n").unwrap();

    let original = recorder(&conn).h1_heads()[0].clone();
    let mut copy = original.clone();
    copy.set_url("/changed").unwrap();
    copy.remove_header("host");
    copy.add_header("X-New", "1").unwrap();

    assert_eq!(original.url(), Some("/orig"));
    assert_eq!(original.header("host"), Some("a"));
    assert!(original.header("x-new").is_none());
    assert_eq!(copy.url(), Some("/changed"));
}

#[test]
fn test_h1_request_converted_for_h2_and_back() {
    let mut conn = h1_server();
    conn.input(
        Direction::Incoming,
        b"GET /search?q=rust HTTP/1.1\r\nHost: example.com\r\n\
          Connection: keep-alive\r\nAccept: */*\r\n\r\n",
    )
    .unwrap();
    let request = recorder(&conn).h1_heads()[0].clone();

    let h2 = Http2Message::from_http_message(5, &request, "https").unwrap();
    assert_eq!(h2.stream_id, 5);
    assert_eq!(h2.headers.get(":authority"), Some("example.com"));
    assert_eq!(h2.headers.get(":path"), Some("/search?q=rust"));
    assert!(!h2.headers.contains("connection"));

    let back = h2.to_http_message().unwrap();
    assert_eq!(back.method(), Some("GET"));
    assert_eq!(back.url(), Some("/search?q=rust"));
    assert_eq!(back.header("host"), Some("example.com"));
    assert_eq!(back.header("accept"), Some("*/*"));
}

#[test]
fn test_response_without_reason_is_byte_stable() {
    let wire = b"HTTP/1.1 204\r\nX-Trace: 1\r\n\r\n";
    let mut conn = h1_client();
    conn.input(Direction::Incoming, wire).unwrap();
    let parsed = recorder(&conn).h1_heads()[0].clone();
    assert_eq!(parsed.status(), Some(""));
    assert_eq!(parsed.to_bytes().unwrap(), wire);
}

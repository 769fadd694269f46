//! Tests for outbound sends, from callbacks and from the embedder

use http12_parser::h2::frame::{self, error_code, frame_type};
use http12_parser::h2::hpack::HpackDecoder;
use http12_parser::{Context, Direction, Http2Message, HttpMessage, ParserError};

use crate::support::{
    client_preface, frames_of_type, get_request, h1_client, h1_server, h2_client, h2_server,
    h2_server_with, headers, parse_frames, recorder, recorder_mut, Peer, Recorder,
};

fn ok_response(body: &str) -> HttpMessage {
    let mut response = HttpMessage::response(200, "OK").unwrap();
    response.add_header("Content-Length", &body.len().to_string()).unwrap();
    response.set_body(body);
    response
}

#[test]
fn test_reply_from_headers_callback() {
    let mut conn = h1_server();
    recorder_mut(&mut conn).on_h1_headers =
        Some(Box::new(|cx: &mut Context<'_>, request: &HttpMessage| {
            assert_eq!(request.url(), Some("/ping"));
            cx.send_h1_message(&ok_response("pong")).unwrap();
        }));
    conn.input(Direction::Incoming, b"GET /ping HTTP/1.1\r\n\r\n").unwrap();

    assert_eq!(
        recorder(&conn).output,
        b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\npong"
    );
}

#[test]
fn test_send_outside_callbacks() {
    let mut conn = h1_client();
    let mut request = HttpMessage::request("POST", "/upload").unwrap();
    request.add_header("Transfer-Encoding", "chunked").unwrap();
    conn.send_h1_headers(&request).unwrap();
    conn.send_h1_data(b"abc", false).unwrap();
    conn.send_h1_data(b"defgh", false).unwrap();
    conn.send_h1_data(b"", true).unwrap();

    assert_eq!(
        recorder(&conn).output,
        b"POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
          3\r\nabc\r\n5\r\ndefgh\r\n0\r\n\r\n"
    );
}

#[test]
fn test_response_to_head_cannot_carry_body() {
    let mut conn = h1_server();
    conn.input(Direction::Incoming, b"HEAD / HTTP/1.1\r\n\r\n").unwrap();
    conn.send_h1_headers(&ok_response("0123456789")).unwrap();
    assert!(matches!(conn.send_h1_data(b"x", true), Err(ParserError::InvalidState(_))));
    conn.send_h1_data(b"", true).unwrap();
}

#[test]
fn test_h1_send_errors() {
    let mut conn = h1_server();
    let request = HttpMessage::request("GET", "/").unwrap();
    assert!(matches!(conn.send_h1_headers(&request), Err(ParserError::InvalidArgument(_))));
    assert!(matches!(conn.send_h1_data(b"x", false), Err(ParserError::InvalidState(_))));

    let mut response = HttpMessage::response(200, "OK").unwrap();
    response.add_header("Content-Length", "3").unwrap();
    conn.send_h1_headers(&response).unwrap();
    assert!(matches!(conn.send_h1_data(b"four", false), Err(ParserError::InvalidArgument(_))));
    assert!(matches!(conn.send_h1_data(b"ab", true), Err(ParserError::InvalidState(_))));
    conn.send_h1_data(b"abc", true).unwrap();
    assert!(conn.last_error().is_some());
}

#[test]
fn test_rejected_message_sends_nothing() {
    let mut conn = h1_server();
    conn.input(Direction::Incoming, b"GET / HTTP/1.1\r\n\r\n").unwrap();

    let mut oversized = HttpMessage::response(200, "OK").unwrap();
    oversized.add_header("Content-Length", "3").unwrap();
    oversized.set_body("hello");
    assert!(matches!(conn.send_h1_message(&oversized), Err(ParserError::InvalidArgument(_))));
    assert!(recorder(&conn).output.is_empty());

    conn.send_h1_message(&ok_response("hello")).unwrap();
    assert_eq!(
        recorder(&conn).output,
        b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello"
    );
}

#[test]
fn test_h2_reply_from_headers_callback() {
    let mut callbacks = Recorder::default();
    callbacks.on_h2_headers = Some(Box::new(|cx: &mut Context<'_>, request: &Http2Message| {
        let response =
            Http2Message::with_headers(request.stream_id, headers(&[(":status", "200")]));
        cx.send_h2_headers(&response, false).unwrap();
        cx.send_h2_data(request.stream_id, b"hi", true).unwrap();
    }));
    let mut conn = h2_server_with(callbacks);
    let mut peer = Peer::new();
    let mut wire = client_preface();
    wire.extend(get_request(&mut peer, 1, true));
    conn.input(Direction::Incoming, &wire).unwrap();

    let frames = parse_frames(&recorder(&conn).output);
    let kinds: Vec<_> = frames.iter().map(|(h, _)| (h.frame_type, h.stream_id)).collect();
    assert_eq!(
        kinds,
        [
            (frame_type::SETTINGS, 0),
            (frame_type::SETTINGS, 0),
            (frame_type::HEADERS, 1),
            (frame_type::DATA, 1),
        ]
    );
    assert!(frames[0].0.is_ack());
    assert!(!frames[1].0.is_ack());
    let decoded = HpackDecoder::new().decode(&frames[2].1).unwrap();
    assert_eq!(decoded.get(":status"), Some("200"));
    assert!(frames[3].0.is_end_stream());
    assert_eq!(frames[3].1, b"hi");
}

#[test]
fn test_h2_send_after_peer_reset() {
    let mut conn = h2_server();
    let mut peer = Peer::new();
    let mut wire = client_preface();
    wire.extend(get_request(&mut peer, 1, false));
    conn.input(Direction::Incoming, &wire).unwrap();

    let response = Http2Message::with_headers(1, headers(&[(":status", "200")]));
    conn.send_h2_headers(&response, false).unwrap();
    conn.input(Direction::Incoming, &frame::create_rst_stream(1, error_code::CANCEL))
        .unwrap();
    assert!(matches!(conn.send_h2_data(1, b"late", true), Err(ParserError::InvalidState(_))));
}

#[test]
fn test_h2_reset_and_goaway() {
    let mut conn = h2_server();
    let mut peer = Peer::new();
    let mut wire = client_preface();
    wire.extend(get_request(&mut peer, 1, false));
    wire.extend(get_request(&mut peer, 3, false));
    conn.input(Direction::Incoming, &wire).unwrap();
    recorder_mut(&mut conn).take_output();

    conn.reset_h2_stream(1, error_code::CANCEL).unwrap();
    conn.send_h2_goaway(error_code::NO_ERROR).unwrap();

    let out = &recorder(&conn).output;
    let rst = frames_of_type(out, frame_type::RST_STREAM);
    assert_eq!((rst[0].0.stream_id, frame::read_u32(&rst[0].1)), (1, error_code::CANCEL));
    let goaway = frames_of_type(out, frame_type::GOAWAY);
    assert_eq!(frame::read_u32(&goaway[0].1), 3);

    let pushed = Http2Message::with_headers(5, headers(&[(":status", "200")]));
    assert!(matches!(conn.send_h2_headers(&pushed, true), Err(ParserError::InvalidState(_))));
}

#[test]
fn test_h2_client_request_starts_connection() {
    let mut conn = h2_client();
    let request = HttpMessage::request("GET", "/index.html").unwrap();
    let mut request = Http2Message::from_http_message(1, &request, "https").unwrap();
    request.headers.add(":authority", "example.com").unwrap();
    conn.send_h2_headers(&request, true).unwrap();

    let out = recorder(&conn).output.clone();
    assert!(out.starts_with(frame::CONNECTION_PREFACE));
    let frames = parse_frames(&out);
    assert_eq!(frames[0].0.frame_type, frame_type::SETTINGS);
    assert_eq!(frames[1].0.frame_type, frame_type::HEADERS);
    assert!(frames[1].0.is_end_stream() && frames[1].0.is_end_headers());

    // The bytes we produced are valid input for an observing server
    let mut server = h2_server();
    server.input(Direction::Incoming, &out).unwrap();
    let heads = recorder(&server).h2_heads();
    assert_eq!(heads[0].headers.get(":path"), Some("/index.html"));
    assert_eq!(heads[0].headers.get(":authority"), Some("example.com"));
}

#[test]
fn test_h2_send_validation() {
    let mut conn = h2_client();
    let empty = Http2Message::new(1);
    assert!(matches!(conn.send_h2_headers(&empty, true), Err(ParserError::InvalidArgument(_))));
    assert!(matches!(conn.send_h2_data(1, b"x", false), Err(ParserError::InvalidState(_))));
    assert!(matches!(
        conn.reset_h2_stream(0, error_code::CANCEL),
        Err(ParserError::InvalidArgument(_))
    ));
}

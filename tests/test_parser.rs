use ferrite::http::message::{Framing, Method, Version};
use ferrite::http::parser::{EofOutcome, MessageParser, ParseError};

fn parse_request(input: &[u8]) -> ferrite::http::message::Message {
    let mut parser = MessageParser::request();
    let consumed = parser.advance(input).unwrap();
    assert_eq!(consumed, input.len());
    parser.poll_message().expect("complete message")
}

#[test]
fn test_parse_minimal_get_request() {
    let message = parse_request(b"GET /x HTTP/1.1\r\nHost: h\r\n\r\n");

    assert_eq!(message.head.method(), Some(Method::GET));
    assert_eq!(message.head.target(), Some("/x"));
    assert_eq!(message.head.version(), Version::Http11);
    assert_eq!(message.head.headers().len(), 1);
    assert_eq!(message.head.headers().get("Host"), Some("h"));
    assert_eq!(message.head.framing(), Framing::None);
    assert!(message.body.is_empty());
}

#[test]
fn test_parse_post_request_with_body() {
    let message =
        parse_request(b"POST /api HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello");

    assert_eq!(message.head.method(), Some(Method::POST));
    assert_eq!(message.head.framing(), Framing::Fixed(5));
    assert_eq!(&message.body[..], b"hello");
}

#[test]
fn test_parse_request_with_binary_body() {
    let message =
        parse_request(b"POST /upload HTTP/1.1\r\nContent-Length: 4\r\n\r\n\x00\x01\x02\x03");
    assert_eq!(&message.body[..], &[0, 1, 2, 3]);
}

#[test]
fn test_parse_across_arbitrary_split_points() {
    // Byte at a time; completeness must not depend on delivery granularity
    let input = b"POST /api HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\nhello";
    let mut parser = MessageParser::request();
    let mut pending: Vec<u8> = Vec::new();
    for &byte in input.iter() {
        pending.push(byte);
        // Unconsumed bytes are re-offered together with each new one
        let consumed = parser.advance(&pending).unwrap();
        pending.drain(..consumed);
    }
    assert!(pending.is_empty());
    let message = parser.poll_message().expect("complete message");
    assert_eq!(&message.body[..], b"hello");
}

#[test]
fn test_incomplete_request_suspends_without_error() {
    let mut parser = MessageParser::request();
    assert_eq!(parser.advance(b"GET / HTTP/1.1\r\nHost: h\r\n").unwrap(), 25);
    assert!(!parser.is_complete());
    // The final bare CR LF completes it
    parser.advance(b"\r\n").unwrap();
    assert!(parser.is_complete());
}

#[test]
fn test_duplicate_headers_preserved_in_order() {
    let message = parse_request(
        b"GET / HTTP/1.1\r\nAccept: text/html\r\nX-Tag: one\r\nX-Tag: two\r\n\r\n",
    );
    let values: Vec<&str> = message.head.headers().get_all("x-tag").collect();
    assert_eq!(values, vec!["one", "two"]);
    // Lookup is case-insensitive, values keep their case
    assert_eq!(message.head.headers().get("ACCEPT"), Some("text/html"));
}

#[test]
fn test_folded_header_continuation() {
    let message =
        parse_request(b"GET / HTTP/1.1\r\nX-Long: first\r\n \tsecond part\r\nHost: h\r\n\r\n");
    assert_eq!(message.head.headers().get("X-Long"), Some("first second part"));
    assert_eq!(message.head.headers().get("Host"), Some("h"));
}

#[test]
fn test_chunked_body_round_trip() {
    let message = parse_request(
        b"POST /w HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
    );
    assert_eq!(message.head.framing(), Framing::Chunked);
    assert_eq!(&message.body[..], b"Wikipedia");
}

#[test]
fn test_chunk_extension_is_ignored() {
    let message = parse_request(
        b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4;name=val\r\nWiki\r\n0\r\n\r\n",
    );
    assert_eq!(&message.body[..], b"Wiki");
}

#[test]
fn test_chunked_trailers_are_retained() {
    let message = parse_request(
        b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\nExpires: never\r\n\r\n",
    );
    assert_eq!(&message.body[..], b"abc");
    assert_eq!(message.trailers.get("Expires"), Some("never"));
}

#[test]
fn test_chunked_overrides_content_length() {
    let message = parse_request(
        b"POST / HTTP/1.1\r\nContent-Length: 999\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nok\r\n0\r\n\r\n",
    );
    assert_eq!(message.head.framing(), Framing::Chunked);
    assert_eq!(&message.body[..], b"ok");
}

#[test]
fn test_invalid_chunk_size_rejected() {
    let mut parser = MessageParser::request();
    let result = parser.advance(
        b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\ndata\r\n0\r\n\r\n",
    );
    assert!(matches!(result, Err(ParseError::MalformedChunk)));
}

#[test]
fn test_missing_chunk_terminator_rejected() {
    let mut parser = MessageParser::request();
    let result = parser.advance(
        b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWikiXX0\r\n\r\n",
    );
    assert!(matches!(result, Err(ParseError::MalformedChunk)));
}

#[test]
fn test_conflicting_content_length_rejected() {
    let mut parser = MessageParser::request();
    let result =
        parser.advance(b"POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 6\r\n\r\nhello");
    assert!(matches!(result, Err(ParseError::MalformedHeader)));
}

#[test]
fn test_repeated_identical_content_length_accepted() {
    let message =
        parse_request(b"POST / HTTP/1.1\r\nContent-Length: 2\r\nContent-Length: 2\r\n\r\nok");
    assert_eq!(message.head.framing(), Framing::Fixed(2));
}

#[test]
fn test_non_numeric_content_length_rejected() {
    let mut parser = MessageParser::request();
    let result = parser.advance(b"POST / HTTP/1.1\r\nContent-Length: five\r\n\r\n");
    assert!(matches!(result, Err(ParseError::MalformedHeader)));
}

#[test]
fn test_negative_content_length_rejected() {
    let mut parser = MessageParser::request();
    let result = parser.advance(b"POST / HTTP/1.1\r\nContent-Length: -1\r\n\r\n");
    assert!(matches!(result, Err(ParseError::MalformedHeader)));
}

#[test]
fn test_unsupported_transfer_coding_rejected() {
    let mut parser = MessageParser::request();
    let result = parser.advance(b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n");
    assert!(matches!(result, Err(ParseError::MalformedHeader)));
}

#[test]
fn test_malformed_header_line_rejected() {
    let mut parser = MessageParser::request();
    let result = parser.advance(b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n");
    assert!(matches!(result, Err(ParseError::MalformedHeader)));
}

#[test]
fn test_unknown_method_rejected() {
    let mut parser = MessageParser::request();
    let result = parser.advance(b"INVALID / HTTP/1.1\r\n\r\n");
    assert!(matches!(result, Err(ParseError::MalformedStartLine)));
}

#[test]
fn test_bad_version_token_rejected() {
    let mut parser = MessageParser::request();
    let result = parser.advance(b"GET / HTTP/2.5\r\n\r\n");
    assert!(matches!(result, Err(ParseError::MalformedStartLine)));
}

#[test]
fn test_leading_blank_lines_before_request_line() {
    let message = parse_request(b"\r\n\r\nGET / HTTP/1.1\r\nHost: h\r\n\r\n");
    assert_eq!(message.head.target(), Some("/"));
}

#[test]
fn test_failure_is_sticky() {
    let mut parser = MessageParser::request();
    assert!(parser.advance(b"BAD LINE\r\n").is_err());
    // Well-formed input afterwards does not revive the parser
    assert!(matches!(
        parser.advance(b"GET / HTTP/1.1\r\n\r\n"),
        Err(ParseError::MalformedStartLine)
    ));
}

#[test]
fn test_pipelined_requests_parsed_in_sequence() {
    let input = b"GET /a HTTP/1.1\r\nHost: h\r\n\r\nGET /b HTTP/1.1\r\nHost: h\r\n\r\n".to_vec();
    let mut parser = MessageParser::request();

    let consumed = parser.advance(&input).unwrap();
    let first = parser.poll_message().expect("first message");
    assert_eq!(first.head.target(), Some("/a"));

    // Bytes beyond the first message were left untouched until it was taken
    let consumed_after = parser.advance(&input[consumed..]).unwrap();
    assert_eq!(consumed + consumed_after, input.len());
    let second = parser.poll_message().expect("second message");
    assert_eq!(second.head.target(), Some("/b"));
}

#[test]
fn test_eof_between_messages_is_clean() {
    // A partial start line stays in the caller's buffer, so the parser
    // itself reports a clean EOF; the connection layer turns leftover
    // bytes into a malformed-start-line failure.
    let mut parser = MessageParser::request();
    assert_eq!(parser.advance(b"GET / HT").unwrap(), 0);
    assert!(matches!(parser.on_eof(), Ok(EofOutcome::Clean)));
}

#[test]
fn test_eof_mid_headers_is_malformed() {
    let mut parser = MessageParser::request();
    parser.advance(b"GET / HTTP/1.1\r\nHost: h\r\n").unwrap();
    assert!(matches!(parser.on_eof(), Err(ParseError::MalformedHeader)));
}

#[test]
fn test_eof_mid_fixed_body_is_truncation() {
    let mut parser = MessageParser::request();
    parser
        .advance(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello")
        .unwrap();
    assert!(matches!(parser.on_eof(), Err(ParseError::UnexpectedEof)));
}

#[test]
fn test_response_status_line_and_fixed_body() {
    let mut parser = MessageParser::response();
    let input = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi";
    assert_eq!(parser.advance(input).unwrap(), input.len());
    let message = parser.poll_message().unwrap();
    match message.head.start_line() {
        ferrite::http::message::StartLine::Status { code, reason, .. } => {
            assert_eq!(*code, 200);
            assert_eq!(reason, "OK");
        }
        _ => panic!("expected a status line"),
    }
    assert_eq!(&message.body[..], b"hi");
}

#[test]
fn test_response_without_framing_reads_until_close() {
    let mut parser = MessageParser::response();
    parser.advance(b"HTTP/1.1 200 OK\r\n\r\npartial bo").unwrap();
    assert!(!parser.is_complete());
    parser.advance(b"dy").unwrap();

    assert!(matches!(parser.on_eof(), Ok(EofOutcome::MessageComplete)));
    let message = parser.poll_message().unwrap();
    assert_eq!(message.head.framing(), Framing::UntilClose);
    assert_eq!(&message.body[..], b"partial body");
}

use crate::http::response::Response;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Serializes a response into wire bytes.
///
/// Status line, headers in insertion order, bare CR LF, then the body. A
/// response carrying `Transfer-Encoding: chunked` has its body wrapped in
/// chunk envelopes; otherwise the body is written verbatim (the builder
/// already supplied Content-Length). When the connection will not persist
/// and the handler did not say so itself, `Connection: close` is emitted.
pub fn encode_response(resp: &Response, keep_alive: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + resp.body.len());

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (name, value) in resp.headers.iter() {
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    if !keep_alive && !resp.headers.contains("Connection") {
        buf.extend_from_slice(b"Connection: close\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    // Body
    if resp.headers.has_token("Transfer-Encoding", "chunked") {
        encode_chunked(&resp.body, &mut buf);
    } else {
        buf.extend_from_slice(&resp.body);
    }

    buf
}

/// Wraps `body` in chunk envelopes: `SIZE-IN-HEX CR LF`, the bytes, CR LF,
/// then the terminal zero chunk.
fn encode_chunked(body: &[u8], buf: &mut Vec<u8>) {
    if !body.is_empty() {
        buf.extend_from_slice(format!("{:x}\r\n", body.len()).as_bytes());
        buf.extend_from_slice(body);
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"0\r\n\r\n");
}

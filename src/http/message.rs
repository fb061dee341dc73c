use bytes::Bytes;

use crate::http::headers::Headers;

/// HTTP request methods.
///
/// Represents the HTTP method/verb of a request line. Unknown tokens are
/// rejected by the parser; routing-level semantics such as 405 responses
/// belong to the layer above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// TRACE - Message loop-back test
    TRACE,
    /// CONNECT - Establish a tunnel
    CONNECT,
}

impl Method {
    /// Parses an HTTP method from its wire token (case-sensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "PATCH" => Some(Method::PATCH),
            "TRACE" => Some(Method::TRACE),
            "CONNECT" => Some(Method::CONNECT),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::TRACE => "TRACE",
            Method::CONNECT => "CONNECT",
        }
    }
}

/// HTTP protocol version of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "HTTP/1.0" => Some(Version::Http10),
            "HTTP/1.1" => Some(Version::Http11),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

/// First line of a message: a request line or a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request {
        method: Method,
        target: String,
        version: Version,
    },
    Status {
        version: Version,
        code: u16,
        reason: String,
    },
}

/// The rule by which a message body's end is determined.
///
/// Derived exclusively from header content. Chunked overrides
/// content-length; a response with neither is delimited by connection
/// close; a request with neither has no body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// No body follows the head.
    None,
    /// Exactly this many body bytes follow.
    Fixed(u64),
    /// Body is a sequence of size-prefixed chunks.
    Chunked,
    /// Body runs until the transport signals end-of-stream (responses only).
    UntilClose,
}

/// A complete, immutable HTTP message head.
///
/// Built incrementally by the parser across possibly many partial reads;
/// once complete, neither the start line nor the header sequence can
/// change. A new head is built for every message on a kept-alive
/// connection.
#[derive(Debug, Clone)]
pub struct MessageHead {
    start: StartLine,
    headers: Headers,
    framing: Framing,
}

impl MessageHead {
    pub(crate) fn new(start: StartLine, headers: Headers, framing: Framing) -> Self {
        Self {
            start,
            headers,
            framing,
        }
    }

    pub fn start_line(&self) -> &StartLine {
        &self.start
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Request method, when this head is a request.
    pub fn method(&self) -> Option<Method> {
        match &self.start {
            StartLine::Request { method, .. } => Some(*method),
            StartLine::Status { .. } => None,
        }
    }

    /// Request target, when this head is a request.
    pub fn target(&self) -> Option<&str> {
        match &self.start {
            StartLine::Request { target, .. } => Some(target.as_str()),
            StartLine::Status { .. } => None,
        }
    }

    pub fn version(&self) -> Version {
        match &self.start {
            StartLine::Request { version, .. } => *version,
            StartLine::Status { version, .. } => *version,
        }
    }

    /// Determines whether the connection should remain open after this
    /// message's exchange completes.
    ///
    /// `Connection: close` forces closure. HTTP/1.0 closes unless
    /// `Connection: keep-alive` is present. HTTP/1.1 defaults to keep-alive.
    pub fn keep_alive(&self) -> bool {
        if self.headers.has_token("Connection", "close") {
            return false;
        }
        match self.version() {
            Version::Http11 => true,
            Version::Http10 => self.headers.has_token("Connection", "keep-alive"),
        }
    }
}

/// A completed message: head, decoded body, and any chunked trailers.
#[derive(Debug, Clone)]
pub struct Message {
    pub head: MessageHead,
    /// Body bytes, already de-framed (chunk envelopes removed).
    pub body: Bytes,
    /// Trailer headers from a chunked body; empty otherwise.
    pub trailers: Headers,
}

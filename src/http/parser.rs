use bytes::BytesMut;

use crate::http::headers::Headers;
use crate::http::message::{Framing, Message, MessageHead, Method, StartLine, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    MalformedStartLine,
    MalformedHeader,
    MalformedChunk,
    /// The transport ended mid-body; a truncation, not a syntax error.
    UnexpectedEof,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MalformedStartLine => write!(f, "malformed start line"),
            ParseError::MalformedHeader => write!(f, "malformed header"),
            ParseError::MalformedChunk => write!(f, "malformed chunk"),
            ParseError::UnexpectedEof => write!(f, "unexpected end of stream"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Whether the parser expects a request line or a status line, which also
/// decides the framing default when neither chunked nor content-length is
/// present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
}

/// What an end-of-stream signal meant to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EofOutcome {
    /// EOF fell between messages; nothing was lost.
    Clean,
    /// EOF completed a close-delimited body; a message is now available.
    MessageComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    StartLine,
    Headers,
    FixedBody { remaining: u64 },
    ChunkSize,
    ChunkData { remaining: u64 },
    ChunkDataEnd,
    Trailers,
    UntilClose,
    Done,
    Failed(ParseError),
}

/// Incremental HTTP/1.x message parser.
///
/// Feed bytes with [`advance`](Self::advance); partial input suspends
/// parsing and is never an error by itself. Completed messages are taken
/// with [`poll_message`](Self::poll_message), which resets the parser for
/// the next message on the same connection.
pub struct MessageParser {
    kind: MessageKind,
    phase: Phase,
    start: Option<StartLine>,
    headers: Headers,
    pending: Option<(String, String)>,
    head: Option<MessageHead>,
    body: BytesMut,
    trailers: Headers,
    pending_trailer: Option<(String, String)>,
    message: Option<Message>,
}

impl MessageParser {
    pub fn request() -> Self {
        Self::new(MessageKind::Request)
    }

    pub fn response() -> Self {
        Self::new(MessageKind::Response)
    }

    fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            phase: Phase::StartLine,
            start: None,
            headers: Headers::new(),
            pending: None,
            head: None,
            body: BytesMut::new(),
            trailers: Headers::new(),
            pending_trailer: None,
            message: None,
        }
    }

    /// A completed message is waiting to be taken.
    pub fn is_complete(&self) -> bool {
        self.message.is_some()
    }

    /// The head is complete and body bytes are being consumed.
    pub fn expects_body(&self) -> bool {
        matches!(
            self.phase,
            Phase::FixedBody { .. }
                | Phase::ChunkSize
                | Phase::ChunkData { .. }
                | Phase::ChunkDataEnd
                | Phase::Trailers
                | Phase::UntilClose
        )
    }

    /// Consumes as much of `input` as the current phase permits.
    ///
    /// Returns the number of bytes consumed. A partial line or partial body
    /// is left unconsumed for the caller to re-offer once more bytes
    /// arrive. Once a message completes, no bytes beyond it are consumed
    /// until it is taken, so pipelined messages stay intact in the caller's
    /// buffer.
    pub fn advance(&mut self, input: &[u8]) -> Result<usize, ParseError> {
        if let Phase::Failed(e) = self.phase {
            return Err(e);
        }
        let mut consumed = 0;
        while self.message.is_none() {
            match self.step(&input[consumed..]) {
                Ok(Some(n)) => consumed += n,
                Ok(None) => break,
                Err(e) => {
                    self.phase = Phase::Failed(e);
                    return Err(e);
                }
            }
        }
        Ok(consumed)
    }

    /// Signals end-of-stream from the transport.
    pub fn on_eof(&mut self) -> Result<EofOutcome, ParseError> {
        match self.phase {
            Phase::StartLine | Phase::Done => Ok(EofOutcome::Clean),
            Phase::Headers => {
                self.phase = Phase::Failed(ParseError::MalformedHeader);
                Err(ParseError::MalformedHeader)
            }
            Phase::FixedBody { .. }
            | Phase::ChunkSize
            | Phase::ChunkData { .. }
            | Phase::ChunkDataEnd
            | Phase::Trailers => {
                self.phase = Phase::Failed(ParseError::UnexpectedEof);
                Err(ParseError::UnexpectedEof)
            }
            Phase::UntilClose => {
                self.finish_message();
                Ok(EofOutcome::MessageComplete)
            }
            Phase::Failed(e) => Err(e),
        }
    }

    /// Takes the completed message, resetting the parser for the next one.
    pub fn poll_message(&mut self) -> Option<Message> {
        let message = self.message.take();
        if message.is_some() {
            self.phase = Phase::StartLine;
        }
        message
    }

    fn step(&mut self, rest: &[u8]) -> Result<Option<usize>, ParseError> {
        match self.phase {
            Phase::StartLine => self.step_start_line(rest),
            Phase::Headers => self.step_headers(rest),
            Phase::FixedBody { remaining } => self.step_fixed(rest, remaining),
            Phase::ChunkSize => self.step_chunk_size(rest),
            Phase::ChunkData { remaining } => self.step_chunk_data(rest, remaining),
            Phase::ChunkDataEnd => self.step_chunk_data_end(rest),
            Phase::Trailers => self.step_trailers(rest),
            Phase::UntilClose => self.step_until_close(rest),
            Phase::Done => Ok(None),
            Phase::Failed(e) => Err(e),
        }
    }

    fn step_start_line(&mut self, rest: &[u8]) -> Result<Option<usize>, ParseError> {
        // Tolerate blank lines ahead of the start line
        if rest.starts_with(b"\r\n") {
            return Ok(Some(2));
        }
        let Some(end) = find_crlf(rest) else {
            return Ok(None);
        };
        let line = std::str::from_utf8(&rest[..end]).map_err(|_| ParseError::MalformedStartLine)?;
        self.start = Some(self.parse_start_line(line)?);
        self.phase = Phase::Headers;
        Ok(Some(end + 2))
    }

    fn parse_start_line(&self, line: &str) -> Result<StartLine, ParseError> {
        match self.kind {
            MessageKind::Request => {
                let mut parts = line.split(' ');
                let method = parts.next().ok_or(ParseError::MalformedStartLine)?;
                let target = parts.next().ok_or(ParseError::MalformedStartLine)?;
                let version = parts.next().ok_or(ParseError::MalformedStartLine)?;
                if parts.next().is_some() {
                    return Err(ParseError::MalformedStartLine);
                }
                if target.is_empty() || target.chars().any(|c| c.is_control()) {
                    return Err(ParseError::MalformedStartLine);
                }
                Ok(StartLine::Request {
                    method: Method::from_str(method).ok_or(ParseError::MalformedStartLine)?,
                    target: target.to_string(),
                    version: Version::from_token(version).ok_or(ParseError::MalformedStartLine)?,
                })
            }
            MessageKind::Response => {
                let mut parts = line.splitn(3, ' ');
                let version = parts.next().ok_or(ParseError::MalformedStartLine)?;
                let code = parts.next().ok_or(ParseError::MalformedStartLine)?;
                let reason = parts.next().unwrap_or("");
                if code.len() != 3 {
                    return Err(ParseError::MalformedStartLine);
                }
                Ok(StartLine::Status {
                    version: Version::from_token(version).ok_or(ParseError::MalformedStartLine)?,
                    code: code.parse().map_err(|_| ParseError::MalformedStartLine)?,
                    reason: reason.to_string(),
                })
            }
        }
    }

    fn step_headers(&mut self, rest: &[u8]) -> Result<Option<usize>, ParseError> {
        let Some(end) = find_crlf(rest) else {
            return Ok(None);
        };
        let line = std::str::from_utf8(&rest[..end]).map_err(|_| ParseError::MalformedHeader)?;
        if line.is_empty() {
            if let Some((name, value)) = self.pending.take() {
                self.headers.push(name, value);
            }
            self.begin_body()?;
            return Ok(Some(2));
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            // Folded continuation of the previous header line
            let Some(pending) = self.pending.as_mut() else {
                return Err(ParseError::MalformedHeader);
            };
            let continuation = line.trim();
            if !continuation.is_empty() {
                pending.1.push(' ');
                pending.1.push_str(continuation);
            }
            return Ok(Some(end + 2));
        }
        if let Some((name, value)) = self.pending.take() {
            self.headers.push(name, value);
        }
        self.pending = Some(parse_header_line(line)?);
        Ok(Some(end + 2))
    }

    fn begin_body(&mut self) -> Result<(), ParseError> {
        let framing = compute_framing(self.kind, &self.headers)?;
        let start = self.start.take().expect("start line parsed before headers");
        let headers = std::mem::take(&mut self.headers);
        self.head = Some(MessageHead::new(start, headers, framing));
        match framing {
            Framing::None | Framing::Fixed(0) => self.finish_message(),
            Framing::Fixed(n) => self.phase = Phase::FixedBody { remaining: n },
            Framing::Chunked => self.phase = Phase::ChunkSize,
            Framing::UntilClose => self.phase = Phase::UntilClose,
        }
        Ok(())
    }

    fn step_fixed(&mut self, rest: &[u8], remaining: u64) -> Result<Option<usize>, ParseError> {
        if rest.is_empty() {
            return Ok(None);
        }
        let n = remaining.min(rest.len() as u64) as usize;
        self.body.extend_from_slice(&rest[..n]);
        let left = remaining - n as u64;
        if left == 0 {
            self.finish_message();
        } else {
            self.phase = Phase::FixedBody { remaining: left };
        }
        Ok(Some(n))
    }

    fn step_chunk_size(&mut self, rest: &[u8]) -> Result<Option<usize>, ParseError> {
        let Some(end) = find_crlf(rest) else {
            return Ok(None);
        };
        let line = std::str::from_utf8(&rest[..end]).map_err(|_| ParseError::MalformedChunk)?;
        // Chunk extensions after ';' are tolerated and ignored
        let size_token = line.split(';').next().unwrap_or("").trim();
        if size_token.is_empty() || !size_token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseError::MalformedChunk);
        }
        let size = u64::from_str_radix(size_token, 16).map_err(|_| ParseError::MalformedChunk)?;
        self.phase = if size == 0 {
            Phase::Trailers
        } else {
            Phase::ChunkData { remaining: size }
        };
        Ok(Some(end + 2))
    }

    fn step_chunk_data(&mut self, rest: &[u8], remaining: u64) -> Result<Option<usize>, ParseError> {
        if rest.is_empty() {
            return Ok(None);
        }
        let n = remaining.min(rest.len() as u64) as usize;
        self.body.extend_from_slice(&rest[..n]);
        let left = remaining - n as u64;
        if left == 0 {
            self.phase = Phase::ChunkDataEnd;
        } else {
            self.phase = Phase::ChunkData { remaining: left };
        }
        Ok(Some(n))
    }

    fn step_chunk_data_end(&mut self, rest: &[u8]) -> Result<Option<usize>, ParseError> {
        if rest.len() < 2 {
            return Ok(None);
        }
        if &rest[..2] != b"\r\n" {
            return Err(ParseError::MalformedChunk);
        }
        self.phase = Phase::ChunkSize;
        Ok(Some(2))
    }

    fn step_trailers(&mut self, rest: &[u8]) -> Result<Option<usize>, ParseError> {
        let Some(end) = find_crlf(rest) else {
            return Ok(None);
        };
        let line = std::str::from_utf8(&rest[..end]).map_err(|_| ParseError::MalformedHeader)?;
        if line.is_empty() {
            if let Some((name, value)) = self.pending_trailer.take() {
                self.trailers.push(name, value);
            }
            self.finish_message();
            return Ok(Some(2));
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            let Some(pending) = self.pending_trailer.as_mut() else {
                return Err(ParseError::MalformedHeader);
            };
            let continuation = line.trim();
            if !continuation.is_empty() {
                pending.1.push(' ');
                pending.1.push_str(continuation);
            }
            return Ok(Some(end + 2));
        }
        if let Some((name, value)) = self.pending_trailer.take() {
            self.trailers.push(name, value);
        }
        self.pending_trailer = Some(parse_header_line(line)?);
        Ok(Some(end + 2))
    }

    fn step_until_close(&mut self, rest: &[u8]) -> Result<Option<usize>, ParseError> {
        if rest.is_empty() {
            return Ok(None);
        }
        self.body.extend_from_slice(rest);
        Ok(Some(rest.len()))
    }

    fn finish_message(&mut self) {
        let head = self.head.take().expect("head completed before body");
        let body = std::mem::take(&mut self.body).freeze();
        let trailers = std::mem::take(&mut self.trailers);
        self.message = Some(Message {
            head,
            body,
            trailers,
        });
        self.phase = Phase::Done;
    }
}

fn parse_header_line(line: &str) -> Result<(String, String), ParseError> {
    let (name, value) = line.split_once(':').ok_or(ParseError::MalformedHeader)?;
    if name.is_empty() || name.contains(' ') || name.contains('\t') || line.contains('\n') {
        return Err(ParseError::MalformedHeader);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Framing precedence: chunked > content-length > kind default.
fn compute_framing(kind: MessageKind, headers: &Headers) -> Result<Framing, ParseError> {
    let mut te_present = false;
    for value in headers.get_all("Transfer-Encoding") {
        te_present = true;
        // chunked is the only coding this core can frame
        if !value
            .split(',')
            .any(|t| t.trim().eq_ignore_ascii_case("chunked"))
        {
            return Err(ParseError::MalformedHeader);
        }
    }
    if te_present {
        return Ok(Framing::Chunked);
    }
    let mut length: Option<u64> = None;
    for value in headers.get_all("Content-Length") {
        let n: u64 = value
            .trim()
            .parse()
            .map_err(|_| ParseError::MalformedHeader)?;
        match length {
            None => length = Some(n),
            Some(previous) if previous != n => return Err(ParseError::MalformedHeader),
            Some(_) => {}
        }
    }
    Ok(match (length, kind) {
        (Some(n), _) => Framing::Fixed(n),
        (None, MessageKind::Request) => Framing::None,
        (None, MessageKind::Response) => Framing::UntilClose,
    })
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::buffer::ByteBuffer;
use crate::http::message::Message;
use crate::http::parser::{EofOutcome, MessageParser, ParseError};
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::http::writer::encode_response;
use crate::server::{Call, Handler};

/// Connection lifecycle.
pub enum ConnState {
    ReadingHead,
    ReadingBody,
    Dispatching(Message),
    Writing(Response, bool),
    Closing,
    Closed,
}

/// Why a connection stopped reading.
#[derive(Debug)]
enum Failure {
    Malformed(ParseError),
    /// Message head exceeded the inbound buffer even after compaction.
    Overflow,
    /// No readiness activity before the idle deadline.
    IdleTimeout,
    Transport(std::io::Error),
}

/// One transport endpoint and its protocol machinery.
///
/// Owns the inbound and outbound buffers and the parser; all of them are
/// touched only from this connection's own task. Reads and writes are
/// readiness-driven and transfer only currently-available bytes.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    secure: bool,
    inbound: ByteBuffer,
    outbound: ByteBuffer,
    parser: MessageParser,
    state: ConnState,
    idle_timeout: Duration,
    response_started: bool,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        secure: bool,
        buffer_capacity: usize,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            stream,
            peer,
            secure,
            inbound: ByteBuffer::with_capacity(buffer_capacity),
            outbound: ByteBuffer::with_capacity(buffer_capacity),
            parser: MessageParser::request(),
            state: ConnState::ReadingHead,
            idle_timeout,
            response_started: false,
        }
    }

    /// Drives the connection until it closes.
    ///
    /// Parse and framing failures are handled here with a best-effort error
    /// response and never reach the handler; only unexpected write-side
    /// errors propagate to the caller.
    pub async fn run<H: Handler>(mut self, handler: Arc<H>) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnState::Closing) {
                ConnState::ReadingHead | ConnState::ReadingBody => {
                    match self.read_message().await {
                        Ok(Some(message)) => self.state = ConnState::Dispatching(message),
                        Ok(None) => self.state = ConnState::Closing,
                        Err(failure) => {
                            self.log_failure(&failure);
                            self.reject(&failure).await;
                            self.state = ConnState::Closing;
                        }
                    }
                }

                ConnState::Dispatching(message) => {
                    let request_persistent = message.head.keep_alive();
                    tracing::debug!(
                        peer = %self.peer,
                        method = message.head.method().map(|m| m.as_str()).unwrap_or("-"),
                        path = message.head.target().unwrap_or("-"),
                        "request complete"
                    );
                    let call = Call {
                        message,
                        peer: self.peer,
                        secure: self.secure,
                    };
                    let response = handler.handle(call).await;
                    let keep_alive = request_persistent && !response.wants_close();
                    self.state = ConnState::Writing(response, keep_alive);
                }

                ConnState::Writing(response, keep_alive) => {
                    self.write_response(&response, keep_alive).await?;
                    self.response_started = false;
                    self.state = if keep_alive {
                        ConnState::ReadingHead // next pipelined request
                    } else {
                        ConnState::Closing
                    };
                }

                ConnState::Closing => {
                    let _ = self.stream.shutdown().await;
                    self.state = ConnState::Closed;
                }

                ConnState::Closed => break,
            }
        }

        tracing::trace!(peer = %self.peer, "connection closed");
        Ok(())
    }

    /// Reads until a complete message is available or the connection ends.
    ///
    /// Each pass parses whatever is already buffered first, so pipelined
    /// requests are served without waiting for new bytes. Returns
    /// `Ok(None)` on a clean end-of-stream between messages.
    async fn read_message(&mut self) -> Result<Option<Message>, Failure> {
        loop {
            self.feed_parser().map_err(Failure::Malformed)?;
            if let Some(message) = self.parser.poll_message() {
                return Ok(Some(message));
            }
            if self.parser.expects_body() {
                self.state = ConnState::ReadingBody;
            }

            // Reclaim consumed space; a head that still cannot fit is fatal
            self.inbound.compact();
            if self.inbound.free() == 0 {
                return Err(Failure::Overflow);
            }

            timeout(self.idle_timeout, self.stream.readable())
                .await
                .map_err(|_| Failure::IdleTimeout)?
                .map_err(Failure::Transport)?;

            let stream = &self.stream;
            match self.inbound.fill_with(|spare| stream.try_read(spare)) {
                Ok(0) => return self.handle_eof(),
                Ok(n) => {
                    tracing::trace!(peer = %self.peer, bytes = n, "filled inbound buffer");
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(Failure::Transport(e)),
            }
        }
    }

    /// Offers buffered bytes to the parser, consuming what it accepts.
    fn feed_parser(&mut self) -> Result<(), ParseError> {
        let parser = &mut self.parser;
        self.inbound.flip();
        let result = self.inbound.drain_to(|bytes| parser.advance(bytes));
        self.inbound.flip();
        result.map(|_| ())
    }

    fn handle_eof(&mut self) -> Result<Option<Message>, Failure> {
        match self.parser.on_eof() {
            Ok(EofOutcome::Clean) => {
                if self.inbound.remaining() > 0 {
                    // Leftover bytes that never formed a start line
                    Err(Failure::Malformed(ParseError::MalformedStartLine))
                } else {
                    Ok(None)
                }
            }
            Ok(EofOutcome::MessageComplete) => Ok(self.parser.poll_message()),
            Err(e) => Err(Failure::Malformed(e)),
        }
    }

    /// Cycles the serialized response through the outbound buffer until the
    /// transport has taken every byte.
    async fn write_response(&mut self, response: &Response, keep_alive: bool) -> anyhow::Result<()> {
        let encoded = encode_response(response, keep_alive);
        let mut offset = 0;
        while offset < encoded.len() || !self.outbound.is_empty() {
            if offset < encoded.len() {
                offset += self
                    .outbound
                    .fill(&encoded[offset..])
                    .context("stage response bytes")?;
            }
            self.outbound.flip();
            while !self.outbound.is_empty() {
                timeout(self.idle_timeout, self.stream.writable())
                    .await
                    .map_err(|_| anyhow::anyhow!("write stalled past idle deadline"))?
                    .context("wait for write readiness")?;
                let stream = &self.stream;
                let written = self
                    .outbound
                    .drain_to(|bytes| match stream.try_write(bytes) {
                        Ok(0) => Err(std::io::Error::new(
                            std::io::ErrorKind::WriteZero,
                            "connection closed while writing",
                        )),
                        Ok(n) => Ok(n),
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
                        Err(e) => Err(e),
                    })
                    .context("write response bytes")?;
                if written > 0 {
                    self.response_started = true;
                }
            }
            self.outbound.flip();
            self.outbound.compact();
        }
        Ok(())
    }

    /// Best-effort error status before closing; skipped when a response has
    /// already started or the failure came from the transport itself.
    async fn reject(&mut self, failure: &Failure) {
        if self.response_started {
            return;
        }
        let response = match failure {
            Failure::Malformed(ParseError::UnexpectedEof) => return,
            Failure::Malformed(_) => Response::bad_request(),
            Failure::Overflow => ResponseBuilder::new(StatusCode::HeaderFieldsTooLarge).build(),
            Failure::IdleTimeout | Failure::Transport(_) => return,
        };
        let bytes = encode_response(&response, false);
        let _ = timeout(self.idle_timeout, self.stream.write_all(&bytes)).await;
        self.linger_drain().await;
    }

    /// Takes whatever the peer already sent before closing, so the error
    /// response is not lost to a reset.
    async fn linger_drain(&mut self) {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(100);
        let mut scratch = [0u8; 4096];
        loop {
            match tokio::time::timeout_at(deadline, self.stream.readable()).await {
                Ok(Ok(())) => match self.stream.try_read(&mut scratch) {
                    Ok(0) => break,
                    Ok(_) => continue,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                    Err(_) => break,
                },
                _ => break,
            }
        }
    }

    fn log_failure(&self, failure: &Failure) {
        match failure {
            Failure::Malformed(ParseError::UnexpectedEof) => {
                tracing::debug!(peer = %self.peer, "peer closed mid-message")
            }
            Failure::Malformed(e) => {
                tracing::warn!(peer = %self.peer, error = %e, "malformed request")
            }
            Failure::Overflow => {
                tracing::warn!(peer = %self.peer, "message head exceeded buffer capacity")
            }
            Failure::IdleTimeout => tracing::debug!(peer = %self.peer, "idle deadline expired"),
            Failure::Transport(e) => {
                tracing::debug!(peer = %self.peer, error = %e, "transport error")
            }
        }
    }
}

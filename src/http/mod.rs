//! HTTP/1.x protocol implementation.
//!
//! Byte-level framing of request and response messages, independent of any
//! transport: the parser consumes whatever bytes the connection has
//! buffered and suspends on partial input.
//!
//! # Architecture
//!
//! - **`headers`**: ordered, duplicate-preserving header sequence
//! - **`message`**: message head, framing mode, method/version/status types
//! - **`parser`**: incremental parser driven by partial reads
//! - **`response`**: response representation with builder pattern
//! - **`writer`**: serializes responses to wire bytes
//!
//! # Parser State Machine
//!
//! ```text
//!        ┌──────────────┐
//!        │  START_LINE  │ ← Await a complete CR LF terminated line
//!        └──────┬───────┘
//!               │ Request/status line parsed
//!               ▼
//!        ┌──────────────┐
//!        │   HEADERS    │ ← name: value lines, folds, bare CR LF ends
//!        └──────┬───────┘
//!               │ Framing computed from the frozen header sequence
//!               ▼
//!        ┌──────────────────────────────┐
//!        │    BODY                      │
//!        │  fixed-length │ chunked │    │
//!        │  until-close  │ none         │
//!        └──────┬───────────────────────┘
//!               │ Body delimited per framing mode
//!               ▼
//!        ┌──────────────┐
//!        │     DONE     │ → message taken, parser resets for the next
//!        └──────────────┘
//! ```
//!
//! Any malformed line moves the parser to a sticky failed state; partial
//! input is never an error by itself.

pub mod headers;
pub mod message;
pub mod parser;
pub mod response;
pub mod writer;

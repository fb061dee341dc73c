//! Ferrite - Non-blocking HTTP/1.x Wire Core
//!
//! Byte-level framing of HTTP messages over a stream, a fixed-capacity
//! fill/drain buffer, and an event-driven connection controller with
//! admission control.

pub mod buffer;
pub mod config;
pub mod http;
pub mod server;

//! Connection lifecycle and the accept/dispatch controller.
//!
//! - **`connection`**: one transport endpoint driven through its state
//!   machine over readiness-based non-blocking I/O
//! - **`controller`**: the accept loop with admission control, live
//!   connection accounting, and graceful shutdown
//!
//! The layer above plugs in through [`Handler`]: it receives a [`Call`]
//! with the parsed message and answers with a response. It never touches
//! sockets or buffers.

pub mod connection;
pub mod controller;

use std::future::Future;
use std::net::SocketAddr;

use crate::http::message::Message;
use crate::http::response::Response;

pub use connection::Connection;
pub use controller::{Controller, ControllerStats, ShutdownHandle};

/// A completed request handed upward for processing.
pub struct Call {
    /// The parsed message: head, de-framed body, trailers.
    pub message: Message,
    /// Peer address of the transport endpoint.
    pub peer: SocketAddr,
    /// Whether the transport under this connection is confidential.
    pub secure: bool,
}

/// Request-processing capability plugged into the controller.
///
/// The handler future may run on any runtime thread; its completion wakes
/// the connection task, which then resumes the write path.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, call: Call) -> impl Future<Output = Response> + Send;
}

impl<F, Fut> Handler for F
where
    F: Fn(Call) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send,
{
    fn handle(&self, call: Call) -> impl Future<Output = Response> + Send {
        self(call)
    }
}

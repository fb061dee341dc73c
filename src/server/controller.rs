use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::server::Handler;
use crate::server::connection::Connection;

/// Counters shared between the controller and its owner.
#[derive(Debug, Default)]
pub struct ControllerStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    live: AtomicUsize,
}

impl ControllerStats {
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Accepts declined at the concurrency ceiling.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Decrements the live count on every connection exit path.
struct LiveGuard(Arc<ControllerStats>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Stops the accept loop; in-flight connections drain under the grace
/// deadline.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// The event loop over the listening endpoint.
///
/// Accepts new transport endpoints, admits them up to the configured
/// concurrency ceiling, and spawns each admitted connection as an
/// independent non-blocking task. At the ceiling an accept is rejected by
/// closing it immediately; the listening endpoint itself stays open and
/// existing connections are unaffected. The handler and all tuning values
/// are explicit construction arguments.
pub struct Controller<H> {
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: Arc<H>,
    stats: Arc<ControllerStats>,
    max_connections: usize,
    idle_timeout: Duration,
    buffer_capacity: usize,
    shutdown_grace: Duration,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<H: Handler> Controller<H> {
    /// Binds the listening endpoint with the configured accept backlog.
    pub async fn bind(config: &Config, handler: H) -> anyhow::Result<Self> {
        let addr: SocketAddr = config
            .server
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address {}", config.server.listen_addr))?;
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .context("create listening socket")?;
        socket.set_reuseaddr(true).context("set SO_REUSEADDR")?;
        socket.bind(addr).context("bind listening socket")?;
        let listener = socket
            .listen(config.server.accept_backlog)
            .context("listen on bound socket")?;
        let local_addr = listener.local_addr().context("query local address")?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            listener,
            local_addr,
            handler: Arc::new(handler),
            stats: Arc::new(ControllerStats::default()),
            max_connections: config.server.max_connections,
            idle_timeout: config.server.idle_timeout(),
            buffer_capacity: config.server.buffer_capacity_bytes,
            shutdown_grace: config.server.shutdown_grace(),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// The bound address; useful when listening on an ephemeral port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> Arc<ControllerStats> {
        self.stats.clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Accepts and dispatches until shut down.
    ///
    /// A failure of the listening endpoint itself is fatal and propagates
    /// to the owning process.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(
            addr = %self.local_addr,
            max_connections = self.max_connections,
            "listening"
        );
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.context("accept failed")?;
                    self.admit(stream, peer);
                }
                _ = self.shutdown_rx.changed() => break,
            }
        }
        self.drain().await;
        Ok(())
    }

    fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        if self.stats.live() >= self.max_connections {
            // Reject by dropping; never queue past the ceiling
            self.stats.rejected.fetch_add(1, Ordering::SeqCst);
            warn!(peer = %peer, "connection ceiling reached, rejecting accept");
            drop(stream);
            return;
        }
        let _ = stream.set_nodelay(true);
        self.stats.live.fetch_add(1, Ordering::SeqCst);
        self.stats.accepted.fetch_add(1, Ordering::SeqCst);
        debug!(peer = %peer, "accepted connection");

        let guard = LiveGuard(self.stats.clone());
        let handler = self.handler.clone();
        let connection = Connection::new(
            stream,
            peer,
            false,
            self.buffer_capacity,
            self.idle_timeout,
        );
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = connection.run(handler).await {
                debug!(peer = %peer, error = %e, "connection ended with error");
            }
        });
    }

    /// Best-effort drain of in-flight connections after shutdown.
    async fn drain(&self) {
        if self.stats.live() == 0 {
            return;
        }
        info!(live = self.stats.live(), "draining in-flight connections");
        let deadline = Instant::now() + self.shutdown_grace;
        while self.stats.live() > 0 && Instant::now() < deadline {
            sleep(Duration::from_millis(25)).await;
        }
        let leftover = self.stats.live();
        if leftover > 0 {
            warn!(live = leftover, "grace deadline passed with connections still open");
        }
    }
}

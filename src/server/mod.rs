//! TCP connection server for the line protocol.
//!
//! ```text
//!  ┌───────────────────────────────────────────────────────────┐
//!  │  Server thread                                            │
//!  │  ┌─────────────────────┐                                  │
//!  │  │ accept (poll 50ms)  │──spawn──▶ Link thread ─▶ Bridge  │
//!  │  │  until ShutdownHandle│──spawn──▶ Link thread ─▶ Bridge  │
//!  │  └─────────────────────┘──spawn──▶ Link thread ─▶ Bridge  │
//!  │            │ shutdown                                     │
//!  │            ▼                                              │
//!  │   stop all links ─▶ join all ─▶ close listener            │
//!  └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The listener is non-blocking and polled so the accept loop can observe
//! the [`ShutdownHandle`] without a process-wide signal trap. Whoever owns
//! the handle (a signal handler, a console watcher, a test) decides when to
//! stop.
//!
//! ## Known limits
//!
//! There is no connection limit and no backpressure: every accepted socket
//! gets a thread. The only admission limit is the listen backlog, fixed at
//! [`LISTEN_BACKLOG`].

pub mod link;

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{info, warn};
use socket2::{Domain, Protocol, Socket, Type};

use crate::config::ServerConfig;
use crate::protocol::ProtocolBridge;

pub use link::{Link, LinkConfig, LinkExit, LinkHandle, LinkState};

/// Pending connections the kernel queues before `accept`.
pub const LISTEN_BACKLOG: i32 = 10;

/// Cooperative stop flag shared between the server and its owner.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the server to stop. Idempotent.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Bound, not yet running, line-protocol server.
pub struct Server {
    listener: TcpListener,
    bridge: ProtocolBridge,
    link_config: LinkConfig,
    poll_interval: Duration,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Validate `config` and bind the listener.
    pub fn bind(config: &ServerConfig, bridge: ProtocolBridge) -> crate::Result<Self> {
        config.validate()?;
        let listener = listen(config.socket_addr()?)?;
        info!(
            "SRV: listening at {} (backlog {})",
            listener.local_addr()?,
            LISTEN_BACKLOG
        );

        Ok(Self {
            listener,
            bridge,
            link_config: LinkConfig {
                terminator: config.terminator(),
                recv_buffer_size: config.recv_buffer_size,
            },
            poll_interval: config.accept_poll_interval(),
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Actual bound address (useful with port `0`).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle that stops [`run`](Self::run) when triggered.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accept connections until shutdown, then drain every link.
    pub fn run(self) -> crate::Result<()> {
        let mut links: Vec<LinkHandle> = Vec::new();

        while !self.shutdown.is_triggered() {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    match Link::spawn(stream, addr, self.bridge.clone(), self.link_config) {
                        Ok(handle) => links.push(handle),
                        Err(e) => warn!("SRV: cannot start link for {}: {}", addr, e),
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    reap_finished(&mut links);
                    std::thread::sleep(self.poll_interval);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    // e.g. EMFILE: keep serving existing links and retry.
                    warn!("SRV: accept error: {}", e);
                    std::thread::sleep(self.poll_interval);
                }
            }
        }

        info!("SRV: terminating, draining {} link(s)", links.len());
        for link in &links {
            link.stop();
        }
        for link in links {
            link.join();
        }
        drop(self.listener);
        info!("SRV: stopped");
        Ok(())
    }

    /// Run the accept loop on a background thread.
    pub fn spawn(self) -> io::Result<ServerHandle> {
        let addr = self.local_addr()?;
        let shutdown = self.shutdown_handle();
        let thread = std::thread::Builder::new()
            .name("slowctl-server".into())
            .spawn(move || self.run())?;
        Ok(ServerHandle {
            addr,
            shutdown,
            thread,
        })
    }
}

/// Bind, listen with [`LISTEN_BACKLOG`], and make the listener non-blocking.
fn listen(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Join links whose threads have already exited.
fn reap_finished(links: &mut Vec<LinkHandle>) {
    let (done, live): (Vec<_>, Vec<_>) = links.drain(..).partition(LinkHandle::is_finished);
    *links = live;
    for link in done {
        link.join();
    }
}

/// A server running on its own thread.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    thread: JoinHandle<crate::Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Trigger shutdown and wait for every link to close.
    pub fn shutdown(self) -> crate::Result<()> {
        self.shutdown.trigger();
        self.join()
    }

    /// Wait for the server thread without triggering shutdown.
    pub fn join(self) -> crate::Result<()> {
        self.thread
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("server thread panicked").into()))
    }
}

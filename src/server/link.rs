//! One client connection.
//!
//! Each accepted socket runs on its own OS thread:
//!
//! ```text
//!  Listening ──▶ Active ──▶ Draining ──▶ Closed
//!                  │                       ▲
//!                  └── peer close / bad ───┘
//!                      UTF-8 / I/O error
//! ```
//!
//! `Active` is a blocking receive loop. Bytes go through the framer one by
//! one; every complete line is handed to the bridge and its reply written
//! back with the terminator. `Draining` is entered from the owning side:
//! [`LinkHandle::stop`] raises the stop flag and shuts the socket down,
//! which wakes the blocked `read` so the thread can observe the flag.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use log::{debug, info, warn};

use crate::error::FramingError;
use crate::protocol::{CommandFramer, PathResolver, ProtocolBridge};

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Accepted, thread not yet running.
    Listening,
    /// Receiving and answering commands.
    Active,
    /// Stop requested; exits at the next read boundary.
    Draining,
    /// Socket closed, thread finished.
    Closed,
}

/// Why a link's receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkExit {
    /// The peer closed its side (zero-length read).
    PeerClosed,
    /// The owner asked the link to stop.
    Stopped,
    /// A line was not valid UTF-8.
    InvalidEncoding,
    /// Socket read or write failed.
    Io,
}

/// Per-connection settings copied from the server config.
#[derive(Debug, Clone, Copy)]
pub struct LinkConfig {
    pub terminator: u8,
    pub recv_buffer_size: usize,
}

/// Connection worker, consumed by [`Link::run`].
pub struct Link {
    addr: SocketAddr,
    stream: TcpStream,
    bridge: ProtocolBridge,
    config: LinkConfig,
    stop: Arc<AtomicBool>,
    state: Arc<Mutex<LinkState>>,
}

impl Link {
    /// Spawn a thread serving `stream`.
    pub fn spawn(
        stream: TcpStream,
        addr: SocketAddr,
        bridge: ProtocolBridge,
        config: LinkConfig,
    ) -> io::Result<LinkHandle> {
        // Accepted sockets may inherit non-blocking mode from the listener.
        stream.set_nonblocking(false)?;
        let control = stream.try_clone()?;
        let stop = Arc::new(AtomicBool::new(false));
        let state = Arc::new(Mutex::new(LinkState::Listening));

        let link = Self {
            addr,
            stream,
            bridge,
            config,
            stop: Arc::clone(&stop),
            state: Arc::clone(&state),
        };
        let thread = std::thread::Builder::new()
            .name(format!("link-{addr}"))
            .spawn(move || link.run())?;

        Ok(LinkHandle {
            addr,
            control,
            stop,
            state,
            thread,
        })
    }

    /// Serve the connection until the peer leaves or a stop is requested.
    pub fn run(mut self) -> LinkExit {
        {
            // A stop may already have moved the link to Draining.
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == LinkState::Listening {
                *state = LinkState::Active;
            }
        }
        info!("LINK[{}]: connected", self.addr);

        let exit = self.receive_loop();

        // Drop the socket; unterminated bytes in the framer are discarded.
        let _ = self.stream.shutdown(Shutdown::Both);
        self.set_state(LinkState::Closed);
        info!("LINK[{}]: closed ({:?})", self.addr, exit);
        exit
    }

    fn receive_loop(&mut self) -> LinkExit {
        let mut framer = CommandFramer::new(self.config.terminator);
        let mut session = PathResolver::new();
        let mut buf = vec![0u8; self.config.recv_buffer_size.max(1)];

        while !self.stop.load(Ordering::Acquire) {
            let n = match self.stream.read(&mut buf) {
                // Our own shutdown also reads as end-of-stream.
                Ok(0) if self.stop.load(Ordering::Acquire) => return LinkExit::Stopped,
                Ok(0) => return LinkExit::PeerClosed,
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    if self.stop.load(Ordering::Acquire) {
                        return LinkExit::Stopped;
                    }
                    warn!("LINK[{}]: read error: {}", self.addr, e);
                    return LinkExit::Io;
                }
            };
            if self.stop.load(Ordering::Acquire) {
                break;
            }

            for &byte in &buf[..n] {
                let reply = match framer.push(byte) {
                    None => continue,
                    Some(Ok(line)) => self.bridge.handle_line(&line, &mut session),
                    Some(Err(FramingError::LineTooLong)) => {
                        warn!("LINK[{}]: line too long, dropped", self.addr);
                        String::new()
                    }
                    Some(Err(FramingError::InvalidEncoding)) => {
                        warn!("LINK[{}]: undecodable line, closing", self.addr);
                        return LinkExit::InvalidEncoding;
                    }
                };
                if let Err(e) = self.send_reply(reply) {
                    warn!("LINK[{}]: write error: {}", self.addr, e);
                    return LinkExit::Io;
                }
            }
        }
        LinkExit::Stopped
    }

    fn send_reply(&mut self, reply: String) -> io::Result<()> {
        let mut out = reply.into_bytes();
        out.push(self.config.terminator);
        debug!("LINK[{}]: reply {} bytes", self.addr, out.len());
        self.stream.write_all(&out)
    }

    fn set_state(&self, state: LinkState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

/// Owner's side of a running link.
pub struct LinkHandle {
    addr: SocketAddr,
    control: TcpStream,
    stop: Arc<AtomicBool>,
    state: Arc<Mutex<LinkState>>,
    thread: JoinHandle<LinkExit>,
}

impl LinkHandle {
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> LinkState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Request the link to drain and unblock its pending read.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != LinkState::Closed {
                *state = LinkState::Draining;
            }
        }
        // Errors here just mean the socket is already gone.
        let _ = self.control.shutdown(Shutdown::Both);
    }

    /// Wait for the link thread to finish.
    pub fn join(self) -> LinkExit {
        let addr = self.addr;
        self.thread.join().unwrap_or_else(|_| {
            warn!("LINK[{}]: thread panicked", addr);
            LinkExit::Io
        })
    }
}

//! Process-wide unique port allocation for harness scenarios.

use std::collections::HashSet;
use std::net::{SocketAddr, TcpListener};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

/// Errors from port allocation and listen-address rewriting.
#[derive(Debug, Error)]
pub enum PortError {
    /// The allocation range is exhausted.
    #[error("no available ports left in range {0}..{1}")]
    Exhausted(u16, u16),

    /// A listen address had no recognizable port component.
    #[error("cannot find a port to replace in {0:?}")]
    BadListenAddr(String),
}

/// Hands out localhost ports that are currently bindable and are never
/// re-issued within the process lifetime, even across concurrent scenarios.
///
/// Migration rewrites every listening address in a snapshot through one of
/// these, so two scenarios prepared in the same process can never collide.
#[derive(Debug)]
pub struct PortAllocator {
    range: (u16, u16),
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    next: u16,
    handed_out: HashSet<u16>,
}

impl PortAllocator {
    /// Creates an allocator over `[start, end)`.
    #[must_use]
    pub fn new(start: u16, end: u16) -> Self {
        Self {
            range: (start, end),
            inner: Mutex::new(Inner {
                next: start,
                handed_out: HashSet::new(),
            }),
        }
    }

    /// Allocates the next free port.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Exhausted`] when every port in the range has been
    /// handed out or is taken by another process.
    pub fn get_port(&self) -> Result<u16, PortError> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        while inner.next < self.range.1 {
            let port = inner.next;
            inner.next += 1;
            if inner.handed_out.contains(&port) {
                continue;
            }
            if is_port_available(port) {
                inner.handed_out.insert(port);
                debug!(port, "allocated port");
                return Ok(port);
            }
        }
        Err(PortError::Exhausted(self.range.0, self.range.1))
    }

    /// Rewrites the port component of a listen address (`host:port` or a bare
    /// port number) with a freshly allocated one, keeping the host part.
    ///
    /// # Errors
    ///
    /// Returns an error when the value has no parsable port, or when
    /// allocation fails.
    pub fn replace_port(&self, listen_addr: &str) -> Result<String, PortError> {
        let fresh = self.get_port()?;
        match listen_addr.rsplit_once(':') {
            Some((host, old)) if old.parse::<u16>().is_ok() => Ok(format!("{host}:{fresh}")),
            None if listen_addr.parse::<u16>().is_ok() => Ok(fresh.to_string()),
            _ => Err(PortError::BadListenAddr(listen_addr.to_string())),
        }
    }
}

/// Checks whether a port is free by attempting to bind it on localhost.
fn is_port_available(port: u16) -> bool {
    TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).is_ok()
}

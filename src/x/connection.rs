//! Watching the primary connection and any secondary connections the client
//! library opens (input methods and the like) for readability.

use crate::{
    error::Result,
    x::transport::ConnectionChange,
};
use nix::poll::{poll, PollFd, PollFlags};
use std::os::unix::io::RawFd;

/// A secondary connection that is being watched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalConnection {
    /// The descriptor
    pub fd:    RawFd,
    /// Token identifying the watch
    pub watch: u64,
}

/// Which descriptors became readable in [`ConnectionWatch::wait`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readiness {
    /// The primary connection has data
    pub primary:  bool,
    /// Secondary connections that have data
    pub internal: Vec<RawFd>,
}

impl Readiness {
    /// Returns `true` if nothing is readable
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.primary && self.internal.is_empty()
    }
}

/// The set of descriptors polled by the event loop
#[derive(Debug, Clone, Default)]
pub struct ConnectionWatch {
    primary:    Option<RawFd>,
    internal:   Vec<InternalConnection>,
    next_watch: u64,
}

impl ConnectionWatch {
    /// Watch `primary`, if any
    #[must_use]
    pub fn new(primary: Option<RawFd>) -> Self {
        Self {
            primary,
            ..Self::default()
        }
    }

    /// The secondary connections currently watched
    #[must_use]
    pub fn internal(&self) -> &[InternalConnection] {
        &self.internal
    }

    /// Apply a change reported by the transport
    pub fn apply(&mut self, change: ConnectionChange) {
        match change {
            ConnectionChange::Opened(fd) => {
                self.opened(fd);
            },
            ConnectionChange::Closed(fd) => {
                self.closed(fd);
            },
        }
    }

    /// Start watching a secondary connection
    pub fn opened(&mut self, fd: RawFd) -> u64 {
        if let Some(conn) = self.internal.iter().find(|c| c.fd == fd) {
            return conn.watch;
        }

        self.next_watch += 1;
        let watch = self.next_watch;
        self.internal.push(InternalConnection { fd, watch });
        log::debug!("watching internal connection fd={} (watch {})", fd, watch);
        watch
    }

    /// Stop watching a secondary connection
    pub fn closed(&mut self, fd: RawFd) -> Option<InternalConnection> {
        let idx = self.internal.iter().position(|c| c.fd == fd)?;
        let conn = self.internal.remove(idx);
        log::debug!("internal connection fd={} closed", fd);
        Some(conn)
    }

    /// Wait up to `timeout_ms` (negative blocks) for any descriptor to become
    /// readable
    pub fn wait(&self, timeout_ms: i32) -> Result<Readiness> {
        let mut fds = self
            .primary
            .iter()
            .copied()
            .chain(self.internal.iter().map(|c| c.fd))
            .map(|fd| PollFd::new(fd, PollFlags::POLLIN))
            .collect::<Vec<_>>();

        if fds.is_empty() {
            return Ok(Readiness::default());
        }

        poll(&mut fds, timeout_ms)?;

        let ready = |pfd: &PollFd| {
            pfd.revents()
                .map_or(false, |r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP))
        };

        let mut readiness = Readiness::default();
        let mut iter = fds.iter();
        if self.primary.is_some() {
            readiness.primary = iter.next().map_or(false, ready);
        }
        readiness.internal = iter
            .zip(self.internal.iter())
            .filter(|(pfd, _)| ready(*pfd))
            .map(|(_, c)| c.fd)
            .collect();

        Ok(readiness)
    }
}

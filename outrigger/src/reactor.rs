//! The event loop side of the bridge.
//!
//! A `Reactor` owns the readiness channel its registered primitives post
//! edges to, plus the token registry mapping each edge back to a socket
//! state. One reactor instance is driven by at most one thread at a time;
//! distinct reactors may run on distinct threads.

use crate::service;
use crate::state::SocketState;
use dashmap::DashMap;
use outrigger_core::primitive::{
    readiness_channel, Direction, ReadinessReceiver, ReadinessSender, Token,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Registry and edge source shared by every socket on one reactor.
pub(crate) struct Shared {
    pub(crate) edges: ReadinessSender,
    pub(crate) sockets: DashMap<Token, Arc<SocketState>>,
    next_token: AtomicUsize,
}

impl Shared {
    pub(crate) fn alloc_token(&self) -> Token {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }
}

/// A readiness-driven dispatch loop for messaging sockets.
///
/// Queued operations are attempted whenever the loop observes a readiness
/// edge for their socket and direction; completions run synchronously on
/// the thread calling [`poll`](Reactor::poll) or
/// [`run_one`](Reactor::run_one).
pub struct Reactor {
    shared: Arc<Shared>,
    incoming: ReadinessReceiver,
}

impl Reactor {
    /// Create an empty reactor.
    #[must_use]
    pub fn new() -> Self {
        let (edges, incoming) = readiness_channel();
        Self {
            shared: Arc::new(Shared {
                edges,
                sockets: DashMap::new(),
                next_token: AtomicUsize::new(1),
            }),
            incoming,
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Drain every pending readiness edge without blocking.
    ///
    /// Returns the number of edges processed. Call in a loop (or after any
    /// operation that may have produced work) to drive async completions.
    pub fn poll(&self) -> usize {
        let mut processed = 0;
        while let Ok((token, dir)) = self.incoming.try_recv() {
            self.dispatch_edge(token, dir);
            processed += 1;
        }
        processed
    }

    /// Block up to `timeout` (forever when `None`) for one readiness edge,
    /// then process it. Returns false when the wait timed out.
    pub fn run_one(&self, timeout: Option<Duration>) -> bool {
        let edge = match timeout {
            Some(t) => self.incoming.recv_timeout(t).ok(),
            None => self.incoming.recv().ok(),
        };
        match edge {
            Some((token, dir)) => {
                self.dispatch_edge(token, dir);
                true
            }
            None => false,
        }
    }

    fn dispatch_edge(&self, token: Token, dir: Direction) {
        // A stale token (closed or moved-from socket) is not an error;
        // the handle may have been released after the edge was posted.
        let Some(state) = self.shared.sockets.get(&token).map(|s| Arc::clone(&s)) else {
            trace!(token, ?dir, "edge for unregistered token dropped");
            return;
        };
        service::dispatch(&state, dir);
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

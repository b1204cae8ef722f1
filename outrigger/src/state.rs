//! Per-socket state shared between the public handle and the reactor.
//!
//! The native primitive is never thread-safe, so every native call runs
//! under the optional per-socket guard. The guard is elided when the socket
//! was opened with the single-threaded optimization; in that mode the
//! caller contracts that one thread drives the owning reactor and issues
//! every direct call. Queue bookkeeping lives behind its own always-present
//! mutex so cross-thread `cancel` stays sound either way.

use crate::op::Operation;
use outrigger_core::error::{Result, SocketError};
use outrigger_core::primitive::{Direction, Primitive, Token};
use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::Arc;

pub(crate) struct Inner {
    pub prim: Option<Arc<dyn Primitive>>,
    /// Last address passed to a successful bind or connect; overwritten,
    /// never accumulated.
    pub endpoint: String,
    pub read_queue: VecDeque<Operation>,
    pub write_queue: VecDeque<Operation>,
    pub open: bool,
    pub shut_read: bool,
    pub shut_write: bool,
    /// True once bind or connect succeeded; freezes link-frozen options.
    pub linked: bool,
    /// Reactor registration this state currently receives edges under.
    pub token: Token,
}

impl Inner {
    pub(crate) fn queue_mut(&mut self, dir: Direction) -> &mut VecDeque<Operation> {
        match dir {
            Direction::Read => &mut self.read_queue,
            Direction::Write => &mut self.write_queue,
        }
    }

    pub(crate) fn is_shut(&self, dir: Direction) -> bool {
        match dir {
            Direction::Read => self.shut_read,
            Direction::Write => self.shut_write,
        }
    }
}

pub(crate) struct SocketState {
    /// Serializes native-primitive calls; `None` selects the unguarded
    /// path (single-threaded contract, documented, not enforced).
    guard: Option<Mutex<()>>,
    inner: Mutex<Inner>,
}

impl SocketState {
    pub(crate) fn new(
        prim: Arc<dyn Primitive>,
        token: Token,
        optimize_single_threaded: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            guard: (!optimize_single_threaded).then(|| Mutex::new(())),
            inner: Mutex::new(Inner {
                prim: Some(prim),
                endpoint: String::new(),
                read_queue: VecDeque::new(),
                write_queue: VecDeque::new(),
                open: true,
                shut_read: false,
                shut_write: false,
                linked: false,
                token,
            }),
        })
    }

    pub(crate) fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock()
    }

    /// Clone out the primitive, failing when the socket is closed.
    pub(crate) fn primitive(&self) -> Result<Arc<dyn Primitive>> {
        let inner = self.inner.lock();
        if !inner.open {
            return Err(SocketError::invalid_state("socket is closed"));
        }
        inner
            .prim
            .clone()
            .ok_or_else(|| SocketError::invalid_state("socket is closed"))
    }

    /// Acquire the native-call guard; no-op on the unguarded path.
    pub(crate) fn lock_native(&self) -> Option<MutexGuard<'_, ()>> {
        self.guard.as_ref().map(Mutex::lock)
    }

    /// Run one native call under the guard. The guard is held for exactly
    /// the duration of `f`, released on every return path.
    pub(crate) fn with_primitive<R>(
        &self,
        f: impl FnOnce(&dyn Primitive) -> Result<R>,
    ) -> Result<R> {
        let prim = self.primitive()?;
        let _native = self.lock_native();
        f(&*prim)
    }
}

//! The native messaging-socket primitive, as seen by the bridge.
//!
//! The primitive is an external collaborator: it owns the wire behavior and
//! exposes non-blocking part-at-a-time I/O plus edge-triggered readiness
//! notification. The bridge never assumes the primitive is thread-safe; a
//! per-socket guard serializes every call unless the caller opted into the
//! single-threaded contract.

use crate::error::Result;
use crate::kind::SocketKind;
use crate::message::Message;
use crate::monitor::EventMask;
use crate::options::{OptionId, OptionValue};
use std::time::Duration;

/// Identifies one registered socket within its reactor.
pub type Token = usize;

/// Readiness direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Parts are (or may be) available to receive.
    Read,
    /// The outgoing queue has (or may have) room.
    Write,
}

/// Which half of the socket to shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Read,
    Write,
    Both,
}

/// One readiness edge: a registered handle became readable or writable.
pub type ReadinessEdge = (Token, Direction);

/// Sender half of a reactor's readiness channel.
pub type ReadinessSender = flume::Sender<ReadinessEdge>;

/// Receiver half of a reactor's readiness channel.
pub type ReadinessReceiver = flume::Receiver<ReadinessEdge>;

/// Create the readiness channel a reactor drains.
#[must_use]
pub fn readiness_channel() -> (ReadinessSender, ReadinessReceiver) {
    flume::unbounded()
}

/// A non-blocking, edge-triggered messaging-socket primitive.
///
/// Calls take `&self`; implementations either synchronize internally or are
/// protected by the bridge's per-socket guard. Edge semantics: after
/// [`register`](Primitive::register), the primitive fires one edge on every
/// transition into readiness (empty to non-empty incoming queue, full to
/// non-full outgoing queue, and on link teardown so pending operations can
/// observe the failure). Edges may be spurious; callers must tolerate a
/// retry that discovers nothing.
pub trait Primitive: Send + Sync {
    /// Kind requested at allocation.
    fn kind(&self) -> SocketKind;

    /// Listen at `endpoint`.
    fn bind(&self, endpoint: &str) -> Result<()>;

    /// Associate with a listener at `endpoint`.
    fn connect(&self, endpoint: &str) -> Result<()>;

    /// Send one part without waiting. `WouldBlock` when the peer queue is
    /// full or no link exists yet; the part is borrowed so a blocked send
    /// can be retried with the same part on the next readiness edge.
    fn try_send(&self, part: &Message) -> Result<()>;

    /// Receive one part without waiting. `WouldBlock` when nothing is
    /// pending.
    fn try_recv(&self) -> Result<Message>;

    /// Block until the direction is (possibly) ready, or `timeout` elapses.
    /// `None` waits forever. Returns false on timeout.
    fn wait_ready(&self, dir: Direction, timeout: Option<Duration>) -> bool;

    /// Heuristic readiness probe used by the speculative fast path.
    fn is_ready(&self, dir: Direction) -> bool;

    /// Subscribe the reactor identified by `token` to this handle's edges.
    /// A handle delivers edges to at most one reactor at a time.
    fn register(&self, edges: ReadinessSender, token: Token);

    /// Half-close one or both directions.
    fn shutdown(&self, how: Shutdown) -> Result<()>;

    /// Store an option value. Shape validation happens in the service
    /// before the call reaches the primitive.
    fn set_option(&self, id: OptionId, value: OptionValue) -> Result<()>;

    /// Fetch an option value.
    fn get_option(&self, id: OptionId) -> Result<OptionValue>;

    /// Publish lifecycle events matching `mask` onto a socket bound at
    /// `endpoint`.
    fn monitor(&self, endpoint: &str, mask: EventMask) -> Result<()>;

    /// Release the handle: tear down links, stop monitoring, wake waiters.
    fn close(&self);
}

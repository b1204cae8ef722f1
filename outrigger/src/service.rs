//! Socket service: queue discipline, dispatch, and the synchronous paths.
//!
//! Everything here operates on a [`SocketState`] and (where registration
//! matters) the reactor's [`Shared`] registry. Lock discipline: dispatch
//! holds the native guard from pop to re-push, and cancel takes it before
//! draining, so an operation is never observable outside its queue.
//! Completions always run with every lock released, so a continuation may
//! re-enter the socket.

use crate::op::{Completion, Operation, RunOutcome};
use crate::reactor::Shared;
use crate::state::SocketState;
use outrigger_core::error::{Result, SocketError};
use outrigger_core::flags::{self, Flags};
use outrigger_core::message::Message;
use outrigger_core::options::{self, OptionId, OptionValue};
use outrigger_core::primitive::{Direction, Primitive, Shutdown};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Drain one direction's queue as far as readiness allows.
///
/// Runs on the reactor thread in response to an edge. Operations complete
/// in queue order; the first operation that reports "not ready" goes back
/// to the queue head and dispatch stops until the next edge.
pub(crate) fn dispatch(state: &Arc<SocketState>, dir: Direction) {
    enum Step {
        Completed(Completion),
        Parked,
        Drained,
    }
    loop {
        // The guard spans pop, attempt, and re-push. Cancel takes it too,
        // so a concurrent cancel or close can never observe an operation
        // out of its queue mid-attempt.
        let step = {
            let _native = state.lock_native();
            let popped = { state.inner().queue_mut(dir).pop_front() };
            match popped {
                None => Step::Drained,
                Some(op) => match state.primitive() {
                    Err(_) => {
                        // closed underneath a queued operation
                        Step::Completed(Box::new(move || {
                            op.complete_err(SocketError::Aborted);
                        }))
                    }
                    Ok(prim) => match op.run(&*prim) {
                        RunOutcome::Done(complete) => Step::Completed(complete),
                        RunOutcome::Retained(op) => {
                            trace!(?dir, "operation retained, waiting for next edge");
                            state.inner().queue_mut(dir).push_front(op);
                            Step::Parked
                        }
                    },
                },
            }
        };
        match step {
            Step::Completed(complete) => complete(),
            Step::Parked | Step::Drained => break,
        }
    }
}

/// Queue one operation, trying the speculative inline path first.
///
/// The fast path runs only when the direction's queue is empty (nothing to
/// overtake), the socket allows speculation, and the primitive looks ready.
/// A queued operation whose primitive is already ready gets a self-posted
/// edge so the reactor wakes even though the primitive saw no transition.
pub(crate) fn enqueue(state: &Arc<SocketState>, shared: &Arc<Shared>, op: Operation) {
    let dir = op.direction();
    {
        let inner = state.inner();
        if !inner.open {
            drop(inner);
            op.complete_err(SocketError::invalid_state("socket is closed"));
            return;
        }
        if inner.is_shut(dir) {
            drop(inner);
            op.complete_err(SocketError::NotConnected);
            return;
        }
    }
    if op.is_trivial() {
        op.complete_trivial();
        return;
    }
    let prim = match state.primitive() {
        Ok(prim) => prim,
        Err(e) => {
            op.complete_err(e);
            return;
        }
    };

    let queue_empty = { state.inner().queue_mut(dir).is_empty() };
    let rejected = if queue_empty && allow_speculative(&*prim) && prim.is_ready(dir) {
        // The guard spans the attempt and the park so a concurrent cancel
        // or close cannot slip between them and miss a retained operation.
        let (completion, rejected) = {
            let _native = state.lock_native();
            match op.run(&*prim) {
                RunOutcome::Done(complete) => (Some(complete), None),
                RunOutcome::Retained(op) => (None, park(state, shared, &*prim, dir, op)),
            }
        };
        if let Some(complete) = completion {
            trace!(?dir, "speculative fast path completed inline");
            complete();
        }
        rejected
    } else {
        park(state, shared, &*prim, dir, op)
    };
    if let Some(op) = rejected {
        op.complete_err(SocketError::Aborted);
    }
}

/// Append to the queue and re-post a consumed readiness edge.
///
/// Edge-triggered primitives only fire on transitions; if readiness arrived
/// before this operation was queued, the edge is already gone, so one is
/// re-posted whenever the primitive still looks ready. Returns the operation
/// back when the socket closed concurrently; the caller completes it with
/// every lock released.
fn park(
    state: &Arc<SocketState>,
    shared: &Arc<Shared>,
    prim: &dyn Primitive,
    dir: Direction,
    op: Operation,
) -> Option<Operation> {
    let token = {
        let mut inner = state.inner();
        if !inner.open {
            return Some(op);
        }
        inner.queue_mut(dir).push_back(op);
        inner.token
    };
    if prim.is_ready(dir) {
        let _ = shared.edges.send((token, dir));
    }
    None
}

fn allow_speculative(prim: &dyn Primitive) -> bool {
    matches!(
        prim.get_option(OptionId::AllowSpeculative),
        Ok(OptionValue::Bool(true))
    )
}

fn timeout_for(prim: &dyn Primitive, dir: Direction) -> Option<Duration> {
    let id = match dir {
        Direction::Write => OptionId::SendTimeout,
        Direction::Read => OptionId::RecvTimeout,
    };
    match prim.get_option(id) {
        Ok(OptionValue::Int(ms)) if ms >= 0 => Some(Duration::from_millis(ms as u64)),
        _ => None,
    }
}

fn check_dir_open(state: &SocketState, dir: Direction) -> Result<()> {
    let inner = state.inner();
    if !inner.open {
        return Err(SocketError::invalid_state("socket is closed"));
    }
    if inner.is_shut(dir) {
        return Err(SocketError::NotConnected);
    }
    Ok(())
}

/// Shared retry loop for the synchronous calls.
///
/// `attempt` returns `Ok(None)` when the primitive was not ready; the loop
/// then waits for readiness, honoring `DONT_WAIT` and the direction's
/// timeout option. A timed-out or non-blocking miss surfaces `WouldBlock`.
fn run_sync<T>(
    state: &SocketState,
    dir: Direction,
    call_flags: Flags,
    mut attempt: impl FnMut(&dyn Primitive) -> Result<Option<T>>,
) -> Result<T> {
    check_dir_open(state, dir)?;
    let prim = state.primitive()?;
    let deadline = timeout_for(&*prim, dir).map(|t| Instant::now() + t);
    loop {
        let outcome = {
            let _native = state.lock_native();
            attempt(&*prim)?
        };
        if let Some(value) = outcome {
            return Ok(value);
        }
        if flags::is_dont_wait(call_flags) {
            return Err(SocketError::WouldBlock);
        }
        let remaining = match deadline {
            Some(d) => {
                let now = Instant::now();
                if now >= d {
                    return Err(SocketError::WouldBlock);
                }
                Some(d - now)
            }
            None => None,
        };
        if !prim.wait_ready(dir, remaining) {
            return Err(SocketError::WouldBlock);
        }
    }
}

/// Send a buffer sequence, blocking per the socket's send timeout.
pub(crate) fn send_sync(
    state: &SocketState,
    bufs: &[bytes::Bytes],
    call_flags: Flags,
) -> Result<usize> {
    if bufs.is_empty() {
        return Ok(0);
    }
    let mut cursor = crate::multipart::SendCursor::new();
    run_sync(state, Direction::Write, call_flags, move |prim| {
        match cursor.step(prim, bufs, call_flags)? {
            crate::multipart::Step::Complete(n) => Ok(Some(n)),
            _ => Ok(None),
        }
    })
}

/// Send one prepared message part.
pub(crate) fn send_message_sync(
    state: &SocketState,
    part: &Message,
    call_flags: Flags,
) -> Result<usize> {
    run_sync(state, Direction::Write, call_flags, |prim| {
        match prim.try_send(part) {
            Ok(()) => Ok(Some(part.len())),
            Err(e) if e.is_retryable() => Ok(None),
            Err(e) => Err(e),
        }
    })
}

/// Receive into a buffer sequence, blocking per the receive timeout.
///
/// Fails with `NoBufferSpace` when `RECV_MORE` assembly runs out of room;
/// the error reports bytes already delivered and whether parts remain.
pub(crate) fn recv_sync(
    state: &SocketState,
    bufs: &mut [Vec<u8>],
    call_flags: Flags,
) -> Result<usize> {
    if bufs.is_empty() {
        return Ok(0);
    }
    let mut cursor = crate::multipart::RecvCursor::new();
    run_sync(state, Direction::Read, call_flags, move |prim| {
        match cursor.step(prim, bufs, call_flags)? {
            crate::multipart::Step::Complete(n) => Ok(Some(n)),
            crate::multipart::Step::CompleteMore {
                bytes,
                more,
                overflow,
            } => {
                if overflow {
                    Err(SocketError::NoBufferSpace {
                        transferred: bytes,
                        more,
                    })
                } else {
                    Ok(Some(bytes))
                }
            }
            crate::multipart::Step::Blocked => Ok(None),
        }
    })
}

/// Multipart receive that reports trailing parts instead of failing.
pub(crate) fn recv_more_sync(
    state: &SocketState,
    bufs: &mut [Vec<u8>],
    call_flags: Flags,
) -> Result<crate::multipart::MoreResult> {
    let call_flags = call_flags | flags::RECV_MORE;
    if bufs.is_empty() {
        return Ok(crate::multipart::MoreResult {
            bytes: 0,
            more: false,
        });
    }
    let mut cursor = crate::multipart::RecvCursor::new();
    run_sync(state, Direction::Read, call_flags, move |prim| {
        match cursor.step(prim, bufs, call_flags)? {
            crate::multipart::Step::Complete(bytes) => Ok(Some(crate::multipart::MoreResult {
                bytes,
                more: false,
            })),
            crate::multipart::Step::CompleteMore { bytes, more, .. } => {
                Ok(Some(crate::multipart::MoreResult { bytes, more }))
            }
            crate::multipart::Step::Blocked => Ok(None),
        }
    })
}

/// Receive one whole part as an owned message.
pub(crate) fn recv_message_sync(state: &SocketState, call_flags: Flags) -> Result<Message> {
    run_sync(state, Direction::Read, call_flags, |prim| {
        match prim.try_recv() {
            Ok(part) => Ok(Some(part)),
            Err(e) if e.is_retryable() => Ok(None),
            Err(e) => Err(e),
        }
    })
}

/// Receive every part of one message, waiting between parts as needed.
pub(crate) fn recv_all_sync(state: &SocketState, call_flags: Flags) -> Result<Vec<Message>> {
    let mut parts = Vec::new();
    loop {
        let part = recv_message_sync(state, call_flags)?;
        let more = part.more();
        parts.push(part);
        if !more {
            return Ok(parts);
        }
    }
}

pub(crate) fn bind(state: &SocketState, endpoint: &str) -> Result<()> {
    state.with_primitive(|prim| prim.bind(endpoint))?;
    debug!(endpoint, "bound");
    let mut inner = state.inner();
    inner.endpoint = endpoint.to_owned();
    inner.linked = true;
    Ok(())
}

pub(crate) fn connect(state: &SocketState, endpoint: &str) -> Result<()> {
    state.with_primitive(|prim| prim.connect(endpoint))?;
    debug!(endpoint, "connected");
    let mut inner = state.inner();
    inner.endpoint = endpoint.to_owned();
    inner.linked = true;
    Ok(())
}

pub(crate) fn set_option(state: &SocketState, id: OptionId, value: OptionValue) -> Result<()> {
    let linked = state.inner().linked;
    options::validate_set(id, &value, linked)?;
    state.with_primitive(|prim| prim.set_option(id, value))
}

pub(crate) fn get_option(state: &SocketState, id: OptionId) -> Result<OptionValue> {
    state.with_primitive(|prim| prim.get_option(id))
}

/// Half-close one or both directions. Later calls in a shut direction fail
/// with `NotConnected` before consulting the queue; operations already
/// queued complete or fail as the primitive reports.
///
/// The flags are recorded only once the primitive accepts the half-close;
/// a failed call leaves the direction's state untouched.
pub(crate) fn shutdown(state: &SocketState, how: Shutdown) -> Result<()> {
    state.with_primitive(|prim| prim.shutdown(how))?;
    let mut inner = state.inner();
    match how {
        Shutdown::Read => inner.shut_read = true,
        Shutdown::Write => inner.shut_write = true,
        Shutdown::Both => {
            inner.shut_read = true;
            inner.shut_write = true;
        }
    }
    Ok(())
}

/// Fail every queued operation with `Aborted`.
///
/// The native guard is taken first; dispatch holds it from pop to re-push,
/// so once the drain has the guard no operation is in flight outside the
/// queues. The drained operations complete after every lock is released.
pub(crate) fn cancel(state: &SocketState) {
    let drained: Vec<Operation> = {
        let _native = state.lock_native();
        let mut guard = state.inner();
        let inner = &mut *guard;
        inner
            .read_queue
            .drain(..)
            .chain(inner.write_queue.drain(..))
            .collect()
    };
    if !drained.is_empty() {
        debug!(count = drained.len(), "canceling queued operations");
    }
    for op in drained {
        op.complete_err(SocketError::Aborted);
    }
}

/// Cancel, release the primitive, and deregister from the reactor.
/// Idempotent.
pub(crate) fn close(state: &SocketState, shared: &Shared) {
    // Flip `open` before draining so a racing enqueue cannot park a fresh
    // operation behind the drain; park re-checks the flag and rejects.
    state.inner().open = false;
    cancel(state);
    let (prim, token) = {
        let mut inner = state.inner();
        (inner.prim.take(), inner.token)
    };
    shared.sockets.remove(&token);
    if let Some(prim) = prim {
        let _native = state.lock_native();
        prim.close();
    }
}

/// Move the primitive, endpoint, queues, and lifecycle flags of `src` into
/// `dst`, leaving `src` closed. Returns the reactor token that traveled
/// with the primitive's registration so the caller can re-point registries.
///
/// `dst` must already be released (its own `close` run) before the move.
pub(crate) fn transfer(dst: &Arc<SocketState>, src: &Arc<SocketState>) -> Result<usize> {
    // Both bookkeeping mutexes are needed at once; order by address so two
    // opposing transfers cannot deadlock.
    let dst_first = Arc::as_ptr(dst).cast::<u8>() < Arc::as_ptr(src).cast::<u8>();
    let (mut first, mut second) = if dst_first {
        (dst.inner(), src.inner())
    } else {
        (src.inner(), dst.inner())
    };
    let (d, s) = if dst_first {
        (&mut *first, &mut *second)
    } else {
        (&mut *second, &mut *first)
    };

    if !s.open {
        return Err(SocketError::invalid_state("source socket is closed"));
    }
    let token = s.token;
    d.prim = s.prim.take();
    d.endpoint = std::mem::take(&mut s.endpoint);
    d.read_queue = std::mem::take(&mut s.read_queue);
    d.write_queue = std::mem::take(&mut s.write_queue);
    d.open = true;
    d.shut_read = s.shut_read;
    d.shut_write = s.shut_write;
    d.linked = s.linked;
    d.token = token;
    s.open = false;
    s.linked = false;
    s.shut_read = false;
    s.shut_write = false;
    // Token zero is never allocated; the source's eventual close becomes a
    // registry no-op instead of unhooking the destination.
    s.token = 0;
    Ok(token)
}

//! Deferred send/receive operations.
//!
//! An `Operation` is one pending unit of work on a socket's read or write
//! queue: the requested buffers or message, the call flags, a progress
//! cursor, and a single-shot continuation. `run` attempts the native calls
//! and either hands the operation back (not ready, re-push at the queue
//! head) or returns a completion thunk. The thunk carries the continuation
//! and its result; the dispatch loop invokes it after releasing the native
//! guard, so a continuation may freely re-enter the socket. Each
//! continuation fires exactly once and is consumed by firing.

use crate::multipart::{MoreResult, RecvCursor, SendCursor, Step};
use bytes::Bytes;
use outrigger_core::error::{Result, SocketError};
use outrigger_core::flags::{self, Flags};
use outrigger_core::message::Message;
use outrigger_core::primitive::{Direction, Primitive};

/// Completion for send operations: bytes transferred.
pub type SendHandler = Box<dyn FnOnce(Result<usize>) + Send + 'static>;

/// Completion for buffer-sequence receives: bytes transferred, plus the
/// destination buffers handed back to the caller.
pub type RecvHandler = Box<dyn FnOnce(Result<usize>, Vec<Vec<u8>>) + Send + 'static>;

/// Completion for multipart receives that report trailing parts.
pub type RecvMoreHandler = Box<dyn FnOnce(Result<MoreResult>, Vec<Vec<u8>>) + Send + 'static>;

/// Completion for whole-message receives.
pub type RecvMessageHandler = Box<dyn FnOnce(Result<Message>) + Send + 'static>;

/// A ready-to-fire continuation with its result bound.
pub(crate) type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Outcome of one attempt against the primitive.
pub(crate) enum RunOutcome {
    /// Not ready; re-push at the queue head and wait for the next edge.
    Retained(Operation),
    /// Finished (success or hard error); invoke after dropping the guard.
    Done(Completion),
}

fn done(f: impl FnOnce() + Send + 'static) -> RunOutcome {
    RunOutcome::Done(Box::new(f))
}

pub(crate) enum Operation {
    SendBuffers {
        bufs: Vec<Bytes>,
        flags: Flags,
        cursor: SendCursor,
        handler: SendHandler,
    },
    SendMessage {
        part: Message,
        flags: Flags,
        handler: SendHandler,
    },
    RecvBuffers {
        bufs: Vec<Vec<u8>>,
        flags: Flags,
        cursor: RecvCursor,
        handler: RecvHandler,
    },
    RecvBuffersMore {
        bufs: Vec<Vec<u8>>,
        flags: Flags,
        cursor: RecvCursor,
        handler: RecvMoreHandler,
    },
    RecvMessage {
        flags: Flags,
        handler: RecvMessageHandler,
    },
}

impl Operation {
    pub(crate) fn send_buffers(bufs: Vec<Bytes>, flags: Flags, handler: SendHandler) -> Self {
        Self::SendBuffers {
            bufs,
            flags,
            cursor: SendCursor::new(),
            handler,
        }
    }

    pub(crate) fn send_message(part: Message, flags: Flags, handler: SendHandler) -> Self {
        Self::SendMessage {
            part,
            flags,
            handler,
        }
    }

    pub(crate) fn recv_buffers(bufs: Vec<Vec<u8>>, flags: Flags, handler: RecvHandler) -> Self {
        Self::RecvBuffers {
            bufs,
            flags,
            cursor: RecvCursor::new(),
            handler,
        }
    }

    pub(crate) fn recv_buffers_more(
        bufs: Vec<Vec<u8>>,
        flags: Flags,
        handler: RecvMoreHandler,
    ) -> Self {
        Self::RecvBuffersMore {
            bufs,
            flags: flags | flags::RECV_MORE,
            cursor: RecvCursor::new(),
            handler,
        }
    }

    pub(crate) fn recv_message(flags: Flags, handler: RecvMessageHandler) -> Self {
        Self::RecvMessage { flags, handler }
    }

    /// Which queue this operation belongs on.
    pub(crate) fn direction(&self) -> Direction {
        match self {
            Self::SendBuffers { .. } | Self::SendMessage { .. } => Direction::Write,
            Self::RecvBuffers { .. } | Self::RecvBuffersMore { .. } | Self::RecvMessage { .. } => {
                Direction::Read
            }
        }
    }

    /// True for operations that complete without touching the primitive
    /// (zero-length buffer sequences complete immediately with zero bytes).
    pub(crate) fn is_trivial(&self) -> bool {
        match self {
            Self::SendBuffers { bufs, .. } => bufs.is_empty(),
            Self::RecvBuffers { bufs, .. } | Self::RecvBuffersMore { bufs, .. } => bufs.is_empty(),
            Self::SendMessage { .. } | Self::RecvMessage { .. } => false,
        }
    }

    /// Attempt the operation against the primitive.
    pub(crate) fn run(self, prim: &dyn Primitive) -> RunOutcome {
        match self {
            Self::SendBuffers {
                bufs,
                flags,
                mut cursor,
                handler,
            } => match cursor.step(prim, &bufs, flags) {
                Ok(Step::Complete(n)) => done(move || handler(Ok(n))),
                Ok(_) => RunOutcome::Retained(Self::SendBuffers {
                    bufs,
                    flags,
                    cursor,
                    handler,
                }),
                Err(e) => done(move || handler(Err(e))),
            },
            Self::SendMessage {
                part,
                flags,
                handler,
            } => match prim.try_send(&part) {
                Ok(()) => done(move || handler(Ok(part.len()))),
                Err(e) if e.is_retryable() => RunOutcome::Retained(Self::SendMessage {
                    part,
                    flags,
                    handler,
                }),
                Err(e) => done(move || handler(Err(e))),
            },
            Self::RecvBuffers {
                mut bufs,
                flags,
                mut cursor,
                handler,
            } => match cursor.step(prim, &mut bufs, flags) {
                Ok(Step::Complete(n)) => done(move || handler(Ok(n), bufs)),
                Ok(Step::CompleteMore {
                    bytes,
                    more,
                    overflow,
                }) => done(move || {
                    if overflow {
                        handler(
                            Err(SocketError::NoBufferSpace {
                                transferred: bytes,
                                more,
                            }),
                            bufs,
                        );
                    } else {
                        handler(Ok(bytes), bufs);
                    }
                }),
                Ok(Step::Blocked) => RunOutcome::Retained(Self::RecvBuffers {
                    bufs,
                    flags,
                    cursor,
                    handler,
                }),
                Err(e) => done(move || handler(Err(e), bufs)),
            },
            Self::RecvBuffersMore {
                mut bufs,
                flags,
                mut cursor,
                handler,
            } => match cursor.step(prim, &mut bufs, flags) {
                Ok(Step::Complete(bytes)) => done(move || {
                    handler(Ok(MoreResult { bytes, more: false }), bufs);
                }),
                Ok(Step::CompleteMore { bytes, more, .. }) => done(move || {
                    handler(Ok(MoreResult { bytes, more }), bufs);
                }),
                Ok(Step::Blocked) => RunOutcome::Retained(Self::RecvBuffersMore {
                    bufs,
                    flags,
                    cursor,
                    handler,
                }),
                Err(e) => done(move || handler(Err(e), bufs)),
            },
            Self::RecvMessage { flags, handler } => match prim.try_recv() {
                Ok(part) => done(move || handler(Ok(part))),
                Err(e) if e.is_retryable() => {
                    RunOutcome::Retained(Self::RecvMessage { flags, handler })
                }
                Err(e) => done(move || handler(Err(e))),
            },
        }
    }

    /// Complete the operation with an error without touching the primitive.
    pub(crate) fn complete_err(self, err: SocketError) {
        match self {
            Self::SendBuffers { handler, .. } | Self::SendMessage { handler, .. } => {
                handler(Err(err));
            }
            Self::RecvBuffers { bufs, handler, .. } => handler(Err(err), bufs),
            Self::RecvBuffersMore { bufs, handler, .. } => handler(Err(err), bufs),
            Self::RecvMessage { handler, .. } => handler(Err(err)),
        }
    }

    /// Complete a zero-buffer operation immediately. Callers check
    /// [`is_trivial`](Operation::is_trivial) first; the message variants
    /// are never trivial and fall back to an error completion.
    pub(crate) fn complete_trivial(self) {
        match self {
            Self::SendBuffers { handler, .. } => handler(Ok(0)),
            Self::RecvBuffers { bufs, handler, .. } => handler(Ok(0), bufs),
            Self::RecvBuffersMore { bufs, handler, .. } => handler(
                Ok(MoreResult {
                    bytes: 0,
                    more: false,
                }),
                bufs,
            ),
            op @ (Self::SendMessage { .. } | Self::RecvMessage { .. }) => {
                op.complete_err(SocketError::invalid_state("not a buffer-sequence operation"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outrigger_core::kind::SocketKind;
    use outrigger_core::mem::MemSocket;
    use outrigger_core::primitive::Primitive;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_abort_fires_handler_once_with_buffers() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = Arc::clone(&fired);
        let op = Operation::recv_buffers(
            vec![vec![0u8; 4]],
            0,
            Box::new(move |res, bufs| {
                assert!(matches!(res, Err(SocketError::Aborted)));
                assert_eq!(bufs.len(), 1);
                fired2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        op.complete_err(SocketError::Aborted);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_retains_blocked_send() {
        let prim = MemSocket::open(SocketKind::Pair).unwrap();
        let op = Operation::send_message(Message::from("hi"), 0, Box::new(|_| panic!("not done")));
        // unlinked socket: send is not ready, so the operation is retained
        assert!(matches!(op.run(&*prim), RunOutcome::Retained(_)));
        prim.close();
    }

    #[test]
    fn test_trivial_send_completes_with_zero() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = Arc::clone(&fired);
        let op = Operation::send_buffers(
            Vec::new(),
            0,
            Box::new(move |res| {
                assert_eq!(res.unwrap(), 0);
                fired2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(op.is_trivial());
        op.complete_trivial();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

//! Multipart assembly and disassembly over buffer sequences.
//!
//! Both the synchronous calls and the queued operations drive the same
//! cursors; a cursor remembers its position so an attempt interrupted by
//! `WouldBlock` resumes exactly where it stopped on the next readiness
//! edge.

use bytes::Bytes;
use outrigger_core::error::Result;
use outrigger_core::flags::{self, Flags};
use outrigger_core::message::Message;
use outrigger_core::primitive::Primitive;

/// Outcome of a multipart receive that tracks trailing parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoreResult {
    /// Bytes delivered into the destination buffers so far.
    pub bytes: usize,
    /// True when undelivered parts of the message remain on the socket.
    pub more: bool,
}

/// One cursor step against the primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Every buffer handled; total bytes transferred.
    Complete(usize),
    /// Multipart receive finished or ran out of room.
    ///
    /// `overflow` is set when parts remained after the buffers were
    /// exhausted, or when a part exceeded its destination buffer (the
    /// part is consumed by the primitive and dropped, matching the
    /// native behavior).
    CompleteMore {
        bytes: usize,
        more: bool,
        overflow: bool,
    },
    /// Not ready; retry on the next readiness edge.
    Blocked,
}

/// Disassembles a buffer sequence into outgoing message parts.
///
/// With `SEND_MORE`, the sequence becomes one multipart message (every part
/// except the last flagged "more"); without it, each buffer is sent as an
/// independent complete message.
#[derive(Debug, Default)]
pub(crate) struct SendCursor {
    next: usize,
    sent: usize,
}

impl SendCursor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn step(
        &mut self,
        prim: &dyn Primitive,
        bufs: &[Bytes],
        call_flags: Flags,
    ) -> Result<Step> {
        let multipart = flags::is_send_more(call_flags);
        while self.next < bufs.len() {
            let last = self.next + 1 == bufs.len();
            let part = Message::from(bufs[self.next].clone()).with_more(multipart && !last);
            match prim.try_send(&part) {
                Ok(()) => {
                    self.sent += bufs[self.next].len();
                    self.next += 1;
                }
                Err(e) if e.is_retryable() => return Ok(Step::Blocked),
                Err(e) => return Err(e),
            }
        }
        Ok(Step::Complete(self.sent))
    }
}

/// Assembles incoming message parts into a buffer sequence.
#[derive(Debug, Default)]
pub(crate) struct RecvCursor {
    next: usize,
    bytes: usize,
}

impl RecvCursor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn step(
        &mut self,
        prim: &dyn Primitive,
        bufs: &mut [Vec<u8>],
        call_flags: Flags,
    ) -> Result<Step> {
        if flags::is_recv_more(call_flags) {
            self.step_multipart(prim, bufs)
        } else {
            self.step_sequential(prim, bufs)
        }
    }

    /// One native message per destination buffer; oversized parts are
    /// truncated per the primitive's native behavior, not detected.
    fn step_sequential(&mut self, prim: &dyn Primitive, bufs: &mut [Vec<u8>]) -> Result<Step> {
        while self.next < bufs.len() {
            match prim.try_recv() {
                Ok(part) => {
                    self.bytes += part.copy_out(&mut bufs[self.next]);
                    self.next += 1;
                }
                Err(e) if e.is_retryable() => return Ok(Step::Blocked),
                Err(e) => return Err(e),
            }
        }
        Ok(Step::Complete(self.bytes))
    }

    /// Consecutive parts of one multipart message, one per buffer.
    fn step_multipart(&mut self, prim: &dyn Primitive, bufs: &mut [Vec<u8>]) -> Result<Step> {
        if bufs.is_empty() {
            return Ok(Step::CompleteMore {
                bytes: 0,
                more: false,
                overflow: false,
            });
        }
        loop {
            if self.next == bufs.len() {
                // filled every buffer and the last part still had "more"
                return Ok(Step::CompleteMore {
                    bytes: self.bytes,
                    more: true,
                    overflow: true,
                });
            }
            match prim.try_recv() {
                Ok(part) => {
                    if part.len() > bufs[self.next].len() {
                        return Ok(Step::CompleteMore {
                            bytes: self.bytes,
                            more: part.more(),
                            overflow: true,
                        });
                    }
                    self.bytes += part.copy_out(&mut bufs[self.next]);
                    self.next += 1;
                    if !part.more() {
                        return Ok(Step::CompleteMore {
                            bytes: self.bytes,
                            more: false,
                            overflow: false,
                        });
                    }
                }
                Err(e) if e.is_retryable() => return Ok(Step::Blocked),
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outrigger_core::flags::{RECV_MORE, SEND_MORE};
    use outrigger_core::kind::SocketKind;
    use outrigger_core::mem::MemSocket;
    use outrigger_core::primitive::Primitive;
    use std::sync::Arc;

    fn pair(name: &str) -> (Arc<MemSocket>, Arc<MemSocket>) {
        let endpoint = format!("inproc://{name}");
        let a = MemSocket::open(SocketKind::Pair).unwrap();
        let b = MemSocket::open(SocketKind::Pair).unwrap();
        a.bind(&endpoint).unwrap();
        b.connect(&endpoint).unwrap();
        (a, b)
    }

    #[test]
    fn test_send_cursor_multipart_marks_all_but_last() {
        let (a, b) = pair("mp-send-more");
        let bufs = vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")];
        let mut cursor = SendCursor::new();
        assert_eq!(cursor.step(&*a, &bufs, SEND_MORE).unwrap(), Step::Complete(6));

        let first = b.try_recv().unwrap();
        assert!(first.more());
        let second = b.try_recv().unwrap();
        assert!(!second.more());
        a.close();
        b.close();
    }

    #[test]
    fn test_send_cursor_without_flag_sends_independent_messages() {
        let (a, b) = pair("mp-send-flat");
        let bufs = vec![Bytes::from_static(b"x"), Bytes::from_static(b"y")];
        let mut cursor = SendCursor::new();
        cursor.step(&*a, &bufs, 0).unwrap();
        assert!(!b.try_recv().unwrap().more());
        assert!(!b.try_recv().unwrap().more());
        a.close();
        b.close();
    }

    #[test]
    fn test_send_cursor_empty_sequence_is_noop() {
        let (a, b) = pair("mp-send-empty");
        let mut cursor = SendCursor::new();
        assert_eq!(cursor.step(&*a, &[], SEND_MORE).unwrap(), Step::Complete(0));
        a.close();
        b.close();
    }

    #[test]
    fn test_recv_cursor_sequential_truncates() {
        let (a, b) = pair("mp-recv-seq");
        b.try_send(&Message::from("abcdef")).unwrap();
        b.try_send(&Message::from("gh")).unwrap();

        let mut bufs = vec![vec![0u8; 4], vec![0u8; 4]];
        let mut cursor = RecvCursor::new();
        assert_eq!(cursor.step(&*a, &mut bufs, 0).unwrap(), Step::Complete(6));
        assert_eq!(&bufs[0], b"abcd");
        assert_eq!(&bufs[1][..2], b"gh");
        a.close();
        b.close();
    }

    #[test]
    fn test_recv_cursor_multipart_overflow() {
        let (a, b) = pair("mp-recv-overflow");
        for (payload, more) in [(&b"p1"[..], true), (b"p2", true), (b"p3", false)] {
            b.try_send(&Message::from(payload).with_more(more)).unwrap();
        }

        let mut bufs = vec![vec![0u8; 8], vec![0u8; 8]];
        let mut cursor = RecvCursor::new();
        assert_eq!(
            cursor.step(&*a, &mut bufs, RECV_MORE).unwrap(),
            Step::CompleteMore {
                bytes: 4,
                more: true,
                overflow: true
            }
        );
        // the third part is still on the socket
        assert_eq!(a.try_recv().unwrap().data(), b"p3");
        a.close();
        b.close();
    }

    #[test]
    fn test_recv_cursor_multipart_clean_finish() {
        let (a, b) = pair("mp-recv-clean");
        b.try_send(&Message::from("p1").with_more(true)).unwrap();
        b.try_send(&Message::from("p2")).unwrap();

        let mut bufs = vec![vec![0u8; 8], vec![0u8; 8], vec![0u8; 8]];
        let mut cursor = RecvCursor::new();
        assert_eq!(
            cursor.step(&*a, &mut bufs, RECV_MORE).unwrap(),
            Step::CompleteMore {
                bytes: 4,
                more: false,
                overflow: false
            }
        );
        a.close();
        b.close();
    }

    #[test]
    fn test_recv_cursor_blocks_then_resumes() {
        let (a, b) = pair("mp-recv-resume");
        b.try_send(&Message::from("p1")).unwrap();

        let mut bufs = vec![vec![0u8; 8], vec![0u8; 8]];
        let mut cursor = RecvCursor::new();
        assert_eq!(cursor.step(&*a, &mut bufs, 0).unwrap(), Step::Blocked);

        b.try_send(&Message::from("p2")).unwrap();
        assert_eq!(cursor.step(&*a, &mut bufs, 0).unwrap(), Step::Complete(4));
        assert_eq!(&bufs[0][..2], b"p1");
        assert_eq!(&bufs[1][..2], b"p2");
        a.close();
        b.close();
    }
}

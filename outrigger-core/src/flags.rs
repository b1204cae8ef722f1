//! Per-call flag bitmask.
//!
//! Every send/receive accepts a `u32` combining the markers below.
//! Unrecognized bits are passed through to the primitive untouched.

/// Flag bitmask type accepted by every send/receive call.
pub type Flags = u32;

/// Fail with `WouldBlock` instead of waiting when the call cannot complete
/// immediately.
pub const DONT_WAIT: Flags = 0b001;

/// On send: treat the supplied buffer sequence as one multipart message,
/// flagging every part except the last with "more".
pub const SEND_MORE: Flags = 0b010;

/// On receive: fill the supplied buffer sequence with consecutive parts of
/// one multipart message instead of one independent message per buffer.
pub const RECV_MORE: Flags = 0b100;

/// True when `DONT_WAIT` is set.
#[must_use]
pub const fn is_dont_wait(flags: Flags) -> bool {
    flags & DONT_WAIT != 0
}

/// True when `SEND_MORE` is set.
#[must_use]
pub const fn is_send_more(flags: Flags) -> bool {
    flags & SEND_MORE != 0
}

/// True when `RECV_MORE` is set.
#[must_use]
pub const fn is_recv_more(flags: Flags) -> bool {
    flags & RECV_MORE != 0
}

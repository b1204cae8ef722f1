//! Socket lifecycle event records.
//!
//! A monitored socket republishes its lifecycle transitions onto a second
//! socket as two-part messages: a fixed 6-byte record (`u16` event kind
//! followed by `u32` value, little-endian, no padding), then a text part
//! carrying the associated endpoint. Receivers may discard the second part.

use crate::error::{Result, SocketError};
use crate::message::Message;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// Lifecycle event kinds, as published in the record's first field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventKind {
    /// Outbound association established.
    Connected = 0x0001,
    /// Connect could not complete immediately.
    ConnectDelayed = 0x0002,
    /// Connect is being retried.
    ConnectRetried = 0x0004,
    /// Socket accepted a listen request.
    Listening = 0x0008,
    /// Bind request refused.
    BindFailed = 0x0010,
    /// Listener accepted an inbound peer.
    Accepted = 0x0020,
    /// Accept failed.
    AcceptFailed = 0x0040,
    /// Socket closed.
    Closed = 0x0080,
    /// Close failed.
    CloseFailed = 0x0100,
    /// Peer went away.
    Disconnected = 0x0200,
    /// Monitoring for this socket stopped.
    MonitorStopped = 0x0400,
}

impl EventKind {
    /// Decode a kind code from the wire.
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0x0001 => Self::Connected,
            0x0002 => Self::ConnectDelayed,
            0x0004 => Self::ConnectRetried,
            0x0008 => Self::Listening,
            0x0010 => Self::BindFailed,
            0x0020 => Self::Accepted,
            0x0040 => Self::AcceptFailed,
            0x0080 => Self::Closed,
            0x0100 => Self::CloseFailed,
            0x0200 => Self::Disconnected,
            0x0400 => Self::MonitorStopped,
            _ => return None,
        })
    }

    /// Wire code for this kind.
    #[must_use]
    pub const fn code(&self) -> u16 {
        *self as u16
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Bitmask selecting which lifecycle events a monitor receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask(pub u32);

impl EventMask {
    /// Every event kind.
    pub const ALL: Self = Self(0xFFFF);

    /// No events.
    pub const NONE: Self = Self(0);

    /// Mask selecting a single kind.
    #[must_use]
    pub const fn of(kind: EventKind) -> Self {
        Self(kind.code() as u32)
    }

    /// Union of two masks.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True when `kind` is selected by this mask.
    #[must_use]
    pub const fn contains(&self, kind: EventKind) -> bool {
        self.0 & kind.code() as u32 != 0
    }
}

/// One decoded lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorEvent {
    /// What happened.
    pub kind: EventKind,
    /// Associated value: a handle id or an error code, kind-dependent.
    pub value: u32,
    /// Endpoint the event relates to.
    pub endpoint: String,
}

/// Byte length of the fixed record part.
pub const RECORD_LEN: usize = 6;

impl MonitorEvent {
    /// Encode the fixed record part (kind + value, no padding).
    #[must_use]
    pub fn encode_record(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RECORD_LEN);
        buf.put_u16_le(self.kind.code());
        buf.put_u32_le(self.value);
        buf.freeze()
    }

    /// Encode the event as the two message parts a monitor socket carries.
    #[must_use]
    pub fn encode_parts(&self) -> [Message; 2] {
        [
            Message::from(self.encode_record()).with_more(true),
            Message::from(self.endpoint.as_str()),
        ]
    }

    /// Decode a record part plus its accompanying endpoint part.
    ///
    /// # Errors
    ///
    /// `InvalidState` when the record is short, carries an unknown kind
    /// code, or the endpoint part is not UTF-8.
    pub fn decode(record: &[u8], endpoint: &[u8]) -> Result<Self> {
        if record.len() < RECORD_LEN {
            return Err(SocketError::invalid_state(format!(
                "monitor record too short: {} bytes",
                record.len()
            )));
        }
        let mut buf = record;
        let code = buf.get_u16_le();
        let value = buf.get_u32_le();
        let kind = EventKind::from_code(code).ok_or_else(|| {
            SocketError::invalid_state(format!("unknown monitor event code {code:#06x}"))
        })?;
        let endpoint = std::str::from_utf8(endpoint)
            .map_err(|e| SocketError::invalid_state(format!("monitor endpoint part: {e}")))?
            .to_owned();
        Ok(Self {
            kind,
            value,
            endpoint,
        })
    }
}

impl fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.kind, self.value, self.endpoint)
    }
}

//! Socket option protocol.
//!
//! Options are keyed by a fixed identifier and carry either a fixed-width
//! scalar or a variable-length byte string. A single central table maps each
//! identifier to its value shape and mutability; get/set are two generic
//! pass-through calls validated against that table, not one type per option.

use crate::error::{Result, SocketError};
use bytes::Bytes;
use std::fmt;

/// Option identifiers understood by the bridge and its primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionId {
    /// Socket kind, as set at construction (read-only).
    Type,
    /// Whether the last received part had the more-flag set (read-only).
    RecvMore,
    /// Outgoing high water mark, in messages.
    SendHwm,
    /// Incoming high water mark, in messages.
    RecvHwm,
    /// Linger interval on close, milliseconds.
    Linger,
    /// Send timeout in milliseconds; -1 waits forever.
    SendTimeout,
    /// Receive timeout in milliseconds; -1 waits forever.
    RecvTimeout,
    /// Peer-visible routing identity; frozen once bound or connected.
    RoutingId,
    /// Subscription prefix to add.
    Subscribe,
    /// Subscription prefix to remove.
    Unsubscribe,
    /// Upper bound on a single part's size, bytes.
    MaxMessageSize,
    /// Last endpoint passed to a successful bind or connect (read-only).
    LastEndpoint,
    /// Permit the enqueue-time speculative fast path.
    AllowSpeculative,
}

/// Declared shape of an option's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionShape {
    /// Fixed-width 32-bit integer.
    Int,
    /// Fixed-width 64-bit integer.
    Long,
    /// Boolean scalar.
    Bool,
    /// Variable-length byte string.
    Binary,
}

/// An option value in transit through get/set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Int(i32),
    Long(i64),
    Bool(bool),
    Bytes(Bytes),
}

impl OptionValue {
    /// Shape of this value.
    #[must_use]
    pub const fn shape(&self) -> OptionShape {
        match self {
            Self::Int(_) => OptionShape::Int,
            Self::Long(_) => OptionShape::Long,
            Self::Bool(_) => OptionShape::Bool,
            Self::Bytes(_) => OptionShape::Binary,
        }
    }
}

impl OptionId {
    /// Declared value shape for this identifier.
    #[must_use]
    pub const fn shape(&self) -> OptionShape {
        match self {
            Self::Type
            | Self::SendHwm
            | Self::RecvHwm
            | Self::Linger
            | Self::SendTimeout
            | Self::RecvTimeout => OptionShape::Int,
            Self::MaxMessageSize => OptionShape::Long,
            Self::RecvMore | Self::AllowSpeculative => OptionShape::Bool,
            Self::RoutingId | Self::Subscribe | Self::Unsubscribe | Self::LastEndpoint => {
                OptionShape::Binary
            }
        }
    }

    /// True when the option can only be read, never set.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        matches!(self, Self::Type | Self::RecvMore | Self::LastEndpoint)
    }

    /// True when the option may no longer change after bind/connect.
    #[must_use]
    pub const fn is_frozen_after_link(&self) -> bool {
        matches!(self, Self::RoutingId)
    }

    /// Default value for options that have one.
    #[must_use]
    pub fn default_value(&self) -> Option<OptionValue> {
        match self {
            Self::SendHwm | Self::RecvHwm => Some(OptionValue::Int(1000)),
            Self::Linger => Some(OptionValue::Int(0)),
            Self::SendTimeout | Self::RecvTimeout => Some(OptionValue::Int(-1)),
            Self::MaxMessageSize => Some(OptionValue::Long(-1)),
            Self::AllowSpeculative => Some(OptionValue::Bool(true)),
            Self::RoutingId => Some(OptionValue::Bytes(Bytes::new())),
            _ => None,
        }
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Validate one set-option request against the central table.
///
/// `linked` reports whether the socket has already bound or connected.
///
/// # Errors
///
/// `InvalidOption` for a read-only identifier or a value of the wrong
/// shape, `InvalidState` for a link-frozen option set after bind/connect.
pub fn validate_set(id: OptionId, value: &OptionValue, linked: bool) -> Result<()> {
    if id.is_read_only() {
        return Err(SocketError::invalid_option(format!(
            "{id} is read-only"
        )));
    }
    if value.shape() != id.shape() {
        return Err(SocketError::invalid_option(format!(
            "{id} expects {:?}, got {:?}",
            id.shape(),
            value.shape()
        )));
    }
    if linked && id.is_frozen_after_link() {
        return Err(SocketError::invalid_state(format!(
            "{id} cannot change after bind/connect"
        )));
    }
    Ok(())
}

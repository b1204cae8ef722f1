//! Outrigger Core
//!
//! This crate contains the runtime-agnostic core building blocks:
//! - Message part type with multipart more-flag semantics (`message`)
//! - Error taxonomy shared by every call variant (`error`)
//! - Per-call flag bitmask (`flags`)
//! - Socket kind enumeration (`kind`)
//! - Option identifier/shape table (`options`)
//! - Lifecycle event records and masks (`monitor`)
//! - The native-primitive trait and readiness plumbing (`primitive`)
//! - In-process transport implementing the primitive (`mem`)

#![cfg_attr(not(test), deny(unsafe_code))]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod flags;
pub mod kind;
pub mod mem;
pub mod message;
pub mod monitor;
pub mod options;
pub mod primitive;

// Optional: a small prelude to make downstream crates ergonomic.
// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::error::{Result, SocketError};
    pub use crate::kind::SocketKind;
    pub use crate::mem::MemSocket;
    pub use crate::message::Message;
    pub use crate::monitor::{EventKind, EventMask, MonitorEvent};
    pub use crate::options::{OptionId, OptionShape, OptionValue};
    pub use crate::primitive::{Direction, Primitive, Shutdown, Token};
}

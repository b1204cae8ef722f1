//! # Outrigger
//!
//! A readiness-driven bridge between an event loop and message-oriented
//! sockets.
//!
//! ## Architecture
//!
//! Outrigger is structured in two layers:
//!
//! - **`outrigger-core`**: messages, flags, option and monitor protocols,
//!   the [`Primitive`](outrigger_core::primitive::Primitive) trait, and an
//!   in-process transport that implements it
//! - **`outrigger`**: the bridge itself (this crate): per-socket operation
//!   queues, speculative dispatch, multipart assembly, and the reactor
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use outrigger::{Reactor, Socket, SocketKind};
//!
//! # fn example() -> outrigger::Result<()> {
//! let reactor = Reactor::new();
//! let server = Socket::new(&reactor, SocketKind::Pair)?;
//! server.bind("inproc://greeter")?;
//! let client = Socket::new(&reactor, SocketKind::Pair)?;
//! client.connect("inproc://greeter")?;
//!
//! // Queue an async send; the handler fires from the reactor thread.
//! client.async_send(vec!["hello".into()], 0, |res| {
//!     println!("sent {} bytes", res.unwrap());
//! });
//! reactor.poll();
//!
//! let msg = server.receive_message(0)?;
//! assert_eq!(msg.data(), b"hello");
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! Every native call on a socket runs under a per-socket guard, so handles
//! may be shared across threads. A socket opened with
//! [`Socket::new_single_threaded`] elides the guard; the caller then
//! contracts that one thread drives the reactor and makes every direct
//! call. Queue bookkeeping stays synchronized in both modes, which keeps
//! [`Socket::cancel`] safe from any thread.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod dev_tracing;
pub mod multipart;
mod op;
pub mod reactor;
mod service;
pub mod socket;
mod state;

pub use bytes::Bytes;
pub use multipart::MoreResult;
pub use op::{RecvHandler, RecvMessageHandler, RecvMoreHandler, SendHandler};
pub use outrigger_core::error::{Result, SocketError};
pub use outrigger_core::flags::{self, Flags, DONT_WAIT, RECV_MORE, SEND_MORE};
pub use outrigger_core::kind::SocketKind;
pub use outrigger_core::message::Message;
pub use outrigger_core::monitor::{EventKind, EventMask, MonitorEvent};
pub use outrigger_core::options::{OptionId, OptionValue};
pub use outrigger_core::primitive::Shutdown;
pub use reactor::Reactor;
pub use socket::Socket;

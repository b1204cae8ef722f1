//! The public socket handle.
//!
//! A `Socket` pairs a native messaging primitive with per-direction
//! operation queues on one reactor. Synchronous calls retry against the
//! primitive's timeout options; `async_*` calls queue an operation whose
//! continuation fires from the reactor thread once readiness allows, in
//! strict submission order per direction.

use crate::multipart::MoreResult;
use crate::op::Operation;
use crate::reactor::{Reactor, Shared};
use crate::service;
use crate::state::SocketState;
use bytes::Bytes;
use outrigger_core::error::{Result, SocketError};
use outrigger_core::flags::Flags;
use outrigger_core::kind::SocketKind;
use outrigger_core::mem::MemSocket;
use outrigger_core::message::Message;
use outrigger_core::monitor::{EventMask, MonitorEvent};
use outrigger_core::options::{OptionId, OptionValue};
use outrigger_core::primitive::{Primitive, Shutdown};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_MONITOR: AtomicU64 = AtomicU64::new(1);

/// A messaging socket bridged onto a [`Reactor`].
pub struct Socket {
    state: Arc<SocketState>,
    shared: Arc<Shared>,
}

impl Socket {
    /// Open a socket of `kind` on `reactor`, with the per-socket guard
    /// serializing native calls.
    ///
    /// # Errors
    ///
    /// `SocketCreationFailed` when the primitive cannot be allocated.
    pub fn new(reactor: &Reactor, kind: SocketKind) -> Result<Self> {
        Self::with_primitive(reactor, MemSocket::open(kind)?, false)
    }

    /// Open a socket without the native-call guard.
    ///
    /// The caller contracts that one thread both drives `reactor` and makes
    /// every direct call on this socket. The contract is documented, not
    /// enforced; queue bookkeeping stays internally synchronized either
    /// way, so `cancel` from another thread remains safe.
    pub fn new_single_threaded(reactor: &Reactor, kind: SocketKind) -> Result<Self> {
        Self::with_primitive(reactor, MemSocket::open(kind)?, true)
    }

    fn with_primitive(
        reactor: &Reactor,
        prim: Arc<dyn Primitive>,
        optimize_single_threaded: bool,
    ) -> Result<Self> {
        let shared = Arc::clone(reactor.shared());
        let token = shared.alloc_token();
        prim.register(shared.edges.clone(), token);
        let state = SocketState::new(prim, token, optimize_single_threaded);
        shared.sockets.insert(token, Arc::clone(&state));
        Ok(Self { state, shared })
    }

    /// Kind the socket was opened with.
    ///
    /// # Errors
    ///
    /// `InvalidState` when the socket is closed or moved-from.
    pub fn kind(&self) -> Result<SocketKind> {
        Ok(self.state.primitive()?.kind())
    }

    /// Last endpoint successfully bound or connected; empty before either.
    pub fn endpoint(&self) -> String {
        self.state.inner().endpoint.clone()
    }

    /// Listen at `endpoint`.
    ///
    /// # Errors
    ///
    /// `TransportUnsupported` for an unknown scheme, `AddressInvalid` for a
    /// malformed endpoint, `AddressInUse` when already bound by another
    /// socket.
    pub fn bind(&self, endpoint: &str) -> Result<()> {
        service::bind(&self.state, endpoint)
    }

    /// Associate with a listener at `endpoint`.
    pub fn connect(&self, endpoint: &str) -> Result<()> {
        service::connect(&self.state, endpoint)
    }

    /// Store an option value.
    ///
    /// # Errors
    ///
    /// `InvalidOption` for read-only options or shape mismatches,
    /// `InvalidState` for link-frozen options set after bind/connect.
    pub fn set_option(&self, id: OptionId, value: OptionValue) -> Result<()> {
        service::set_option(&self.state, id, value)
    }

    /// Fetch an option value.
    pub fn get_option(&self, id: OptionId) -> Result<OptionValue> {
        service::get_option(&self.state, id)
    }

    /// Half-close one or both directions. Subsequent calls in a shut
    /// direction fail with `NotConnected`.
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        service::shutdown(&self.state, how)
    }

    /// Fail every queued operation with `Aborted`. Each continuation fires
    /// exactly once; the socket stays usable.
    pub fn cancel(&self) {
        service::cancel(&self.state);
    }

    /// Cancel queued work, release the primitive, and deregister from the
    /// reactor. Idempotent; `Drop` calls this.
    pub fn close(&self) {
        service::close(&self.state, &self.shared);
    }

    /// Send a buffer sequence, blocking per the send timeout option.
    ///
    /// With `SEND_MORE` the sequence goes out as one multipart message;
    /// without it each buffer is an independent complete message. Returns
    /// total bytes sent. An empty sequence is a no-op returning zero.
    ///
    /// # Errors
    ///
    /// `WouldBlock` with `DONT_WAIT` or on timeout, `NotConnected` after
    /// the write half is shut or the peer is gone.
    pub fn send(&self, bufs: &[Bytes], flags: Flags) -> Result<usize> {
        service::send_sync(&self.state, bufs, flags)
    }

    /// Send one prepared message part. Returns the part's length.
    pub fn send_message(&self, part: &Message, flags: Flags) -> Result<usize> {
        service::send_message_sync(&self.state, part, flags)
    }

    /// Receive into a buffer sequence, blocking per the receive timeout.
    ///
    /// Without `RECV_MORE` each buffer takes one whole message, truncating
    /// oversized payloads. With it, consecutive parts of one multipart
    /// message fill consecutive buffers.
    ///
    /// # Errors
    ///
    /// `NoBufferSpace` when `RECV_MORE` assembly runs out of room; the
    /// error carries bytes already delivered and whether parts remain.
    pub fn receive(&self, bufs: &mut [Vec<u8>], flags: Flags) -> Result<usize> {
        service::recv_sync(&self.state, bufs, flags)
    }

    /// Multipart receive reporting trailing parts instead of failing.
    pub fn receive_more(&self, bufs: &mut [Vec<u8>], flags: Flags) -> Result<MoreResult> {
        service::recv_more_sync(&self.state, bufs, flags)
    }

    /// Receive one whole part as an owned message.
    pub fn receive_message(&self, flags: Flags) -> Result<Message> {
        service::recv_message_sync(&self.state, flags)
    }

    /// Receive every part of one message, waiting between parts as needed.
    pub fn receive_all(&self, flags: Flags) -> Result<Vec<Message>> {
        service::recv_all_sync(&self.state, flags)
    }

    /// Queue a buffer-sequence send; `handler` fires with total bytes sent.
    pub fn async_send<H>(&self, bufs: Vec<Bytes>, flags: Flags, handler: H)
    where
        H: FnOnce(Result<usize>) + Send + 'static,
    {
        self.enqueue(Operation::send_buffers(bufs, flags, Box::new(handler)));
    }

    /// Queue a single-part send.
    pub fn async_send_message<H>(&self, part: Message, flags: Flags, handler: H)
    where
        H: FnOnce(Result<usize>) + Send + 'static,
    {
        self.enqueue(Operation::send_message(part, flags, Box::new(handler)));
    }

    /// Queue a buffer-sequence receive; the buffers come back through the
    /// handler along with bytes received.
    pub fn async_receive<H>(&self, bufs: Vec<Vec<u8>>, flags: Flags, handler: H)
    where
        H: FnOnce(Result<usize>, Vec<Vec<u8>>) + Send + 'static,
    {
        self.enqueue(Operation::recv_buffers(bufs, flags, Box::new(handler)));
    }

    /// Queue a multipart receive that reports trailing parts.
    pub fn async_receive_more<H>(&self, bufs: Vec<Vec<u8>>, flags: Flags, handler: H)
    where
        H: FnOnce(Result<MoreResult>, Vec<Vec<u8>>) + Send + 'static,
    {
        self.enqueue(Operation::recv_buffers_more(bufs, flags, Box::new(handler)));
    }

    /// Queue a whole-part receive.
    pub fn async_receive_message<H>(&self, flags: Flags, handler: H)
    where
        H: FnOnce(Result<Message>) + Send + 'static,
    {
        self.enqueue(Operation::recv_message(flags, Box::new(handler)));
    }

    fn enqueue(&self, op: Operation) {
        service::enqueue(&self.state, &self.shared, op);
    }

    /// Take over `other`'s primitive, queues, and endpoint.
    ///
    /// Queued operations keep their order and completion identity; `other`
    /// is left closed and rejects further calls with `InvalidState`. Any
    /// primitive this socket previously held is released first. Both
    /// sockets should live on the same reactor; the readiness registration
    /// travels with the primitive.
    ///
    /// # Errors
    ///
    /// `InvalidState` when `other` is already closed or is this socket.
    pub fn take_from(&self, other: &Socket) -> Result<()> {
        if Arc::ptr_eq(&self.state, &other.state) {
            return Err(SocketError::invalid_state(
                "cannot transfer a socket into itself",
            ));
        }
        if !other.state.inner().open {
            return Err(SocketError::invalid_state("source socket is closed"));
        }
        service::close(&self.state, &self.shared);
        let token = service::transfer(&self.state, &other.state)?;
        other.shared.sockets.remove(&token);
        self.shared.sockets.insert(token, Arc::clone(&self.state));
        Ok(())
    }

    /// Start publishing lifecycle events matching `mask` and return a
    /// connected observer socket.
    ///
    /// Each event arrives on the observer as two parts: a fixed binary
    /// record then the endpoint text. [`receive_event`](Socket::receive_event)
    /// on the observer decodes one event.
    pub fn monitor(&self, reactor: &Reactor, mask: EventMask) -> Result<Socket> {
        let uri = format!(
            "inproc://monitor.v1.{}",
            NEXT_MONITOR.fetch_add(1, Ordering::Relaxed)
        );
        self.state.with_primitive(|prim| prim.monitor(&uri, mask))?;
        let observer = Socket::new(reactor, SocketKind::Pair)?;
        observer.connect(&uri)?;
        Ok(observer)
    }

    /// Receive and decode one lifecycle event from a monitor observer.
    ///
    /// # Errors
    ///
    /// `InvalidState` when the parts on the socket do not form a valid
    /// event record, plus any receive error.
    pub fn receive_event(&self, flags: Flags) -> Result<MonitorEvent> {
        let record = self.receive_message(flags)?;
        if !record.more() {
            return Err(SocketError::invalid_state(
                "monitor record missing endpoint part",
            ));
        }
        let endpoint = self.receive_message(flags)?;
        MonitorEvent::decode(record.data(), endpoint.data())
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.close();
    }
}

//! In-process transport implementing [`Primitive`].
//!
//! Endpoints use the `inproc://` scheme and live in a process-wide registry.
//! A connect links exactly two sockets with a pair of bounded part queues,
//! one per direction; queue capacity comes from the sending side's
//! `SendHwm` option at link time.
//!
//! Readiness is edge-triggered: a registered watcher is signaled only on
//! the empty-to-non-empty transition (readable), the full-to-non-full
//! transition (writable), on link establishment (writable, both ends) and
//! on queue teardown (both directions, so pending operations observe the
//! failure). Blocking waits ride the same queues via condvars.

use crate::error::{Result, SocketError};
use crate::kind::SocketKind;
use crate::message::Message;
use crate::monitor::{EventKind, EventMask, MonitorEvent};
use crate::options::{OptionId, OptionValue};
use crate::primitive::{Direction, Primitive, ReadinessSender, Shutdown, Token};
use dashmap::DashMap;
use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const SCHEME: &str = "inproc://";

/// Process-wide registry of bound endpoints.
static REGISTRY: once_cell::sync::Lazy<DashMap<String, Arc<MemSocket>>> =
    once_cell::sync::Lazy::new(DashMap::new);

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

fn endpoint_name(endpoint: &str) -> Result<&str> {
    let Some(name) = endpoint.strip_prefix(SCHEME) else {
        return Err(SocketError::TransportUnsupported(endpoint.to_owned()));
    };
    if name.is_empty() {
        return Err(SocketError::AddressInvalid(
            "inproc endpoint name cannot be empty".to_owned(),
        ));
    }
    Ok(name)
}

/// Where a handle delivers its readiness edges.
#[derive(Default)]
struct WatchCell {
    inner: Mutex<Option<(ReadinessSender, Token)>>,
}

impl WatchCell {
    fn set(&self, edges: ReadinessSender, token: Token) {
        *self.inner.lock() = Some((edges, token));
    }

    fn signal(&self, dir: Direction) {
        if let Some((edges, token)) = self.inner.lock().as_ref() {
            let _ = edges.send((*token, dir));
        }
    }
}

struct QueueState {
    parts: VecDeque<Message>,
    closed: bool,
}

/// One direction of a link: a bounded FIFO of message parts.
struct PartQueue {
    state: Mutex<QueueState>,
    cond: Condvar,
    capacity: usize,
    /// Signaled readable when the queue leaves empty (or closes).
    reader_watch: Arc<WatchCell>,
    /// Signaled writable when the queue leaves full (or closes).
    writer_watch: Arc<WatchCell>,
}

impl PartQueue {
    fn new(capacity: usize, reader_watch: Arc<WatchCell>, writer_watch: Arc<WatchCell>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                parts: VecDeque::new(),
                closed: false,
            }),
            cond: Condvar::new(),
            capacity: capacity.max(1),
            reader_watch,
            writer_watch,
        }
    }

    fn push(&self, part: Message) -> Result<()> {
        let was_empty;
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(SocketError::NotConnected);
            }
            if state.parts.len() >= self.capacity {
                return Err(SocketError::WouldBlock);
            }
            was_empty = state.parts.is_empty();
            state.parts.push_back(part);
            self.cond.notify_all();
        }
        if was_empty {
            self.reader_watch.signal(Direction::Read);
        }
        Ok(())
    }

    /// Push two parts as one unit: both land or neither does.
    fn push_pair(&self, first: Message, second: Message) -> Result<()> {
        let was_empty;
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(SocketError::NotConnected);
            }
            if state.parts.len() + 2 > self.capacity {
                return Err(SocketError::WouldBlock);
            }
            was_empty = state.parts.is_empty();
            state.parts.push_back(first);
            state.parts.push_back(second);
            self.cond.notify_all();
        }
        if was_empty {
            self.reader_watch.signal(Direction::Read);
        }
        Ok(())
    }

    fn pop(&self) -> Result<Message> {
        let (part, was_full);
        {
            let mut state = self.state.lock();
            match state.parts.pop_front() {
                Some(p) => {
                    was_full = state.parts.len() + 1 >= self.capacity;
                    part = p;
                }
                None if state.closed => return Err(SocketError::NotConnected),
                None => return Err(SocketError::WouldBlock),
            }
            self.cond.notify_all();
        }
        if was_full {
            self.writer_watch.signal(Direction::Write);
        }
        Ok(part)
    }

    fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            self.cond.notify_all();
        }
        self.reader_watch.signal(Direction::Read);
        self.writer_watch.signal(Direction::Write);
    }

    fn is_readable(&self) -> bool {
        let state = self.state.lock();
        state.closed || !state.parts.is_empty()
    }

    fn is_writable(&self) -> bool {
        let state = self.state.lock();
        state.closed || state.parts.len() < self.capacity
    }

    /// Wait until readable or `deadline`; true when (possibly) readable.
    fn wait_readable(&self, deadline: Option<Instant>) -> bool {
        let mut state = self.state.lock();
        while state.parts.is_empty() && !state.closed {
            match deadline {
                Some(d) => {
                    if self.cond.wait_until(&mut state, d).timed_out() {
                        return false;
                    }
                }
                None => self.cond.wait(&mut state),
            }
        }
        true
    }

    fn wait_writable(&self, deadline: Option<Instant>) -> bool {
        let mut state = self.state.lock();
        while state.parts.len() >= self.capacity && !state.closed {
            match deadline {
                Some(d) => {
                    if self.cond.wait_until(&mut state, d).timed_out() {
                        return false;
                    }
                }
                None => self.cond.wait(&mut state),
            }
        }
        true
    }
}

#[derive(Clone)]
struct Link {
    /// Outgoing parts (this socket writes, the peer reads).
    tx: Arc<PartQueue>,
    /// Incoming parts (the peer writes, this socket reads).
    rx: Arc<PartQueue>,
    peer: Weak<MemSocket>,
}

#[derive(Default)]
struct LinkSlot {
    link: Option<Link>,
    /// Set on close/shutdown so waiters without a link stop waiting.
    dead: bool,
}

struct MonitorTap {
    sink: Arc<MemSocket>,
    mask: EventMask,
}

/// An in-process messaging socket.
pub struct MemSocket {
    id: u32,
    kind: SocketKind,
    self_ref: Weak<MemSocket>,
    watch: Arc<WatchCell>,
    slot: Mutex<LinkSlot>,
    link_cond: Condvar,
    opts: Mutex<HashMap<OptionId, OptionValue>>,
    tap: Mutex<Option<MonitorTap>>,
    rcvmore: AtomicBool,
    shut_read: AtomicBool,
    shut_write: AtomicBool,
    closed: AtomicBool,
    bound_at: Mutex<Option<String>>,
    last_endpoint: Mutex<String>,
}

impl MemSocket {
    /// Allocate a fresh handle of the requested kind.
    pub fn open(kind: SocketKind) -> Result<Arc<Self>> {
        let mut opts = HashMap::new();
        for id in [
            OptionId::SendHwm,
            OptionId::RecvHwm,
            OptionId::Linger,
            OptionId::SendTimeout,
            OptionId::RecvTimeout,
            OptionId::MaxMessageSize,
            OptionId::AllowSpeculative,
            OptionId::RoutingId,
        ] {
            if let Some(default) = id.default_value() {
                opts.insert(id, default);
            }
        }
        let socket = Arc::new_cyclic(|weak| Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            self_ref: weak.clone(),
            watch: Arc::new(WatchCell::default()),
            slot: Mutex::new(LinkSlot::default()),
            link_cond: Condvar::new(),
            opts: Mutex::new(opts),
            tap: Mutex::new(None),
            rcvmore: AtomicBool::new(false),
            shut_read: AtomicBool::new(false),
            shut_write: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            bound_at: Mutex::new(None),
            last_endpoint: Mutex::new(String::new()),
        });
        trace!(id = socket.id, kind = %kind, "mem socket opened");
        Ok(socket)
    }

    fn opt_int(&self, id: OptionId) -> i32 {
        match self.opts.lock().get(&id) {
            Some(OptionValue::Int(v)) => *v,
            _ => 0,
        }
    }

    fn current_link(&self) -> Option<Link> {
        self.slot.lock().link.clone()
    }

    fn emit(&self, kind: EventKind, value: u32, endpoint: &str) {
        let tap = self.tap.lock();
        if let Some(tap) = tap.as_ref() {
            if !tap.mask.contains(kind) {
                return;
            }
            let event = MonitorEvent {
                kind,
                value,
                endpoint: endpoint.to_owned(),
            };
            trace!(id = self.id, %event, "monitor event");
            // Best effort: a saturated or unconnected monitor drops the
            // whole event rather than back-pressuring the observed socket.
            // The record and endpoint parts go in as one unit; a half
            // delivered pair would desync every later decode.
            let [record, address] = event.encode_parts();
            if let Some(link) = tap.sink.current_link() {
                let _ = link.tx.push_pair(record, address);
            }
        }
    }

    /// Wire two sockets together. Locks both slots in id order.
    fn establish(a: &Arc<MemSocket>, b: &Arc<MemSocket>, endpoint: &str) -> Result<()> {
        let ab = Arc::new(PartQueue::new(
            a.opt_int(OptionId::SendHwm) as usize,
            Arc::clone(&b.watch),
            Arc::clone(&a.watch),
        ));
        let ba = Arc::new(PartQueue::new(
            b.opt_int(OptionId::SendHwm) as usize,
            Arc::clone(&a.watch),
            Arc::clone(&b.watch),
        ));

        let (first, second) = if a.id <= b.id { (a, b) } else { (b, a) };
        let mut first_slot = first.slot.lock();
        let mut second_slot = second.slot.lock();
        if first_slot.link.is_some() || second_slot.link.is_some() {
            return Err(SocketError::invalid_state(format!(
                "endpoint {endpoint} already has a peer"
            )));
        }
        let (a_slot, b_slot) = if a.id <= b.id {
            (&mut *first_slot, &mut *second_slot)
        } else {
            (&mut *second_slot, &mut *first_slot)
        };
        a_slot.link = Some(Link {
            tx: Arc::clone(&ab),
            rx: Arc::clone(&ba),
            peer: Arc::downgrade(b),
        });
        b_slot.link = Some(Link {
            tx: ba,
            rx: ab,
            peer: Arc::downgrade(a),
        });
        drop(second_slot);
        drop(first_slot);
        a.link_cond.notify_all();
        b.link_cond.notify_all();
        // Linking is the transition into writability for both ends.
        a.watch.signal(Direction::Write);
        b.watch.signal(Direction::Write);
        Ok(())
    }
}

impl Primitive for MemSocket {
    fn kind(&self) -> SocketKind {
        self.kind
    }

    fn bind(&self, endpoint: &str) -> Result<()> {
        let name = match endpoint_name(endpoint) {
            Ok(name) => name,
            Err(e) => {
                self.emit(EventKind::BindFailed, self.id, endpoint);
                return Err(e);
            }
        };
        if self.bound_at.lock().is_some() {
            return Err(SocketError::invalid_state(
                "socket is already bound".to_owned(),
            ));
        }
        let this = self
            .self_ref
            .upgrade()
            .ok_or(SocketError::NotConnected)?;
        match REGISTRY.entry(name.to_owned()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                self.emit(EventKind::BindFailed, self.id, endpoint);
                Err(SocketError::AddressInUse(endpoint.to_owned()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(this);
                *self.bound_at.lock() = Some(name.to_owned());
                *self.last_endpoint.lock() = endpoint.to_owned();
                debug!(id = self.id, endpoint, "bound");
                self.emit(EventKind::Listening, self.id, endpoint);
                Ok(())
            }
        }
    }

    fn connect(&self, endpoint: &str) -> Result<()> {
        let name = endpoint_name(endpoint)?;
        let listener = REGISTRY
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SocketError::AddressInvalid(endpoint.to_owned()))?;
        let this = self
            .self_ref
            .upgrade()
            .ok_or(SocketError::NotConnected)?;
        if Arc::ptr_eq(&this, &listener) {
            return Err(SocketError::AddressInvalid(
                "cannot connect a socket to itself".to_owned(),
            ));
        }
        MemSocket::establish(&this, &listener, endpoint)?;
        *self.last_endpoint.lock() = endpoint.to_owned();
        debug!(id = self.id, peer = listener.id, endpoint, "connected");
        self.emit(EventKind::Connected, listener.id, endpoint);
        listener.emit(EventKind::Accepted, self.id, endpoint);
        Ok(())
    }

    fn try_send(&self, part: &Message) -> Result<()> {
        if self.shut_write.load(Ordering::Acquire) {
            return Err(SocketError::NotConnected);
        }
        match self.current_link() {
            // parts are refcounted, so the clone never copies the payload
            Some(link) => link.tx.push(part.clone()),
            None if self.slot.lock().dead => Err(SocketError::NotConnected),
            None => Err(SocketError::WouldBlock),
        }
    }

    fn try_recv(&self) -> Result<Message> {
        if self.shut_read.load(Ordering::Acquire) {
            return Err(SocketError::NotConnected);
        }
        match self.current_link() {
            Some(link) => {
                let part = link.rx.pop()?;
                self.rcvmore.store(part.more(), Ordering::Release);
                Ok(part)
            }
            None if self.slot.lock().dead => Err(SocketError::NotConnected),
            None => Err(SocketError::WouldBlock),
        }
    }

    fn wait_ready(&self, dir: Direction, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let shut = match dir {
                Direction::Read => &self.shut_read,
                Direction::Write => &self.shut_write,
            };
            if shut.load(Ordering::Acquire) {
                return true; // fail fast in the caller
            }
            if let Some(link) = self.current_link() {
                return match dir {
                    Direction::Read => link.rx.wait_readable(deadline),
                    Direction::Write => link.tx.wait_writable(deadline),
                };
            }
            let mut slot = self.slot.lock();
            if slot.dead {
                return true;
            }
            if slot.link.is_some() {
                continue;
            }
            match deadline {
                Some(d) => {
                    if self.link_cond.wait_until(&mut slot, d).timed_out() {
                        return false;
                    }
                }
                None => self.link_cond.wait(&mut slot),
            }
        }
    }

    fn is_ready(&self, dir: Direction) -> bool {
        match dir {
            Direction::Read => {
                if self.shut_read.load(Ordering::Acquire) {
                    return true;
                }
                match self.current_link() {
                    Some(link) => link.rx.is_readable(),
                    None => self.slot.lock().dead,
                }
            }
            Direction::Write => {
                if self.shut_write.load(Ordering::Acquire) {
                    return true;
                }
                match self.current_link() {
                    Some(link) => link.tx.is_writable(),
                    None => self.slot.lock().dead,
                }
            }
        }
    }

    fn register(&self, edges: ReadinessSender, token: Token) {
        self.watch.set(edges, token);
    }

    fn shutdown(&self, how: Shutdown) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SocketError::invalid_state("socket is closed".to_owned()));
        }
        let link = self.current_link();
        if matches!(how, Shutdown::Read | Shutdown::Both) {
            self.shut_read.store(true, Ordering::Release);
            if let Some(link) = &link {
                link.rx.close();
            }
        }
        if matches!(how, Shutdown::Write | Shutdown::Both) {
            self.shut_write.store(true, Ordering::Release);
            if let Some(link) = &link {
                link.tx.close();
            }
        }
        self.link_cond.notify_all();
        debug!(id = self.id, ?how, "shutdown");
        Ok(())
    }

    fn set_option(&self, id: OptionId, value: OptionValue) -> Result<()> {
        if id == OptionId::Unsubscribe {
            self.opts.lock().remove(&OptionId::Subscribe);
            return Ok(());
        }
        self.opts.lock().insert(id, value);
        Ok(())
    }

    fn get_option(&self, id: OptionId) -> Result<OptionValue> {
        match id {
            OptionId::Type => Ok(OptionValue::Int(self.kind as i32)),
            OptionId::RecvMore => Ok(OptionValue::Bool(self.rcvmore.load(Ordering::Acquire))),
            OptionId::LastEndpoint => Ok(OptionValue::Bytes(bytes::Bytes::copy_from_slice(
                self.last_endpoint.lock().as_bytes(),
            ))),
            _ => self
                .opts
                .lock()
                .get(&id)
                .cloned()
                .ok_or_else(|| SocketError::invalid_option(format!("{id} is not set"))),
        }
    }

    fn monitor(&self, endpoint: &str, mask: EventMask) -> Result<()> {
        let sink = MemSocket::open(SocketKind::Pair)?;
        sink.bind(endpoint)?;
        *self.tap.lock() = Some(MonitorTap { sink, mask });
        debug!(id = self.id, endpoint, "monitoring enabled");
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let endpoint = self.last_endpoint.lock().clone();
        self.emit(EventKind::Closed, self.id, &endpoint);
        self.emit(EventKind::MonitorStopped, self.id, &endpoint);

        if let Some(name) = self.bound_at.lock().take() {
            REGISTRY.remove(&name);
        }

        let link = {
            let mut slot = self.slot.lock();
            slot.dead = true;
            self.link_cond.notify_all();
            slot.link.take()
        };
        if let Some(link) = link {
            link.tx.close();
            link.rx.close();
            if let Some(peer) = link.peer.upgrade() {
                let peer_endpoint = peer.last_endpoint.lock().clone();
                peer.emit(EventKind::Disconnected, self.id, &peer_endpoint);
            }
        }

        if let Some(tap) = self.tap.lock().take() {
            tap.sink.close();
        }
        debug!(id = self.id, "closed");
    }
}

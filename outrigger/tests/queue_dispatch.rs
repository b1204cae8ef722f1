//! Queue discipline: submission-order completion, cancellation, the
//! speculative fast path, and shutdown behavior.

use outrigger::{
    OptionId, OptionValue, Reactor, Shutdown, Socket, SocketError, SocketKind, DONT_WAIT,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn pair(reactor: &Reactor, name: &str) -> (Socket, Socket) {
    let endpoint = format!("inproc://{name}");
    let a = Socket::new(reactor, SocketKind::Pair).unwrap();
    let b = Socket::new(reactor, SocketKind::Pair).unwrap();
    a.bind(&endpoint).unwrap();
    b.connect(&endpoint).unwrap();
    (a, b)
}

#[test]
fn test_async_sends_complete_in_submission_order() {
    outrigger::dev_tracing::init_tracing();
    let reactor = Reactor::new();
    let a = Socket::new(&reactor, SocketKind::Pair).unwrap();
    a.set_option(OptionId::SendHwm, OptionValue::Int(2)).unwrap();
    a.bind("inproc://qd-fifo").unwrap();
    let b = Socket::new(&reactor, SocketKind::Pair).unwrap();
    b.connect("inproc://qd-fifo").unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..5usize {
        let order = Arc::clone(&order);
        a.async_send(vec![format!("msg-{i}").into()], 0, move |res| {
            res.unwrap();
            order.lock().unwrap().push(i);
        });
    }
    // the first two fit under the high water mark and complete inline
    assert_eq!(*order.lock().unwrap(), vec![0, 1]);

    for i in 0..5usize {
        let msg = b.receive_message(0).unwrap();
        assert_eq!(msg.data(), format!("msg-{i}").as_bytes());
        reactor.poll();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_cancel_aborts_each_queued_operation_once() {
    let reactor = Reactor::new();
    let (a, _b) = pair(&reactor, "qd-cancel");

    let aborted = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let aborted = Arc::clone(&aborted);
        a.async_receive_message(0, move |res| {
            assert!(matches!(res, Err(SocketError::Aborted)));
            aborted.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(aborted.load(Ordering::SeqCst), 0);

    a.cancel();
    assert_eq!(aborted.load(Ordering::SeqCst), 3);

    // the socket stays usable after cancel
    _b.send(&["after".into()], 0).unwrap();
    assert_eq!(a.receive_message(0).unwrap().data(), b"after");

    // nothing left for the reactor to complete
    a.cancel();
    assert_eq!(aborted.load(Ordering::SeqCst), 3);
}

#[test]
fn test_close_aborts_pending_operations() {
    let reactor = Reactor::new();
    let (a, _b) = pair(&reactor, "qd-close-pending");

    let aborted = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let aborted = Arc::clone(&aborted);
        a.async_receive_message(0, move |res| {
            assert!(matches!(res, Err(SocketError::Aborted)));
            aborted.fetch_add(1, Ordering::SeqCst);
        });
    }

    // close must deliver every pending continuation exactly once
    a.close();
    assert_eq!(aborted.load(Ordering::SeqCst), 2);

    // nothing lingers for the reactor to find afterwards
    reactor.poll();
    assert_eq!(aborted.load(Ordering::SeqCst), 2);
}

#[test]
fn test_cancel_racing_dispatch_never_strands_a_completion() {
    let reactor = Arc::new(Reactor::new());
    let a = Socket::new(&reactor, SocketKind::Pair).unwrap();
    a.set_option(OptionId::SendHwm, OptionValue::Int(1)).unwrap();
    a.bind("inproc://qd-race").unwrap();
    let b = Socket::new(&reactor, SocketKind::Pair).unwrap();
    b.connect("inproc://qd-race").unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let driver = {
        let reactor = Arc::clone(&reactor);
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                reactor.run_one(Some(Duration::from_millis(1)));
            }
        })
    };

    let completed = Arc::new(AtomicUsize::new(0));
    let mut submitted = 0usize;
    for i in 0..200usize {
        let completed = Arc::clone(&completed);
        a.async_send(vec!["payload".into()], 0, move |_res| {
            completed.fetch_add(1, Ordering::SeqCst);
        });
        submitted += 1;
        if i % 3 == 0 {
            let _ = b.receive_message(DONT_WAIT);
        }
        if i % 5 == 0 {
            a.cancel();
        }
    }
    a.cancel();
    stop.store(true, Ordering::SeqCst);
    driver.join().unwrap();
    reactor.poll();
    a.cancel();

    // every submission completed (sent or aborted), none twice, none lost
    assert_eq!(completed.load(Ordering::SeqCst), submitted);
}

#[test]
fn test_speculative_receive_completes_inline() {
    let reactor = Reactor::new();
    let (a, b) = pair(&reactor, "qd-spec");
    b.send(&["ready".into()], 0).unwrap();

    let fired = Arc::new(AtomicBool::new(false));
    let fired2 = Arc::clone(&fired);
    a.async_receive_message(0, move |res| {
        assert_eq!(res.unwrap().data(), b"ready");
        fired2.store(true, Ordering::SeqCst);
    });
    // completed during the call, before any reactor turn
    assert!(fired.load(Ordering::SeqCst));
}

#[test]
fn test_disabled_speculation_defers_to_the_reactor() {
    let reactor = Reactor::new();
    let (a, b) = pair(&reactor, "qd-nospec");
    a.set_option(OptionId::AllowSpeculative, OptionValue::Bool(false))
        .unwrap();
    b.send(&["deferred".into()], 0).unwrap();

    let fired = Arc::new(AtomicBool::new(false));
    let fired2 = Arc::clone(&fired);
    a.async_receive_message(0, move |res| {
        assert_eq!(res.unwrap().data(), b"deferred");
        fired2.store(true, Ordering::SeqCst);
    });
    assert!(!fired.load(Ordering::SeqCst));

    // the self-posted edge wakes the reactor even without a transition
    assert!(reactor.poll() > 0);
    assert!(fired.load(Ordering::SeqCst));
}

#[test]
fn test_shutdown_direction_fails_immediately() {
    let reactor = Reactor::new();
    let (a, b) = pair(&reactor, "qd-shutdown");

    a.shutdown(Shutdown::Write).unwrap();
    assert!(matches!(
        a.send(&["x".into()], 0),
        Err(SocketError::NotConnected)
    ));
    // the read half still works
    b.send(&["still-open".into()], 0).unwrap();
    assert_eq!(a.receive_message(0).unwrap().data(), b"still-open");

    a.shutdown(Shutdown::Read).unwrap();
    assert!(matches!(
        a.receive_message(0),
        Err(SocketError::NotConnected)
    ));

    // async submissions in a shut direction fail without queueing
    let fired = Arc::new(AtomicBool::new(false));
    let fired2 = Arc::clone(&fired);
    a.async_send_message("x".into(), 0, move |res| {
        assert!(matches!(res, Err(SocketError::NotConnected)));
        fired2.store(true, Ordering::SeqCst);
    });
    assert!(fired.load(Ordering::SeqCst));
}

#[test]
fn test_zero_length_sequences_are_noops() {
    let reactor = Reactor::new();
    let (a, _b) = pair(&reactor, "qd-empty");

    assert_eq!(a.send(&[], 0).unwrap(), 0);

    let fired = Arc::new(AtomicBool::new(false));
    let fired2 = Arc::clone(&fired);
    a.async_receive(Vec::new(), 0, move |res, bufs| {
        assert_eq!(res.unwrap(), 0);
        assert!(bufs.is_empty());
        fired2.store(true, Ordering::SeqCst);
    });
    assert!(fired.load(Ordering::SeqCst));
}

#[test]
fn test_dont_wait_and_timeout_surface_would_block() {
    let reactor = Reactor::new();
    let (a, _b) = pair(&reactor, "qd-timeout");

    assert!(matches!(
        a.receive_message(DONT_WAIT),
        Err(SocketError::WouldBlock)
    ));

    a.set_option(OptionId::RecvTimeout, OptionValue::Int(50))
        .unwrap();
    let start = Instant::now();
    assert!(matches!(
        a.receive_message(0),
        Err(SocketError::WouldBlock)
    ));
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn test_closed_socket_rejects_operations() {
    let reactor = Reactor::new();
    let (a, _b) = pair(&reactor, "qd-closed");

    a.close();
    assert!(matches!(
        a.send(&["x".into()], 0),
        Err(SocketError::InvalidState(_))
    ));
    assert!(matches!(
        a.receive_message(0),
        Err(SocketError::InvalidState(_))
    ));

    let fired = Arc::new(AtomicBool::new(false));
    let fired2 = Arc::clone(&fired);
    a.async_receive_message(0, move |res| {
        assert!(matches!(res, Err(SocketError::InvalidState(_))));
        fired2.store(true, Ordering::SeqCst);
    });
    assert!(fired.load(Ordering::SeqCst));
}

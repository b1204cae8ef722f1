//! Multipart framing across the public socket surface.

use outrigger::{Reactor, Socket, SocketError, SocketKind, RECV_MORE, SEND_MORE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn pair(reactor: &Reactor, name: &str) -> (Socket, Socket) {
    let endpoint = format!("inproc://{name}");
    let a = Socket::new(reactor, SocketKind::Pair).unwrap();
    let b = Socket::new(reactor, SocketKind::Pair).unwrap();
    a.bind(&endpoint).unwrap();
    b.connect(&endpoint).unwrap();
    (a, b)
}

#[test]
fn test_send_more_frames_one_multipart_message() {
    let reactor = Reactor::new();
    let (a, b) = pair(&reactor, "mt-frame");

    let sent = a
        .send(&["alpha".into(), "beta".into(), "gamma".into()], SEND_MORE)
        .unwrap();
    assert_eq!(sent, 14);

    let first = b.receive_message(0).unwrap();
    assert!(first.more());
    assert_eq!(first.data(), b"alpha");
    let second = b.receive_message(0).unwrap();
    assert!(second.more());
    let third = b.receive_message(0).unwrap();
    assert!(!third.more());
    assert_eq!(third.data(), b"gamma");
}

#[test]
fn test_recv_more_assembles_into_buffers() {
    let reactor = Reactor::new();
    let (a, b) = pair(&reactor, "mt-assemble");
    a.send(&["head".into(), "tail".into()], SEND_MORE).unwrap();

    let mut bufs = vec![vec![0u8; 8]; 4];
    let result = b.receive_more(&mut bufs, 0).unwrap();
    assert_eq!(result.bytes, 8);
    assert!(!result.more);
    assert_eq!(&bufs[0][..4], b"head");
    assert_eq!(&bufs[1][..4], b"tail");
}

#[test]
fn test_overflow_reports_no_buffer_space_and_leaves_tail() {
    let reactor = Reactor::new();
    let (a, b) = pair(&reactor, "mt-overflow");
    a.send(&["p1".into(), "p2".into(), "p3".into()], SEND_MORE)
        .unwrap();

    let mut bufs = vec![vec![0u8; 8]; 2];
    let err = b.receive(&mut bufs, RECV_MORE).unwrap_err();
    match err {
        SocketError::NoBufferSpace { transferred, more } => {
            assert_eq!(transferred, 4);
            assert!(more);
        }
        other => panic!("expected NoBufferSpace, got {other:?}"),
    }

    // the undelivered tail is still on the socket
    let rest = b.receive_all(0).unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].data(), b"p3");
    assert!(!rest[0].more());
}

#[test]
fn test_receive_all_collects_every_part() {
    let reactor = Reactor::new();
    let (a, b) = pair(&reactor, "mt-all");
    a.send(&["one".into(), "two".into(), "three".into()], SEND_MORE)
        .unwrap();

    let parts = b.receive_all(0).unwrap();
    assert_eq!(parts.len(), 3);
    assert!(parts[0].more());
    assert!(parts[1].more());
    assert!(!parts[2].more());
    assert_eq!(parts[2].data(), b"three");
}

#[test]
fn test_sequential_receive_truncates_oversized_payloads() {
    let reactor = Reactor::new();
    let (a, b) = pair(&reactor, "mt-truncate");
    a.send(&["longer-than-four".into()], 0).unwrap();
    a.send(&["ok".into()], 0).unwrap();

    let mut bufs = vec![vec![0u8; 4], vec![0u8; 4]];
    let n = b.receive(&mut bufs, 0).unwrap();
    assert_eq!(n, 6);
    assert_eq!(&bufs[0], b"long");
    assert_eq!(&bufs[1][..2], b"ok");
}

#[test]
fn test_async_receive_more_reports_trailing_parts() {
    let reactor = Reactor::new();
    let (a, b) = pair(&reactor, "mt-async-more");
    a.send(&["x1".into(), "x2".into(), "x3".into()], SEND_MORE)
        .unwrap();

    let fired = Arc::new(AtomicBool::new(false));
    let fired2 = Arc::clone(&fired);
    b.async_receive_more(vec![vec![0u8; 8]; 2], 0, move |res, bufs| {
        let result = res.unwrap();
        assert_eq!(result.bytes, 4);
        assert!(result.more);
        assert_eq!(&bufs[0][..2], b"x1");
        fired2.store(true, Ordering::SeqCst);
    });
    reactor.poll();
    assert!(fired.load(Ordering::SeqCst));
}

#[test]
fn test_async_receive_resumes_across_blocked_parts() {
    let reactor = Reactor::new();
    let (a, b) = pair(&reactor, "mt-resume");
    a.send(&["first".into()], 0).unwrap();

    let fired = Arc::new(AtomicBool::new(false));
    let fired2 = Arc::clone(&fired);
    b.async_receive(vec![vec![0u8; 8], vec![0u8; 8]], 0, move |res, bufs| {
        assert_eq!(res.unwrap(), 11);
        assert_eq!(&bufs[0][..5], b"first");
        assert_eq!(&bufs[1][..6], b"second");
        fired2.store(true, Ordering::SeqCst);
    });
    reactor.poll();
    // one part delivered, the operation stays queued for the second
    assert!(!fired.load(Ordering::SeqCst));

    a.send(&["second".into()], 0).unwrap();
    reactor.poll();
    assert!(fired.load(Ordering::SeqCst));
}

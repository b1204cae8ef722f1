//! Socket kind enumeration.
//!
//! A single concrete socket type is parameterized by this enum at
//! construction; kinds never diverge behaviorally inside the bridge, they
//! are metadata the primitive interprets.

use std::fmt;

/// Messaging socket kinds, discriminants matching the wire-level codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SocketKind {
    /// Exclusive two-way link between exactly two peers.
    Pair = 0,

    /// Fans messages out to every matching subscriber.
    Pub = 1,

    /// Receives from publishers, filtered by subscription prefix.
    Sub = 2,

    /// Request side of a strictly alternating request-reply dialog.
    Req = 3,

    /// Reply side of the same dialog.
    Rep = 4,

    /// Request side without the lockstep constraint.
    Dealer = 5,

    /// Addresses individual peers by routing identity.
    Router = 6,

    /// Pulls work items from upstream pushers.
    Pull = 7,

    /// Hands work items round-robin to downstream pullers.
    Push = 8,

    /// Publisher that also surfaces subscription messages upstream.
    XPub = 9,

    /// Subscriber driving its subscriptions with explicit messages.
    XSub = 10,

    /// Raw byte-stream peer, no message framing.
    Stream = 11,
}

impl SocketKind {
    /// Short uppercase name for logs and diagnostics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pair => "PAIR",
            Self::Pub => "PUB",
            Self::Sub => "SUB",
            Self::Req => "REQ",
            Self::Rep => "REP",
            Self::Dealer => "DEALER",
            Self::Router => "ROUTER",
            Self::Pull => "PULL",
            Self::Push => "PUSH",
            Self::XPub => "XPUB",
            Self::XSub => "XSUB",
            Self::Stream => "STREAM",
        }
    }

    /// Whether a link between this kind and `peer` carries traffic.
    #[must_use]
    pub fn is_compatible(&self, peer: SocketKind) -> bool {
        matches!(
            (self, peer),
            (Self::Pair, Self::Pair)
                | (Self::Pub, Self::Sub)
                | (Self::Sub, Self::Pub)
                | (Self::Req, Self::Rep)
                | (Self::Rep, Self::Req)
                | (Self::Req, Self::Router)
                | (Self::Router, Self::Req)
                | (Self::Dealer, Self::Rep)
                | (Self::Rep, Self::Dealer)
                | (Self::Dealer, Self::Router)
                | (Self::Router, Self::Dealer)
                | (Self::Dealer, Self::Dealer)
                | (Self::Router, Self::Router)
                | (Self::Push, Self::Pull)
                | (Self::Pull, Self::Push)
                | (Self::XPub, Self::XSub)
                | (Self::XSub, Self::XPub)
                | (Self::Stream, Self::Stream)
        )
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(SocketKind::Dealer.to_string(), "DEALER");
        assert_eq!(SocketKind::Pair.to_string(), "PAIR");
    }

    #[test]
    fn test_kind_compatibility() {
        assert!(SocketKind::Req.is_compatible(SocketKind::Rep));
        assert!(SocketKind::Pair.is_compatible(SocketKind::Pair));
        assert!(SocketKind::Push.is_compatible(SocketKind::Pull));

        assert!(!SocketKind::Req.is_compatible(SocketKind::Dealer));
        assert!(!SocketKind::Pub.is_compatible(SocketKind::Pull));
    }
}

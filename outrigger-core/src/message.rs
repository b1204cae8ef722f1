//! A single message part.
//!
//! Multipart messages are delivered as an ordered sequence of parts; every
//! part except the last carries the more-flag. The part owns its payload as
//! refcounted [`Bytes`], so cloning a part never copies the payload.

use bytes::Bytes;

/// One part of a (possibly multipart) message.
///
/// # Examples
///
/// ```
/// use outrigger_core::message::Message;
///
/// let part = Message::from("hello").with_more(true);
/// assert_eq!(part.len(), 5);
/// assert!(part.more());
///
/// let mut dst = [0u8; 3];
/// // copy-out truncates to the destination, returning the bytes copied
/// assert_eq!(part.copy_out(&mut dst), 3);
/// assert_eq!(&dst, b"hel");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    data: Bytes,
    more: bool,
}

impl Message {
    /// Create an empty part with the more-flag clear.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: Bytes::new(),
            more: false,
        }
    }

    /// Build a part from a payload and an explicit more-flag.
    #[must_use]
    pub fn with_more(mut self, more: bool) -> Self {
        self.more = more;
        self
    }

    /// Set the more-flag in place.
    pub fn set_more(&mut self, more: bool) {
        self.more = more;
    }

    /// True when further parts of the same logical message follow this one.
    #[must_use]
    pub const fn more(&self) -> bool {
        self.more
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the payload.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the part and return its payload.
    #[must_use]
    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// Copy the payload into `dst`, truncating to whichever side is shorter.
    ///
    /// Returns the number of bytes copied. Excess payload beyond `dst` is
    /// dropped; this mirrors the native truncation behavior of the
    /// underlying primitive and is deliberately not treated as an error.
    pub fn copy_out(&self, dst: &mut [u8]) -> usize {
        let n = self.data.len().min(dst.len());
        dst[..n].copy_from_slice(&self.data[..n]);
        n
    }
}

impl From<Bytes> for Message {
    fn from(data: Bytes) -> Self {
        Self { data, more: false }
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
            more: false,
        }
    }
}

impl From<&[u8]> for Message {
    fn from(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
            more: false,
        }
    }
}

impl From<&str> for Message {
    fn from(data: &str) -> Self {
        Self {
            data: Bytes::copy_from_slice(data.as_bytes()),
            more: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_out_truncates() {
        let part = Message::from(&b"abcdef"[..]);
        let mut dst = [0u8; 4];
        assert_eq!(part.copy_out(&mut dst), 4);
        assert_eq!(&dst, b"abcd");
    }

    #[test]
    fn test_copy_out_short_payload() {
        let part = Message::from("ab");
        let mut dst = [0u8; 8];
        assert_eq!(part.copy_out(&mut dst), 2);
        assert_eq!(&dst[..2], b"ab");
    }

    #[test]
    fn test_more_flag() {
        let part = Message::from("x").with_more(true);
        assert!(part.more());
        let mut part = part;
        part.set_more(false);
        assert!(!part.more());
    }

    #[test]
    fn test_empty_default() {
        let part = Message::new();
        assert!(part.is_empty());
        assert!(!part.more());
        assert_eq!(part.len(), 0);
    }
}

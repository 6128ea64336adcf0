//! Outbound messages and the pre-open send queue.
//!
//! Messages submitted while a socket is still connecting wait in an
//! [`OutboundQueue`]. The queue belongs to exactly one connection and is
//! drained once, in order, right after the handshake; afterwards it refuses
//! new messages so nothing can be stranded in it.

use std::collections::VecDeque;

use bytes::Bytes;
use thiserror::Error;

/// Message sent to the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Command string.
    Text(String),
    /// Opaque binary buffer.
    Binary(Bytes),
}

impl OutboundMessage {
    /// Text content, if this is a command string.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            OutboundMessage::Text(text) => Some(text),
            OutboundMessage::Binary(_) => None,
        }
    }

    /// Length of the message in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            OutboundMessage::Text(text) => text.len(),
            OutboundMessage::Binary(bytes) => bytes.len(),
        }
    }

    /// Whether the message has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl From<&str> for OutboundMessage {
    fn from(value: &str) -> Self { OutboundMessage::Text(value.to_owned()) }
}

impl From<String> for OutboundMessage {
    fn from(value: String) -> Self { OutboundMessage::Text(value) }
}

impl From<Vec<u8>> for OutboundMessage {
    fn from(value: Vec<u8>) -> Self { OutboundMessage::Binary(Bytes::from(value)) }
}

impl From<Bytes> for OutboundMessage {
    fn from(value: Bytes) -> Self { OutboundMessage::Binary(value) }
}

/// Errors raised by [`OutboundQueue`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OutboundError {
    /// The queue was already flushed; the connection sends directly now.
    #[error("outbound queue already drained")]
    Drained,
}

/// FIFO of messages submitted before the connection opened.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: VecDeque<OutboundMessage>,
    drained: bool,
}

impl OutboundQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append a message.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError::Drained`] once the queue has been flushed.
    pub fn push(&mut self, message: OutboundMessage) -> Result<(), OutboundError> {
        if self.drained {
            return Err(OutboundError::Drained);
        }
        self.pending.push_back(message);
        Ok(())
    }

    /// Take every queued message in submission order.
    ///
    /// ```
    /// use docwire::outbound::{OutboundError, OutboundQueue};
    ///
    /// let mut queue = OutboundQueue::new();
    /// queue.push("a".into()).unwrap();
    /// queue.push("b".into()).unwrap();
    /// let sent: Vec<_> = queue.drain().unwrap().collect();
    /// assert_eq!(sent.len(), 2);
    /// assert_eq!(queue.drain().err(), Some(OutboundError::Drained));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError::Drained`] on the second call.
    pub fn drain(&mut self) -> Result<std::collections::vec_deque::IntoIter<OutboundMessage>, OutboundError> {
        if self.drained {
            return Err(OutboundError::Drained);
        }
        self.drained = true;
        Ok(std::mem::take(&mut self.pending).into_iter())
    }

    /// Number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize { self.pending.len() }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.pending.is_empty() }

    /// Whether the queue has been flushed.
    #[must_use]
    pub fn is_drained(&self) -> bool { self.drained }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn rejects_push_after_drain() {
        let mut queue = OutboundQueue::new();
        queue.push("useractive".into()).expect("push");
        let _ = queue.drain().expect("first drain");
        assert_eq!(queue.push("late".into()), Err(OutboundError::Drained));
        assert!(queue.is_empty());
        assert!(queue.is_drained());
    }

    #[test]
    fn binary_messages_have_no_text() {
        let message = OutboundMessage::from(vec![1_u8, 2, 3]);
        assert_eq!(message.as_text(), None);
        assert_eq!(message.len(), 3);
    }

    proptest! {
        #[test]
        fn drains_in_submission_order(commands in proptest::collection::vec("[a-z]{1,12}", 0..64)) {
            let mut queue = OutboundQueue::new();
            for command in &commands {
                queue.push(command.as_str().into()).expect("push");
            }
            let drained: Vec<String> = queue
                .drain()
                .expect("drain")
                .filter_map(|m| m.as_text().map(str::to_owned))
                .collect();
            prop_assert_eq!(drained, commands);
        }
    }
}

//! A multi-subscriber notification publisher.
//!
//! Every long-lived stream of outbound events (expression updates,
//! visualization payloads, suggestions-database changes) is fanned out to
//! however many subscribers currently care through one of these. Cloning a
//! publisher re-publishes onto the same underlying broadcast buffer rather
//! than creating an independent one, which is what lets a component hand out
//! a `Publisher` to several call sites while still emitting once.

use crate::clone_ref::CloneRef;
use std::any::TypeId;
use std::fmt;

/// Buffer size for a notification publisher.
///
/// If a subscriber falls behind by more than this many messages, publishing
/// blocks (async) until it catches up. Sessions are expected to keep up with
/// their own execution contexts, so this only needs to absorb short bursts.
const NOTIFICATION_BUFFER_SIZE: usize = 64;

/// A notification publisher.
///
/// Wraps [`flo_stream::Publisher`] to additionally implement `Debug` and
/// [`CloneRef`] (cloning republishes onto the same stream).
pub struct Publisher<Message>(pub flo_stream::Publisher<Message>);

impl<Message: Clone> Publisher<Message> {
    /// Create a new publisher with the default buffer size.
    pub fn new() -> Self {
        Self(flo_stream::Publisher::new(NOTIFICATION_BUFFER_SIZE))
    }

    /// Publish a message to all current and future subscribers.
    pub async fn publish(&mut self, message: Message) {
        self.0.publish(message).await
    }

    /// Subscribe to this publisher's stream of messages.
    ///
    /// The subscriber only observes messages published after it subscribes.
    pub fn subscribe(&mut self) -> flo_stream::Subscriber<Message> {
        self.0.subscribe()
    }
}

impl<Message: Clone> Default for Publisher<Message> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Message: 'static> fmt::Debug for Publisher<Message> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notification::Publisher<{:?}>", TypeId::of::<Message>())
    }
}

impl<Message: Clone> Clone for Publisher<Message> {
    fn clone(&self) -> Self {
        let Self(inner) = self;
        Self(inner.republish())
    }
}

impl<Message: Clone> CloneRef for Publisher<Message> {
    fn clone_ref(&self) -> Self {
        self.clone()
    }
}

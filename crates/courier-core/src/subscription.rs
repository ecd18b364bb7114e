//! Subscriber registry and message streams.
//!
//! Inbound messages fan out two ways: registered callbacks run
//! synchronously in the delivery path, and each live [`MessageStream`] gets
//! a copy pushed onto its own unbounded queue. Dropping a handle or stream
//! unregisters it; a forgotten stream can never wedge delivery for the
//! others.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use courier_store::PlaintextMessage;
use futures::Stream;
use tokio::sync::mpsc;
use tracing::debug;

type Callback = Box<dyn Fn(&PlaintextMessage) + Send + Sync>;

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    callbacks: HashMap<u64, Callback>,
    streams: HashMap<u64, mpsc::UnboundedSender<PlaintextMessage>>,
}

/// Shared fan-out registry.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. Dropping the returned handle unregisters it.
    pub fn subscribe(&self, callback: impl Fn(&PlaintextMessage) + Send + Sync + 'static) -> SubscriptionHandle {
        let id = {
            let mut inner = lock(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.callbacks.insert(id, Box::new(callback));
            id
        };
        SubscriptionHandle {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Open a new message stream. Each stream is independent and starts at
    /// the next delivered message; dropping it unregisters the queue.
    pub fn stream(&self) -> MessageStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = {
            let mut inner = lock(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.streams.insert(id, sender);
            id
        };
        MessageStream {
            id,
            receiver,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver a message to every subscriber.
    ///
    /// Callbacks run synchronously, in registration order. Streams whose
    /// receiving half is gone are pruned.
    pub fn publish(&self, message: &PlaintextMessage) {
        let mut inner = lock(&self.inner);

        let mut ids: Vec<u64> = inner.callbacks.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            if let Some(callback) = inner.callbacks.get(&id) {
                callback(message);
            }
        }

        inner
            .streams
            .retain(|id, sender| match sender.send(message.clone()) {
                Ok(()) => true,
                Err(_) => {
                    debug!(stream = id, "Pruned closed message stream");
                    false
                }
            });
    }

    /// Number of live subscribers (callbacks plus streams).
    pub fn len(&self) -> usize {
        let inner = lock(&self.inner);
        inner.callbacks.len() + inner.streams.len()
    }

    /// Whether no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock(inner: &Arc<Mutex<RegistryInner>>) -> std::sync::MutexGuard<'_, RegistryInner> {
    // Poisoning can only come from a subscriber callback panicking
    // mid-publish; the registry maps themselves stay consistent.
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Handle for a registered callback. Unsubscribes on drop.
pub struct SubscriptionHandle {
    id: u64,
    registry: Weak<Mutex<RegistryInner>>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            lock(&inner).callbacks.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SubscriptionHandle({})", self.id)
    }
}

/// A pull stream of inbound messages. Unregisters on drop.
pub struct MessageStream {
    id: u64,
    receiver: mpsc::UnboundedReceiver<PlaintextMessage>,
    registry: Weak<Mutex<RegistryInner>>,
}

impl Stream for MessageStream {
    type Item = PlaintextMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for MessageStream {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            lock(&inner).streams.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MessageStream({})", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_crypto::SigningKeyPair;
    use courier_store::{ConversationId, MessageId};
    use courier_protocol::AccountId;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn message(text: &str) -> PlaintextMessage {
        let keypair = SigningKeyPair::generate();
        let a = AccountId::new(1).unwrap();
        let b = AccountId::new(2).unwrap();
        PlaintextMessage {
            id: MessageId::generate(),
            conversation_id: ConversationId::new(a, b),
            sender_id: b,
            recipient_id: a,
            text: text.into(),
            embeds: Vec::new(),
            reply_to: None,
            timestamp: 1,
            signature: keypair.sign(b"test"),
            is_read: false,
        }
    }

    #[test]
    fn test_callback_invoked_once_per_message() {
        let registry = SubscriptionRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let _handle = registry.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.publish(&message("one"));
        registry.publish(&message("two"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropping_handle_unsubscribes() {
        let registry = SubscriptionRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let handle = registry.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        registry.publish(&message("before"));
        drop(handle);
        registry.publish(&message("after"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_stream_receives_messages() {
        let registry = SubscriptionRegistry::new();
        let mut stream = registry.stream();

        registry.publish(&message("hello"));
        let received = stream.next().await.unwrap();
        assert_eq!(received.text, "hello");
    }

    #[tokio::test]
    async fn test_streams_are_independent() {
        let registry = SubscriptionRegistry::new();
        let mut first = registry.stream();

        registry.publish(&message("one"));
        // Opened after the first publish, so it only sees the second.
        let mut second = registry.stream();
        registry.publish(&message("two"));

        assert_eq!(first.next().await.unwrap().text, "one");
        assert_eq!(first.next().await.unwrap().text, "two");
        assert_eq!(second.next().await.unwrap().text, "two");
    }

    #[tokio::test]
    async fn test_dropped_stream_is_pruned() {
        let registry = SubscriptionRegistry::new();
        let stream = registry.stream();
        assert_eq!(registry.len(), 1);

        drop(stream);
        assert!(registry.is_empty());

        // Publishing after the drop must not fail.
        registry.publish(&message("nobody listening"));
    }

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let registry = SubscriptionRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = order.clone();
        let _a = registry.subscribe(move |_| first.lock().unwrap().push("first"));
        let second = order.clone();
        let _b = registry.subscribe(move |_| second.lock().unwrap().push("second"));

        registry.publish(&message("x"));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }
}

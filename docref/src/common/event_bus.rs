use crate::errors::{DocrefError, DocrefResult, ErrorKind};
use basu::error::BasuError;
use basu::event::Event;
use basu::{EventBus, Handle, HandlerId};
use std::marker::PhantomData;
use std::sync::Arc;

/// A topic-keyed publish/subscribe bus.
///
/// Listeners register against a topic (an event name such as
/// `entity.Category.replaceOne`) and receive every event published on that
/// topic. Publishing to a topic without listeners is a cheap no-op.
///
/// # Example
///
/// ```ignore
/// let bus: DocrefEventBus<AfterEventInfo, AfterListener> = DocrefEventBus::new();
/// let subscriber = bus.register("entity.Category.replaceOne", listener)?;
/// bus.publish("entity.Category.replaceOne", info)?;
/// bus.deregister(subscriber)?;
/// ```
#[derive(Clone)]
pub struct DocrefEventBus<E, L> {
    inner: Arc<DocrefEventBusInner<E, L>>,
}

impl<E, L> Default for DocrefEventBus<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, L> DocrefEventBus<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    pub fn new() -> Self {
        DocrefEventBus {
            inner: Arc::new(DocrefEventBusInner::new()),
        }
    }

    /// Registers a listener on `topic`.
    pub fn register(&self, topic: &str, listener: L) -> DocrefResult<SubscriberRef> {
        self.inner.register(topic, listener)
    }

    /// Removes a previously registered listener.
    pub fn deregister(&self, subscriber: &SubscriberRef) -> DocrefResult<()> {
        self.inner.deregister(subscriber)
    }

    /// Publishes an event to every listener of `topic`.
    pub fn publish(&self, topic: &str, event: E) -> DocrefResult<()> {
        self.inner.publish(topic, event)
    }

    /// Clears all registered listeners.
    pub fn close(&self) -> DocrefResult<()> {
        self.inner.close()
    }

    pub fn has_listeners(&self, topic: &str) -> bool {
        self.inner.has_listeners(topic)
    }
}

/// Handle returned on registration, used to remove the listener again.
#[derive(Clone)]
pub struct SubscriberRef {
    topic: String,
    pub(crate) inner: HandlerId,
}

impl SubscriberRef {
    pub fn new(topic: &str, inner: HandlerId) -> Self {
        SubscriberRef {
            topic: topic.to_string(),
            inner,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

struct DocrefEventBusInner<E, L> {
    event_bus: EventBus<E>,
    phantom_data: PhantomData<L>,
}

impl<E, L> DocrefEventBusInner<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    fn new() -> Self {
        DocrefEventBusInner {
            event_bus: EventBus::new(),
            phantom_data: PhantomData,
        }
    }

    fn register(&self, topic: &str, listener: L) -> DocrefResult<SubscriberRef> {
        match self.event_bus.subscribe(topic, Box::new(listener)) {
            Ok(handler_id) => Ok(SubscriberRef::new(topic, handler_id)),
            Err(e) => Err(Self::docref_error(e)),
        }
    }

    #[inline]
    fn deregister(&self, subscriber: &SubscriberRef) -> DocrefResult<()> {
        match self.event_bus.unsubscribe(&subscriber.topic, &subscriber.inner) {
            Ok(_) => Ok(()),
            Err(e) => Err(Self::docref_error(e)),
        }
    }

    #[inline]
    fn publish(&self, topic: &str, event: E) -> DocrefResult<()> {
        // Fast path: check if there are listeners before creating event
        let handler_count = match self.event_bus.get_handler_count(topic) {
            Ok(count) => count,
            Err(e) => {
                if matches!(e, BasuError::EventTypeNotFOUND) {
                    return Ok(());
                }
                return Err(Self::docref_error(e));
            }
        };

        if handler_count == 0 {
            return Ok(());
        }

        let basu_event = Event::new(event);
        match self.event_bus.publish(topic, &basu_event) {
            Ok(_) => Ok(()),
            Err(e) => Err(Self::docref_error(e)),
        }
    }

    #[inline]
    fn close(&self) -> DocrefResult<()> {
        match self.event_bus.clear() {
            Ok(_) => Ok(()),
            Err(e) => Err(Self::docref_error(e)),
        }
    }

    #[inline]
    fn has_listeners(&self, topic: &str) -> bool {
        match self.event_bus.get_handler_count(topic) {
            Ok(count) => count > 0,
            Err(BasuError::EventTypeNotFOUND) => false,
            Err(e) => {
                log::warn!("Failed to check listeners for {}: {}, defaulting to false", topic, e);
                false
            }
        }
    }

    #[inline]
    fn docref_error(e: BasuError) -> DocrefError {
        match e {
            BasuError::EventTypeNotFOUND => DocrefError::new(
                "Event bus error: no listener is registered for the requested event",
                ErrorKind::EventError,
            ),
            BasuError::MutexPoisoned => DocrefError::new(
                "Event bus error: internal mutex poisoned",
                ErrorKind::EventError,
            ),
            BasuError::HandlerError(e) => DocrefError::new(
                &format!("Event listener error: {}", e),
                ErrorKind::EventError,
            ),
        }
    }
}

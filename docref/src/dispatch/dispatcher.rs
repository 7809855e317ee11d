use crate::common::{async_task, DocrefEventBus, SubscriberRef, EVENT_SEPARATOR};
use crate::dispatch::Payload;
use crate::errors::{DocrefError, DocrefResult, ErrorKind};
use basu::error::BasuError;
use basu::event::Event;
use basu::Handle;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// A handler answers one event. It receives the dispatcher so it can
/// dispatch further events (fetching referenced entities, for example).
pub type Handler = Arc<dyn Fn(&Dispatcher, Payload) -> DocrefResult<Payload> + Send + Sync>;

/// Runs before the handler of an event. An error vetoes the dispatch.
pub type BeforeHook = Arc<dyn Fn(&str, &Payload) -> DocrefResult<()> + Send + Sync>;

pub type FailureListener = Arc<dyn Fn(&DispatchFailure) + Send + Sync>;

/// Routes named events to their handlers.
///
/// Each event name has at most one handler. Around the handler sit
/// synchronous before hooks, which may veto the call, and after listeners,
/// which run on a separate thread once the handler succeeded. The caller of
/// [Dispatcher::dispatch] never waits for after listeners; when one fails,
/// the failure is delivered to the listeners registered with
/// [Dispatcher::on_failure].
///
/// # Example
///
/// ```ignore
/// let dispatcher = Dispatcher::new();
/// dispatcher.subscribe("entity.Category.count", |_, _| Ok(Payload::Count(0)));
///
/// let count = dispatcher.dispatch("entity.Category.count", Payload::None)?.into_count()?;
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    handlers: RwLock<HashMap<String, Handler>>,
    before_hooks: RwLock<HashMap<String, Vec<BeforeHook>>>,
    after_bus: DocrefEventBus<AfterEventInfo, AfterListener>,
    failure_listeners: RwLock<Vec<FailureListener>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            inner: Arc::new(DispatcherInner {
                handlers: RwLock::new(HashMap::new()),
                before_hooks: RwLock::new(HashMap::new()),
                after_bus: DocrefEventBus::new(),
                failure_listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Installs the handler of `event`, replacing any previous one.
    pub fn subscribe<F>(&self, event: &str, handler: F)
    where
        F: Fn(&Dispatcher, Payload) -> DocrefResult<Payload> + Send + Sync + 'static,
    {
        self.install(event.to_string(), Arc::new(handler));
    }

    /// Installs every handler of `handlers` as `<namespace>.<name>`.
    pub fn subscribe_map<I>(&self, namespace: &str, handlers: I)
    where
        I: IntoIterator<Item = (String, Handler)>,
    {
        for (name, handler) in handlers {
            self.install(format!("{}{}{}", namespace, EVENT_SEPARATOR, name), handler);
        }
    }

    /// Removes the handler of `event`. Returns whether one was installed.
    pub fn unsubscribe(&self, event: &str) -> bool {
        self.inner.handlers.write().remove(event).is_some()
    }

    pub fn has_handler(&self, event: &str) -> bool {
        self.inner.handlers.read().contains_key(event)
    }

    /// Dispatches `payload` to the handler of `event` and returns its result.
    ///
    /// Before hooks run first, in registration order, and the first failing
    /// hook aborts the dispatch. After listeners are only notified when the
    /// handler succeeds.
    pub fn dispatch(&self, event: &str, payload: Payload) -> DocrefResult<Payload> {
        let handler = self.inner.handlers.read().get(event).cloned();
        let handler = match handler {
            Some(handler) => handler,
            None => {
                log::error!("No handler is registered for event {}", event);
                return Err(DocrefError::new(
                    &format!("No handler is registered for event {}", event),
                    ErrorKind::HandlerNotFound,
                ));
            }
        };

        let hooks = self
            .inner
            .before_hooks
            .read()
            .get(event)
            .cloned()
            .unwrap_or_default();
        for hook in hooks {
            hook(event, &payload)?;
        }

        // params are only kept around when someone listens for them
        let params = if self.inner.after_bus.has_listeners(event) {
            Some(payload.clone())
        } else {
            None
        };

        let result = handler(self, payload)?;

        if let Some(params) = params {
            let info = AfterEventInfo {
                event: event.to_string(),
                params,
                result: result.clone(),
                dispatcher: self.clone(),
            };
            let bus = self.inner.after_bus.clone();
            async_task(move || {
                let topic = info.event.clone();
                if let Err(e) = bus.publish(&topic, info) {
                    log::error!("Failed to notify after listeners of {}: {}", topic, e);
                }
            });
        }
        Ok(result)
    }

    /// Adds a hook that runs before every dispatch of `event`.
    pub fn on_before<F>(&self, event: &str, hook: F)
    where
        F: Fn(&str, &Payload) -> DocrefResult<()> + Send + Sync + 'static,
    {
        self.inner
            .before_hooks
            .write()
            .entry(event.to_string())
            .or_default()
            .push(Arc::new(hook));
    }

    /// Removes every before hook of `event`.
    pub fn clear_before(&self, event: &str) {
        self.inner.before_hooks.write().remove(event);
    }

    /// Adds a listener notified after every successful dispatch of `event`.
    pub fn on_after<F>(&self, event: &str, listener: F) -> DocrefResult<SubscriberRef>
    where
        F: Fn(&AfterEventInfo) -> DocrefResult<()> + Send + Sync + 'static,
    {
        self.inner
            .after_bus
            .register(event, AfterListener::new(listener))
    }

    pub fn remove_after(&self, subscriber: &SubscriberRef) -> DocrefResult<()> {
        self.inner.after_bus.deregister(subscriber)
    }

    pub fn has_after_listeners(&self, event: &str) -> bool {
        self.inner.after_bus.has_listeners(event)
    }

    /// Adds a listener to the failure channel.
    pub fn on_failure<F>(&self, listener: F)
    where
        F: Fn(&DispatchFailure) + Send + Sync + 'static,
    {
        self.inner.failure_listeners.write().push(Arc::new(listener));
    }

    /// Delivers `failure` to every failure channel listener.
    pub fn report_failure(&self, failure: DispatchFailure) {
        let listeners = self.inner.failure_listeners.read().clone();
        if listeners.is_empty() {
            log::error!(
                "Unhandled failure of {}: {} ({})",
                failure.event,
                failure.message,
                failure.kind
            );
            return;
        }

        for listener in listeners {
            listener(&failure);
        }
    }

    /// Drops every handler, hook and listener.
    pub fn close(&self) -> DocrefResult<()> {
        self.inner.handlers.write().clear();
        self.inner.before_hooks.write().clear();
        self.inner.failure_listeners.write().clear();
        self.inner.after_bus.close()
    }

    fn install(&self, event: String, handler: Handler) {
        let mut handlers = self.inner.handlers.write();
        if handlers.contains_key(&event) {
            log::warn!("Replacing the handler of event {}", event);
        }
        handlers.insert(event, handler);
    }
}

/// What an after listener receives: the event, the payload it was
/// dispatched with, the handler's result and the dispatcher itself.
#[derive(Clone)]
pub struct AfterEventInfo {
    event: String,
    params: Payload,
    result: Payload,
    dispatcher: Dispatcher,
}

impl AfterEventInfo {
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn params(&self) -> &Payload {
        &self.params
    }

    pub fn result(&self) -> &Payload {
        &self.result
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl Debug for AfterEventInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AfterEventInfo")
            .field("event", &self.event)
            .field("params", &self.params)
            .field("result", &self.result)
            .finish()
    }
}

/// A failed after listener, as seen on the failure channel.
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchFailure {
    pub event: String,
    pub message: String,
    pub kind: ErrorKind,
}

impl DispatchFailure {
    pub fn new(event: &str, error: &DocrefError) -> Self {
        DispatchFailure {
            event: event.to_string(),
            message: error.message().to_string(),
            kind: error.kind().clone(),
        }
    }
}

#[derive(Clone)]
pub struct AfterListener {
    on_event: Arc<dyn Fn(&AfterEventInfo) -> DocrefResult<()> + Send + Sync>,
}

impl AfterListener {
    pub fn new<F>(on_event: F) -> Self
    where
        F: Fn(&AfterEventInfo) -> DocrefResult<()> + Send + Sync + 'static,
    {
        AfterListener {
            on_event: Arc::new(on_event),
        }
    }
}

impl Handle<AfterEventInfo> for AfterListener {
    fn handle(&self, event: &Event<AfterEventInfo>) -> Result<(), BasuError> {
        let info = &event.data;
        if let Err(e) = (self.on_event)(info) {
            // other listeners of the same event still run
            log::warn!("After listener of {} failed: {}", info.event(), e);
            info.dispatcher()
                .report_failure(DispatchFailure::new(info.event(), &e));
        }
        Ok(())
    }
}

impl Debug for AfterListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AfterListener").finish()
    }
}

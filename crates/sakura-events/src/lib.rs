use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod subscriptions;

pub use subscriptions::Subscriptions;

/// Event delivered to subscribers. Built fresh for every publish call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            topic: topic.into(),
            payload,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Subscriber callback. Identity is the shared allocation, so keep the
/// `Handler` you subscribed with around to unsubscribe it later.
pub type Handler = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |event| f(event).boxed())
}

/// Wrap a synchronous closure as a [`Handler`]. The closure runs at
/// dispatch time, in subscription order.
pub fn sync_handler<F>(f: F) -> Handler
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(move |event| future::ready(f(&event)).boxed())
}

#[derive(Debug, thiserror::Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),
    #[error("handler panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Serialize)]
pub struct HandlerFailure {
    /// Position of the handler in the publish snapshot.
    pub index: usize,
    pub error: HandlerError,
}

/// Outcome of one publish call.
#[derive(Debug, Serialize)]
pub struct PublishReport {
    pub topic: String,
    pub delivered: usize,
    pub failures: Vec<HandlerFailure>,
}

impl PublishReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn invoked(&self) -> usize {
        self.delivered + self.failures.len()
    }
}

type TopicTable = HashMap<String, Vec<Handler>>;

/// Topic-keyed publish/subscribe bus.
///
/// Cloning is cheap and every clone shares the same subscriber table.
#[derive(Clone, Default)]
pub struct EventBus {
    topics: Arc<Mutex<TopicTable>>,
    debug: bool,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<(String, usize)> = self
            .table()
            .iter()
            .map(|(topic, handlers)| (topic.clone(), handlers.len()))
            .collect();
        f.debug_struct("EventBus")
            .field("topics", &counts)
            .field("debug", &self.debug)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus that traces every subscribe, unsubscribe and publish at debug level.
    pub fn with_debug(debug: bool) -> Self {
        let bus = Self {
            topics: Arc::default(),
            debug,
        };
        if debug {
            tracing::debug!("event bus initialised");
        }
        bus
    }

    fn table(&self) -> MutexGuard<'_, TopicTable> {
        self.topics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `handler` for `topic`. Returns `false` when that exact
    /// handler was already subscribed to the topic.
    pub fn subscribe(&self, topic: &str, handler: Handler) -> bool {
        if self.debug {
            tracing::debug!(topic, "subscribing");
        }
        let mut table = self.table();
        let handlers = table.entry(topic.to_string()).or_default();
        if handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            return false;
        }
        handlers.push(handler);
        true
    }

    /// Remove `handler` from `topic`. Unknown handlers are ignored.
    pub fn unsubscribe(&self, topic: &str, handler: &Handler) -> bool {
        if self.debug {
            tracing::debug!(topic, "unsubscribing");
        }
        let mut table = self.table();
        let Some(handlers) = table.get_mut(topic) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|h| !Arc::ptr_eq(h, handler));
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            table.remove(topic);
        }
        removed
    }

    pub fn subscribe_batch<I, T>(&self, pairs: I)
    where
        I: IntoIterator<Item = (T, Handler)>,
        T: AsRef<str>,
    {
        for (topic, handler) in pairs {
            self.subscribe(topic.as_ref(), handler);
        }
    }

    pub fn subscribe_all<I, T>(&self, topics: I, handler: &Handler)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        for topic in topics {
            self.subscribe(topic.as_ref(), Arc::clone(handler));
        }
    }

    pub fn unsubscribe_all<I, T>(&self, topics: I, handler: &Handler)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        for topic in topics {
            self.unsubscribe(topic.as_ref(), handler);
        }
    }

    pub async fn publish(&self, topic: &str, payload: Option<Value>) -> PublishReport {
        self.dispatch(Event::new(topic, payload)).await
    }

    pub async fn publish_from(
        &self,
        topic: &str,
        source: &str,
        payload: Option<Value>,
    ) -> PublishReport {
        self.dispatch(Event::new(topic, payload).with_source(source))
            .await
    }

    /// Deliver `event` to every handler subscribed to its topic when the call
    /// was made. Handlers are invoked in subscription order; the returned
    /// future resolves once all of them have settled.
    pub async fn dispatch(&self, event: Event) -> PublishReport {
        let snapshot: Vec<Handler> = self
            .table()
            .get(&event.topic)
            .cloned()
            .unwrap_or_default();
        if self.debug {
            tracing::debug!(
                topic = %event.topic,
                source = event.source.as_deref().unwrap_or("unknown"),
                handlers = snapshot.len(),
                "publishing"
            );
        }

        let mut failures = Vec::new();
        let mut pending = Vec::with_capacity(snapshot.len());
        for (index, handler) in snapshot.iter().enumerate() {
            let event = event.clone();
            match std::panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(fut) => pending.push(async move {
                    (index, AssertUnwindSafe(fut).catch_unwind().await)
                }),
                Err(panic) => failures.push(HandlerFailure {
                    index,
                    error: HandlerError::Panicked(panic_message(panic.as_ref())),
                }),
            }
        }

        for (index, outcome) in future::join_all(pending).await {
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => HandlerError::Failed(format!("{err:#}")),
                Err(panic) => HandlerError::Panicked(panic_message(panic.as_ref())),
            };
            failures.push(HandlerFailure { index, error });
        }
        failures.sort_by_key(|f| f.index);

        for failure in &failures {
            tracing::warn!(
                topic = %event.topic,
                handler = failure.index,
                error = %failure.error,
                "event handler failed"
            );
        }

        PublishReport {
            delivered: snapshot.len() - failures.len(),
            topic: event.topic,
            failures,
        }
    }

    /// Drop every topic and handler. Only used at full teardown.
    pub fn clear(&self) {
        if self.debug {
            tracing::debug!("clearing event bus");
        }
        self.table().clear();
    }

    /// Topics with at least one subscriber, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.table().keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn handler_count(&self, topic: &str) -> usize {
        self.table().get(topic).map_or(0, Vec::len)
    }

    pub fn is_subscribed(&self, topic: &str, handler: &Handler) -> bool {
        self.table()
            .get(topic)
            .is_some_and(|handlers| handlers.iter().any(|h| Arc::ptr_eq(h, handler)))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

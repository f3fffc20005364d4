use std::sync::Arc;

use crate::{EventBus, Handler};

/// Subscriptions owned by one component instance.
///
/// Everything added here is removed from the bus on [`Subscriptions::release`]
/// or when the value is dropped, so a detached component is never invoked again.
pub struct Subscriptions {
    bus: EventBus,
    entries: Vec<(String, Handler)>,
}

impl std::fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriptions")
            .field(
                "topics",
                &self.entries.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Subscriptions {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, topic: &str, handler: Handler) {
        if self.bus.subscribe(topic, Arc::clone(&handler)) {
            self.entries.push((topic.to_string(), handler));
        }
    }

    pub fn add_batch<I, T>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (T, Handler)>,
        T: AsRef<str>,
    {
        for (topic, handler) in pairs {
            self.add(topic.as_ref(), handler);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn release(&mut self) {
        for (topic, handler) in self.entries.drain(..) {
            self.bus.unsubscribe(&topic, &handler);
        }
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync_handler;

    #[test]
    fn release_unsubscribes_every_pair() {
        let bus = EventBus::new();
        let h = sync_handler(|_| Ok(()));
        let mut subs = Subscriptions::new(bus.clone());
        subs.add_batch([("cart:add-item", h.clone()), ("cart:update-item", h.clone())]);
        subs.add("cart:add-item", h.clone());
        assert_eq!(subs.len(), 2);

        subs.release();

        assert!(subs.is_empty());
        assert!(!bus.is_subscribed("cart:add-item", &h));
        assert!(!bus.is_subscribed("cart:update-item", &h));
    }

    #[test]
    fn drop_releases() {
        let bus = EventBus::new();
        let h = sync_handler(|_| Ok(()));
        {
            let mut subs = Subscriptions::new(bus.clone());
            subs.add("filter:change", h.clone());
            assert_eq!(bus.handler_count("filter:change"), 1);
        }
        assert_eq!(bus.handler_count("filter:change"), 0);
    }
}

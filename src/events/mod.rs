//! In-process event bus. Publishing is fire-and-forget: handlers run on
//! their own spawned task and a handler error never propagates back to the
//! publisher, only a metric (mirroring how the teacher's ingestion layer
//! treats webhook handler failures as data, not control flow).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::error;
use uuid::Uuid;

use crate::domain::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventTag {
    RawCollected,
    Standardized,
    Deduplicated,
    PhotosProcessed,
}

impl EventTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventTag::RawCollected => "raw.collected",
            EventTag::Standardized => "standardized",
            EventTag::Deduplicated => "deduplicated",
            EventTag::PhotosProcessed => "photos.processed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub tag: EventTag,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(tag: EventTag, payload: serde_json::Value) -> Self {
        Self { tag, payload }
    }
}

type Handler = Arc<dyn Fn(Event) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

#[derive(Default, Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<std::collections::HashMap<EventTag, Vec<(Uuid, Handler)>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `tag`, returning a subscription id that can
    /// later be passed to `unsubscribe`.
    pub async fn subscribe<F, Fut>(&self, tag: EventTag, handler: F) -> Uuid
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let boxed: Handler = Arc::new(move |event| Box::pin(handler(event)));
        self.handlers
            .write()
            .await
            .entry(tag)
            .or_default()
            .push((id, boxed));
        id
    }

    pub async fn unsubscribe(&self, tag: EventTag, id: Uuid) {
        if let Some(list) = self.handlers.write().await.get_mut(&tag) {
            list.retain(|(existing, _)| *existing != id);
        }
    }

    /// Dispatches `event` to every handler registered for its tag. Each
    /// handler runs on its own task; a failure bumps `events_handler_failed`
    /// and is otherwise swallowed.
    pub async fn publish(&self, event: Event) {
        let handlers = self.handlers.read().await;
        let Some(list) = handlers.get(&event.tag) else {
            return;
        };

        for (_, handler) in list.clone() {
            let event = event.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                if let Err(e) = handler(event.clone()).await {
                    metrics::counter!("events_handler_failed", "tag" => event.tag.as_str()).increment(1);
                    error!(tag = event.tag.as_str(), error = %e, "event handler failed");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn publish_invokes_all_subscribers_for_the_tag() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = count.clone();
        bus.subscribe(EventTag::RawCollected, move |_| {
            let c1 = c1.clone();
            async move {
                c1.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        let c2 = count.clone();
        bus.subscribe(EventTag::RawCollected, move |_| {
            let c2 = c2.clone();
            async move {
                c2.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        bus.publish(Event::new(EventTag::RawCollected, serde_json::json!({})))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn handler_failure_does_not_panic_the_bus() {
        let bus = EventBus::new();
        bus.subscribe(EventTag::Standardized, |_| async {
            Err(crate::domain::error::IngestError::internal("boom"))
        })
        .await;

        bus.publish(Event::new(EventTag::Standardized, serde_json::json!({})))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn unsubscribed_handler_is_not_invoked() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let id = bus
            .subscribe(EventTag::Deduplicated, move |_| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;
        bus.unsubscribe(EventTag::Deduplicated, id).await;

        bus.publish(Event::new(EventTag::Deduplicated, serde_json::json!({})))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}

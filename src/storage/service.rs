use super::area::StorageArea;
use super::event::{StorageEvent, StorageScope};
use super::StorageHandles;
use crate::config::DEFAULT_CHANNEL_CAPACITY;
use crate::tab::TabId;
use anyhow::Result;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::broadcast;

/// A handle for receiving storage change notifications.
pub type Subscription = broadcast::Receiver<StorageEvent>;

#[derive(Debug)]
struct StorageBus {
    tx: broadcast::Sender<StorageEvent>,
}

impl StorageBus {
    fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    fn subscribe(&self) -> Subscription {
        self.tx.subscribe()
    }

    fn publish(&self, ev: StorageEvent) {
        // send() only fails when nobody is subscribed, which is fine.
        let _ = self.tx.send(ev);
    }
}

/// Local and session storage of one origin, plus the bus every tab listens on.
#[derive(Clone)]
pub struct StorageService {
    origin: url::Origin,
    local: Arc<dyn StorageArea>,
    session: Arc<dyn StorageArea>,
    bus: Arc<StorageBus>,
}

impl Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl StorageService {
    pub fn new(origin: url::Origin, local: Arc<dyn StorageArea>, session: Arc<dyn StorageArea>) -> Self {
        Self::with_capacity(origin, local, session, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(
        origin: url::Origin,
        local: Arc<dyn StorageArea>,
        session: Arc<dyn StorageArea>,
        capacity: usize,
    ) -> Self {
        Self {
            origin,
            local,
            session,
            bus: Arc::new(StorageBus::with_capacity(capacity)),
        }
    }

    pub fn origin(&self) -> &url::Origin {
        &self.origin
    }

    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Returns the areas as seen by `tab`. Every mutation made through them is published on
    /// the bus with `tab` as its source.
    pub fn handles_for(&self, tab: TabId) -> StorageHandles {
        StorageHandles {
            local: self.wrap_notifying(self.local.clone(), Some(tab), StorageScope::Local),
            session: self.wrap_notifying(self.session.clone(), Some(tab), StorageScope::Session),
        }
    }

    fn wrap_notifying(
        &self,
        inner: Arc<dyn StorageArea>,
        source_tab: Option<TabId>,
        scope: StorageScope,
    ) -> Arc<dyn StorageArea> {
        Arc::new(NotifyingArea {
            inner,
            origin: self.origin.clone(),
            source_tab,
            bus: self.bus.clone(),
            scope,
        })
    }
}

struct NotifyingArea {
    inner: Arc<dyn StorageArea>,
    origin: url::Origin,
    source_tab: Option<TabId>,
    bus: Arc<StorageBus>,
    scope: StorageScope,
}

impl NotifyingArea {
    fn publish(&self, key: Option<&str>, old_value: Option<String>, new_value: Option<String>) {
        self.bus.publish(StorageEvent {
            origin: self.origin.clone(),
            key: key.map(str::to_string),
            old_value,
            new_value,
            source_tab: self.source_tab,
            scope: self.scope,
        });
    }
}

impl StorageArea for NotifyingArea {
    fn get_item(&self, key: &str) -> Option<String> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let old = self.inner.get_item(key);
        self.inner.set_item(key, value)?;
        if old.as_deref() != Some(value) {
            self.publish(Some(key), old, Some(value.to_string()));
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let Some(old) = self.inner.get_item(key) else {
            return Ok(());
        };
        self.inner.remove_item(key)?;
        self.publish(Some(key), Some(old), None);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let was_empty = self.inner.is_empty();
        self.inner.clear()?;
        if !was_empty {
            self.publish(None, None, None);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryArea;

    fn service() -> StorageService {
        let origin = url::Url::parse("https://example.com").unwrap().origin();
        StorageService::new(origin, Arc::new(InMemoryArea::new()), Arc::new(InMemoryArea::new()))
    }

    #[test]
    fn tabs_share_the_same_areas() {
        let service = service();
        let a = service.handles_for(TabId::new());
        let b = service.handles_for(TabId::new());

        a.local.set_item("k", "v").unwrap();
        a.session.set_item("s", "1").unwrap();
        assert_eq!(b.local.get_item("k").as_deref(), Some("v"));
        assert_eq!(b.session.get_item("s").as_deref(), Some("1"));
        assert!(b.session.get_item("k").is_none());
    }

    #[test]
    fn mutations_are_published_with_source_tab() {
        let service = service();
        let mut rx = service.subscribe();
        let tab = TabId::new();
        let h = service.handles_for(tab);

        h.local.set_item("k", "1").unwrap();
        h.local.set_item("k", "2").unwrap();
        h.session.remove_item("missing").unwrap();
        h.local.remove_item("k").unwrap();

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.key.as_deref(), Some("k"));
        assert_eq!(ev.old_value, None);
        assert_eq!(ev.new_value.as_deref(), Some("1"));
        assert!(ev.is_from(tab));
        assert_eq!(ev.scope, StorageScope::Local);

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.old_value.as_deref(), Some("1"));
        assert_eq!(ev.new_value.as_deref(), Some("2"));

        // the removal of the missing key was skipped
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.old_value.as_deref(), Some("2"));
        assert_eq!(ev.new_value, None);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn clear_publishes_keyless_event() {
        let service = service();
        let mut rx = service.subscribe();
        let h = service.handles_for(TabId::new());

        h.session.clear().unwrap(); // already empty, nothing published
        h.session.set_item("a", "1").unwrap();
        h.session.clear().unwrap();

        let _set = rx.try_recv().unwrap();
        let ev = rx.try_recv().unwrap();
        assert!(ev.key.is_none());
        assert_eq!(ev.scope, StorageScope::Session);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let service = service();
        let h = service.handles_for(TabId::new());
        h.local.set_item("k", "v").unwrap();
        assert_eq!(h.local.len(), 1);
    }
}

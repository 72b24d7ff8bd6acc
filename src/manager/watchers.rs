use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::manager::StorageKind;

/// Why a watcher is being notified.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChangeCause {
    /// The entry expired, or was deleted with `exec_callback` set
    Expired,
    /// Another tab changed or removed the entry
    CrossTab,
}

/// Payload delivered to a watcher callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: StorageKind,
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub is_removal: bool,
    pub cause: ChangeCause,
    /// Routing tag the watcher was registered with
    pub tag: Option<String>,
}

pub type WatchCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// A change callback for one entry, plus optional routing metadata that is echoed back in
/// every [`ChangeEvent`].
#[derive(Clone)]
pub struct Watcher {
    callback: WatchCallback,
    tag: Option<String>,
}

impl Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher").field("tag", &self.tag).finish_non_exhaustive()
    }
}

impl Watcher {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub(crate) fn notify(
        &self,
        kind: StorageKind,
        key: &str,
        old_value: Option<String>,
        new_value: Option<String>,
        is_removal: bool,
        cause: ChangeCause,
    ) {
        let event = ChangeEvent {
            kind,
            key: key.to_string(),
            old_value,
            new_value,
            is_removal,
            cause,
            tag: self.tag.clone(),
        };
        log::debug!("Notifying watcher of {}:{:?} ({:?})", kind, key, cause);
        (self.callback)(&event);
    }
}

/// Registered watchers, at most one per `(kind, key)`.
#[derive(Debug, Default)]
pub(crate) struct WatcherRegistry {
    watchers: HashMap<(StorageKind, String), Watcher>,
}

impl WatcherRegistry {
    /// Registers `watcher`, silently replacing the previous one.
    pub(crate) fn insert(&mut self, kind: StorageKind, key: &str, watcher: Watcher) -> Option<Watcher> {
        self.watchers.insert((kind, key.to_string()), watcher)
    }

    pub(crate) fn remove(&mut self, kind: StorageKind, key: &str) -> Option<Watcher> {
        self.watchers.remove(&(kind, key.to_string()))
    }

    pub(crate) fn get(&self, kind: StorageKind, key: &str) -> Option<Watcher> {
        self.watchers.get(&(kind, key.to_string())).cloned()
    }

    pub(crate) fn remove_kind(&mut self, kind: StorageKind) -> usize {
        let before = self.watchers.len();
        self.watchers.retain(|(k, _), _| *k != kind);
        before - self.watchers.len()
    }

    pub(crate) fn contains(&self, kind: StorageKind, key: &str) -> bool {
        self.watchers.contains_key(&(kind, key.to_string()))
    }

    pub(crate) fn len(&self) -> usize {
        self.watchers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording() -> (Watcher, Arc<Mutex<Vec<ChangeEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let watcher = Watcher::new(move |ev| sink.lock().unwrap().push(ev.clone()));
        (watcher, seen)
    }

    #[test]
    fn notify_builds_event_with_tag() {
        let (watcher, seen) = recording();
        let watcher = watcher.with_tag("profile-panel");

        watcher.notify(StorageKind::Local, "k", Some("old".into()), None, true, ChangeCause::Expired);

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen[0],
            ChangeEvent {
                kind: StorageKind::Local,
                key: "k".into(),
                old_value: Some("old".into()),
                new_value: None,
                is_removal: true,
                cause: ChangeCause::Expired,
                tag: Some("profile-panel".into()),
            }
        );
    }

    #[test]
    fn one_watcher_per_kind_and_key() {
        let mut reg = WatcherRegistry::default();
        let (a, seen_a) = recording();
        let (b, seen_b) = recording();

        assert!(reg.insert(StorageKind::Local, "k", a).is_none());
        assert!(reg.insert(StorageKind::Local, "k", b).is_some());
        reg.insert(StorageKind::Session, "k", Watcher::new(|_| {}));
        assert_eq!(reg.len(), 2);

        reg.get(StorageKind::Local, "k")
            .unwrap()
            .notify(StorageKind::Local, "k", None, Some("v".into()), false, ChangeCause::CrossTab);
        assert!(seen_a.lock().unwrap().is_empty());
        assert_eq!(seen_b.lock().unwrap().len(), 1);

        // get does not remove
        assert!(reg.contains(StorageKind::Local, "k"));
        assert!(reg.remove(StorageKind::Local, "k").is_some());
        assert!(reg.remove(StorageKind::Local, "k").is_none());
    }

    #[test]
    fn remove_kind_leaves_other_kinds() {
        let mut reg = WatcherRegistry::default();
        reg.insert(StorageKind::Local, "a", Watcher::new(|_| {}));
        reg.insert(StorageKind::Local, "b", Watcher::new(|_| {}));
        reg.insert(StorageKind::Session, "a", Watcher::new(|_| {}));

        assert_eq!(reg.remove_kind(StorageKind::Local), 2);
        assert!(reg.contains(StorageKind::Session, "a"));
        assert_eq!(reg.len(), 1);
    }
}

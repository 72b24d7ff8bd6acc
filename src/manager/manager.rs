use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::config::ManagerConfig;
use crate::cookies::CookieJarHandle;
use crate::errors::StorageError;
use crate::manager::backend::{AreaBackend, Backend, CookieBackend, WriteAttributes};
use crate::manager::bridge;
use crate::manager::expiry::{schedule, Expiry, ExpiryRegistry};
use crate::manager::watchers::{ChangeCause, Watcher, WatcherRegistry};
use crate::manager::StorageKind;
use crate::storage::{StorageEvent, StorageService};
use crate::tab::TabId;

/// Path and domain attributes of a cookie. Unset fields fall back to the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieScope {
    pub path: Option<String>,
    pub domain: Option<String>,
}

impl CookieScope {
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Per-entry extras for [`StorageManager::set`].
#[derive(Debug, Clone)]
pub enum WatchSpec {
    /// Change watcher for a local or session entry
    Callback(Watcher),
    /// Scope of a cookie
    CookieScope(CookieScope),
}

impl From<Watcher> for WatchSpec {
    fn from(watcher: Watcher) -> Self {
        WatchSpec::Callback(watcher)
    }
}

impl From<CookieScope> for WatchSpec {
    fn from(scope: CookieScope) -> Self {
        WatchSpec::CookieScope(scope)
    }
}

/// Timer and watcher bookkeeping of one manager.
#[derive(Debug, Default)]
pub(crate) struct Registries {
    pub(crate) expiry: ExpiryRegistry,
    pub(crate) watchers: WatcherRegistry,
}

pub(crate) struct ManagerInner {
    pub(crate) tab: TabId,
    pub(crate) origin: url::Origin,
    local: AreaBackend,
    session: AreaBackend,
    cookie: CookieBackend,
    state: Mutex<Registries>,
    runtime: Handle,
}

/// Storage manager bound to one tab.
///
/// All tabs of an origin share the same [`StorageService`] and cookie jar; each tab owns its
/// timers and watchers. Dropping the manager cancels its pending timers and stops listening for
/// other tabs' changes.
///
/// ```rust
/// use std::sync::Arc;
/// use gosub_storage::cookies::DefaultCookieJar;
/// use gosub_storage::storage::{InMemoryArea, StorageService};
/// use gosub_storage::{Expiry, StorageKind, StorageManager, TabId, Watcher};
///
/// #[tokio::main]
/// async fn main() -> Result<(), gosub_storage::StorageError> {
///     let origin = url::Url::parse("https://example.com").unwrap().origin();
///     let service = StorageService::new(origin, Arc::new(InMemoryArea::new()), Arc::new(InMemoryArea::new()));
///     let manager = StorageManager::new(&service, DefaultCookieJar::new().into_handle(), TabId::new())?;
///
///     let watcher = Watcher::new(|ev| println!("{} changed: {:?}", ev.key, ev.cause));
///     manager.set(StorageKind::Local, "token", "abc", Some(Expiry::Days(7)), Some(watcher.into()))?;
///     assert_eq!(manager.get(StorageKind::Local, "token").as_deref(), Some("abc"));
///
///     manager.del(StorageKind::Local, "token", true)?;
///     assert!(manager.get(StorageKind::Local, "token").is_none());
///     Ok(())
/// }
/// ```
pub struct StorageManager {
    inner: Arc<ManagerInner>,
    bridge: CancellationToken,
}

impl StorageManager {
    /// Creates a manager for `tab` with the default configuration. Must be called from within a
    /// tokio runtime, which drives the expiry timers and the cross-tab bridge.
    pub fn new(service: &StorageService, cookie_jar: CookieJarHandle, tab: TabId) -> Result<Self, StorageError> {
        Self::with_config(service, cookie_jar, tab, ManagerConfig::default())
    }

    pub fn with_config(
        service: &StorageService,
        cookie_jar: CookieJarHandle,
        tab: TabId,
        config: ManagerConfig,
    ) -> Result<Self, StorageError> {
        let runtime = Handle::try_current().map_err(|_| StorageError::NoRuntime)?;
        let handles = service.handles_for(tab);

        let inner = Arc::new(ManagerInner {
            tab,
            origin: service.origin().clone(),
            local: AreaBackend::new(handles.local),
            session: AreaBackend::new(handles.session),
            cookie: CookieBackend::new(cookie_jar, &config),
            state: Mutex::new(Registries::default()),
            runtime,
        });

        let bridge = CancellationToken::new();
        bridge::spawn(&inner.runtime, Arc::downgrade(&inner), service.subscribe(), bridge.clone());
        log::debug!("Storage manager started for tab {}", tab);

        Ok(Self { inner, bridge })
    }

    pub fn tab_id(&self) -> TabId {
        self.inner.tab
    }

    /// Writes `value` under `key`.
    ///
    /// For local and session entries, `expiry` replaces any pending expiry of the key (no expiry
    /// cancels it), and a [`WatchSpec::Callback`] replaces any watcher of the key. For cookies,
    /// `expiry` becomes the `expires` attribute and a [`WatchSpec::CookieScope`] sets path and
    /// domain.
    ///
    /// Fails with [`StorageError::InvalidArgument`] for an empty key, or a watch spec or expiry that
    /// does not apply to `kind`. Nothing is written in that case.
    pub fn set(
        &self,
        kind: StorageKind,
        key: &str,
        value: &str,
        expiry: Option<Expiry>,
        watch: Option<WatchSpec>,
    ) -> Result<(), StorageError> {
        self.inner.set(kind, key, value, expiry, watch)
    }

    /// Current value of `key`, or `None` when absent.
    pub fn get(&self, kind: StorageKind, key: &str) -> Option<String> {
        self.inner.backend(kind).raw_get(key)
    }

    /// Deletes `key`. Its timer and watcher go away with it; with `exec_callback` the watcher is
    /// notified once before it is dropped. Deleting a missing key is a no-op.
    pub fn del(&self, kind: StorageKind, key: &str, exec_callback: bool) -> Result<(), StorageError> {
        self.inner.del(kind, key, exec_callback)
    }

    /// Removes every entry of `kind` together with its timers and watchers. No watcher is
    /// notified.
    pub fn clear(&self, kind: StorageKind) -> Result<(), StorageError> {
        self.inner.clear(kind)
    }

    /// Shorthand for a cookie [`set`](Self::set) with an explicit scope.
    pub fn set_cookie(
        &self,
        key: &str,
        value: &str,
        expires: Option<Expiry>,
        scope: CookieScope,
    ) -> Result<(), StorageError> {
        self.set(StorageKind::Cookie, key, value, expires, Some(scope.into()))
    }

    /// Deletes a cookie that was written under a specific scope.
    pub fn del_cookie(&self, key: &str, scope: CookieScope) -> Result<(), StorageError> {
        self.inner.del_cookie(key, scope)
    }

    /// True when an expiry timer is pending for `key`.
    pub fn has_timer(&self, kind: StorageKind, key: &str) -> bool {
        self.inner.state().expiry.contains(kind, key)
    }

    /// True when a watcher is registered for `key`.
    pub fn has_watcher(&self, kind: StorageKind, key: &str) -> bool {
        self.inner.state().watchers.contains(kind, key)
    }

    /// Delivers a storage event from the platform. The manager's own bridge calls this for every
    /// event on the bus; events written by this tab are ignored.
    pub fn on_storage_event(&self, ev: &StorageEvent) {
        self.inner.on_storage_event(ev)
    }
}

impl Drop for StorageManager {
    fn drop(&mut self) {
        self.bridge.cancel();
        let mut state = self.inner.state();
        log::debug!(
            "Storage manager of tab {} stopped ({} timer(s), {} watcher(s) dropped)",
            self.inner.tab,
            state.expiry.len(),
            state.watchers.len()
        );
        for kind in StorageKind::ALL {
            state.expiry.cancel_kind(kind);
        }
    }
}

impl ManagerInner {
    pub(crate) fn state(&self) -> MutexGuard<'_, Registries> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn backend(&self, kind: StorageKind) -> &dyn Backend {
        match kind {
            StorageKind::Local => &self.local,
            StorageKind::Session => &self.session,
            StorageKind::Cookie => &self.cookie,
        }
    }

    fn set(
        self: &Arc<Self>,
        kind: StorageKind,
        key: &str,
        value: &str,
        expiry: Option<Expiry>,
        watch: Option<WatchSpec>,
    ) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::invalid("key must not be empty"));
        }

        let caps = kind.capabilities();
        let now = OffsetDateTime::now_utc();

        let (watcher, scope) = match watch {
            None => (None, None),
            Some(WatchSpec::Callback(w)) if caps.can_watch => (Some(w), None),
            Some(WatchSpec::CookieScope(s)) if caps.can_expire_natively => (None, Some(s)),
            Some(WatchSpec::Callback(_)) => {
                return Err(StorageError::invalid(format!("{} entries cannot be watched", kind)));
            }
            Some(WatchSpec::CookieScope(_)) => {
                return Err(StorageError::invalid(format!("{} entries have no cookie scope", kind)));
            }
        };

        if caps.can_expire_natively {
            let scope = scope.unwrap_or_default();
            let attrs = WriteAttributes {
                expires: expiry.map(|e| e.cookie_expires(now)).transpose()?,
                path: scope.path,
                domain: scope.domain,
            };
            self.backend(kind).raw_set(key, value, &attrs)?;
            return Ok(());
        }

        let delay = match &expiry {
            Some(e) => e.timer_delay(now)?,
            None => None,
        };

        let mut state = self.state();
        self.backend(kind).raw_set(key, value, &WriteAttributes::default())?;

        if state.expiry.cancel(kind, key) {
            log::debug!("Tab {}: replaced expiry of {}:{:?}", self.tab, kind, key);
        }
        if let Some(delay) = delay {
            self.arm_timer(&mut state, kind, key, delay);
        }
        if let Some(watcher) = watcher {
            state.watchers.insert(kind, key, watcher);
        }
        Ok(())
    }

    fn arm_timer(self: &Arc<Self>, state: &mut Registries, kind: StorageKind, key: &str, delay: Duration) {
        let id = state.expiry.next_id();
        let inner = Arc::downgrade(self);
        let timer_key = key.to_string();

        let handle = schedule(&self.runtime, id, delay, move || {
            if let Some(inner) = inner.upgrade() {
                inner.expire(kind, &timer_key, id);
            }
        });
        state.expiry.insert(kind, key, handle);
        log::debug!("Tab {}: {}:{:?} expires in {:?}", self.tab, kind, key, delay);
    }

    /// Timer callback. Removes the timer record, then the watcher, then the entry, and notifies
    /// the watcher last.
    fn expire(&self, kind: StorageKind, key: &str, id: u64) {
        let (watcher, old_value) = {
            let mut state = self.state();
            if !state.expiry.take_if_current(kind, key, id) {
                log::trace!("Tab {}: stale timer for {}:{:?} ignored", self.tab, kind, key);
                return;
            }
            let watcher = state.watchers.remove(kind, key);

            let backend = self.backend(kind);
            let old_value = backend.raw_get(key);
            if let Err(e) = backend.raw_delete(key, &WriteAttributes::default()) {
                log::warn!("Tab {}: cannot delete expired {}:{:?}: {}", self.tab, kind, key, e);
            }
            (watcher, old_value)
        };

        log::debug!("Tab {}: {}:{:?} expired", self.tab, kind, key);
        if let Some(watcher) = watcher {
            watcher.notify(kind, key, old_value, None, true, ChangeCause::Expired);
        }
    }

    /// Timer and watcher go first, so nothing can fire for the key once the callback has run.
    /// The callback still sees the entry; it is removed afterwards.
    fn del(&self, kind: StorageKind, key: &str, exec_callback: bool) -> Result<(), StorageError> {
        if key.is_empty() {
            return Ok(());
        }
        if kind.capabilities().can_expire_natively {
            self.backend(kind).raw_delete(key, &WriteAttributes::default())?;
            return Ok(());
        }

        let (watcher, old_value) = {
            let mut state = self.state();
            state.expiry.cancel(kind, key);
            (state.watchers.remove(kind, key), self.backend(kind).raw_get(key))
        };

        if exec_callback {
            if let Some(watcher) = watcher {
                watcher.notify(kind, key, old_value, None, true, ChangeCause::Expired);
            }
        }

        let mut state = self.state();
        self.backend(kind).raw_delete(key, &WriteAttributes::default())?;
        // whatever the callback registered for the key goes with it
        state.expiry.cancel(kind, key);
        state.watchers.remove(kind, key);
        Ok(())
    }

    fn del_cookie(&self, key: &str, scope: CookieScope) -> Result<(), StorageError> {
        if key.is_empty() {
            return Ok(());
        }
        let attrs = WriteAttributes {
            expires: None,
            path: scope.path,
            domain: scope.domain,
        };
        self.cookie.raw_delete(key, &attrs)?;
        Ok(())
    }

    fn clear(&self, kind: StorageKind) -> Result<(), StorageError> {
        if !kind.capabilities().can_clear_all {
            for key in self.backend(kind).keys() {
                self.del(kind, &key, false)?;
            }
            return Ok(());
        }

        let mut state = self.state();
        self.backend(kind).raw_clear()?;
        let timers = state.expiry.cancel_kind(kind);
        let watchers = state.watchers.remove_kind(kind);
        log::debug!(
            "Tab {}: cleared {} ({} timer(s), {} watcher(s) dropped)",
            self.tab,
            kind,
            timers,
            watchers
        );
        Ok(())
    }
}

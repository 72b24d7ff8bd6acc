//! Cross-tab event bridge.
//!
//! Every manager listens on the storage bus of its origin. Events written by other tabs are
//! reconciled against this tab's timers and handed to its watchers. The bridge never writes to
//! storage.

use std::sync::Weak;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::manager::manager::ManagerInner;
use crate::manager::{ChangeCause, StorageKind};
use crate::storage::{StorageEvent, Subscription};

/// Spawns the listener task. It ends when `cancel` fires or the manager is gone.
pub(crate) fn spawn(runtime: &Handle, inner: Weak<ManagerInner>, mut rx: Subscription, cancel: CancellationToken) {
    runtime.spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => {
                        let Some(inner) = inner.upgrade() else { break };
                        inner.on_storage_event(&ev);
                    }
                    Err(RecvError::Lagged(n)) => {
                        log::warn!("Storage bridge lagged behind, {} event(s) lost", n);
                        let Some(inner) = inner.upgrade() else { break };
                        inner.resync();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
        log::trace!("Storage bridge stopped");
    });
}

impl ManagerInner {
    /// Reconciles a change made by another tab.
    pub(crate) fn on_storage_event(&self, ev: &StorageEvent) {
        if ev.is_from(self.tab) || ev.origin != self.origin {
            return;
        }
        let kind = StorageKind::from(ev.scope);

        let Some(key) = ev.key.as_deref() else {
            // The other tab cleared the whole area
            let canceled = self.drop_stale_timers(kind);
            log::debug!("Tab {}: {} cleared elsewhere, {} timer(s) canceled", self.tab, kind, canceled);
            return;
        };

        let (is_removal, watcher) = {
            let mut state = self.state();
            let is_removal = self.backend(kind).raw_get(key).is_none();
            if is_removal && state.expiry.cancel(kind, key) {
                log::debug!("Tab {}: {}:{:?} removed elsewhere, timer canceled", self.tab, kind, key);
            }
            (is_removal, state.watchers.get(kind, key))
        };

        if let Some(watcher) = watcher {
            watcher.notify(
                kind,
                key,
                ev.old_value.clone(),
                ev.new_value.clone(),
                is_removal,
                ChangeCause::CrossTab,
            );
        }
    }

    /// Catches up after lost events. Watchers are not notified of what was missed.
    fn resync(&self) {
        for kind in StorageKind::ALL {
            if kind.capabilities().can_watch {
                let canceled = self.drop_stale_timers(kind);
                if canceled > 0 {
                    log::debug!("Tab {}: {} stale {} timer(s) canceled", self.tab, canceled, kind);
                }
            }
        }
    }

    /// Cancels the timers of `kind` whose entries are gone from storage.
    fn drop_stale_timers(&self, kind: StorageKind) -> usize {
        let mut state = self.state();
        let backend = self.backend(kind);
        let stale: Vec<String> = state
            .expiry
            .keys_of(kind)
            .into_iter()
            .filter(|k| backend.raw_get(k).is_none())
            .collect();
        for k in &stale {
            state.expiry.cancel(kind, k);
        }
        stale.len()
    }
}

//! Application-managed time-to-live.
//!
//! [`Expiry`] is what callers pass to `set`. For local and session entries it turns into a
//! timer owned by the [`ExpiryRegistry`]; for cookies it turns into an `expires` attribute and
//! the jar takes care of the rest.

use std::collections::HashMap;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::cookies::format_http_date;
use crate::errors::StorageError;
use crate::manager::StorageKind;

const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// When an entry should go away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiry {
    /// Whole days from now. Zero means "never" for local/session entries, a negative value
    /// expires the entry right away.
    Days(i64),
    /// A duration from now. Zero means "never" for local/session entries.
    After(Duration),
    /// An absolute point in time.
    At(OffsetDateTime),
    /// A pre-formatted cookie `expires` value, used verbatim. Cookies only.
    Formatted(String),
}

impl Expiry {
    /// Delay before a local/session entry expires, or `None` when no timer is needed.
    pub(crate) fn timer_delay(&self, now: OffsetDateTime) -> Result<Option<Duration>, StorageError> {
        match self {
            Expiry::Days(0) => Ok(None),
            Expiry::Days(days) if *days < 0 => Ok(Some(Duration::ZERO)),
            Expiry::Days(days) => Ok(Some(Duration::from_secs(
                days.saturating_mul(SECS_PER_DAY).unsigned_abs(),
            ))),
            Expiry::After(d) if d.is_zero() => Ok(None),
            Expiry::After(d) => Ok(Some(*d)),
            Expiry::At(at) => Ok(Some(Duration::try_from(*at - now).unwrap_or(Duration::ZERO))),
            Expiry::Formatted(_) => Err(StorageError::invalid(
                "a pre-formatted expiry only applies to cookies",
            )),
        }
    }

    /// The cookie `expires` attribute for this expiry.
    pub(crate) fn cookie_expires(&self, now: OffsetDateTime) -> Result<String, StorageError> {
        let at = match self {
            Expiry::Formatted(s) => return Ok(s.clone()),
            Expiry::Days(days) => now.checked_add(time::Duration::seconds(days.saturating_mul(SECS_PER_DAY))),
            Expiry::After(d) => time::Duration::try_from(*d).ok().and_then(|d| now.checked_add(d)),
            Expiry::At(at) => Some(*at),
        };
        let at = at.ok_or_else(|| StorageError::invalid(format!("expiry out of range: {self:?}")))?;
        format_http_date(at).map_err(|e| StorageError::invalid(format!("cannot format expiry: {e}")))
    }
}

/// Cancelable handle of a scheduled expiry. Dropping it cancels the timer.
#[derive(Debug)]
pub(crate) struct TimerHandle {
    id: u64,
    cancel: CancellationToken,
}

impl TimerHandle {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Runs `on_fire` on `runtime` after `delay`, unless the returned handle is canceled or
/// dropped first.
pub(crate) fn schedule<F>(runtime: &Handle, id: u64, delay: Duration, on_fire: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    runtime.spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => on_fire(),
        }
    });

    TimerHandle { id, cancel }
}

/// Pending expiry timers, at most one per `(kind, key)`.
#[derive(Debug, Default)]
pub(crate) struct ExpiryRegistry {
    timers: HashMap<(StorageKind, String), TimerHandle>,
    next_id: u64,
}

impl ExpiryRegistry {
    /// Generation id for the next timer.
    pub(crate) fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Registers `handle`, canceling the timer it replaces. Returns true when one was replaced.
    pub(crate) fn insert(&mut self, kind: StorageKind, key: &str, handle: TimerHandle) -> bool {
        self.timers.insert((kind, key.to_string()), handle).is_some()
    }

    /// Cancels the timer for `(kind, key)`. Returns true when there was one.
    pub(crate) fn cancel(&mut self, kind: StorageKind, key: &str) -> bool {
        self.timers.remove(&(kind, key.to_string())).is_some()
    }

    /// Removes the record for `(kind, key)` if it still belongs to timer `id`. A timer whose
    /// record was replaced or canceled in the meantime gets `false` and must not act.
    pub(crate) fn take_if_current(&mut self, kind: StorageKind, key: &str, id: u64) -> bool {
        let k = (kind, key.to_string());
        match self.timers.get(&k) {
            Some(handle) if handle.id() == id => {
                self.timers.remove(&k);
                true
            }
            _ => false,
        }
    }

    /// Cancels every timer of `kind`, returning how many there were.
    pub(crate) fn cancel_kind(&mut self, kind: StorageKind) -> usize {
        let before = self.timers.len();
        self.timers.retain(|(k, _), _| *k != kind);
        before - self.timers.len()
    }

    pub(crate) fn keys_of(&self, kind: StorageKind) -> Vec<String> {
        self.timers
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub(crate) fn contains(&self, kind: StorageKind, key: &str) -> bool {
        self.timers.contains_key(&(kind, key.to_string()))
    }

    pub(crate) fn len(&self) -> usize {
        self.timers.len()
    }
}

//! The storage manager: one `set`/`get`/`del`/`clear` surface over local storage, session
//! storage and cookies, with application-managed expiry and change watchers.
//!
//! # Main Types
//!
//! - [`StorageManager`]: the per-tab entry point.
//! - [`StorageKind`]: which medium an operation addresses, with its [`Capabilities`].
//! - [`Expiry`]: time-to-live of an entry.
//! - [`WatchSpec`]: a change [`Watcher`] for local/session entries, or a [`CookieScope`].
//! - [`ChangeEvent`]: what a watcher receives.
//!
//! Local and session entries get their expiry from a timer owned by the manager, and their
//! watchers are notified on expiry, on deletion with `exec_callback`, and when another tab
//! changes the entry. Cookies expire natively and cannot be watched.

pub mod backend;
mod bridge;
pub mod expiry;
pub mod kind;
#[allow(clippy::module_inception)]
mod manager;
pub mod watchers;

pub use backend::{build_cookie_string, Backend, WriteAttributes};
pub use expiry::Expiry;
pub use kind::{Capabilities, StorageKind};
pub use manager::{CookieScope, StorageManager, WatchSpec};
pub use watchers::{ChangeCause, ChangeEvent, WatchCallback, Watcher};

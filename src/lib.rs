//! Expiring, observable key/value storage over local storage, session storage and cookies.
//!
//! A [`StorageManager`] is created per tab from a shared [`storage::StorageService`] and a
//! shared cookie jar. It gives entries a time-to-live, notifies watchers when entries expire
//! or are changed by another tab, and hides the differences between the three media.

pub mod config;
pub mod cookies;
pub mod errors;
pub mod manager;
pub mod storage;
pub mod tab;

pub use errors::StorageError;
pub use manager::{ChangeCause, ChangeEvent, CookieScope, Expiry, StorageKind, StorageManager, WatchSpec, Watcher};
pub use tab::TabId;

//! Storage media for local and session storage.
//!
//! This module defines the key/value [`StorageArea`] trait that the storage manager writes
//! through, the in-memory and SQLite implementations of it, and the [`StorageService`] that
//! ties the areas of one origin to a change-notification bus.
//!
//! # Concepts
//!
//! - **Local storage**: persistent key/value data for the origin, shared by all tabs.
//! - **Session storage**: ephemeral key/value data for the origin, shared by all tabs of the
//!   browsing session.
//!
//! Every tab obtains its areas through [`StorageService::handles_for`]. The returned areas
//! publish a [`StorageEvent`] stamped with the writing tab on every mutation, which is how
//! other tabs learn about changes they did not make.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use gosub_storage::storage::{InMemoryArea, StorageService};
//! use gosub_storage::TabId;
//!
//! let origin = url::Url::parse("https://example.com").unwrap().origin();
//! let service = StorageService::new(
//!     origin,
//!     Arc::new(InMemoryArea::new()),
//!     Arc::new(InMemoryArea::new()),
//! );
//!
//! let mut events = service.subscribe();
//! let handles = service.handles_for(TabId::new());
//! handles.local.set_item("greeting", "hello").unwrap();
//!
//! let ev = events.try_recv().unwrap();
//! assert_eq!(ev.new_value.as_deref(), Some("hello"));
//! ```

use std::sync::Arc;

/// Storage area module, defining the key/value storage interface.
pub mod area;
/// Event module, providing storage change events.
pub mod event;
/// In-memory storage area.
pub mod in_memory;
/// Service module, binding the areas of an origin to the event bus.
pub mod service;
/// SQLite-backed persistent storage area.
#[cfg(feature = "sqlite_store")]
pub mod sqlite_store;

/// Handles to both local and session storage areas, as seen by one tab.
#[derive(Clone)]
pub struct StorageHandles {
    /// Local storage area, persistent and shared across tabs.
    pub local: Arc<dyn StorageArea>,
    /// Session storage area, ephemeral and shared across the tabs of the session.
    pub session: Arc<dyn StorageArea>,
}

pub use area::StorageArea;
pub use event::{StorageEvent, StorageScope};
pub use in_memory::InMemoryArea;
pub use service::{StorageService, Subscription};
#[cfg(feature = "sqlite_store")]
pub use sqlite_store::SqliteArea;

use std::fmt::Display;
use crate::storage::StorageScope;

/// The storage backends a [`StorageManager`](crate::StorageManager) can address.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Persistent storage shared by all tabs of the origin (localStorage)
    Local,
    /// Session storage shared by the tabs of the session (sessionStorage)
    Session,
    /// The document's cookie jar
    Cookie,
}

/// What a storage kind can do by itself. The manager dispatches on this table instead of
/// branching on the kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// The medium can drop all of its entries in one call
    pub can_clear_all: bool,
    /// The medium enforces expiry itself, so no timer is needed
    pub can_expire_natively: bool,
    /// Entries can carry a watcher, and other tabs' changes are observable
    pub can_watch: bool,
}

impl StorageKind {
    pub const ALL: [StorageKind; 3] = [StorageKind::Local, StorageKind::Session, StorageKind::Cookie];

    pub const fn capabilities(self) -> Capabilities {
        match self {
            StorageKind::Local | StorageKind::Session => Capabilities {
                can_clear_all: true,
                can_expire_natively: false,
                can_watch: true,
            },
            StorageKind::Cookie => Capabilities {
                can_clear_all: false,
                can_expire_natively: true,
                can_watch: false,
            },
        }
    }

}

impl From<StorageScope> for StorageKind {
    fn from(scope: StorageScope) -> Self {
        match scope {
            StorageScope::Local => StorageKind::Local,
            StorageScope::Session => StorageKind::Session,
        }
    }
}

impl Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Local => write!(f, "local"),
            StorageKind::Session => write!(f, "session"),
            StorageKind::Cookie => write!(f, "cookie"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookies_expire_natively_and_cannot_be_watched() {
        let caps = StorageKind::Cookie.capabilities();
        assert!(caps.can_expire_natively);
        assert!(!caps.can_watch);
        assert!(!caps.can_clear_all);
    }

    #[test]
    fn areas_share_capabilities() {
        assert_eq!(StorageKind::Local.capabilities(), StorageKind::Session.capabilities());
        assert!(StorageKind::Local.capabilities().can_watch);
    }

    #[test]
    fn event_scopes_map_to_watchable_kinds() {
        for scope in [StorageScope::Local, StorageScope::Session] {
            assert!(StorageKind::from(scope).capabilities().can_watch);
        }
        assert_eq!(StorageKind::from(StorageScope::Session), StorageKind::Session);
    }
}

use crate::tab::TabId;

/// Which storage object changed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StorageScope { Local, Session }

/// A change to a storage area, as delivered to every tab of the origin.
///
/// `key` is `None` when the whole area was cleared. Receivers compare `source_tab` against
/// their own id to skip changes they made themselves.
#[derive(Clone, Debug)]
pub struct StorageEvent {
    pub origin: url::Origin,
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub source_tab: Option<TabId>, // None when written outside any tab
    pub scope: StorageScope,
}

impl StorageEvent {
    /// True when the event was caused by `tab` itself.
    pub fn is_from(&self, tab: TabId) -> bool {
        self.source_tab == Some(tab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn o(s: &str) -> url::Origin {
        url::Url::parse(s).expect("valid URL").origin()
    }

    #[test]
    fn construct_local_event_without_source_tab() {
        let ev = StorageEvent {
            origin: o("https://example.com"),
            key: Some("greeting".into()),
            old_value: None,
            new_value: Some("hello".into()),
            source_tab: None,
            scope: StorageScope::Local,
        };

        assert_eq!(ev.origin.ascii_serialization(), "https://example.com");
        assert_eq!(ev.key.as_deref(), Some("greeting"));
        assert_eq!(ev.old_value, None);
        assert_eq!(ev.new_value.as_deref(), Some("hello"));
        assert!(!ev.is_from(TabId::new()));
        assert_eq!(ev.scope, StorageScope::Local);
    }

    #[test]
    fn is_from_matches_only_the_writer() {
        let writer = TabId::new();
        let ev = StorageEvent {
            origin: o("https://site.test"),
            key: Some("count".into()),
            old_value: Some("1".into()),
            new_value: Some("2".into()),
            source_tab: Some(writer),
            scope: StorageScope::Session,
        };

        assert!(ev.is_from(writer));
        assert!(!ev.is_from(TabId::new()));
    }

    #[test]
    fn debug_includes_scope_and_key() {
        let ev = StorageEvent {
            origin: o("https://debug.test"),
            key: Some("x".into()),
            old_value: Some("1".into()),
            new_value: Some("2".into()),
            source_tab: None,
            scope: StorageScope::Local,
        };
        let s = format!("{:?}", ev);
        assert!(s.contains("StorageEvent"));
        assert!(s.contains("Local"));
        assert!(s.contains("key: Some(\"x\")"));
    }
}

use std::fmt::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for a tab. Every [`StorageManager`](crate::StorageManager) is bound to
/// exactly one tab, and storage events carry the id of the tab that wrote them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(Uuid);

impl TabId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TabId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(TabId::new(), TabId::new());
    }

    #[test]
    fn display_is_the_uuid() {
        let uuid = Uuid::new_v4();
        assert_eq!(TabId::from(uuid).to_string(), uuid.to_string());
    }
}

use anyhow::Result;

/// Object-safe key/value storage area (DOM's Storage).
pub trait StorageArea: Send + Sync {
    /// Retrieves the value associated with the given key, or `None` if not found.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Sets the value for the given key, overwriting any existing value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the item with the given key. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Clears all items in the storage area.
    fn clear(&self) -> Result<()>;

    /// Returns the number of items in the storage area.
    fn len(&self) -> usize;

    /// Returns true when the area holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a vector of all keys in the storage area.
    fn keys(&self) -> Vec<String>;
}

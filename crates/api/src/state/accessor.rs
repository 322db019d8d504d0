//! Defines the `StateAccess` trait for key-value storage operations.

use super::StateScanIter;
use veid_types::error::StateError;

/// A dyn-safe trait providing the key-value storage operations the module
/// needs: point reads and writes plus ordered iteration by prefix.
///
/// This trait erases the concrete storage engine, allowing handlers and
/// sweeps to run against any ordered byte-keyed store. Iteration order is the
/// lexicographic byte order of keys; the key layout in `veid_types::keys`
/// relies on this for its time-ordered queues.
pub trait StateAccess: Send + Sync {
    /// Gets a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError>;

    /// Inserts a key-value pair.
    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError>;

    /// Deletes a key-value pair. Deleting an absent key is a no-op.
    fn delete(&mut self, key: &[u8]) -> Result<(), StateError>;

    /// Scans all key-value pairs starting with `prefix`, in ascending key
    /// order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<StateScanIter<'_>, StateError>;

    /// Scans all key-value pairs starting with `prefix`, in descending key
    /// order.
    fn prefix_scan_rev(&self, prefix: &[u8]) -> Result<StateScanIter<'_>, StateError>;
}

// Blanket implementation to allow `StateAccess` to be used behind a `Box`
// trait object.
impl<T: StateAccess + ?Sized> StateAccess for Box<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        (**self).get(key)
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError> {
        (**self).insert(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StateError> {
        (**self).delete(key)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<StateScanIter<'_>, StateError> {
        (**self).prefix_scan(prefix)
    }

    fn prefix_scan_rev(&self, prefix: &[u8]) -> Result<StateScanIter<'_>, StateError> {
        (**self).prefix_scan_rev(prefix)
    }
}

//! An ordered in-memory `StateAccess` implementation backed by a `BTreeMap`.
//!
//! Iteration order matches what a production ordered KV engine provides, so
//! time-ordered queue semantics can be exercised in unit tests unchanged.

use std::collections::BTreeMap;
use veid_api::state::{StateAccess, StateScanIter};
use veid_types::error::StateError;

/// In-memory state for tests.
#[derive(Default, Debug, Clone)]
pub struct MemoryState {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the state holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn range_of(prefix: &[u8]) -> (Vec<u8>, Option<Vec<u8>>) {
        // The exclusive upper bound is the prefix with its last
        // non-0xFF byte incremented; all-0xFF prefixes scan to the end.
        let mut upper = prefix.to_vec();
        while let Some(last) = upper.last_mut() {
            if *last < 0xFF {
                *last += 1;
                return (prefix.to_vec(), Some(upper));
            }
            upper.pop();
        }
        (prefix.to_vec(), None)
    }
}

impl StateAccess for MemoryState {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.data.get(key).cloned())
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StateError> {
        self.data.remove(key);
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<StateScanIter<'_>, StateError> {
        let (lower, upper) = Self::range_of(prefix);
        let items: Vec<_> = match upper {
            Some(upper) => self.data.range(lower..upper).collect(),
            None => self.data.range(lower..).collect(),
        };
        Ok(Box::new(
            items
                .into_iter()
                .map(|(k, v)| Ok((k.clone(), v.clone())))
                .collect::<Vec<_>>()
                .into_iter(),
        ))
    }

    fn prefix_scan_rev(&self, prefix: &[u8]) -> Result<StateScanIter<'_>, StateError> {
        let (lower, upper) = Self::range_of(prefix);
        let mut items: Vec<_> = match upper {
            Some(upper) => self.data.range(lower..upper).collect(),
            None => self.data.range(lower..).collect(),
        };
        items.reverse();
        Ok(Box::new(
            items
                .into_iter()
                .map(|(k, v)| Ok((k.clone(), v.clone())))
                .collect::<Vec<_>>()
                .into_iter(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_scan_is_ordered_and_bounded() {
        let mut state = MemoryState::new();
        state.insert(&[0x10, 2], b"b").unwrap();
        state.insert(&[0x10, 1], b"a").unwrap();
        state.insert(&[0x11, 0], b"other").unwrap();

        let keys: Vec<_> = state
            .prefix_scan(&[0x10])
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(keys, vec![vec![0x10, 1], vec![0x10, 2]]);
    }

    #[test]
    fn reverse_scan_reverses() {
        let mut state = MemoryState::new();
        state.insert(&[0x10, 1], b"a").unwrap();
        state.insert(&[0x10, 2], b"b").unwrap();
        let keys: Vec<_> = state
            .prefix_scan_rev(&[0x10])
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(keys, vec![vec![0x10, 2], vec![0x10, 1]]);
    }

    #[test]
    fn all_ff_prefix_scans_to_end() {
        let mut state = MemoryState::new();
        state.insert(&[0xFF, 0x01], b"x").unwrap();
        let found: Vec<_> = state.prefix_scan(&[0xFF]).unwrap().collect();
        assert_eq!(found.len(), 1);
    }
}

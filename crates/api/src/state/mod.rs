//! State access interfaces.

mod accessor;

pub use accessor::StateAccess;

use veid_types::error::StateError;

/// The item type yielded by prefix scans.
pub type StateScanItem = Result<(Vec<u8>, Vec<u8>), StateError>;

/// A boxed iterator over key-value pairs under a prefix.
pub type StateScanIter<'a> = Box<dyn Iterator<Item = StateScanItem> + 'a>;

//! The persisted entity model of the VEID module.
//!
//! Every struct here is stored in the key-value state under the layout in
//! [`crate::keys`] using the canonical codec in [`crate::codec`]. Maps and
//! sets are `BTreeMap`/`BTreeSet` throughout; language-native hash maps never
//! appear in persisted data.

mod appeal;
mod biometric;
mod delegation;
mod erasure;
mod events;
mod fallback;
mod identity;
mod model;
mod pipeline;
mod scope;
mod sync;
mod wallet;

pub use appeal::*;
pub use biometric::*;
pub use delegation::*;
pub use erasure::*;
pub use events::*;
pub use fallback::*;
pub use identity::*;
pub use model::*;
pub use pipeline::*;
pub use scope::*;
pub use sync::*;
pub use wallet::*;

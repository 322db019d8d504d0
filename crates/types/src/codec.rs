//! Defines the canonical, deterministic binary codec for all consensus-critical state.
//!
//! This module provides simple wrappers around `parity-scale-codec` (SCALE).
//! SCALE is length-prefixed, has a fixed field order and encodes ordered maps
//! (`BTreeMap`/`BTreeSet`) in sorted key order, so every replica produces the
//! same bytes for the same value. By centralizing the codec logic here in the
//! base `types` crate, we ensure that all components use the exact same
//! serialization format for state, preventing consensus failures due to
//! different binary representations of the same data.

use parity_scale_codec::{Decode, DecodeAll, Encode};

/// Encodes a value into a deterministic, canonical byte representation.
///
/// This function should be used for all data that is written to
/// consensus-critical state or is included in a hash for signing or id
/// derivation.
pub fn to_bytes_canonical<T: Encode>(v: &T) -> Vec<u8> {
    v.encode()
}

/// Decodes a value from a canonical byte representation.
///
/// Fails fast on any decoding error, including trailing bytes. This is
/// critical for preventing malformed data from being processed in a consensus
/// context.
pub fn from_bytes_canonical<T: Decode>(b: &[u8]) -> Result<T, String> {
    T::decode_all(&mut &*b).map_err(|e| format!("canonical decode failed: {}", e))
}

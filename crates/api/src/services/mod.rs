//! Traits for pluggable blockchain services.

use crate::lifecycle::{OnBeginBlock, OnEndBlock};
use bitflags::bitflags;

bitflags! {
    /// A bitmask representing the lifecycle hooks a service exposes. This is
    /// distinct from the service's callable messages, which are defined by
    /// its message enum.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Capabilities: u32 {
        /// Implements the OnBeginBlock trait.
        const ON_BEGIN_BLOCK = 0b0001;
        /// Implements the OnEndBlock trait.
        const ON_END_BLOCK = 0b0010;
    }
}

/// The base trait for any service managed by the chain.
///
/// Message dispatch is a tagged variant over a closed message set handled by
/// an exhaustive match in the service's router, so the trait itself only
/// carries identity and lifecycle wiring.
pub trait BlockchainService: Send + Sync {
    /// A unique, static, lowercase string identifier for the service.
    fn id(&self) -> &str;

    /// The version of the ABI the service expects from the host.
    fn abi_version(&self) -> u32;

    /// A string identifying the schema of the state this service reads and
    /// writes.
    fn state_schema(&self) -> &str;

    /// Returns a bitmask of the lifecycle hooks this service implements.
    fn capabilities(&self) -> Capabilities;

    /// Attempts to downcast this service to an `OnBeginBlock` trait object.
    fn as_on_begin_block(&self) -> Option<&dyn OnBeginBlock> {
        None
    }

    /// Attempts to downcast this service to an `OnEndBlock` trait object.
    fn as_on_end_block(&self) -> Option<&dyn OnEndBlock> {
        None
    }
}

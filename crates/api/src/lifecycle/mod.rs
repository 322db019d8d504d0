//! Defines traits for services that hook into the block processing lifecycle.

use crate::events::EventSink;
use crate::state::StateAccess;
use crate::transaction::TxContext;
use veid_types::error::StateError;

/// A trait for services that need to perform actions before any message in a
/// block is processed.
pub trait OnBeginBlock {
    /// Called once per block before message processing.
    fn on_begin_block(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<(), StateError>;
}

/// A trait for services that need to perform actions at the end of a block.
///
/// End-of-block sweeps must be fault-isolating: a failure processing one item
/// is logged and skipped, never aborting the block.
pub trait OnEndBlock {
    /// Called after all messages in a block have been processed.
    fn on_end_block(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        sink: &mut EventSink,
    ) -> Result<(), StateError>;
}

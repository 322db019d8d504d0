//! Defines the stable context for message execution.

use veid_types::app::AccountId;

/// Provides stable, read-only context to handlers and sweeps during
/// execution.
///
/// Heights and timestamps come exclusively from the block header delivered by
/// consensus; the module never reads a wall clock.
#[derive(Clone, Copy, Debug)]
pub struct TxContext {
    /// The current block height being processed.
    pub block_height: u64,
    /// The deterministic timestamp of the current block, in unix seconds,
    /// taken from its header.
    pub block_time: u64,
    /// The unique identifier of the chain, for replay protection.
    pub chain_id: u32,
    /// The account that signed the current message. This is the
    /// authoritative source for permission checks within handlers. For
    /// lifecycle hooks it is the default (zero) account.
    pub signer_account_id: AccountId,
}

impl TxContext {
    /// The block time expressed in nanoseconds, used where id derivation
    /// calls for nanosecond precision.
    pub fn block_time_ns(&self) -> u64 {
        self.block_time.saturating_mul(1_000_000_000)
    }
}

#![forbid(unsafe_code)]

//! # VEID Test Utilities
//!
//! Utilities for testing the VEID module components: an ordered in-memory
//! `StateAccess` implementation, deterministic account fixtures and a mock
//! MFA oracle.

pub mod fixtures;
pub mod memory_state;
pub mod mock_oracle;

pub use fixtures::{account, test_context, TestSigner};
pub use memory_state::MemoryState;
pub use mock_oracle::MockMfaOracle;

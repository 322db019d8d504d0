#![forbid(unsafe_code)]

//! Core data structures and error types for the VEID identity module.
//!
//! Everything consensus-critical lives here: the persisted entities, the
//! byte-stable key layout, the canonical codec and the error taxonomy. The
//! crate deliberately carries no I/O so that every other layer can depend on
//! it without dragging in a runtime.

pub mod app;
pub mod codec;
pub mod error;
pub mod keys;
pub mod service_configs;

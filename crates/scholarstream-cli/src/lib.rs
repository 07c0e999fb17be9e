//! `scholarstream` CLI crate (library surface).
//!
//! The entrypoint for end users is the `scholarstream` binary. This module
//! re-exports the core types so integrations can depend on one crate.

pub use scholarstream_core as core;
pub use scholarstream_local as local;

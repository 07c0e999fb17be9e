//! reqwest-backed IO for scholarstream: the backend client, the stream
//! driver that feeds the reducer, and transcript export.

pub use scholarstream_core::{Error, Result};

pub mod client;
pub mod config;
pub mod driver;
pub mod export;

pub use client::{BackendClient, SearchRequest};
pub use config::BackendConfig;
pub use export::{export_transcript, ExportFormat, ExportOptions, FontSource};

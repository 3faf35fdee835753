//! toorPIA API client — session auth and map synchronization.
//!
//! This crate is the single source of truth for the toorPIA wire contract:
//! login, fit/addplot requests, map export, and checksum-deduplicated
//! map import.
//!
//! Blocking HTTP only, no Tokio runtime. No retries beyond the single
//! lazy login. One client instance per caller.

mod auth;
mod checksum;
mod client;
mod error;
mod snapshot;

pub use auth::{
    auth_file_path, delete_credentials, load_credentials, save_credentials, ApiCredentials,
    DEFAULT_API_BASE,
};
pub use checksum::compute_fingerprint;
pub use client::{
    AddPlotOptions, AddPlotResult, FitTransformOptions, MapHandle, ToorClient,
};
pub use error::Error;
pub use snapshot::{
    is_canonical_file, read_snapshot, write_snapshot, MapSnapshot, WriteReport,
};

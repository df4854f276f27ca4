//! # Photo Catalog
//!
//! Imports a folder of photos into a durable per-folder catalog and flags
//! badly exposed shots.
//!
//! ## Core Philosophy
//! - **Never lose the catalog** - every write is atomic, a crash leaves the old file readable
//! - **Never touch originals** - photos are only read; previews live in `.thumbnails`
//! - **Report, don't throw** - per-file failures are collected, a batch always finishes
//!
//! ## Architecture
//! The library is split into a core engine (GUI-agnostic) and presentation layers:
//! - `core` - Scanning, fingerprinting, metadata, thumbnails, exposure, catalog, import
//! - `events` - Event-driven progress reporting
//! - `error` - Typed error taxonomy
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{CatalogError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or GUI).
/// Filtering follows `RUST_LOG`; without it only warnings and errors are shown.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

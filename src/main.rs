//! # photo-catalog CLI
//!
//! Command-line interface for the photo catalog.
//!
//! ## Usage
//! ```bash
//! photo-catalog import ~/Photos/Trip --recursive
//! photo-catalog classify ~/Photos/Trip --output json
//! ```

mod cli;

use photo_catalog::Result;

fn main() -> Result<()> {
    photo_catalog::init_tracing();
    cli::run()
}

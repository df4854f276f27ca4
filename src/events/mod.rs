//! # Events Module
//!
//! Progress events for UI layers.
//!
//! ## Design
//! Import and classification workers report through an injected sink. The
//! `EventSender` is one such sink: it forwards every update over a channel
//! so a UI thread (the CLI progress bar, a GUI) can render it.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Import(ImportEvent::Progress(p)) = event {
//!             println!("{}/{} ({:.0}%)", p.processed, p.total, p.percentage);
//!         }
//!     }
//! });
//!
//! importer.import_folder(&folder, &sender);
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;

//! Persistence of the engine state document.
//!
//! The on-disk format is a single JSON document with three sections:
//! `settings`, `profiles` and `automation`. Loading runs an explicit repair
//! pass that substitutes defaults for anything missing or malformed; saving
//! is an atomic whole-file rewrite.

mod loader;
mod path;
mod schema;

pub use loader::{load, repair, save, to_document};
pub use path::config_file_path;
pub use schema::{Document, Settings};

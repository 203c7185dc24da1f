//! Archive-backed page pipeline for a comic book viewer.
//!
//! The [`file_handler::FileHandler`] is the entry point: it opens an archive,
//! a directory or a single image, extracts archive members on a background
//! thread in the order the reader is likely to need them, and hands out
//! decoded pages from a small cache that follows the current page.

pub mod archive;
pub mod cache;
pub mod error;
pub mod file_handler;
pub mod files;
pub mod ordering;
pub mod page;
pub mod prefs;
pub mod sort;
pub mod status;

pub use error::{ComixError, Result};
pub use file_handler::{FileHandler, Pages};
pub use prefs::Preferences;

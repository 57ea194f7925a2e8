//! trashkeeper library crate
//!
//! Reclaims disk space from the `.Trash` folders of a media recorder's
//! volumes. Usable as a CLI binary or embedded through [`trashcan::Trashcan`].

pub mod cli;
pub mod config;
pub mod eraser;
pub mod error;
pub mod history;
pub mod locations;
pub mod logging;
pub mod mounts;
pub mod output;
pub mod policy;
pub mod progress;
pub mod space;
pub mod trashcan;
pub mod utils;

pub use error::{Result, TrashError};

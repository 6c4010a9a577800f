//! Core types for the live-pace notifier.
//!
//! Holds the subscription and live-run data model, the error taxonomy, time
//! formatting, the event classifier and command-line settings. Nothing here
//! performs I/O.

pub mod classifier;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;

pub use error::{PaceError, Result};

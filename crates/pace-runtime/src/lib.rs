//! Runtime layer for the live-pace notifier.
//!
//! Runs the background poll loop, fans notifications out through a message
//! sink, and answers subscription commands from the chat host.

pub mod clock;
pub mod commands;
pub mod notifier;
pub mod poller;
pub mod sinks;

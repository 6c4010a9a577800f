//! Data layer for the live-pace notifier.
//!
//! Owns the subscription registry and its persistence port, and talks to the
//! paceman.gg API for live runs and player lookups.

pub mod paceman;
pub mod registry;
pub mod store;

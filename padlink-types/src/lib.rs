//! # padlink-types
//!
//! Shared type definitions for the padlink control client.
//! This crate contains the device data model and the virtual-clock timer
//! queue used by padlink-net and padlink-core.

pub mod layout;
pub mod state;
pub mod timer;

pub use layout::{Layout, DEFAULT_FAMILIES, DEFAULT_PATTERNS, STEPS};
pub use state::*;
pub use timer::{TimerId, TimerQueue};

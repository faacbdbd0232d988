//! # padlink-core
//!
//! Client engine for a networked drum machine. Mirrors the device state,
//! runs the local interaction state machines (pad tremolo, selection,
//! filter shortcuts) and caches the device's sample library, all on a
//! single thread driven by an injected clock.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use padlink_core::{Config, ControlSurface, Input, Session};
//! use padlink_net::WsConnector;
//!
//! let config = Config::load();
//! let mut session = Session::new(&config, Box::new(WsConnector::new()));
//! session.start(clock.elapsed());
//!
//! loop {
//!     session.advance(clock.elapsed());
//!     // forward user input
//!     session.handle(Input::TogglePlay)?;
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`store`]: `StateStore`, the canonical device mirror and its merge rules
//! - [`interaction`]: `InteractionController` for pads, selection, keys and filters
//! - [`catalog`]: `SampleCatalogCache`, per-family sample listings
//! - [`session`]: `Session` and the `ControlSurface` trait
//! - [`notice`]: notifications handed to observers
//! - [`config`] / [`prefs`]: embedded config with user overrides, UI prefs

pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod interaction;
pub mod notice;
pub mod prefs;
pub mod session;
pub mod store;

pub use catalog::{CatalogRow, SampleCatalogCache, SampleFilter};
pub use config::{Config, Timing};
pub use context::{Ctx, TimerEvent};
pub use error::ClientError;
pub use interaction::{
    FilterTarget, Input, InteractionController, KeyCode, KeyEvent, Modifiers, PadVisual,
    Selection,
};
pub use notice::{Notice, Observer};
pub use prefs::UiPrefs;
pub use session::{ControlSurface, Session};
pub use store::{ChangeKind, StateStore, StoreChange};

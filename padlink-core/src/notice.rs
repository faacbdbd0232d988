//! Notifications delivered to the presentation layer.
//!
//! Components queue notices while they mutate state; the session hands them
//! to observers once the mutation is complete. Observers only ever see a
//! shared reference to the store.

use padlink_types::SampleEntry;

use crate::catalog::CatalogRow;
use crate::interaction::{FilterTarget, PadVisual, Selection};
use crate::store::{ChangeKind, StateStore, StoreChange};

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Store(StoreChange),
    PadVisual { pad: usize, visual: PadVisual },
    /// Device reported a pad hit; `lit` goes false when the flash ends.
    PadFlash { pad: usize, lit: bool },
    Selection(Selection),
    CatalogRendered(Vec<CatalogRow>),
    SampleCounts { counts: Vec<(String, u32)>, total: u64 },
    SampleSelector { pad: usize, family: String, samples: Vec<SampleEntry> },
    NoSamples { family: String },
    FilterIndicator { target: FilterTarget, active_filters: u32 },
    Connection { open: bool },
    Toast(String),
}

impl Notice {
    /// Store change kind, for observers that only follow some fields.
    pub fn change_kind(&self) -> Option<ChangeKind> {
        match self {
            Notice::Store(change) => Some(change.kind()),
            _ => None,
        }
    }
}

/// Receives notices after each mutation.
pub trait Observer {
    /// Filter applied before `notify`. Defaults to everything.
    fn wants(&self, _notice: &Notice) -> bool {
        true
    }

    fn notify(&mut self, notice: &Notice, store: &StateStore);
}

//! Shared plumbing handed to the state machines on every call.

use std::time::Duration;

use padlink_net::CommandSink;
use padlink_types::TimerQueue;

use crate::interaction::FilterTarget;
use crate::notice::Notice;
use crate::store::{StateStore, StoreChange};

/// Everything a timer in the session queue can stand for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    TremoloArm { pad: usize },
    TremoloTick { pad: usize },
    KeyTremoloTick { pad: usize },
    PulseEnd { pad: usize },
    FlashEnd { pad: usize },
    FilterWindow { target: FilterTarget },
    PatternFetch,
    CatalogRequest { pad: usize },
    CatalogRender,
    AuditionFallback { pad: usize },
    AuditionTrigger { pad: usize },
}

impl TimerEvent {
    /// Pad whose trigger/tremolo session owns this timer.
    pub fn tremolo_pad(&self) -> Option<usize> {
        match self {
            TimerEvent::TremoloArm { pad }
            | TimerEvent::TremoloTick { pad }
            | TimerEvent::KeyTremoloTick { pad }
            | TimerEvent::PulseEnd { pad } => Some(*pad),
            _ => None,
        }
    }
}

/// Borrowed view of the session handed to the controller and catalog.
pub struct Ctx<'a> {
    pub sink: &'a mut dyn CommandSink,
    pub store: &'a mut StateStore,
    pub timers: &'a mut TimerQueue<TimerEvent>,
    pub notices: &'a mut Vec<Notice>,
}

impl Ctx<'_> {
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn publish(&mut self, changes: Vec<StoreChange>) {
        self.notices.extend(changes.into_iter().map(Notice::Store));
    }

    pub fn toast(&mut self, text: impl Into<String>) {
        self.notices.push(Notice::Toast(text.into()));
    }
}

//! The client session: one link, one store, and the state machines around
//! them, driven by an injected clock.

use std::time::Duration;

use log::{debug, info, warn};

use padlink_net::{Command, Connector, DeviceMessage, LinkEvent, LinkState, TransportLink};
use padlink_types::{PadSample, TimerQueue};

use crate::catalog::{SampleCatalogCache, SampleFilter};
use crate::config::Config;
use crate::context::{Ctx, TimerEvent};
use crate::error::ClientError;
use crate::interaction::{FilterTarget, Input, InteractionController, PadVisual, Selection};
use crate::notice::{Notice, Observer};
use crate::store::{StateStore, StoreChange};

/// What the presentation layer can do with a session.
pub trait ControlSurface {
    fn handle(&mut self, input: Input) -> Result<(), ClientError>;

    /// Ask for the pad's family listing and open the selector once it arrives.
    fn open_selector(&mut self, pad: usize) -> Result<(), ClientError>;
    fn close_selector(&mut self);
    fn choose_sample(&mut self, pad: usize, name: &str) -> Result<(), ClientError>;
    fn audition(&mut self, family: &str, name: &str) -> Result<(), ClientError>;
    /// List every family of the kit.
    fn refresh_samples(&mut self) -> Result<(), ClientError>;
    fn set_sample_filter(&mut self, filter: SampleFilter);

    fn store(&self) -> &StateStore;
    fn selection(&self) -> Selection;
    fn pad_visual(&self, pad: usize) -> PadVisual;
    fn pad_sample(&self, pad: usize) -> Option<&PadSample>;
    fn is_connected(&self) -> bool;
}

pub struct Session {
    link: TransportLink,
    timers: TimerQueue<TimerEvent>,
    store: StateStore,
    catalog: SampleCatalogCache,
    controller: InteractionController,
    observers: Vec<Box<dyn Observer>>,
    notices: Vec<Notice>,
}

impl Session {
    pub fn new(config: &Config, connector: Box<dyn Connector>) -> Self {
        let layout = config.layout();
        let timing = config.timing();
        Self {
            link: TransportLink::new(config.url(), connector, config.link_timing()),
            timers: TimerQueue::new(),
            controller: InteractionController::new(layout.pads(), config.pad_keys(), &timing),
            catalog: SampleCatalogCache::new(&timing),
            store: StateStore::new(layout),
            observers: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn link(&self) -> &TransportLink {
        &self.link
    }

    pub fn catalog(&self) -> &SampleCatalogCache {
        &self.catalog
    }

    pub fn timers(&self) -> &TimerQueue<TimerEvent> {
        &self.timers
    }

    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    /// Open the link. `now` is the session clock's starting point.
    pub fn start(&mut self, now: Duration) {
        self.timers.advance(now);
        info!("Starting session against {}", self.link.url());
        self.link.connect(now);
    }

    /// Move the clock to `now`: fire due timers in deadline order, then
    /// drain the link.
    pub fn advance(&mut self, now: Duration) {
        while let Some((id, event)) = self.timers.pop_due(now) {
            self.with_ctx(|controller, catalog, ctx| match event {
                TimerEvent::CatalogRequest { .. }
                | TimerEvent::CatalogRender
                | TimerEvent::AuditionFallback { .. }
                | TimerEvent::AuditionTrigger { .. } => catalog.on_timer(ctx, id, &event),
                _ => controller.on_timer(ctx, id, &event),
            });
        }
        self.timers.advance(now);

        for event in self.link.poll(now) {
            match event {
                LinkEvent::Opened => {
                    self.notices.push(Notice::Connection { open: true });
                    self.deliver();
                }
                LinkEvent::Closed => {
                    self.with_ctx(|_, catalog, ctx| {
                        catalog.on_link_closed(ctx);
                        ctx.notify(Notice::Connection { open: false });
                    });
                }
                LinkEvent::Message(message) => {
                    if let Err(e) = self.dispatch_message(message) {
                        report_inbound(&e);
                    }
                }
                LinkEvent::Malformed(why) => report_inbound(&ClientError::Malformed(why)),
            }
        }
    }

    /// Cancel every timer and close the link for good.
    pub fn shutdown(&mut self) {
        self.with_ctx(|controller, catalog, ctx| {
            controller.shutdown(ctx);
            catalog.shutdown(ctx);
        });
        self.timers.clear();
        self.link.close();
    }

    fn dispatch_message(&mut self, message: DeviceMessage) -> Result<(), ClientError> {
        let inventory = self.with_ctx(|controller, catalog, ctx| {
            dispatch_message(message, controller, catalog, ctx)
        })?;
        if let Some(total) = inventory {
            self.link.note_inventory(total);
        }
        Ok(())
    }

    /// Run `f` against the session's parts, then hand queued notices to
    /// observers.
    fn with_ctx<R>(
        &mut self,
        f: impl FnOnce(&mut InteractionController, &mut SampleCatalogCache, &mut Ctx<'_>) -> R,
    ) -> R {
        let mut ctx = Ctx {
            sink: &mut self.link,
            store: &mut self.store,
            timers: &mut self.timers,
            notices: &mut self.notices,
        };
        let result = f(&mut self.controller, &mut self.catalog, &mut ctx);
        self.deliver();
        result
    }

    fn deliver(&mut self) {
        if self.notices.is_empty() {
            return;
        }
        let notices = std::mem::take(&mut self.notices);
        for notice in &notices {
            for observer in self.observers.iter_mut() {
                if observer.wants(notice) {
                    observer.notify(notice, &self.store);
                }
            }
        }
    }
}

/// Apply one device push to the store and the state machines. Returns the
/// library total when the push was a sample count report.
fn dispatch_message(
    message: DeviceMessage,
    controller: &mut InteractionController,
    catalog: &mut SampleCatalogCache,
    ctx: &mut Ctx,
) -> Result<Option<u64>, ClientError> {
    match message {
        DeviceMessage::State(patch) => {
            let changes = ctx.store.merge_device_state(&patch);
            let pads_changed = changes
                .iter()
                .any(|c| matches!(c, StoreChange::PadSample { .. }));
            let pattern_changed = changes
                .iter()
                .any(|c| matches!(c, StoreChange::ActivePattern(_)));
            ctx.publish(changes);
            if pads_changed {
                catalog.schedule_render(ctx);
            }
            if pattern_changed {
                controller.revalidate(ctx);
            }
            ctx.sink.send(Command::GetPattern);
        }
        DeviceMessage::Step { step } => {
            let changes = ctx.store.set_current_step(step)?;
            ctx.publish(changes);
        }
        DeviceMessage::Pad { pad } => controller.flash_pad(ctx, pad)?,
        DeviceMessage::Pattern(push) => {
            let changes = ctx.store.merge_pattern(&push.into_update())?;
            let pattern_changed = changes
                .iter()
                .any(|c| matches!(c, StoreChange::ActivePattern(_)));
            ctx.publish(changes);
            if pattern_changed {
                controller.revalidate(ctx);
            }
        }
        DeviceMessage::LoopState {
            track,
            active,
            paused,
        } => {
            let track = index(track, "track")?;
            let changes = ctx.store.set_loop_state(track, active, paused)?;
            ctx.publish(changes);
        }
        DeviceMessage::SampleCounts(counts) => {
            let total = catalog.on_sample_counts(ctx, &counts);
            debug!("Device reports {} samples", total);
            return Ok(Some(total));
        }
        DeviceMessage::SampleList {
            family,
            pad,
            samples,
        } => catalog.on_sample_list(ctx, &family, pad, samples),
        DeviceMessage::SampleLoaded {
            pad,
            filename,
            size,
            format,
        } => catalog.on_sample_loaded(ctx, pad, &filename, size, format.as_deref())?,
        DeviceMessage::StepVelocitySet {
            track,
            step,
            velocity,
        } => {
            let track = index(track, "track")?;
            let step = index(step, "step")?;
            let velocity = u8::try_from(velocity)
                .map_err(|_| ClientError::Rejected { what: "velocity", index: velocity })?;
            let changes = ctx.store.set_velocity(track, step, velocity)?;
            ctx.publish(changes);
        }
        DeviceMessage::TrackFilterSet {
            track,
            active_filters,
        }
        | DeviceMessage::TrackFilterCleared {
            track,
            active_filters,
        } => {
            let track = index(track, "track")?;
            if !ctx.store.layout().has_track(track) {
                return Err(ClientError::rejected("track", track));
            }
            ctx.notify(Notice::FilterIndicator {
                target: FilterTarget::Track(track),
                active_filters,
            });
        }
        DeviceMessage::PadFilterSet { pad, active_filters }
        | DeviceMessage::PadFilterCleared { pad, active_filters } => {
            let pad = index(pad, "pad")?;
            if !ctx.store.layout().has_pad(pad) {
                return Err(ClientError::rejected("pad", pad));
            }
            ctx.notify(Notice::FilterIndicator {
                target: FilterTarget::Pad(pad),
                active_filters,
            });
        }
        DeviceMessage::Unknown => return Err(ClientError::UnknownType),
    }
    Ok(None)
}

/// Inbound frames that fail never reach the store. Unknown types are
/// expected from newer firmware and only logged at debug.
fn report_inbound(e: &ClientError) {
    match e {
        ClientError::UnknownType => debug!("Ignoring device message: {}", e),
        _ => warn!("Ignoring device message: {}", e),
    }
}

fn index(value: i64, what: &'static str) -> Result<usize, ClientError> {
    usize::try_from(value).map_err(|_| ClientError::Rejected { what, index: value })
}

impl ControlSurface for Session {
    fn handle(&mut self, input: Input) -> Result<(), ClientError> {
        self.with_ctx(|controller, _, ctx| controller.handle(ctx, &input))
    }

    fn open_selector(&mut self, pad: usize) -> Result<(), ClientError> {
        self.with_ctx(|_, catalog, ctx| catalog.open_selector(ctx, pad))
    }

    fn close_selector(&mut self) {
        self.catalog.close_selector();
    }

    fn choose_sample(&mut self, pad: usize, name: &str) -> Result<(), ClientError> {
        self.with_ctx(|_, catalog, ctx| catalog.choose_sample(ctx, pad, name))
    }

    fn audition(&mut self, family: &str, name: &str) -> Result<(), ClientError> {
        self.with_ctx(|_, catalog, ctx| catalog.audition(ctx, family, name))
    }

    fn refresh_samples(&mut self) -> Result<(), ClientError> {
        self.with_ctx(|_, catalog, ctx| catalog.request_all(ctx))
    }

    fn set_sample_filter(&mut self, filter: SampleFilter) {
        self.with_ctx(|_, catalog, ctx| catalog.set_filter(ctx, filter));
    }

    fn store(&self) -> &StateStore {
        &self.store
    }

    fn selection(&self) -> Selection {
        self.controller.selection()
    }

    fn pad_visual(&self, pad: usize) -> PadVisual {
        self.controller.pad_visual(pad)
    }

    fn pad_sample(&self, pad: usize) -> Option<&PadSample> {
        self.store.device().pad_sample(pad)
    }

    fn is_connected(&self) -> bool {
        self.link.state() == LinkState::Open
    }
}

//! Per-family sample listings fetched on demand from the device.
//!
//! Listings arrive one family at a time in response to `getSamples`. The
//! cache never assumes it holds the full library: a family is listed only
//! after the device answered for it. Requests in flight are tracked in a
//! ledger that expires entries after a while and is voided on disconnect.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use log::{debug, info};

use padlink_net::{Command, RawSample, SampleCounts};
use padlink_types::{normalize_format, PadSample, SampleEntry, TimerId, DEFAULT_QUALITY};

use crate::config::Timing;
use crate::context::{Ctx, TimerEvent};
use crate::error::ClientError;
use crate::interaction::TRIGGER_VELOCITY;
use crate::notice::Notice;

/// Which samples the library view shows. `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleFilter {
    pub family: Option<String>,
    pub format: Option<String>,
    pub rate: Option<u32>,
    pub channels: Option<u8>,
    /// Only samples currently loaded on their family's pad.
    pub active_only: bool,
}

impl SampleFilter {
    pub fn matches(&self, entry: &SampleEntry, active: bool) -> bool {
        self.family.as_deref().map_or(true, |f| f == entry.family)
            && self
                .format
                .as_deref()
                .map_or(true, |f| f.eq_ignore_ascii_case(&entry.format))
            && self.rate.map_or(true, |r| r == entry.rate)
            && self.channels.map_or(true, |c| c == entry.channels)
            && (!self.active_only || active)
    }
}

/// One line of the rendered library view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub entry: SampleEntry,
    /// Loaded on its family's pad at render time.
    pub active: bool,
}

/// Staggered "list everything" pass.
struct Batch {
    /// Families whose request has not gone out yet, with their pad.
    unsent: Vec<(String, usize)>,
    timers: Vec<TimerId>,
}

struct Audition {
    filename: String,
    timer: TimerId,
}

pub struct SampleCatalogCache {
    lists: BTreeMap<String, Vec<SampleEntry>>,
    counts: Vec<(String, u32)>,
    pending: HashMap<String, Duration>,
    batch: Option<Batch>,
    render: Option<TimerId>,
    /// Selector waiting for its family listing.
    selector: Option<(String, usize)>,
    auditions: HashMap<usize, Audition>,
    filter: SampleFilter,
    timing: Timing,
}

impl SampleCatalogCache {
    pub fn new(timing: &Timing) -> Self {
        Self {
            lists: BTreeMap::new(),
            counts: Vec::new(),
            pending: HashMap::new(),
            batch: None,
            render: None,
            selector: None,
            auditions: HashMap::new(),
            filter: SampleFilter::default(),
            timing: *timing,
        }
    }

    /// Listing of one family, sorted by name. Empty until the device answered.
    pub fn samples(&self, family: &str) -> &[SampleEntry] {
        self.lists.get(family).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.lists.keys().map(String::as_str)
    }

    /// Last reported per-family counts.
    pub fn counts(&self) -> &[(String, u32)] {
        &self.counts
    }

    pub fn filter(&self) -> &SampleFilter {
        &self.filter
    }

    pub fn is_pending(&self, family: &str, now: Duration) -> bool {
        self.pending
            .get(family)
            .is_some_and(|sent| now.saturating_sub(*sent) < self.timing.pending_expiry)
    }

    /// Families of the running batch still waiting for their turn.
    pub fn batch_remaining(&self) -> usize {
        self.batch.as_ref().map_or(0, |b| b.unsent.len())
    }

    /// Ask the device for one family's listing. Returns false when a request
    /// for it is already in flight.
    pub fn request_family(
        &mut self,
        ctx: &mut Ctx,
        family: &str,
        pad: usize,
    ) -> Result<bool, ClientError> {
        if !ctx.sink.is_open() {
            return Err(ClientError::TransportUnavailable);
        }
        let now = ctx.now();
        if self.is_pending(family, now) {
            debug!("Listing for {} already requested", family);
            return Ok(false);
        }
        let sent = ctx.sink.send(Command::GetSamples {
            family: family.to_string(),
            pad,
        });
        if !sent {
            return Err(ClientError::TransportUnavailable);
        }
        self.pending.insert(family.to_string(), now);
        Ok(true)
    }

    /// Request the pad's family and open the selector once it arrives.
    pub fn open_selector(&mut self, ctx: &mut Ctx, pad: usize) -> Result<(), ClientError> {
        let family = ctx
            .store
            .layout()
            .family(pad)
            .ok_or(ClientError::rejected("pad", pad))?
            .to_string();
        self.request_family(ctx, &family, pad)?;
        self.selector = Some((family, pad));
        Ok(())
    }

    pub fn close_selector(&mut self) {
        self.selector = None;
    }

    /// Load `name` onto `pad`. The device confirms with `sampleLoaded`.
    pub fn choose_sample(
        &mut self,
        ctx: &mut Ctx,
        pad: usize,
        name: &str,
    ) -> Result<(), ClientError> {
        let family = ctx
            .store
            .layout()
            .family(pad)
            .ok_or(ClientError::rejected("pad", pad))?
            .to_string();
        self.selector = None;
        let sent = ctx.sink.send(Command::LoadSample {
            family,
            filename: name.to_string(),
            pad,
        });
        if sent {
            Ok(())
        } else {
            Err(ClientError::TransportUnavailable)
        }
    }

    /// Load `name` onto its family's pad and play it once loaded.
    pub fn audition(&mut self, ctx: &mut Ctx, family: &str, name: &str) -> Result<(), ClientError> {
        let pad = ctx
            .store
            .layout()
            .pad_for_family(family)
            .ok_or_else(|| ClientError::UnknownFamily(family.to_string()))?;
        let sent = ctx.sink.send(Command::LoadSample {
            family: family.to_string(),
            filename: name.to_string(),
            pad,
        });
        if !sent {
            return Err(ClientError::TransportUnavailable);
        }
        if let Some(previous) = self.auditions.remove(&pad) {
            ctx.timers.cancel(previous.timer);
        }
        let timer = ctx
            .timers
            .schedule(self.timing.audition_fallback, TimerEvent::AuditionFallback { pad });
        self.auditions.insert(
            pad,
            Audition {
                filename: name.to_string(),
                timer,
            },
        );
        Ok(())
    }

    /// List every kit family, one request per stagger step. Calling again
    /// while a batch runs reschedules only what has not been sent.
    pub fn request_all(&mut self, ctx: &mut Ctx) -> Result<(), ClientError> {
        if !ctx.sink.is_open() {
            return Err(ClientError::TransportUnavailable);
        }
        let unsent = match self.batch.take() {
            Some(batch) => {
                for timer in batch.timers {
                    ctx.timers.cancel(timer);
                }
                debug!("Rescheduling {} outstanding listing requests", batch.unsent.len());
                batch.unsent
            }
            None => ctx
                .store
                .layout()
                .families
                .iter()
                .enumerate()
                .map(|(pad, family)| (family.clone(), pad))
                .collect(),
        };
        if unsent.is_empty() {
            return Ok(());
        }
        let timers = unsent
            .iter()
            .enumerate()
            .map(|(i, (_, pad))| {
                ctx.timers.schedule(
                    self.timing.request_stagger * i as u32,
                    TimerEvent::CatalogRequest { pad: *pad },
                )
            })
            .collect();
        self.batch = Some(Batch { unsent, timers });
        Ok(())
    }

    pub fn on_timer(&mut self, ctx: &mut Ctx, id: TimerId, event: &TimerEvent) {
        match *event {
            TimerEvent::CatalogRequest { pad } => self.batch_step(ctx, id, pad),
            TimerEvent::CatalogRender => {
                if self.render == Some(id) {
                    self.render = None;
                    self.render_now(ctx);
                }
            }
            TimerEvent::AuditionFallback { pad } | TimerEvent::AuditionTrigger { pad } => {
                if self.auditions.get(&pad).is_some_and(|a| a.timer == id) {
                    self.auditions.remove(&pad);
                    ctx.sink.send_trigger(pad, TRIGGER_VELOCITY);
                }
            }
            _ => {}
        }
    }

    fn batch_step(&mut self, ctx: &mut Ctx, id: TimerId, pad: usize) {
        let Some(batch) = self.batch.as_mut() else {
            return;
        };
        batch.timers.retain(|t| *t != id);
        let Some(pos) = batch.unsent.iter().position(|(_, p)| *p == pad) else {
            return;
        };
        let (family, pad) = batch.unsent.remove(pos);
        if batch.unsent.is_empty() {
            self.batch = None;
        }
        if let Err(e) = self.request_family(ctx, &family, pad) {
            debug!("Listing request for {} not sent: {}", family, e);
        }
    }

    /// Handle a `sampleList` push.
    pub fn on_sample_list(
        &mut self,
        ctx: &mut Ctx,
        family: &str,
        pad: Option<i64>,
        samples: Vec<RawSample>,
    ) {
        self.pending.remove(family);
        let wanted = self.selector.as_ref().and_then(|(f, p)| {
            let pad_matches = pad.map_or(true, |reported| i64::try_from(*p) == Ok(reported));
            (f == family && pad_matches).then_some(*p)
        });

        if samples.is_empty() {
            if wanted.is_some() {
                self.selector = None;
                ctx.notify(Notice::NoSamples {
                    family: family.to_string(),
                });
            }
            return;
        }

        let mut entries: Vec<SampleEntry> = samples
            .into_iter()
            .map(|raw| raw.into_entry(family))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Listed {} samples for {}", entries.len(), family);
        self.lists.insert(family.to_string(), entries);
        self.schedule_render(ctx);

        if let Some(pad) = wanted {
            self.selector = None;
            ctx.notify(Notice::SampleSelector {
                pad,
                family: family.to_string(),
                samples: self.samples(family).to_vec(),
            });
        }
    }

    /// Handle a `sampleCounts` push. Returns the total across kit families.
    pub fn on_sample_counts(&mut self, ctx: &mut Ctx, counts: &SampleCounts) -> u64 {
        self.counts = ctx
            .store
            .layout()
            .families
            .iter()
            .map(|family| (family.clone(), counts.count(family)))
            .collect();
        let total = self.counts.iter().map(|(_, n)| u64::from(*n)).sum();
        ctx.notify(Notice::SampleCounts {
            counts: self.counts.clone(),
            total,
        });
        self.schedule_render(ctx);
        total
    }

    /// Handle a `sampleLoaded` push: bind the pad and finish an audition.
    pub fn on_sample_loaded(
        &mut self,
        ctx: &mut Ctx,
        pad: i64,
        filename: &str,
        size: Option<u64>,
        format: Option<&str>,
    ) -> Result<(), ClientError> {
        let pad = usize::try_from(pad)
            .ok()
            .filter(|p| ctx.store.layout().has_pad(*p))
            .ok_or(ClientError::Rejected { what: "pad", index: pad })?;
        let sample = PadSample {
            filename: filename.to_string(),
            size_bytes: size.unwrap_or(0),
            format: normalize_format(format, filename),
            quality: DEFAULT_QUALITY.to_string(),
        };
        let label = sample.display_name().to_string();
        let changes = ctx.store.set_pad_sample(pad, Some(sample))?;
        ctx.publish(changes);
        ctx.toast(format!("Pad {}: {} loaded", pad + 1, label));
        self.schedule_render(ctx);

        let confirmed = self
            .auditions
            .get(&pad)
            .is_some_and(|a| a.filename == filename);
        if confirmed {
            if let Some(audition) = self.auditions.get_mut(&pad) {
                ctx.timers.cancel(audition.timer);
                audition.timer = ctx
                    .timers
                    .schedule(self.timing.audition_trigger, TimerEvent::AuditionTrigger { pad });
            }
        }
        Ok(())
    }

    /// Change the library filter and redraw right away.
    pub fn set_filter(&mut self, ctx: &mut Ctx, filter: SampleFilter) {
        self.filter = filter;
        if let Some(id) = self.render.take() {
            ctx.timers.cancel(id);
        }
        self.render_now(ctx);
    }

    /// Queue a redraw, pushing back one already queued so a burst of
    /// listings draws once after it goes quiet.
    pub fn schedule_render(&mut self, ctx: &mut Ctx) {
        if let Some(id) = self.render.take() {
            ctx.timers.cancel(id);
        }
        self.render = Some(
            ctx.timers
                .schedule(self.timing.render_debounce, TimerEvent::CatalogRender),
        );
    }

    /// Rows of the filtered view. Whether a sample is active is looked up in
    /// the store on every call.
    pub fn rows(&self, ctx: &Ctx) -> Vec<CatalogRow> {
        self.lists
            .values()
            .flatten()
            .filter_map(|entry| {
                let active = ctx.store.loaded_sample(&entry.family) == Some(entry.name.as_str());
                self.filter.matches(entry, active).then(|| CatalogRow {
                    entry: entry.clone(),
                    active,
                })
            })
            .collect()
    }

    fn render_now(&mut self, ctx: &mut Ctx) {
        let rows = self.rows(ctx);
        ctx.notify(Notice::CatalogRendered(rows));
    }

    /// Forget everything in flight. Listings already received are kept.
    pub fn on_link_closed(&mut self, ctx: &mut Ctx) {
        if !self.pending.is_empty() {
            info!("Voiding {} pending listing requests", self.pending.len());
        }
        self.pending.clear();
        if let Some(batch) = self.batch.take() {
            for timer in batch.timers {
                ctx.timers.cancel(timer);
            }
        }
        for (_, audition) in self.auditions.drain() {
            ctx.timers.cancel(audition.timer);
        }
        self.selector = None;
    }

    /// Cancel every timer owned by the cache.
    pub fn shutdown(&mut self, ctx: &mut Ctx) {
        self.on_link_closed(ctx);
        if let Some(id) = self.render.take() {
            ctx.timers.cancel(id);
        }
    }
}

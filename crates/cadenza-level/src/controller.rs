//! Rendition set management: admission, selection, live reload, recovery.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use cadenza_core::{
    ErrorData, ErrorDetails, ErrorKind, Level, LevelDetails, LoadStats, MediaTrackInfo,
    ParsedLevel,
};
use cadenza_events::{Event, EventBus, LevelEvent, ManifestEvent, MediaEvent};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::{
    build_blocking_reload_url, compute_reload_interval, parse_push_params, AutoLevelProvider,
    Capabilities, LevelOptions, LowestLevelProvider, LOW_LATENCY_HEAD_START,
};

/// Audio codec that some sinks misdeclare; erased under the MPEG-audio
/// workaround so the demuxer probes the real codec.
const MPEG_AUDIO_CODEC: &str = "mp4a.40.34";

struct Inner {
    opts: LevelOptions,
    caps: Capabilities,
    abr: Arc<dyn AutoLevelProvider>,
    levels: Vec<Level>,
    current: Option<usize>,
    manual: Option<usize>,
    first_level: usize,
    start_level_override: Option<usize>,
    level_retry_count: u32,
    started: bool,
    next_auto_level_hint: Option<usize>,
    timer_handle: Option<tokio::task::JoinHandle<()>>,
    timer_generation: u64,
    self_ref: Weak<Mutex<Inner>>,
}

/// Manages the set of alternative bitrate renditions: groups and filters the
/// manifest, gates rendition switching, reloads live playlists on a timer
/// (blocking LL-HLS reloads included), and recovers from load errors with
/// backoff, redundant-URL failover and rendition walk-down.
pub struct LevelController {
    inner: Arc<Mutex<Inner>>,
    bus: EventBus,
}

impl LevelController {
    #[must_use]
    pub fn new(bus: EventBus, opts: LevelOptions, caps: Capabilities) -> Self {
        Self::with_auto_level_provider(bus, opts, caps, Arc::new(LowestLevelProvider))
    }

    /// Construct with the external ABR controller's choice feed.
    #[must_use]
    pub fn with_auto_level_provider(
        bus: EventBus,
        opts: LevelOptions,
        caps: Capabilities,
        abr: Arc<dyn AutoLevelProvider>,
    ) -> Self {
        let inner = Arc::new(Mutex::new(Inner {
            opts,
            caps,
            abr,
            levels: Vec::new(),
            current: None,
            manual: None,
            first_level: 0,
            start_level_override: None,
            level_retry_count: 0,
            started: true,
            next_auto_level_hint: None,
            timer_handle: None,
            timer_generation: 0,
            self_ref: Weak::new(),
        }));
        inner.lock().unwrap_or_else(PoisonError::into_inner).self_ref = Arc::downgrade(&inner);
        Self { inner, bus }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route one bus event into the matching handler.
    ///
    /// `ERROR` events are not routed here: recovery mutates the event
    /// (retry marking, fatal promotion), so the dispatcher must call
    /// [`handle_error`] with the mutable event before observers see it.
    ///
    /// [`handle_error`]: LevelController::handle_error
    pub fn handle_event(&self, event: &Event) {
        match event {
            Event::Manifest(ManifestEvent::Loading) => self.handle_manifest_loading(),
            Event::Manifest(ManifestEvent::Loaded {
                levels,
                audio_tracks,
                stats,
                ..
            }) => self.handle_manifest_loaded(levels, audio_tracks, *stats),
            Event::Level(LevelEvent::Loaded {
                level,
                details,
                id,
                stats,
            }) => self.handle_level_loaded(*level, *id, details.clone(), *stats),
            Event::Level(LevelEvent::AudioTrackSwitched { group_id, .. }) => {
                if let Some(group_id) = group_id {
                    self.handle_audio_track_switched(group_id);
                }
            }
            Event::Media(MediaEvent::Detaching) => {
                Inner::clear_timer(&mut self.lock());
            }
            _ => {}
        }
    }

    pub fn handle_manifest_loading(&self) {
        let mut g = self.lock();
        Inner::clear_timer(&mut g);
        g.levels.clear();
        g.current = None;
        g.manual = None;
        g.level_retry_count = 0;
        g.next_auto_level_hint = None;
    }

    /// Manifest admission: group redundant streams by bitrate, filter by
    /// codec support, sort, and announce the surviving rendition set.
    pub fn handle_manifest_loaded(
        &self,
        parsed: &[ParsedLevel],
        audio_tracks: &[MediaTrackInfo],
        stats: LoadStats,
    ) {
        let mut g = self.lock();

        let mut levels: Vec<Level> = Vec::new();
        for entry in parsed {
            if let Some(existing) = levels.iter_mut().find(|l| l.bitrate == entry.bitrate) {
                existing.url.push(entry.url.clone());
                if let Some(group) = &entry.audio_group_id {
                    if !existing.audio_group_ids.contains(group) {
                        existing.audio_group_ids.push(group.clone());
                    }
                }
                if let Some(group) = &entry.text_group_id {
                    if !existing.text_group_ids.contains(group) {
                        existing.text_group_ids.push(group.clone());
                    }
                }
            } else {
                levels.push(Level::from_parsed(entry));
            }
        }

        let video_codec_found = levels.iter().any(|l| l.video_codec.is_some());
        let audio_codec_found = levels.iter().any(|l| l.audio_codec.is_some());

        // Audio-only renditions are fallbacks a codec'd stream never plays.
        if video_codec_found && audio_codec_found {
            levels.retain(|l| l.video_codec.is_some());
        }

        levels.retain(|l| {
            l.audio_codec
                .as_deref()
                .is_none_or(|c| (g.caps.codec_supported)(c))
                && l.video_codec
                    .as_deref()
                    .is_none_or(|c| (g.caps.codec_supported)(c))
        });

        if g.caps.mpeg_audio_workaround {
            for level in &mut levels {
                if level
                    .audio_codec
                    .as_deref()
                    .is_some_and(|c| c.contains(MPEG_AUDIO_CODEC))
                {
                    level.audio_codec = None;
                }
            }
        }

        if levels.is_empty() {
            warn!("no level with compatible codecs found in manifest");
            drop(g);
            self.bus.publish(
                ErrorData::new(
                    ErrorKind::Media,
                    ErrorDetails::ManifestIncompatibleCodecs,
                    true,
                )
                .with_reason("no level with compatible codecs found in manifest"),
            );
            return;
        }

        levels.sort_by_key(|l| l.bitrate);

        let first_bitrate = parsed.first().map_or(0, |p| p.bitrate);
        g.first_level = levels
            .iter()
            .position(|l| l.bitrate == first_bitrate)
            .unwrap_or(0);
        g.levels = levels.clone();

        let alt_audio = audio_tracks.iter().any(|t| t.url.is_some());
        debug!(
            levels = levels.len(),
            first_level = g.first_level,
            "manifest admitted"
        );
        let start = Inner::start_level(&g);
        let started = g.started;
        drop(g);

        self.bus.publish(ManifestEvent::Parsed {
            levels,
            audio_tracks: audio_tracks.to_vec(),
            first_level: self.first_level(),
            stats,
            audio: audio_codec_found,
            video: video_codec_found,
            alt_audio,
        });

        if started {
            self.set_level(start);
        }
    }

    /// Currently selected rendition index.
    #[must_use]
    pub fn level(&self) -> Option<usize> {
        self.lock().current
    }

    /// Switch renditions. The single write-authorised gate: cancels any armed
    /// reload, announces the switch, and issues a playlist load when details
    /// are missing or live.
    pub fn set_level(&self, new_level: usize) {
        let mut g = self.lock();
        if new_level >= g.levels.len() {
            drop(g);
            warn!(level = new_level, "invalid level index");
            self.bus.publish(
                ErrorData::new(ErrorKind::Other, ErrorDetails::LevelSwitchError, false)
                    .with_level(new_level)
                    .with_reason("invalid level idx"),
            );
            return;
        }

        // Re-selecting the current rendition with details in hand changes
        // nothing; in particular an armed live reload must survive.
        if g.current == Some(new_level) && g.levels[new_level].details.is_some() {
            return;
        }

        Inner::clear_timer(&mut g);

        if g.current != Some(new_level) {
            info!(level = new_level, "switching level");
            g.current = Some(new_level);
            let bitrate = g.levels[new_level].bitrate;
            self.bus.publish(LevelEvent::Switching {
                level: new_level,
                bitrate,
            });
        }

        let level = &g.levels[new_level];
        let needs_load = level.details.as_ref().is_none_or(|d| d.live);
        if needs_load && g.started {
            let url = level.active_url().clone();
            let id = level.url_id;
            drop(g);
            self.bus.publish(LevelEvent::Loading {
                url,
                level: new_level,
                id,
            });
        }
    }

    /// Pinned rendition, `None` in auto (ABR) mode.
    #[must_use]
    pub fn manual_level(&self) -> Option<usize> {
        self.lock().manual
    }

    pub fn set_manual_level(&self, level: Option<usize>) {
        self.lock().manual = level;
        if let Some(level) = level {
            self.set_level(level);
        }
    }

    /// The rendition the next fragment load should come from: the pinned
    /// level if set, then any recovery walk-down hint, otherwise the ABR
    /// controller's choice.
    #[must_use]
    pub fn next_load_level(&self) -> usize {
        let g = self.lock();
        g.manual
            .or(g.next_auto_level_hint)
            .unwrap_or_else(|| g.abr.next_auto_level())
    }

    /// Start-up rendition: explicit override, then configuration, then the
    /// manifest's first entry.
    #[must_use]
    pub fn start_level(&self) -> usize {
        Inner::start_level(&self.lock())
    }

    pub fn set_start_level(&self, level: usize) {
        self.lock().start_level_override = Some(level);
    }

    /// Index of the manifest's original first rendition in bitrate order.
    #[must_use]
    pub fn first_level(&self) -> usize {
        self.lock().first_level
    }

    /// Snapshot of the rendition set.
    #[must_use]
    pub fn levels(&self) -> Vec<Level> {
        self.lock().levels.clone()
    }

    /// Whether a reload or retry timer is armed.
    #[must_use]
    pub fn has_pending_reload(&self) -> bool {
        self.lock()
            .timer_handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Install freshly loaded playlist details and arm the live reload.
    pub fn handle_level_loaded(
        &self,
        level_idx: usize,
        id: usize,
        mut details: LevelDetails,
        stats: LoadStats,
    ) {
        trace!(level = level_idx, id, live = details.live, "level loaded");
        let mut g = self.lock();
        let Some(level) = g.levels.get_mut(level_idx) else {
            debug!(level = level_idx, "ignoring stale level loaded event");
            return;
        };

        details.push = parse_push_params(&details.url);
        details.updated = match &level.details {
            None => true,
            Some(prev) => {
                details.end_sn != prev.end_sn
                    || (details.server_control.is_none() && details.url != prev.url)
            }
        };
        let updated = details.updated;
        let live = details.live;
        level.details = Some(details.clone());

        if g.current != Some(level_idx) {
            return;
        }

        // A clean load clears the error budget unless a fragment problem is
        // still being worked on.
        if !g.levels[level_idx].fragment_error {
            g.levels[level_idx].load_error = 0;
            g.level_retry_count = 0;
        }

        if !live {
            Inner::clear_timer(&mut g);
            return;
        }
        if !g.started {
            return;
        }

        let interval = compute_reload_interval(&details, Some(&stats));
        if details.can_block_reload() {
            // Blocking reload: ask the server for the next sequence number
            // and give the request a head start. Part advancement is
            // deliberately not applied; only the MSN moves.
            let msn = details.end_sn + u64::from(updated);
            let skip = details
                .server_control
                .map_or(0.0, |sc| sc.can_skip_until);
            let url = build_blocking_reload_url(
                g.levels[level_idx].active_url(),
                msn,
                None,
                None,
                skip,
            );
            let delay = interval
                .saturating_sub(LOW_LATENCY_HEAD_START)
                .max(LOW_LATENCY_HEAD_START);
            debug!(level = level_idx, ?delay, %url, "arming low-latency reload");
            Inner::arm_timer(&mut g, self.bus.clone(), delay, Some(url));
        } else {
            debug!(level = level_idx, ?interval, "arming live reload");
            Inner::arm_timer(&mut g, self.bus.clone(), interval, None);
        }
    }

    /// Error recovery. The dispatcher must route `ERROR` events here before
    /// publishing them onward: recovery marks scheduled retries
    /// (`level_retry`) and promotes exhausted ones by flipping `fatal`.
    pub fn handle_error(&self, event: &mut ErrorData) {
        let mut g = self.lock();
        if event.fatal {
            Inner::clear_timer(&mut g);
            return;
        }

        let level_error = event.details.is_level_scoped();
        let frag_error = event.details.is_fragment_scoped();
        if !level_error && !frag_error {
            return;
        }

        let Some(level_idx) = event
            .level
            .or_else(|| event.frag.as_ref().map(|f| f.level))
        else {
            return;
        };

        if g.levels.is_empty() {
            // Recovery without an installed rendition set is an internal
            // inconsistency; surface it instead of corrupting state.
            drop(g);
            warn!("error recovery invoked with no levels installed");
            self.bus.publish(
                ErrorData::new(ErrorKind::Other, event.details, true)
                    .with_reason("cannot recover: no levels installed"),
            );
            return;
        }
        if level_idx >= g.levels.len() {
            return;
        }

        Inner::recover_level(&mut g, &self.bus, event, level_idx, level_error, frag_error);
    }

    /// Re-bind the redundant URL matching a freshly selected audio group.
    pub fn handle_audio_track_switched(&self, group_id: &str) {
        let mut g = self.lock();
        let Some(current) = g.current else {
            return;
        };
        let level = &g.levels[current];
        if level.audio_group_ids.is_empty() {
            return;
        }
        let Some(url_id) = level
            .audio_group_ids
            .iter()
            .position(|gid| gid.as_str() == group_id)
        else {
            return;
        };
        if url_id != level.url_id && url_id < level.url.len() {
            info!(level = current, url_id, "audio group switch re-binds level URL");
            let level = &mut g.levels[current];
            level.url_id = url_id;
            level.details = None;
            Inner::clear_timer(&mut g);
            Inner::load_current(&mut g, &self.bus, None);
        }
    }

    /// Remove a rendition, or just one of its redundant URLs.
    ///
    /// Surviving fragments are re-indexed so every fragment's `level` field
    /// matches its owner's position in the new set.
    pub fn remove_level(&self, index: usize, url_id: Option<usize>) {
        let mut g = self.lock();
        let mut levels: Vec<Level> = Vec::with_capacity(g.levels.len());
        for (i, mut level) in g.levels.drain(..).enumerate() {
            if i == index {
                if let Some(url_id) = url_id {
                    if level.url.len() > 1 && url_id < level.url.len() {
                        level.url.remove(url_id);
                        level.url_id = 0;
                        levels.push(level);
                    }
                }
                // Otherwise the level is dropped entirely.
            } else {
                levels.push(level);
            }
        }
        for (i, level) in levels.iter_mut().enumerate() {
            if let Some(details) = &mut level.details {
                for frag in &mut details.fragments {
                    frag.level = i;
                }
            }
        }
        g.levels = levels.clone();
        if g.current.is_some_and(|c| c >= levels.len()) {
            g.current = None;
        }
        drop(g);
        self.bus.publish(LevelEvent::Updated { levels });
    }

    /// Resume playlist loading: clear error budgets and (re)issue the load
    /// for the current or start-up rendition.
    pub fn start_load(&self) {
        let mut g = self.lock();
        g.started = true;
        for level in &mut g.levels {
            level.load_error = 0;
            level.fragment_error = false;
        }
        g.level_retry_count = 0;
        g.next_auto_level_hint = None;
        let target = match g.current {
            Some(current) => Some(current),
            None if !g.levels.is_empty() => Some(Inner::start_level(&g)),
            None => None,
        };
        drop(g);
        if let Some(target) = target {
            self.set_level(target);
        }
    }

    /// Halt playlist loading: no further load events beyond those already in
    /// flight, and no armed timer.
    pub fn stop_load(&self) {
        let mut g = self.lock();
        g.started = false;
        Inner::clear_timer(&mut g);
    }

    pub fn destroy(&self) {
        let mut g = self.lock();
        Inner::clear_timer(&mut g);
        g.levels.clear();
        g.current = None;
        g.manual = None;
        g.level_retry_count = 0;
    }
}

impl Drop for LevelController {
    fn drop(&mut self) {
        Inner::clear_timer(&mut self.lock());
    }
}

impl Inner {
    fn start_level(g: &Inner) -> usize {
        g.start_level_override
            .or(g.opts.start_level)
            .unwrap_or(g.first_level)
    }

    fn clear_timer(g: &mut Inner) {
        g.timer_generation += 1;
        if let Some(handle) = g.timer_handle.take() {
            handle.abort();
        }
    }

    /// Arm the reload timer, cancelling any previous one: at most one
    /// pending reload per controller.
    fn arm_timer(g: &mut Inner, bus: EventBus, delay: Duration, ll_url: Option<Url>) {
        Inner::clear_timer(g);
        let generation = g.timer_generation;
        let weak = g.self_ref.clone();
        g.timer_handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut g = inner.lock().unwrap_or_else(PoisonError::into_inner);
            if g.timer_generation != generation {
                return;
            }
            g.timer_handle = None;
            Inner::load_current(&mut g, &bus, ll_url);
        }));
    }

    /// Issue the playlist load for the current rendition, resolving the URL
    /// at fire time unless a blocking-reload URL was pre-built.
    fn load_current(g: &mut Inner, bus: &EventBus, url_override: Option<Url>) {
        if !g.started {
            return;
        }
        let Some(current) = g.current else {
            return;
        };
        let Some(level) = g.levels.get(current) else {
            return;
        };
        let url = url_override.unwrap_or_else(|| level.active_url().clone());
        bus.publish(LevelEvent::Loading {
            url,
            level: current,
            id: level.url_id,
        });
    }

    /// The recovery state machine: backoff for level-scoped errors, then
    /// redundant-URL failover, then rendition walk-down.
    fn recover_level(
        g: &mut Inner,
        bus: &EventBus,
        event: &mut ErrorData,
        level_idx: usize,
        level_error: bool,
        frag_error: bool,
    ) {
        {
            let level = &mut g.levels[level_idx];
            level.load_error += 1;
            level.fragment_error = frag_error;
        }

        if level_error {
            if g.level_retry_count < g.opts.level_loading_max_retry {
                let delay = g
                    .opts
                    .level_loading_retry_delay
                    .saturating_mul(2u32.saturating_pow(g.level_retry_count))
                    .min(g.opts.level_loading_max_retry_timeout);
                warn!(
                    level = level_idx,
                    retry = g.level_retry_count,
                    ?delay,
                    "level load failed, retrying"
                );
                Inner::arm_timer(g, bus.clone(), delay, None);
                event.level_retry = true;
                g.level_retry_count += 1;
            } else {
                warn!(level = level_idx, "level load retries exhausted");
                g.current = None;
                Inner::clear_timer(g);
                event.fatal = true;
                return;
            }
        }

        // Redundant failover composes with the backoff armed above: the
        // delayed load resolves the freshly advanced URL.
        let level = &mut g.levels[level_idx];
        let redundant = level.url.len();
        if redundant > 1 && level.load_error < redundant {
            level.url_id = (level.url_id + 1) % redundant;
            level.details = None;
            warn!(
                level = level_idx,
                url_id = level.url_id,
                "switching to redundant URL"
            );
        } else if g.manual.is_none() {
            // Auto mode: walk down one rendition, wrapping from the lowest
            // to the highest. The hint steers the next load without
            // cancelling any retry armed above.
            let next = if level_idx == 0 {
                g.levels.len() - 1
            } else {
                level_idx - 1
            };
            warn!(from = level_idx, to = next, "recovery redirects to rendition");
            g.next_auto_level_hint = Some(next);
        } else if frag_error {
            // Manual mode: null the index so a later `set_level` of the same
            // rendition re-triggers the load.
            g.current = None;
        }
    }
}

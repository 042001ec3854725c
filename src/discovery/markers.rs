// src/discovery/markers.rs

use crate::discovery::map::{MapController, MapLibrary, MarkerHandle, MarkerSpec};
use crate::discovery::popup::PopupManager;
use crate::discovery::timers::{Debouncer, Scheduler, TimerId, TimerTask};
use crate::domain::{GeoPoint, Listing, ListingId};
use crate::templates::components::{listing_popup, price_pill};
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One live marker and the popup content bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerEntry {
    pub marker: MarkerHandle,
    pub spec: MarkerSpec,
    pub popup_html: String,
}

/// Listing id → live marker. Only [`MarkerSync`] mutates it.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    entries: BTreeMap<ListingId, MarkerEntry>,
}

impl MarkerRegistry {
    pub fn keys(&self) -> impl Iterator<Item = &ListingId> {
        self.entries.keys()
    }

    pub fn get(&self, id: &ListingId) -> Option<&MarkerEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &ListingId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = GeoPoint> + '_ {
        self.entries.values().map(|e| e.spec.position)
    }
}

/// What one synchronization pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub generation: u64,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    /// Listings whose marker could not be built; they are retried on the next pass.
    pub failed: Vec<ListingId>,
}

#[derive(Debug)]
struct PendingPass {
    generation: u64,
    listings: Vec<Listing>,
}

/// Keeps the marker registry in step with the filtered listing collection using minimal map mutations.
///
/// Passes are requested with [`MarkerSync::request`] and run later by the engine. A newer request
/// replaces an older one that has not run yet, so only the latest collection ever reaches the map.
#[derive(Debug)]
pub struct MarkerSync {
    registry: MarkerRegistry,
    pending: Option<PendingPass>,
    generation: u64,
    applied: u64,
    fit: Debouncer,
    fit_delay: Duration,
    currency_symbol: String,
}

impl MarkerSync {
    pub fn new(fit_delay: Duration, currency_symbol: impl Into<String>) -> Self {
        Self {
            registry: MarkerRegistry::default(),
            pending: None,
            generation: 0,
            applied: 0,
            fit: Debouncer::new(),
            fit_delay,
            currency_symbol: currency_symbol.into(),
        }
    }

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn fit_pending(&self) -> bool {
        self.fit.is_armed()
    }

    /// Generation of the last pass that reached the map.
    pub fn applied_generation(&self) -> u64 {
        self.applied
    }

    /// Queues `listings` as the next target state, superseding any queued pass. Returns its generation.
    pub fn request(&mut self, listings: &[Listing]) -> u64 {
        self.generation += 1;
        if let Some(stale) = self.pending.replace(PendingPass {
            generation: self.generation,
            listings: listings.to_vec(),
        }) {
            debug!(
                superseded = stale.generation,
                by = self.generation,
                "marker sync pass superseded"
            );
        }
        self.generation
    }

    /// Runs the newest queued pass if the map is ready. Returns `None` when nothing ran.
    pub fn run_pending<L: MapLibrary>(
        &mut self,
        map: &mut MapController<L>,
        popups: &mut PopupManager,
        timers: &mut Scheduler,
        now: Instant,
    ) -> Option<SyncReport> {
        if !map.is_ready() {
            return None;
        }
        let pass = self.pending.take()?;
        if pass.generation <= self.applied {
            debug!(generation = pass.generation, "dropping stale marker sync pass");
            return None;
        }
        Some(self.apply(pass, map, popups, timers, now))
    }

    fn apply<L: MapLibrary>(
        &mut self,
        pass: PendingPass,
        map: &mut MapController<L>,
        popups: &mut PopupManager,
        timers: &mut Scheduler,
        now: Instant,
    ) -> SyncReport {
        let mut report = SyncReport {
            generation: pass.generation,
            ..SyncReport::default()
        };

        let wanted: HashSet<&ListingId> = pass.listings.iter().map(|l| &l.id).collect();

        // 1. Drop markers whose listing left the collection.
        let stale: Vec<ListingId> = self
            .registry
            .entries
            .keys()
            .filter(|id| !wanted.contains(id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(entry) = self.registry.entries.remove(&id) {
                popups.detach(&id, map, timers);
                if let Err(e) = map.remove_marker(entry.marker) {
                    warn!(listing_id = %id, error = %e, "failed to remove marker");
                }
                report.removed += 1;
            }
        }

        // 2 + 3. Create new markers; touch survivors only when what they show changed.
        let mut seen: HashSet<&ListingId> = HashSet::with_capacity(pass.listings.len());
        for listing in &pass.listings {
            if !seen.insert(&listing.id) {
                warn!(listing_id = %listing.id, "duplicate listing id in collection, ignoring repeat");
                continue;
            }

            let spec = marker_spec(listing, &self.currency_symbol);
            let popup_html = listing_popup(listing, &self.currency_symbol).into_string();

            match self.registry.entries.get_mut(&listing.id) {
                Some(entry) => {
                    let mut touched = false;
                    if entry.spec != spec {
                        if let Err(e) = map.update_marker(entry.marker, &spec) {
                            warn!(listing_id = %listing.id, error = %e, "failed to update marker, dropping it");
                            let marker = entry.marker;
                            self.registry.entries.remove(&listing.id);
                            popups.detach(&listing.id, map, timers);
                            if let Err(e) = map.remove_marker(marker) {
                                debug!(listing_id = %listing.id, error = %e, "marker already gone");
                            }
                            report.failed.push(listing.id.clone());
                            continue;
                        }
                        entry.spec = spec;
                        touched = true;
                    }
                    if entry.popup_html != popup_html {
                        popups.refresh_content(&listing.id, &popup_html, map);
                        entry.popup_html = popup_html;
                        touched = true;
                    }
                    if touched {
                        report.updated += 1;
                    } else {
                        report.unchanged += 1;
                    }
                }
                None => match map.add_marker(&spec) {
                    Ok(marker) => {
                        self.registry.entries.insert(
                            listing.id.clone(),
                            MarkerEntry {
                                marker,
                                spec,
                                popup_html,
                            },
                        );
                        report.added += 1;
                    }
                    Err(e) => {
                        warn!(listing_id = %listing.id, error = %e, "skipping listing, marker could not be created");
                        report.failed.push(listing.id.clone());
                    }
                },
            }
        }

        // 4. Frame the result once things settle.
        if self.registry.is_empty() {
            self.fit.cancel(timers);
        } else {
            self.fit
                .trigger(timers, now, self.fit_delay, TimerTask::FitBounds);
        }

        self.applied = pass.generation;
        debug!(
            generation = report.generation,
            added = report.added,
            updated = report.updated,
            unchanged = report.unchanged,
            removed = report.removed,
            failed = report.failed.len(),
            "marker sync pass applied"
        );
        report
    }

    /// Handles a fired `FitBounds` timer.
    pub fn on_fit_timer<L: MapLibrary>(&mut self, id: TimerId, map: &mut MapController<L>) {
        if !self.fit.fired(id) {
            return;
        }
        if let Err(e) = map.fit_bounds(self.registry.positions()) {
            warn!(error = %e, "failed to fit map to markers");
        }
    }

    /// Removes every marker. Used on teardown; keeps going past individual failures.
    pub fn clear<L: MapLibrary>(
        &mut self,
        map: &mut MapController<L>,
        popups: &mut PopupManager,
        timers: &mut Scheduler,
    ) -> usize {
        self.fit.cancel(timers);
        self.pending = None;
        let entries = std::mem::take(&mut self.registry.entries);
        let n = entries.len();
        for (id, entry) in entries {
            popups.detach(&id, map, timers);
            if let Err(e) = map.remove_marker(entry.marker) {
                warn!(listing_id = %id, error = %e, "failed to remove marker during teardown");
            }
        }
        // A later mount starts from an empty registry, so any pass may apply again.
        self.applied = 0;
        self.generation = 0;
        n
    }

    pub(crate) fn forget_timers(&mut self) {
        self.fit.forget();
    }
}

/// Marker drawing data for a listing: its position plus the price pill.
pub fn marker_spec(listing: &Listing, currency_symbol: &str) -> MarkerSpec {
    MarkerSpec {
        position: listing.position,
        title: listing.title.clone(),
        label_html: price_pill(listing.price, currency_symbol).into_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::discovery::map::SceneLibrary;

    struct Fixture {
        timers: Scheduler,
        map: MapController<SceneLibrary>,
        popups: PopupManager,
        sync: MarkerSync,
        now: Instant,
    }

    impl Fixture {
        fn new() -> Self {
            let mut timers = Scheduler::new();
            let now = Instant::now();
            let mut map = MapController::new(SceneLibrary::ready(), DiscoveryConfig::default());
            map.initialize(&mut timers, now).unwrap();
            Self {
                timers,
                map,
                popups: PopupManager::new(Duration::from_millis(200)),
                sync: MarkerSync::new(Duration::from_millis(250), "₱"),
                now,
            }
        }

        fn sync(&mut self, listings: &[Listing]) -> SyncReport {
            self.sync.request(listings);
            self.sync
                .run_pending(&mut self.map, &mut self.popups, &mut self.timers, self.now)
                .expect("pass should run")
        }

        fn keys(&self) -> Vec<String> {
            self.sync.registry().keys().map(|k| k.to_string()).collect()
        }

        fn live_markers(&self) -> usize {
            self.map.instance().unwrap().marker_count()
        }
    }

    fn listing(id: &str, lat: f64, price: u64) -> Listing {
        Listing::new(id, format!("Listing {id}"), GeoPoint::new(lat, 124.8), price)
    }

    #[test]
    fn failed_update_drops_the_marker_and_its_popup() {
        let mut fx = Fixture::new();
        fx.sync(&[listing("a", 10.0, 1000), listing("b", 10.1, 2000)]);

        let a = ListingId::from("a");
        let marker = fx.sync.registry().get(&a).unwrap().marker;
        fx.popups
            .show(&a, marker, "<p>a</p>", &mut fx.map, &mut fx.timers)
            .unwrap();

        // Latitude out of range: the library refuses to move the marker there.
        let report = fx.sync(&[listing("a", 95.0, 1000), listing("b", 10.1, 2000)]);
        assert_eq!(report.failed, vec![a.clone()]);
        assert_eq!(report.unchanged, 1);
        assert_eq!(fx.keys(), vec!["b"]);
        assert_eq!(fx.live_markers(), 1);
        assert!(!fx.popups.is_open());

        // A later valid position brings it back.
        let report = fx.sync(&[listing("a", 10.2, 1000), listing("b", 10.1, 2000)]);
        assert_eq!(report.added, 1);
        assert_eq!(fx.keys(), vec!["a", "b"]);
    }

    #[test]
    fn registry_tracks_collection() {
        let mut f = Fixture::new();

        let r = f.sync(&[listing("1", 10.1, 3000), listing("2", 10.2, 8000)]);
        assert_eq!(r.added, 2);
        assert_eq!(f.keys(), vec!["1", "2"]);

        let r = f.sync(&[listing("2", 10.2, 8000), listing("3", 10.3, 1500)]);
        assert_eq!((r.added, r.removed, r.unchanged), (1, 1, 1));
        assert_eq!(f.keys(), vec!["2", "3"]);
        assert_eq!(f.live_markers(), 2);
    }

    #[test]
    fn survivors_keep_their_marker() {
        let mut f = Fixture::new();
        f.sync(&[listing("1", 10.1, 3000)]);
        let handle = f.sync.registry().get(&"1".into()).unwrap().marker;

        let r = f.sync(&[listing("1", 10.1, 3000)]);
        assert_eq!(r.unchanged, 1);
        assert_eq!(f.sync.registry().get(&"1".into()).unwrap().marker, handle);
        assert_eq!(f.map.instance().unwrap().stats().markers_added, 1);
        assert_eq!(f.map.instance().unwrap().stats().markers_updated, 0);
    }

    #[test]
    fn moved_or_repriced_listing_updates_in_place() {
        let mut f = Fixture::new();
        f.sync(&[listing("1", 10.1, 3000)]);
        let handle = f.sync.registry().get(&"1".into()).unwrap().marker;

        let r = f.sync(&[listing("1", 10.15, 3500)]);
        assert_eq!(r.updated, 1);
        let entry = f.sync.registry().get(&"1".into()).unwrap();
        assert_eq!(entry.marker, handle);
        assert!(entry.spec.label_html.contains("₱3,500"));
        assert_eq!(f.map.instance().unwrap().stats().markers_updated, 1);
    }

    #[test]
    fn bad_listing_does_not_abort_pass() {
        let mut f = Fixture::new();
        let r = f.sync(&[
            listing("ok-1", 10.1, 1000),
            listing("broken", 200.0, 1000),
            listing("ok-2", 10.2, 1000),
        ]);
        assert_eq!(r.added, 2);
        assert_eq!(r.failed, vec![ListingId::from("broken")]);
        assert_eq!(f.keys(), vec!["ok-1", "ok-2"]);
    }

    #[test]
    fn newer_request_supersedes_queued_one() {
        let mut f = Fixture::new();
        let first = f.sync.request(&[listing("1", 10.1, 3000)]);
        let second = f.sync.request(&[listing("2", 10.2, 8000)]);
        assert!(second > first);

        let r = f
            .sync
            .run_pending(&mut f.map, &mut f.popups, &mut f.timers, f.now)
            .unwrap();
        assert_eq!(r.generation, second);
        assert_eq!(f.keys(), vec!["2"]);
        assert!(f
            .sync
            .run_pending(&mut f.map, &mut f.popups, &mut f.timers, f.now)
            .is_none());
    }

    #[test]
    fn fit_is_debounced_and_skipped_when_empty() {
        let mut f = Fixture::new();
        f.sync(&[listing("1", 10.1, 3000)]);
        f.sync(&[listing("1", 10.1, 3000), listing("2", 10.2, 3000)]);
        assert!(f.sync.fit_pending());

        let fired: Vec<_> = f
            .timers
            .take_due(f.now + Duration::from_secs(1))
            .into_iter()
            .filter(|(_, t)| *t == TimerTask::FitBounds)
            .collect();
        assert_eq!(fired.len(), 1);
        f.sync.on_fit_timer(fired[0].0, &mut f.map);
        assert_eq!(f.map.instance().unwrap().stats().fit_bounds_calls, 1);

        f.sync(&[]);
        assert!(!f.sync.fit_pending());
        assert!(f.sync.registry().is_empty());
        assert_eq!(f.live_markers(), 0);
    }

    #[test]
    fn removing_listing_closes_its_popup() {
        let mut f = Fixture::new();
        f.sync(&[listing("1", 10.1, 3000)]);
        let entry = f.sync.registry().get(&"1".into()).unwrap().clone();
        f.popups
            .show(&"1".into(), entry.marker, &entry.popup_html, &mut f.map, &mut f.timers)
            .unwrap();

        f.sync(&[]);
        assert!(!f.popups.is_open());
        assert_eq!(f.map.instance().unwrap().popup_count(), 0);
    }

    #[test]
    fn waits_for_map() {
        let (lib, _loader) = SceneLibrary::deferred();
        let mut timers = Scheduler::new();
        let now = Instant::now();
        let mut map = MapController::new(lib, DiscoveryConfig::default());
        map.initialize(&mut timers, now).unwrap();
        let mut popups = PopupManager::new(Duration::from_millis(200));
        let mut sync = MarkerSync::new(Duration::from_millis(250), "₱");

        sync.request(&[listing("1", 10.1, 3000)]);
        assert!(sync.run_pending(&mut map, &mut popups, &mut timers, now).is_none());
        assert!(sync.has_pending());
    }
}

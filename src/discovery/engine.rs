// src/discovery/engine.rs

use crate::config::DiscoveryConfig;
use crate::discovery::filter;
use crate::discovery::lock::{InteractionLock, LockState};
use crate::discovery::map::{MapController, MapInput, MapLibrary, MapStatus};
use crate::discovery::markers::{MarkerSync, SyncReport};
use crate::discovery::popup::PopupManager;
use crate::discovery::timers::{Debouncer, PeriodicTask, Scheduler, TimerId, TimerTask};
use crate::discovery::view_mode::{ViewMode, ViewModeController};
use crate::domain::{FilterOptions, GeoPoint, Listing, ListingId};
use crate::source::ListingSource;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Upper bound on timer rounds per tick; each round may schedule follow-up work due immediately.
const MAX_TICK_ROUNDS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed {
        message: String,
    },
}

/// "Showing `shown` of `total` properties".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultSummary {
    pub shown: usize,
    pub total: usize,
}

/// User-visible messages the host shows as toasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    LoadFailed(String),
    MapUnavailable(String),
    LocationUnsupported,
    LocationDenied,
    LocationUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeoError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable: {0}")]
    Unavailable(String),
    #[error("location request timed out")]
    Timeout,
}

/// Which collection the engine fetches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ListingScope {
    #[default]
    Public,
    Owner(String),
}

/// Callbacks into the surrounding UI.
pub trait DiscoveryHost {
    /// A listing was picked on the map or in the list; the host opens the detail overlay and reports
    /// back through [`DiscoveryEngine::overlay_opened`] / [`DiscoveryEngine::overlay_closed`].
    fn listing_selected(&mut self, listing: &Listing);

    fn results_changed(&mut self, _summary: ResultSummary) {}

    fn load_state_changed(&mut self, _state: &LoadState) {}

    fn notify(&mut self, _notice: Notice) {}

    /// Starts an asynchronous geolocation request. The answer arrives later through
    /// [`DiscoveryEngine::location_resolved`]. `false` means the capability does not exist.
    fn request_location(&mut self) -> bool {
        false
    }
}

/// The property discovery engine: keeps the map, the list and the active filters consistent.
///
/// Everything runs on the host's event loop. The host forwards UI events to the methods below and calls
/// [`DiscoveryEngine::tick`] whenever [`DiscoveryEngine::next_deadline`] passes.
pub struct DiscoveryEngine<L: MapLibrary, H: DiscoveryHost> {
    config: DiscoveryConfig,
    source: Box<dyn ListingSource>,
    scope: ListingScope,
    host: H,

    timers: Scheduler,
    map: MapController<L>,
    markers: MarkerSync,
    popups: PopupManager,
    lock: InteractionLock,
    view: ViewModeController,
    sync_timer: Debouncer,
    refresh: PeriodicTask,

    listings: Vec<Listing>,
    filtered: Vec<Listing>,
    filters: FilterOptions,
    load_state: LoadState,
    mounted: bool,
    locating: bool,
    /// Position resolved while no map was ready; applied once the next marker pass settles.
    deferred_location: Option<GeoPoint>,
}

impl<L: MapLibrary, H: DiscoveryHost> DiscoveryEngine<L, H> {
    pub fn new(
        library: L,
        source: Box<dyn ListingSource>,
        scope: ListingScope,
        host: H,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            map: MapController::new(library, config.clone()),
            markers: MarkerSync::new(config.fit_bounds_debounce, config.currency_symbol.clone()),
            popups: PopupManager::new(config.popup_close_delay),
            config,
            source,
            scope,
            host,
            timers: Scheduler::new(),
            lock: InteractionLock::new(),
            view: ViewModeController::default(),
            sync_timer: Debouncer::new(),
            refresh: PeriodicTask::default(),
            listings: Vec::new(),
            filtered: Vec::new(),
            filters: FilterOptions::default(),
            load_state: LoadState::Idle,
            mounted: false,
            locating: false,
            deferred_location: None,
        }
    }

    // ---------- accessors ----------

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn filtered(&self) -> &[Listing] {
        &self.filtered
    }

    pub fn filters(&self) -> &FilterOptions {
        &self.filters
    }

    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            shown: self.filtered.len(),
            total: self.listings.len(),
        }
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view.mode()
    }

    pub fn lock_state(&self) -> LockState {
        self.lock.state()
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn scope(&self) -> &ListingScope {
        &self.scope
    }

    pub fn marker_ids(&self) -> Vec<ListingId> {
        self.markers.registry().keys().cloned().collect()
    }

    pub fn popup_open_for(&self) -> Option<&ListingId> {
        self.popups.open_for()
    }

    pub fn map(&self) -> &MapController<L> {
        &self.map
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// When the host should call [`DiscoveryEngine::tick`] next.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_due()
    }

    // ---------- lifecycle ----------

    /// Mounts the view: brings up the map (in map mode), fetches the collection and starts the optional
    /// periodic refresh. Mounting twice is a no-op.
    pub fn mount(&mut self, now: Instant) {
        if self.mounted {
            debug!("discovery view already mounted");
            return;
        }
        self.mounted = true;
        info!(scope = ?self.scope, mode = %self.view.mode(), "mounting discovery view");

        if self.view.mode() == ViewMode::Map {
            self.mount_map(now);
        }
        self.load(now);

        match self.config.refresh_interval {
            Some(period) if period.is_zero() => {
                warn!("refresh interval is zero, periodic refresh disabled");
            }
            Some(period) => {
                self.refresh
                    .start(&mut self.timers, now, period, TimerTask::Refresh);
            }
            None => {}
        }
    }

    /// Tears the view down: cancels every timer, closes the popup, removes the markers and disposes the map,
    /// in that order. Never fails; problems are logged.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.locating = false;
        self.deferred_location = None;

        let cancelled = self.timers.cancel_all();
        self.sync_timer.forget();
        self.refresh.forget();
        self.markers.forget_timers();
        self.map.forget_timers();
        debug!(cancelled, "timers cancelled on unmount");

        self.teardown_map();
        info!("discovery view unmounted");
    }

    fn mount_map(&mut self, now: Instant) {
        match self.map.initialize(&mut self.timers, now) {
            Ok(MapStatus::Ready) => self.request_sync(now),
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "map initialization failed");
                self.host.notify(Notice::MapUnavailable(e.to_string()));
            }
        }
    }

    fn teardown_map(&mut self) {
        self.sync_timer.cancel(&mut self.timers);
        self.popups.close(&mut self.map, &mut self.timers);
        let removed = self
            .markers
            .clear(&mut self.map, &mut self.popups, &mut self.timers);
        self.popups.forget();
        self.map.dispose(&mut self.timers);
        debug!(removed, "map torn down");
    }

    // ---------- data ----------

    /// Fetches the collection for the engine's scope. A failure keeps the previous collection and moves to
    /// `Failed`; [`DiscoveryEngine::retry`] tries again.
    pub fn load(&mut self, now: Instant) {
        self.set_load_state(LoadState::Loading);

        let fetched = match &self.scope {
            ListingScope::Public => self.source.fetch_listings(),
            ListingScope::Owner(owner) => self.source.fetch_owner_listings(owner),
        };

        match fetched {
            Ok(listings) => {
                info!(count = listings.len(), "listings loaded");
                self.listings = listings;
                self.set_load_state(LoadState::Ready);
                self.recompute(now);
            }
            Err(e) => {
                warn!(error = %e, "failed to load listings");
                let message = e.to_string();
                self.set_load_state(LoadState::Failed {
                    message: message.clone(),
                });
                self.host.notify(Notice::LoadFailed(message));
            }
        }
    }

    pub fn retry(&mut self, now: Instant) {
        self.load(now);
    }

    fn set_load_state(&mut self, state: LoadState) {
        if self.load_state != state {
            self.load_state = state;
            self.host.load_state_changed(&self.load_state);
        }
    }

    /// Replaces the active filters wholesale ("Apply").
    pub fn apply_filters(&mut self, filters: FilterOptions, now: Instant) {
        debug!(?filters, "applying filters");
        self.filters = filters;
        self.recompute(now);
    }

    pub fn reset_filters(&mut self, now: Instant) {
        self.apply_filters(FilterOptions::default(), now);
    }

    fn recompute(&mut self, now: Instant) {
        self.filtered = filter::apply(&self.listings, &self.filters);
        let summary = self.summary();
        debug!(shown = summary.shown, total = summary.total, "filtered collection updated");
        self.host.results_changed(summary);
        self.request_sync(now);
    }

    /// Queues a marker pass for the current filtered collection; it runs on the next tick and replaces any
    /// pass that has not run yet.
    fn request_sync(&mut self, now: Instant) {
        if !self.mounted || self.view.mode() != ViewMode::Map {
            return;
        }
        let generation = self.markers.request(&self.filtered);
        self.sync_timer
            .trigger(&mut self.timers, now, Duration::ZERO, TimerTask::SyncPass);
        debug!(generation, "marker sync requested");
    }

    // ---------- view mode ----------

    /// Switches renderer without refetching or refiltering. Returns `false` if already in `mode`.
    pub fn set_view_mode(&mut self, mode: ViewMode, now: Instant) -> bool {
        let Some(change) = self.view.set(mode) else {
            return false;
        };
        info!(from = %change.from, to = %change.to, "view mode changed");
        if self.mounted {
            match change.to {
                ViewMode::List => self.teardown_map(),
                ViewMode::Map => self.mount_map(now),
            }
        }
        true
    }

    pub fn toggle_view_mode(&mut self, now: Instant) -> ViewMode {
        let next = self.view.mode().other();
        self.set_view_mode(next, now);
        next
    }

    // ---------- pointer events ----------

    pub fn marker_hovered(&mut self, id: &ListingId) {
        if self.lock.is_locked() {
            return;
        }
        let Some(entry) = self.markers.registry().get(id) else {
            debug!(listing_id = %id, "hover on unknown marker");
            return;
        };
        if let Err(e) = self.popups.show(
            id,
            entry.marker,
            &entry.popup_html,
            &mut self.map,
            &mut self.timers,
        ) {
            warn!(listing_id = %id, error = %e, "failed to open popup");
        }
    }

    pub fn marker_left(&mut self, id: &ListingId, now: Instant) {
        self.popups.schedule_close(id, &mut self.timers, now);
    }

    /// Closes the popup, tells the host, and locks the map. Returns `false` for unknown ids.
    pub fn marker_clicked(&mut self, id: &ListingId) -> bool {
        if !self.markers.registry().contains(id) {
            debug!(listing_id = %id, "click on unknown marker");
            return false;
        }
        self.select(id)
    }

    /// Same selection path as a marker click.
    pub fn list_item_clicked(&mut self, id: &ListingId) -> bool {
        self.select(id)
    }

    fn select(&mut self, id: &ListingId) -> bool {
        let Some(listing) = self.filtered.iter().find(|l| &l.id == id) else {
            debug!(listing_id = %id, "selected listing is not in the filtered collection");
            return false;
        };
        self.popups.close(&mut self.map, &mut self.timers);
        self.host.listing_selected(listing);
        self.engage_lock();
        true
    }

    pub fn overlay_opened(&mut self) {
        self.engage_lock();
    }

    pub fn overlay_closed(&mut self) {
        if self.lock.release() {
            self.map.set_interactive(true);
        }
    }

    fn engage_lock(&mut self) {
        if self.lock.engage() {
            self.map.set_interactive(false);
        }
        self.popups.close(&mut self.map, &mut self.timers);
    }

    /// Raw viewport input from the user. Returns whether the viewport moved.
    pub fn dispatch_map_input(&mut self, input: &MapInput) -> bool {
        self.map.dispatch_input(input)
    }

    // ---------- geolocation ----------

    /// "Use my location". Returns whether a request is now in flight.
    pub fn locate_me(&mut self) -> bool {
        if !self.mounted {
            return false;
        }
        if self.locating {
            return true;
        }
        if self.host.request_location() {
            self.locating = true;
            true
        } else {
            self.host.notify(Notice::LocationUnsupported);
            false
        }
    }

    /// Outcome of a request started by [`DiscoveryEngine::locate_me`]. Ignored after unmount.
    pub fn location_resolved(&mut self, result: Result<GeoPoint, GeoError>) {
        if !self.mounted || !self.locating {
            debug!("ignoring location result, no request in flight");
            return;
        }
        self.locating = false;

        match result {
            Ok(point) if point.is_valid() => {
                if self.map.is_ready() {
                    self.center_on(point);
                } else {
                    debug!("map not shown yet, centering on the user once it is");
                    self.deferred_location = Some(point);
                }
            }
            Ok(point) => {
                warn!(lat = point.lat, lng = point.lng, "geolocation returned an invalid position");
                self.host
                    .notify(Notice::LocationUnavailable("invalid position".into()));
            }
            Err(GeoError::PermissionDenied) => {
                info!("geolocation permission denied");
                self.host.notify(Notice::LocationDenied);
            }
            Err(e) => {
                info!(error = %e, "geolocation failed");
                self.host.notify(Notice::LocationUnavailable(e.to_string()));
            }
        }
    }

    fn center_on(&mut self, point: GeoPoint) {
        if let Err(e) = self.map.set_view(point, self.config.locate_zoom) {
            warn!(error = %e, "failed to center map on the user");
        }
    }

    /// Runs after the bounds fit that follows a marker pass, so the user's position wins over it.
    fn apply_deferred_location(&mut self) {
        if let Some(point) = self.deferred_location.take() {
            self.center_on(point);
        }
    }

    // ---------- timers ----------

    /// Runs everything due at `now`. Returns how many timers fired.
    pub fn tick(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        for _ in 0..MAX_TICK_ROUNDS {
            let due = self.timers.take_due(now);
            if due.is_empty() {
                return fired;
            }
            fired += due.len();
            for (id, task) in due {
                self.on_timer(id, task, now);
            }
        }
        warn!(fired, "tick stopped after too many rounds of follow-up timers");
        fired
    }

    fn on_timer(&mut self, id: TimerId, task: TimerTask, now: Instant) {
        match task {
            TimerTask::LibraryPoll => {
                let was_ready = self.map.is_ready();
                match self.map.on_library_poll(id, &mut self.timers, now) {
                    Ok(MapStatus::Ready) if !was_ready => self.request_sync(now),
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "map initialization failed");
                        self.host.notify(Notice::MapUnavailable(e.to_string()));
                    }
                }
            }
            TimerTask::InvalidateSize => self.map.on_invalidate_size(id),
            TimerTask::SyncPass => {
                if self.sync_timer.fired(id) {
                    if let Some(report) =
                        self.markers
                            .run_pending(&mut self.map, &mut self.popups, &mut self.timers, now)
                    {
                        self.log_report(&report);
                        if !self.markers.fit_pending() {
                            self.apply_deferred_location();
                        }
                    }
                }
            }
            TimerTask::FitBounds => {
                self.markers.on_fit_timer(id, &mut self.map);
                self.apply_deferred_location();
            }
            TimerTask::PopupClose => self.popups.on_close_timer(id, &mut self.map),
            TimerTask::Refresh => {
                if self.refresh.owns(id) {
                    debug!("periodic listing refresh");
                    self.load(now);
                }
            }
        }
    }

    fn log_report(&self, report: &SyncReport) {
        if !report.failed.is_empty() {
            warn!(
                generation = report.generation,
                failed = ?report.failed,
                "some listings have no marker this pass"
            );
        }
    }
}

impl<L: MapLibrary, H: DiscoveryHost> Drop for DiscoveryEngine<L, H> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::map::SceneLibrary;
    use crate::source::SourceError;

    struct StaticSource(Vec<Listing>);

    impl ListingSource for StaticSource {
        fn fetch_listings(&self) -> Result<Vec<Listing>, SourceError> {
            Ok(self.0.clone())
        }

        fn fetch_owner_listings(&self, owner_id: &str) -> Result<Vec<Listing>, SourceError> {
            Ok(self
                .0
                .iter()
                .filter(|l| l.owner_id == owner_id)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct NullHost;

    impl DiscoveryHost for NullHost {
        fn listing_selected(&mut self, _listing: &Listing) {}
    }

    fn listing(id: &str, owner: &str) -> Listing {
        let mut l = Listing::new(id, id, GeoPoint::new(10.67, 124.80), 1000);
        l.owner_id = owner.into();
        l
    }

    #[test]
    fn owner_scope_fetches_owner_collection() {
        let source = StaticSource(vec![listing("a", "o1"), listing("b", "o2")]);
        let mut engine = DiscoveryEngine::new(
            SceneLibrary::ready(),
            Box::new(source),
            ListingScope::Owner("o2".into()),
            NullHost,
            DiscoveryConfig::default(),
        );
        engine.mount(Instant::now());

        let ids: Vec<_> = engine.listings().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(engine.load_state(), &LoadState::Ready);
    }

    #[test]
    fn unmount_is_idempotent_and_clears_timers() {
        let mut engine = DiscoveryEngine::new(
            SceneLibrary::ready(),
            Box::new(StaticSource(vec![listing("a", "o1")])),
            ListingScope::Public,
            NullHost,
            DiscoveryConfig::default(),
        );
        engine.mount(Instant::now());
        assert!(engine.pending_timers() > 0);

        engine.unmount();
        engine.unmount();
        assert_eq!(engine.pending_timers(), 0);
        assert!(engine.map().instance().is_none());
    }
}

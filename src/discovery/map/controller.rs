// src/discovery/map/controller.rs

use crate::config::DiscoveryConfig;
use crate::discovery::map::{
    Interactions, LatLngBounds, MapError, MapInput, MapInstance, MapLibrary, MapOptions,
    MarkerHandle, MarkerSpec, PopupHandle,
};
use crate::discovery::timers::{Debouncer, Scheduler, TimerId, TimerTask};
use crate::domain::GeoPoint;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapStatus {
    /// No instance and no pending initialization.
    Unmounted,
    /// Waiting for the library to finish loading; a poll timer is armed.
    Pending,
    Ready,
}

/// Exclusive owner of the map instance for one mounted view.
///
/// Tracks every marker and popup it hands out so that [`MapController::dispose`] can release them even when
/// the caller forgot to.
pub struct MapController<L: MapLibrary> {
    library: L,
    container_id: String,
    config: DiscoveryConfig,
    instance: Option<L::Map>,
    status: MapStatus,
    interactive: bool,
    poll: Debouncer,
    invalidate: Debouncer,
    poll_attempts: u32,
    markers: BTreeSet<MarkerHandle>,
    popups: BTreeSet<PopupHandle>,
}

impl<L: MapLibrary> MapController<L> {
    pub fn new(library: L, config: DiscoveryConfig) -> Self {
        Self {
            library,
            container_id: config.container_id.clone(),
            config,
            instance: None,
            status: MapStatus::Unmounted,
            interactive: true,
            poll: Debouncer::new(),
            invalidate: Debouncer::new(),
            poll_attempts: 0,
            markers: BTreeSet::new(),
            popups: BTreeSet::new(),
        }
    }

    pub fn status(&self) -> MapStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == MapStatus::Ready
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn instance(&self) -> Option<&L::Map> {
        self.instance.as_ref()
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    pub fn poll_attempts(&self) -> u32 {
        self.poll_attempts
    }

    /// Creates the map instance, or arranges to retry once the library has loaded.
    ///
    /// Calling this while an instance exists reuses it. A library that is still loading is not an error:
    /// a poll timer is armed and `Pending` is returned.
    pub fn initialize(&mut self, timers: &mut Scheduler, now: Instant) -> Result<MapStatus, MapError> {
        if self.instance.is_some() {
            debug!(container = %self.container_id, "map already initialized, reusing instance");
            return Ok(MapStatus::Ready);
        }

        if !self.library.is_loaded() {
            self.poll_attempts += 1;
            debug!(
                container = %self.container_id,
                attempt = self.poll_attempts,
                "map library not loaded yet, retrying later"
            );
            self.poll.trigger(
                timers,
                now,
                self.config.library_poll_interval,
                TimerTask::LibraryPoll,
            );
            self.status = MapStatus::Pending;
            return Ok(MapStatus::Pending);
        }

        self.poll.cancel(timers);

        let options = MapOptions {
            center: self.config.default_center,
            zoom: self.config.default_zoom,
            max_zoom: self.config.tiles.max_zoom,
            zoom_control: true,
        };
        let mut map = match self.library.create_map(&self.container_id, &options) {
            Ok(map) => map,
            Err(e) => {
                self.status = MapStatus::Unmounted;
                return Err(e);
            }
        };
        if let Err(e) = map.add_tile_layer(&self.config.tiles) {
            if let Err(remove_err) = map.remove() {
                error!(container = %self.container_id, error = %remove_err, "failed to remove half-built map");
            }
            self.status = MapStatus::Unmounted;
            return Err(e);
        }
        if !self.interactive {
            map.set_interactions(Interactions::none());
            map.set_container_interactive(false);
        }

        self.instance = Some(map);
        self.status = MapStatus::Ready;
        self.invalidate.trigger(
            timers,
            now,
            self.config.invalidate_size_delay,
            TimerTask::InvalidateSize,
        );
        info!(container = %self.container_id, "map initialized");
        Ok(MapStatus::Ready)
    }

    /// Handles a fired `LibraryPoll` timer. Stale timers are ignored.
    pub fn on_library_poll(
        &mut self,
        id: TimerId,
        timers: &mut Scheduler,
        now: Instant,
    ) -> Result<MapStatus, MapError> {
        if !self.poll.fired(id) {
            return Ok(self.status);
        }
        self.initialize(timers, now)
    }

    /// Handles a fired `InvalidateSize` timer.
    pub fn on_invalidate_size(&mut self, id: TimerId) {
        if !self.invalidate.fired(id) {
            return;
        }
        if let Some(map) = self.instance.as_mut() {
            map.invalidate_size();
        }
    }

    fn map_mut(&mut self) -> Result<&mut L::Map, MapError> {
        self.instance.as_mut().ok_or(MapError::NotMounted)
    }

    pub fn add_marker(&mut self, spec: &MarkerSpec) -> Result<MarkerHandle, MapError> {
        let handle = self.map_mut()?.add_marker(spec)?;
        self.markers.insert(handle);
        Ok(handle)
    }

    pub fn update_marker(&mut self, marker: MarkerHandle, spec: &MarkerSpec) -> Result<(), MapError> {
        self.map_mut()?.update_marker(marker, spec)
    }

    pub fn remove_marker(&mut self, marker: MarkerHandle) -> Result<(), MapError> {
        self.markers.remove(&marker);
        self.map_mut()?.remove_marker(marker)
    }

    pub fn open_popup(&mut self, anchor: MarkerHandle, html: &str) -> Result<PopupHandle, MapError> {
        let handle = self.map_mut()?.open_popup(anchor, html)?;
        self.popups.insert(handle);
        Ok(handle)
    }

    pub fn set_popup_content(&mut self, popup: PopupHandle, html: &str) -> Result<(), MapError> {
        self.map_mut()?.set_popup_content(popup, html)
    }

    pub fn close_popup(&mut self, popup: PopupHandle) -> Result<(), MapError> {
        self.popups.remove(&popup);
        self.map_mut()?.close_popup(popup)
    }

    /// Frames `points` with the configured padding. An empty set leaves the viewport alone.
    pub fn fit_bounds<I>(&mut self, points: I) -> Result<bool, MapError>
    where
        I: IntoIterator<Item = GeoPoint>,
    {
        let Some(bounds) = LatLngBounds::from_points(points) else {
            return Ok(false);
        };
        let padding = self.config.bounds_padding;
        self.map_mut()?.fit_bounds(bounds.pad(padding))?;
        Ok(true)
    }

    pub fn set_view(&mut self, center: GeoPoint, zoom: f64) -> Result<(), MapError> {
        self.map_mut()?.set_view(center, zoom)
    }

    /// Enables or disables every viewport handler plus pointer events on the container.
    /// Remembered across re-initialization.
    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
        if let Some(map) = self.instance.as_mut() {
            let handlers = if interactive {
                Interactions::all()
            } else {
                Interactions::none()
            };
            map.set_interactions(handlers);
            map.set_container_interactive(interactive);
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Forwards raw user input to the instance. Returns whether the viewport moved.
    pub fn dispatch_input(&mut self, input: &MapInput) -> bool {
        match self.instance.as_mut() {
            Some(map) => map.handle_input(input),
            None => false,
        }
    }

    /// Releases popups, markers and the instance, and cancels this controller's timers.
    ///
    /// Never fails: every step runs even if an earlier one errored, and errors are logged.
    /// Returns `false` when there was nothing to dispose.
    pub fn dispose(&mut self, timers: &mut Scheduler) -> bool {
        self.poll.cancel(timers);
        self.invalidate.cancel(timers);
        self.poll_attempts = 0;

        let had_instance = self.instance.is_some();
        if let Some(mut map) = self.instance.take() {
            for popup in std::mem::take(&mut self.popups) {
                if let Err(e) = map.close_popup(popup) {
                    debug!(?popup, error = %e, "popup already gone during dispose");
                }
            }
            for marker in std::mem::take(&mut self.markers) {
                if let Err(e) = map.remove_marker(marker) {
                    debug!(?marker, error = %e, "marker already gone during dispose");
                }
            }
            if let Err(e) = map.remove() {
                error!(container = %self.container_id, error = %e, "failed to remove map instance");
            }
            info!(container = %self.container_id, "map disposed");
        }

        self.markers.clear();
        self.popups.clear();
        self.status = MapStatus::Unmounted;
        had_instance
    }

    /// Forgets timer handles after the owner cleared the whole queue.
    pub(crate) fn forget_timers(&mut self) {
        self.poll.forget();
        self.invalidate.forget();
    }
}

impl<L: MapLibrary> Drop for MapController<L> {
    fn drop(&mut self) {
        if self.instance.is_some() {
            let mut scratch = Scheduler::new();
            self.forget_timers();
            self.dispose(&mut scratch);
        }
    }
}

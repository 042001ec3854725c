// src/discovery/popup.rs

use crate::discovery::map::{MapController, MapError, MapLibrary, MarkerHandle, PopupHandle};
use crate::discovery::timers::{Debouncer, Scheduler, TimerId, TimerTask};
use crate::domain::ListingId;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
struct OpenPopup {
    listing_id: ListingId,
    handle: PopupHandle,
}

/// Owns the single hover popup shown on the map.
///
/// Leaving a marker starts a short close delay; entering any marker before it elapses cancels the close,
/// so a pointer that briefly slips off and back does not make the popup flicker.
#[derive(Debug)]
pub struct PopupManager {
    open: Option<OpenPopup>,
    close_timer: Debouncer,
    close_delay: Duration,
}

impl PopupManager {
    pub fn new(close_delay: Duration) -> Self {
        Self {
            open: None,
            close_timer: Debouncer::new(),
            close_delay,
        }
    }

    /// Listing whose popup is currently open.
    pub fn open_for(&self) -> Option<&ListingId> {
        self.open.as_ref().map(|p| &p.listing_id)
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn close_pending(&self) -> bool {
        self.close_timer.is_armed()
    }

    /// Opens the popup for `listing_id`, replacing whatever popup was open.
    pub fn show<L: MapLibrary>(
        &mut self,
        listing_id: &ListingId,
        anchor: MarkerHandle,
        html: &str,
        map: &mut MapController<L>,
        timers: &mut Scheduler,
    ) -> Result<(), MapError> {
        self.close_timer.cancel(timers);

        if self.open_for() == Some(listing_id) {
            return Ok(());
        }
        self.close_now(map);

        let handle = map.open_popup(anchor, html)?;
        debug!(listing_id = %listing_id, "popup opened");
        self.open = Some(OpenPopup {
            listing_id: listing_id.clone(),
            handle,
        });
        Ok(())
    }

    /// The pointer left `listing_id`'s marker: close after the quiet period unless it comes back.
    pub fn schedule_close(&mut self, listing_id: &ListingId, timers: &mut Scheduler, now: Instant) {
        if self.open_for() != Some(listing_id) {
            return;
        }
        self.close_timer
            .trigger(timers, now, self.close_delay, TimerTask::PopupClose);
    }

    /// Handles a fired `PopupClose` timer. Stale timers are ignored.
    pub fn on_close_timer<L: MapLibrary>(&mut self, id: TimerId, map: &mut MapController<L>) {
        if self.close_timer.fired(id) {
            self.close_now(map);
        }
    }

    /// Closes immediately and drops any pending delayed close.
    pub fn close<L: MapLibrary>(&mut self, map: &mut MapController<L>, timers: &mut Scheduler) {
        self.close_timer.cancel(timers);
        self.close_now(map);
    }

    /// Closes the popup if it belongs to `listing_id` (its marker is going away).
    pub fn detach<L: MapLibrary>(
        &mut self,
        listing_id: &ListingId,
        map: &mut MapController<L>,
        timers: &mut Scheduler,
    ) {
        if self.open_for() == Some(listing_id) {
            self.close(map, timers);
        }
    }

    /// Replaces the content of the open popup if it belongs to `listing_id`.
    pub fn refresh_content<L: MapLibrary>(
        &mut self,
        listing_id: &ListingId,
        html: &str,
        map: &mut MapController<L>,
    ) {
        let Some(open) = self.open.as_ref() else {
            return;
        };
        if &open.listing_id != listing_id {
            return;
        }
        if let Err(e) = map.set_popup_content(open.handle, html) {
            warn!(listing_id = %listing_id, error = %e, "failed to refresh popup content");
        }
    }

    fn close_now<L: MapLibrary>(&mut self, map: &mut MapController<L>) {
        if let Some(open) = self.open.take() {
            if let Err(e) = map.close_popup(open.handle) {
                // The library may already have dropped it together with its marker.
                debug!(listing_id = %open.listing_id, error = %e, "popup was already closed");
            }
        }
    }

    /// Drops all state without touching the map; for use after the map and timer queue were torn down.
    pub(crate) fn forget(&mut self) {
        self.open = None;
        self.close_timer.forget();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::discovery::map::{MarkerSpec, SceneLibrary};
    use crate::domain::GeoPoint;

    struct Fixture {
        timers: Scheduler,
        map: MapController<SceneLibrary>,
        a: MarkerHandle,
        b: MarkerHandle,
    }

    fn fixture() -> Fixture {
        let mut timers = Scheduler::new();
        let mut map = MapController::new(SceneLibrary::ready(), DiscoveryConfig::default());
        map.initialize(&mut timers, Instant::now()).unwrap();
        timers.cancel_all();
        map.forget_timers();
        let spec = |lat| MarkerSpec {
            position: GeoPoint::new(lat, 124.0),
            title: "x".into(),
            label_html: String::new(),
        };
        let a = map.add_marker(&spec(10.0)).unwrap();
        let b = map.add_marker(&spec(10.1)).unwrap();
        Fixture { timers, map, a, b }
    }

    fn open_count(f: &Fixture) -> usize {
        f.map.instance().unwrap().popup_count()
    }

    #[test]
    fn at_most_one_popup() {
        let mut f = fixture();
        let mut popups = PopupManager::new(Duration::from_millis(200));

        popups.show(&"a".into(), f.a, "<p>a</p>", &mut f.map, &mut f.timers).unwrap();
        popups.show(&"b".into(), f.b, "<p>b</p>", &mut f.map, &mut f.timers).unwrap();

        assert_eq!(open_count(&f), 1);
        assert_eq!(popups.open_for(), Some(&ListingId::from("b")));
    }

    #[test]
    fn leave_closes_after_delay() {
        let t0 = Instant::now();
        let mut f = fixture();
        let mut popups = PopupManager::new(Duration::from_millis(200));
        let a: ListingId = "a".into();

        popups.show(&a, f.a, "<p>a</p>", &mut f.map, &mut f.timers).unwrap();
        popups.schedule_close(&a, &mut f.timers, t0);
        assert!(f.timers.take_due(t0 + Duration::from_millis(150)).is_empty());
        assert!(popups.is_open());

        for (id, _) in f.timers.take_due(t0 + Duration::from_millis(200)) {
            popups.on_close_timer(id, &mut f.map);
        }
        assert!(!popups.is_open());
        assert_eq!(open_count(&f), 0);
    }

    #[test]
    fn reentering_cancels_close() {
        let t0 = Instant::now();
        let mut f = fixture();
        let mut popups = PopupManager::new(Duration::from_millis(200));
        let a: ListingId = "a".into();

        popups.show(&a, f.a, "<p>a</p>", &mut f.map, &mut f.timers).unwrap();
        popups.schedule_close(&a, &mut f.timers, t0);
        popups.show(&a, f.a, "<p>a</p>", &mut f.map, &mut f.timers).unwrap();

        assert!(f.timers.take_due(t0 + Duration::from_secs(1)).is_empty());
        assert!(popups.is_open());
        assert_eq!(f.map.instance().unwrap().stats().popups_opened, 1);
    }

    #[test]
    fn detach_only_affects_owner() {
        let mut f = fixture();
        let mut popups = PopupManager::new(Duration::from_millis(200));
        popups.show(&"a".into(), f.a, "<p>a</p>", &mut f.map, &mut f.timers).unwrap();

        popups.detach(&"b".into(), &mut f.map, &mut f.timers);
        assert!(popups.is_open());
        popups.detach(&"a".into(), &mut f.map, &mut f.timers);
        assert!(!popups.is_open());
    }
}

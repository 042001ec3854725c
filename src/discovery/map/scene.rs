//! In-memory map library.
//!
//! Behaves like a slippy-map library without a renderer: it keeps a Web Mercator viewport, layers, markers
//! and popups, and applies user input only through the handlers that are enabled. Hosts without a browser
//! map use it directly; it also makes viewport and handler state observable.

use crate::config::TileSource;
use crate::discovery::map::{
    Interactions, KeyAction, LatLngBounds, MapError, MapInput, MapInstance, MapLibrary, MapOptions,
    MarkerHandle, MarkerSpec, PopupHandle,
};
use crate::domain::GeoPoint;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::rc::Rc;

const TILE_SIZE: f64 = 256.0;
const MAX_LATITUDE: f64 = 85.051_128_78;
const KEYBOARD_PAN_PX: f64 = 80.0;

/// Flips a deferred [`SceneLibrary`] to loaded, the way a lazily fetched script bundle finishes.
#[derive(Debug, Clone)]
pub struct LibraryLoader(Rc<Cell<bool>>);

impl LibraryLoader {
    pub fn finish_loading(&self) {
        self.0.set(true);
    }
}

#[derive(Debug)]
pub struct SceneLibrary {
    loaded: Rc<Cell<bool>>,
    size: (f64, f64),
    maps_created: u32,
    live: Rc<Cell<u32>>,
}

impl SceneLibrary {
    /// Library that is available immediately.
    pub fn ready() -> Self {
        Self {
            loaded: Rc::new(Cell::new(true)),
            size: (1024.0, 720.0),
            maps_created: 0,
            live: Rc::new(Cell::new(0)),
        }
    }

    /// Library that reports not-loaded until the returned loader is triggered.
    pub fn deferred() -> (Self, LibraryLoader) {
        let loaded = Rc::new(Cell::new(false));
        let loader = LibraryLoader(Rc::clone(&loaded));
        (
            Self {
                loaded,
                size: (1024.0, 720.0),
                maps_created: 0,
                live: Rc::new(Cell::new(0)),
            },
            loader,
        )
    }

    pub fn maps_created(&self) -> u32 {
        self.maps_created
    }

    /// Maps created and not yet removed.
    pub fn live_maps(&self) -> u32 {
        self.live.get()
    }
}

impl MapLibrary for SceneLibrary {
    type Map = SceneMap;

    fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    fn create_map(&mut self, container_id: &str, options: &MapOptions) -> Result<SceneMap, MapError> {
        if !self.is_loaded() {
            return Err(MapError::NotLoaded);
        }
        if !options.center.is_valid() {
            return Err(MapError::InvalidPosition {
                lat: options.center.lat,
                lng: options.center.lng,
            });
        }
        self.maps_created += 1;
        self.live.set(self.live.get() + 1);
        Ok(SceneMap::new(container_id, options, self.size, Rc::clone(&self.live)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenePopup {
    pub anchor: MarkerHandle,
    pub html: String,
}

/// Counters for operations that are invisible in the final state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub markers_added: u32,
    pub markers_updated: u32,
    pub markers_removed: u32,
    pub popups_opened: u32,
    pub fit_bounds_calls: u32,
    pub size_invalidations: u32,
}

#[derive(Debug)]
pub struct SceneMap {
    container_id: String,
    center: GeoPoint,
    zoom: f64,
    max_zoom: f64,
    size: (f64, f64),
    tiles: Vec<TileSource>,
    markers: BTreeMap<MarkerHandle, MarkerSpec>,
    popups: BTreeMap<PopupHandle, ScenePopup>,
    interactions: Interactions,
    container_interactive: bool,
    removed: bool,
    live_maps: Rc<Cell<u32>>,
    next_handle: u64,
    stats: SceneStats,
}

impl SceneMap {
    fn new(container_id: &str, options: &MapOptions, size: (f64, f64), live: Rc<Cell<u32>>) -> Self {
        Self {
            container_id: container_id.to_string(),
            center: options.center,
            zoom: options.zoom,
            max_zoom: f64::from(options.max_zoom),
            size,
            tiles: Vec::new(),
            markers: BTreeMap::new(),
            popups: BTreeMap::new(),
            interactions: Interactions::all(),
            container_interactive: true,
            removed: false,
            live_maps: live,
            next_handle: 0,
            stats: SceneStats::default(),
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn tile_layers(&self) -> &[TileSource] {
        &self.tiles
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn marker(&self, handle: MarkerHandle) -> Option<&MarkerSpec> {
        self.markers.get(&handle)
    }

    pub fn markers(&self) -> impl Iterator<Item = (&MarkerHandle, &MarkerSpec)> {
        self.markers.iter()
    }

    pub fn open_popups(&self) -> impl Iterator<Item = &ScenePopup> {
        self.popups.values()
    }

    pub fn popup_count(&self) -> usize {
        self.popups.len()
    }

    pub fn interactions(&self) -> Interactions {
        self.interactions
    }

    pub fn container_interactive(&self) -> bool {
        self.container_interactive
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn stats(&self) -> SceneStats {
        self.stats
    }

    fn live(&self) -> Result<(), MapError> {
        if self.removed {
            Err(MapError::Disposed)
        } else {
            Ok(())
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn degrees_per_pixel(&self) -> f64 {
        360.0 / (TILE_SIZE * 2f64.powf(self.zoom))
    }

    fn pan_pixels(&mut self, dx: f64, dy: f64) -> bool {
        if dx == 0.0 && dy == 0.0 {
            return false;
        }
        let deg = self.degrees_per_pixel();
        // Dragging content right reveals what lies west of the center.
        let lat = (self.center.lat + dy * deg).clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let mut lng = self.center.lng - dx * deg;
        if lng > 180.0 {
            lng -= 360.0;
        } else if lng < -180.0 {
            lng += 360.0;
        }
        self.center = GeoPoint::new(lat, lng);
        true
    }

    fn zoom_by(&mut self, delta: f64) -> bool {
        let next = (self.zoom + delta).clamp(0.0, self.max_zoom);
        if next == self.zoom {
            return false;
        }
        self.zoom = next;
        true
    }

    /// Highest zoom at which `bounds` fits the container.
    fn bounds_zoom(&self, bounds: &LatLngBounds) -> f64 {
        let lng_fraction = (bounds.north_east.lng - bounds.south_west.lng) / 360.0;
        let y_fraction = (mercator_y(bounds.north_east.lat) - mercator_y(bounds.south_west.lat)).abs();

        let fit = |pixels: f64, fraction: f64| {
            if fraction <= f64::EPSILON {
                f64::INFINITY
            } else {
                (pixels / (TILE_SIZE * fraction)).log2()
            }
        };

        let zoom = fit(self.size.0, lng_fraction).min(fit(self.size.1, y_fraction));
        if zoom.is_finite() {
            zoom.floor().clamp(0.0, self.max_zoom)
        } else {
            self.max_zoom
        }
    }

    fn apply_bounds(&mut self, bounds: LatLngBounds) -> bool {
        let before = (self.center, self.zoom);
        self.zoom = self.bounds_zoom(&bounds);
        self.center = bounds.center();
        before != (self.center, self.zoom)
    }
}

/// Web Mercator y as a fraction of the world height.
fn mercator_y(lat: f64) -> f64 {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    (PI / 4.0 + lat / 2.0).tan().ln() / (2.0 * PI)
}

impl MapInstance for SceneMap {
    fn add_tile_layer(&mut self, tiles: &TileSource) -> Result<(), MapError> {
        self.live()?;
        let template = &tiles.url_template;
        if !["{z}", "{x}", "{y}"].iter().all(|p| template.contains(p)) {
            return Err(MapError::Library(format!("tile url template {template:?} lacks {{z}}/{{x}}/{{y}}")));
        }
        self.max_zoom = self.max_zoom.min(f64::from(tiles.max_zoom));
        self.tiles.push(tiles.clone());
        Ok(())
    }

    fn add_marker(&mut self, spec: &MarkerSpec) -> Result<MarkerHandle, MapError> {
        self.live()?;
        if !spec.position.is_valid() {
            return Err(MapError::InvalidPosition {
                lat: spec.position.lat,
                lng: spec.position.lng,
            });
        }
        let handle = MarkerHandle(self.next_id());
        self.markers.insert(handle, spec.clone());
        self.stats.markers_added += 1;
        Ok(handle)
    }

    fn update_marker(&mut self, marker: MarkerHandle, spec: &MarkerSpec) -> Result<(), MapError> {
        self.live()?;
        if !spec.position.is_valid() {
            return Err(MapError::InvalidPosition {
                lat: spec.position.lat,
                lng: spec.position.lng,
            });
        }
        let slot = self
            .markers
            .get_mut(&marker)
            .ok_or(MapError::UnknownMarker(marker))?;
        *slot = spec.clone();
        self.stats.markers_updated += 1;
        Ok(())
    }

    fn remove_marker(&mut self, marker: MarkerHandle) -> Result<(), MapError> {
        self.live()?;
        self.markers
            .remove(&marker)
            .ok_or(MapError::UnknownMarker(marker))?;
        // Popups bound to the marker go with it.
        self.popups.retain(|_, p| p.anchor != marker);
        self.stats.markers_removed += 1;
        Ok(())
    }

    fn open_popup(&mut self, anchor: MarkerHandle, html: &str) -> Result<PopupHandle, MapError> {
        self.live()?;
        if !self.markers.contains_key(&anchor) {
            return Err(MapError::UnknownMarker(anchor));
        }
        let handle = PopupHandle(self.next_id());
        self.popups.insert(
            handle,
            ScenePopup {
                anchor,
                html: html.to_string(),
            },
        );
        self.stats.popups_opened += 1;
        Ok(handle)
    }

    fn set_popup_content(&mut self, popup: PopupHandle, html: &str) -> Result<(), MapError> {
        self.live()?;
        let slot = self
            .popups
            .get_mut(&popup)
            .ok_or(MapError::UnknownPopup(popup))?;
        slot.html = html.to_string();
        Ok(())
    }

    fn close_popup(&mut self, popup: PopupHandle) -> Result<(), MapError> {
        self.live()?;
        self.popups
            .remove(&popup)
            .map(|_| ())
            .ok_or(MapError::UnknownPopup(popup))
    }

    fn fit_bounds(&mut self, bounds: LatLngBounds) -> Result<(), MapError> {
        self.live()?;
        self.stats.fit_bounds_calls += 1;
        self.apply_bounds(bounds);
        Ok(())
    }

    fn set_view(&mut self, center: GeoPoint, zoom: f64) -> Result<(), MapError> {
        self.live()?;
        if !center.is_valid() {
            return Err(MapError::InvalidPosition {
                lat: center.lat,
                lng: center.lng,
            });
        }
        self.center = center;
        self.zoom = zoom.clamp(0.0, self.max_zoom);
        Ok(())
    }

    fn center(&self) -> GeoPoint {
        self.center
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn set_interactions(&mut self, interactions: Interactions) {
        self.interactions = interactions;
    }

    fn set_container_interactive(&mut self, interactive: bool) {
        self.container_interactive = interactive;
    }

    fn handle_input(&mut self, input: &MapInput) -> bool {
        if self.removed {
            return false;
        }
        let pointer = self.container_interactive;
        let i = self.interactions;

        match input {
            MapInput::Drag { dx, dy } if pointer && i.dragging => self.pan_pixels(*dx, *dy),
            MapInput::ScrollZoom { steps } if pointer && i.scroll_wheel_zoom => self.zoom_by(*steps),
            MapInput::DoubleClick { at } if pointer && i.double_click_zoom => {
                let zoomed = self.zoom_by(1.0);
                let moved = at.is_valid() && *at != self.center;
                if moved {
                    self.center = *at;
                }
                zoomed || moved
            }
            MapInput::BoxZoom { bounds } if pointer && i.box_zoom => self.apply_bounds(*bounds),
            MapInput::Key(action) if i.keyboard => match action {
                KeyAction::PanUp => self.pan_pixels(0.0, KEYBOARD_PAN_PX),
                KeyAction::PanDown => self.pan_pixels(0.0, -KEYBOARD_PAN_PX),
                KeyAction::PanLeft => self.pan_pixels(KEYBOARD_PAN_PX, 0.0),
                KeyAction::PanRight => self.pan_pixels(-KEYBOARD_PAN_PX, 0.0),
                KeyAction::ZoomIn => self.zoom_by(1.0),
                KeyAction::ZoomOut => self.zoom_by(-1.0),
            },
            _ => false,
        }
    }

    fn invalidate_size(&mut self) {
        if !self.removed {
            self.stats.size_invalidations += 1;
        }
    }

    fn remove(&mut self) -> Result<(), MapError> {
        self.live()?;
        self.popups.clear();
        self.markers.clear();
        self.tiles.clear();
        self.removed = true;
        self.live_maps.set(self.live_maps.get().saturating_sub(1));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> MapOptions {
        MapOptions {
            center: GeoPoint::new(10.6777, 124.8009),
            zoom: 14.0,
            max_zoom: 19,
            zoom_control: true,
        }
    }

    fn spec(lat: f64, lng: f64) -> MarkerSpec {
        MarkerSpec {
            position: GeoPoint::new(lat, lng),
            title: "t".into(),
            label_html: "<div>₱1</div>".into(),
        }
    }

    #[test]
    fn deferred_library_refuses_until_loaded() {
        let (mut lib, loader) = SceneLibrary::deferred();
        assert!(!lib.is_loaded());
        assert!(matches!(lib.create_map("map", &options()), Err(MapError::NotLoaded)));

        loader.finish_loading();
        assert!(lib.is_loaded());
        assert!(lib.create_map("map", &options()).is_ok());
        assert_eq!(lib.maps_created(), 1);
    }

    #[test]
    fn drag_moves_center_only_when_enabled() {
        let mut map = SceneLibrary::ready().create_map("map", &options()).unwrap();
        let start = map.center();

        map.set_interactions(Interactions::none());
        assert!(!map.handle_input(&MapInput::Drag { dx: 120.0, dy: 0.0 }));
        assert_eq!(map.center(), start);

        map.set_interactions(Interactions::all());
        map.set_container_interactive(false);
        assert!(!map.handle_input(&MapInput::Drag { dx: 120.0, dy: 0.0 }));

        map.set_container_interactive(true);
        assert!(map.handle_input(&MapInput::Drag { dx: 120.0, dy: 0.0 }));
        assert!(map.center().lng < start.lng);
    }

    #[test]
    fn keyboard_and_zoom_inputs() {
        let mut map = SceneLibrary::ready().create_map("map", &options()).unwrap();
        assert!(map.handle_input(&MapInput::Key(KeyAction::ZoomIn)));
        assert_eq!(map.zoom(), 15.0);
        assert!(map.handle_input(&MapInput::ScrollZoom { steps: -2.0 }));
        assert_eq!(map.zoom(), 13.0);

        map.set_interactions(Interactions {
            keyboard: false,
            ..Interactions::all()
        });
        assert!(!map.handle_input(&MapInput::Key(KeyAction::PanLeft)));
    }

    #[test]
    fn invalid_marker_position_is_rejected() {
        let mut map = SceneLibrary::ready().create_map("map", &options()).unwrap();
        assert!(matches!(
            map.add_marker(&spec(200.0, 0.0)),
            Err(MapError::InvalidPosition { .. })
        ));
        assert_eq!(map.marker_count(), 0);
    }

    #[test]
    fn removing_marker_drops_its_popup() {
        let mut map = SceneLibrary::ready().create_map("map", &options()).unwrap();
        let m = map.add_marker(&spec(10.0, 124.0)).unwrap();
        map.open_popup(m, "<p>hi</p>").unwrap();
        assert_eq!(map.popup_count(), 1);

        map.remove_marker(m).unwrap();
        assert_eq!(map.popup_count(), 0);
    }

    #[test]
    fn fit_bounds_frames_points() {
        let mut map = SceneLibrary::ready().create_map("map", &options()).unwrap();
        let bounds = LatLngBounds::from_points(vec![
            GeoPoint::new(10.0, 124.0),
            GeoPoint::new(11.0, 125.0),
        ])
        .unwrap();
        map.fit_bounds(bounds).unwrap();
        assert!((map.center().lat - 10.5).abs() < 1e-9);
        assert!(map.zoom() < 14.0);
        assert_eq!(map.stats().fit_bounds_calls, 1);
    }

    #[test]
    fn removed_map_rejects_operations() {
        let mut map = SceneLibrary::ready().create_map("map", &options()).unwrap();
        map.add_marker(&spec(10.0, 124.0)).unwrap();
        map.remove().unwrap();
        assert!(map.is_removed());
        assert_eq!(map.marker_count(), 0);
        assert!(matches!(map.add_marker(&spec(10.0, 124.0)), Err(MapError::Disposed)));
        assert!(matches!(map.remove(), Err(MapError::Disposed)));
    }
}

//! Adapter boundary around the imperative map library.
//!
//! The library is modelled by two traits: [`MapLibrary`] (possibly still loading, creates instances) and
//! [`MapInstance`] (one live map bound to a container). Only [`MapController`] holds an instance; the rest of
//! the engine goes through the controller.

mod controller;
mod map_error;
pub mod scene;

pub use controller::{MapController, MapStatus};
pub use map_error::MapError;
pub use scene::{LibraryLoader, SceneLibrary, SceneMap};

use crate::config::TileSource;
use crate::domain::GeoPoint;

/// Library-issued marker handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(pub u64);

/// Library-issued popup handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PopupHandle(pub u64);

/// Everything the library needs to draw one marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub position: GeoPoint,
    /// Hover title / accessible name.
    pub title: String,
    /// HTML for the marker icon (the price pill).
    pub label_html: String,
}

/// Axis-aligned geographic rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLngBounds {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl LatLngBounds {
    /// Smallest bounds containing every point; `None` for an empty set.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = GeoPoint>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self {
            south_west: first,
            north_east: first,
        };
        for p in iter {
            bounds.extend(p);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, p: GeoPoint) {
        self.south_west.lat = self.south_west.lat.min(p.lat);
        self.south_west.lng = self.south_west.lng.min(p.lng);
        self.north_east.lat = self.north_east.lat.max(p.lat);
        self.north_east.lng = self.north_east.lng.max(p.lng);
    }

    /// Grows the bounds by `ratio` of its height/width on every side.
    pub fn pad(self, ratio: f64) -> Self {
        let dlat = (self.north_east.lat - self.south_west.lat) * ratio;
        let dlng = (self.north_east.lng - self.south_west.lng) * ratio;
        Self {
            south_west: GeoPoint::new(
                (self.south_west.lat - dlat).max(-90.0),
                (self.south_west.lng - dlng).max(-180.0),
            ),
            north_east: GeoPoint::new(
                (self.north_east.lat + dlat).min(90.0),
                (self.north_east.lng + dlng).min(180.0),
            ),
        }
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lat >= self.south_west.lat
            && p.lat <= self.north_east.lat
            && p.lng >= self.south_west.lng
            && p.lng <= self.north_east.lng
    }
}

/// User input handlers a map can enable or disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interactions {
    pub dragging: bool,
    pub scroll_wheel_zoom: bool,
    pub double_click_zoom: bool,
    pub box_zoom: bool,
    pub keyboard: bool,
}

impl Interactions {
    pub const fn all() -> Self {
        Self {
            dragging: true,
            scroll_wheel_zoom: true,
            double_click_zoom: true,
            box_zoom: true,
            keyboard: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            dragging: false,
            scroll_wheel_zoom: false,
            double_click_zoom: false,
            box_zoom: false,
            keyboard: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapOptions {
    pub center: GeoPoint,
    pub zoom: f64,
    pub max_zoom: u8,
    pub zoom_control: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    PanUp,
    PanDown,
    PanLeft,
    PanRight,
    ZoomIn,
    ZoomOut,
}

/// Raw user input as the browser delivers it to the map container.
#[derive(Debug, Clone, PartialEq)]
pub enum MapInput {
    /// Pointer drag by a pixel offset.
    Drag { dx: f64, dy: f64 },
    /// Wheel steps; positive zooms in.
    ScrollZoom { steps: f64 },
    DoubleClick { at: GeoPoint },
    BoxZoom { bounds: LatLngBounds },
    Key(KeyAction),
}

/// Entry point of the external mapping library.
pub trait MapLibrary {
    type Map: MapInstance;

    /// The library may load lazily; until this returns `true` no map can be created.
    fn is_loaded(&self) -> bool;

    fn create_map(&mut self, container_id: &str, options: &MapOptions) -> Result<Self::Map, MapError>;
}

/// One live map bound to a DOM container.
pub trait MapInstance {
    fn add_tile_layer(&mut self, tiles: &TileSource) -> Result<(), MapError>;

    fn add_marker(&mut self, spec: &MarkerSpec) -> Result<MarkerHandle, MapError>;
    fn update_marker(&mut self, marker: MarkerHandle, spec: &MarkerSpec) -> Result<(), MapError>;
    fn remove_marker(&mut self, marker: MarkerHandle) -> Result<(), MapError>;

    fn open_popup(&mut self, anchor: MarkerHandle, html: &str) -> Result<PopupHandle, MapError>;
    fn set_popup_content(&mut self, popup: PopupHandle, html: &str) -> Result<(), MapError>;
    fn close_popup(&mut self, popup: PopupHandle) -> Result<(), MapError>;

    fn fit_bounds(&mut self, bounds: LatLngBounds) -> Result<(), MapError>;
    fn set_view(&mut self, center: GeoPoint, zoom: f64) -> Result<(), MapError>;
    fn center(&self) -> GeoPoint;
    fn zoom(&self) -> f64;

    fn set_interactions(&mut self, interactions: Interactions);
    /// Toggles pointer events on the container element itself.
    fn set_container_interactive(&mut self, interactive: bool);
    /// Applies user input according to the enabled handlers; returns whether the viewport moved.
    fn handle_input(&mut self, input: &MapInput) -> bool;

    fn invalidate_size(&mut self);
    /// Destroys the instance and everything attached to it.
    fn remove(&mut self) -> Result<(), MapError>;
}

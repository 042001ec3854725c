use crate::discovery::map::{MarkerHandle, PopupHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("map library is not loaded yet")]
    NotLoaded,
    #[error("no map instance is mounted")]
    NotMounted,
    #[error("map instance was disposed")]
    Disposed,
    #[error("position ({lat}, {lng}) cannot be placed on the map")]
    InvalidPosition { lat: f64, lng: f64 },
    #[error("unknown marker {0:?}")]
    UnknownMarker(MarkerHandle),
    #[error("unknown popup {0:?}")]
    UnknownPopup(PopupHandle),
    #[error("map library error: {0}")]
    Library(String),
}

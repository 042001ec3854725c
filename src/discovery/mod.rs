//! Property discovery: the map view, the list view and the active filters kept consistent.
//!
//! Data flows `ListingSource -> filter -> filtered collection -> (list renderer | MarkerSync -> map)`.
//! [`DiscoveryEngine`] is the entry point; the other modules are its parts.

pub mod engine;
pub mod filter;
pub mod lock;
pub mod map;
pub mod markers;
pub mod popup;
pub mod timers;
pub mod view_mode;

pub use engine::{
    DiscoveryEngine, DiscoveryHost, GeoError, ListingScope, LoadState, Notice, ResultSummary,
};
pub use lock::{InteractionLock, LockState};
pub use map::{MapController, MapError, MapInput, MapLibrary, SceneLibrary};
pub use markers::{MarkerRegistry, MarkerSync, SyncReport};
pub use popup::PopupManager;
pub use timers::{Debouncer, PeriodicTask, Scheduler, TimerId, TimerTask};
pub use view_mode::{ViewMode, ViewModeController};

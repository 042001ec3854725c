//! BoardMap: a rental listings marketplace and its property discovery engine.

pub mod config;
pub mod db;
pub mod discovery;
pub mod domain;
pub mod errors;
pub mod responses;
pub mod router;
pub mod source;
pub mod telemetry;
pub mod templates;

pub use router::{handle, AppContext};

#[cfg(test)]
mod tests;

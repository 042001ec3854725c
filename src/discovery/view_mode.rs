// src/discovery/view_mode.rs

use std::fmt;
use std::str::FromStr;

/// Which renderer consumes the filtered collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Map,
    List,
}

impl ViewMode {
    pub fn other(self) -> Self {
        match self {
            ViewMode::Map => ViewMode::List,
            ViewMode::List => ViewMode::Map,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Map => "map",
            ViewMode::List => "list",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "map" => Ok(ViewMode::Map),
            "list" => Ok(ViewMode::List),
            other => Err(format!("unknown view mode '{other}'")),
        }
    }
}

/// A mode switch that actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub from: ViewMode,
    pub to: ViewMode,
}

/// Holds the current render mode. Switching never touches the data; the engine decides what
/// mounting or tearing down a renderer means.
#[derive(Debug, Default)]
pub struct ViewModeController {
    mode: ViewMode,
}

impl ViewModeController {
    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// `None` when already in `mode`.
    pub fn set(&mut self, mode: ViewMode) -> Option<ModeChange> {
        if self.mode == mode {
            return None;
        }
        let change = ModeChange {
            from: self.mode,
            to: mode,
        };
        self.mode = mode;
        Some(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_only_real_changes() {
        let mut ctl = ViewModeController::default();
        assert_eq!(ctl.mode(), ViewMode::Map);
        assert_eq!(ctl.set(ViewMode::Map), None);
        assert_eq!(
            ctl.set(ViewMode::List),
            Some(ModeChange {
                from: ViewMode::Map,
                to: ViewMode::List
            })
        );
        assert_eq!(ctl.set(ViewMode::List), None);
    }

    #[test]
    fn parses_query_values() {
        assert_eq!("List".parse::<ViewMode>(), Ok(ViewMode::List));
        assert!("grid".parse::<ViewMode>().is_err());
    }
}

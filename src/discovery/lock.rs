// src/discovery/lock.rs

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    #[default]
    Idle,
    /// A detail overlay is open; the map must not react to user input.
    Locked,
}

/// Two-state lock that suspends map input while the detail overlay is open.
///
/// `Idle --(listing selected / overlay opened)--> Locked --(overlay closed)--> Idle`.
/// Repeating an event in the state it leads to is a no-op.
#[derive(Debug, Default)]
pub struct InteractionLock {
    state: LockState,
}

impl InteractionLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == LockState::Locked
    }

    /// Returns `true` if this call moved the lock from `Idle` to `Locked`.
    pub fn engage(&mut self) -> bool {
        if self.state == LockState::Locked {
            return false;
        }
        debug!("interaction lock engaged");
        self.state = LockState::Locked;
        true
    }

    /// Returns `true` if this call moved the lock from `Locked` back to `Idle`.
    pub fn release(&mut self) -> bool {
        if self.state == LockState::Idle {
            return false;
        }
        debug!("interaction lock released");
        self.state = LockState::Idle;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut lock = InteractionLock::new();
        assert_eq!(lock.state(), LockState::Idle);

        assert!(lock.engage());
        assert!(!lock.engage());
        assert!(lock.is_locked());

        assert!(lock.release());
        assert!(!lock.release());
        assert_eq!(lock.state(), LockState::Idle);
    }
}

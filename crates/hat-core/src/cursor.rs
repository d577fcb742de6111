//! The counter triple threaded through dissection
//!
//! Dissection never mutates shared counters. Every recursive call takes a
//! Cursor and returns the advanced one, which keeps each per-fragment
//! function referentially transparent.

use serde::{Deserialize, Serialize};

/// Immutable walk state: next position, next input slot, enclosing anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Next position to assign
    pub position: u32,

    /// Next runtime input slot to assign
    pub real_position: u32,

    /// Position of the nearest enclosing structural node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<u32>,
}

impl Cursor {
    /// Walk state at the start of a section pass
    pub fn start() -> Self {
        Self {
            position: 1,
            real_position: 0,
            parent: None,
        }
    }

    /// Reserve the next position slot, returning it and the advanced cursor
    pub fn reserve(self) -> (u32, Self) {
        (
            self.position,
            Self {
                position: self.position + 1,
                ..self
            },
        )
    }

    /// Claim the next runtime input slot
    pub fn claim_input(self) -> (u32, Self) {
        (
            self.real_position,
            Self {
                real_position: self.real_position + 1,
                ..self
            },
        )
    }

    /// The same counters, scoped under a structural anchor
    pub fn under(self, anchor: u32) -> Self {
        Self {
            parent: Some(anchor),
            ..self
        }
    }

    /// Carry advanced counters forward while restoring this cursor's parent.
    ///
    /// Used when a recursive child walk finishes: positions move on, the
    /// enclosing scope does not.
    pub fn rejoin(self, advanced: Self) -> Self {
        Self {
            position: advanced.position,
            real_position: advanced.real_position,
            parent: self.parent,
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_state() {
        let cursor = Cursor::start();
        assert_eq!(cursor.position, 1);
        assert_eq!(cursor.real_position, 0);
        assert_eq!(cursor.parent, None);
    }

    #[test]
    fn test_reserve_advances_position_only() {
        let (pos, next) = Cursor::start().reserve();
        assert_eq!(pos, 1);
        assert_eq!(next.position, 2);
        assert_eq!(next.real_position, 0);
    }

    #[test]
    fn test_claim_input_advances_slot_only() {
        let (slot, next) = Cursor::start().claim_input();
        assert_eq!(slot, 0);
        assert_eq!(next.position, 1);
        assert_eq!(next.real_position, 1);
    }

    #[test]
    fn test_under_and_rejoin() {
        let outer = Cursor::start();
        let (anchor, after) = outer.reserve();
        let scoped = after.under(anchor);
        assert_eq!(scoped.parent, Some(1));

        let (_, advanced) = scoped.reserve();
        let (_, advanced) = advanced.claim_input();
        let rejoined = after.rejoin(advanced);
        assert_eq!(rejoined.position, 3);
        assert_eq!(rejoined.real_position, 1);
        assert_eq!(rejoined.parent, None);
    }
}

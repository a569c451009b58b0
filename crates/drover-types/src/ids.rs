//! Strongly-typed identifier wrappers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical position in the worker pool.
///
/// Slot ids are allocated monotonically by the cluster and never reused, so
/// a slot id uniquely names one position for the lifetime of the master. The
/// id survives respawns of the worker occupying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(u64);

impl SlotId {
    /// Wrap a raw slot number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw slot number.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id allocated after this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

impl From<u64> for SlotId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_ordering() {
        let a = SlotId::new(1);
        let b = a.next();
        assert_eq!(a.to_string(), "slot-1");
        assert_eq!(b.get(), 2);
        assert!(a < b);
    }

    #[test]
    fn serializes_as_bare_number() {
        let json = serde_json::to_string(&SlotId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: SlotId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SlotId::new(7));
    }
}

//! Cell identity within a notebook.
//!
//! A `CellId` is assigned when a cell enters the notebook and is never
//! reused, even after the cell is removed. It is independent of the
//! nbformat `id` field, which older notebooks do not carry.

use serde::{Deserialize, Serialize};

/// Unique identifier for a cell in a notebook.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(u32);

impl CellId {
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_id_equality() {
        let a = CellId::from_raw(1);
        let b = CellId::from_raw(1);
        let c = CellId::from_raw(2);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);
    }

    #[test]
    fn test_cell_id_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(CellId::from_raw(1));
        set.insert(CellId::from_raw(1)); // duplicate
        set.insert(CellId::from_raw(2));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(CellId::from_raw(7).to_string(), "cell#7");
    }
}

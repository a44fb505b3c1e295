//! Generation counters distinguishing successive uses of one slot.

use std::fmt;

/// Identity of one use of a recycled work unit.
///
/// Zero means "never assigned" and is never produced by [`Generation::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u16);

impl Generation {
    /// The reserved, never-assigned generation.
    pub const NONE: Generation = Generation(0);

    pub const fn from_raw(raw: u16) -> Self {
        Generation(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn is_assigned(self) -> bool {
        self.0 != 0
    }

    /// Next generation, wrapping `u16::MAX` back to 1.
    pub const fn next(self) -> Self {
        if self.0 == u16::MAX {
            Generation(1)
        } else {
            Generation(self.0 + 1)
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_yields_zero() {
        let mut generation = Generation::NONE;
        for _ in 0..(u16::MAX as u32 * 2 + 3) {
            generation = generation.next();
            assert!(generation.is_assigned());
        }
    }

    #[test]
    fn test_wraps_to_one() {
        assert_eq!(Generation::from_raw(u16::MAX).next(), Generation::from_raw(1));
        assert_eq!(Generation::NONE.next(), Generation::from_raw(1));
    }
}

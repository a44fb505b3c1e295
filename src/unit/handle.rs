use super::generation::Generation;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static ARENA_ID_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Identifier of the arena that owns a unit. `DETACHED` marks units built
/// outside any arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ArenaId(u32);

impl ArenaId {
    pub const DETACHED: ArenaId = ArenaId(0);

    pub(crate) fn next() -> Self {
        ArenaId(ARENA_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Where a unit lives: its arena and slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SlotKey {
    pub arena: ArenaId,
    pub slot: u32,
}

/// Generation-checked reference to a work unit.
///
/// Plain data: copying, storing or sending a handle needs no
/// synchronization. Operations through a handle whose generation no longer
/// matches its slot are silent no-ops.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WorkHandle {
    key: SlotKey,
    generation: Generation,
}

impl WorkHandle {
    /// A handle that never refers to anything.
    pub const NULL: WorkHandle = WorkHandle {
        key: SlotKey {
            arena: ArenaId::DETACHED,
            slot: 0,
        },
        generation: Generation::NONE,
    };

    pub(crate) fn new(key: SlotKey, generation: Generation) -> Self {
        Self { key, generation }
    }

    pub fn arena(&self) -> ArenaId {
        self.key.arena
    }

    pub fn slot(&self) -> u32 {
        self.key.slot
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_null(&self) -> bool {
        !self.generation.is_assigned()
    }
}

impl fmt::Debug for WorkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("WorkHandle(null)");
        }
        write!(
            f,
            "WorkHandle({}:{}@{})",
            self.key.arena.0, self.key.slot, self.generation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle() {
        assert!(WorkHandle::NULL.is_null());
        assert!(WorkHandle::default().is_null());
        assert_eq!(format!("{:?}", WorkHandle::NULL), "WorkHandle(null)");
    }

    #[test]
    fn test_arena_ids_are_unique() {
        let a = ArenaId::next();
        let b = ArenaId::next();
        assert_ne!(a, b);
        assert_ne!(a, ArenaId::DETACHED);
    }
}

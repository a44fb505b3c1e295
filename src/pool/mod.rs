//! Arena of reusable work units.
//!
//! All units are allocated up front in one contiguous slice and recycled
//! through a free list. A [`WorkHandle`] is `(arena, slot, generation)`;
//! resolving it is an index plus a generation compare, so stale handles
//! are detected without reference counting.
//!
//! The arena enforces the reuse contract of [`WorkUnit::initialize`]:
//! every slot is [cleared](WorkUnit::clear) before it is handed out again.

use crate::dispatch::{StopCallback, StopDispatcher};
use crate::error::{Error, Result};
use crate::unit::handle::SlotKey;
use crate::unit::{Action, ArenaId, AsyncFlags, BoxedSequence, WorkHandle, WorkUnit};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Work to load into a unit.
#[derive(Default)]
pub struct Work {
    pub(crate) action: Option<Action>,
    pub(crate) sequence: Option<BoxedSequence>,
    pub(crate) flags: AsyncFlags,
    pub(crate) stop_callbacks: Vec<StopCallback>,
}

impl Work {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_action<F: FnOnce() + Send + 'static>(action: F) -> Self {
        Self::new().action(action)
    }

    pub fn from_sequence<S: crate::unit::Sequence + 'static>(sequence: S) -> Self {
        Self::new().sequence(sequence)
    }

    pub fn action<F: FnOnce() + Send + 'static>(mut self, action: F) -> Self {
        self.action = Some(Box::new(action));
        self
    }

    pub fn sequence<S: crate::unit::Sequence + 'static>(mut self, sequence: S) -> Self {
        self.sequence = Some(Box::new(sequence));
        self
    }

    pub fn flags(mut self, flags: AsyncFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Register a stop callback before the unit is handed to anyone who
    /// could step it.
    pub fn on_stop<F: FnOnce() + Send + 'static>(mut self, callback: F) -> Self {
        self.stop_callbacks.push(Box::new(callback));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.action.is_none() && self.sequence.is_none()
    }
}

impl std::fmt::Debug for Work {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Work")
            .field("action", &self.action.is_some())
            .field("sequence", &self.sequence.is_some())
            .field("flags", &self.flags)
            .field("stop_callbacks", &self.stop_callbacks.len())
            .finish()
    }
}

pub struct WorkArena {
    id: ArenaId,
    units: Box<[WorkUnit]>,
    occupied: Box<[AtomicBool]>,
    free: Mutex<Vec<u32>>,
    live: AtomicUsize,
}

impl WorkArena {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config("arena capacity must be > 0"));
        }
        let slots = u32::try_from(capacity)
            .map_err(|_| Error::config(format!("arena capacity {} too large", capacity)))?;

        let id = ArenaId::next();
        let units = (0..slots)
            .map(|slot| WorkUnit::with_key(SlotKey { arena: id, slot }))
            .collect();
        let occupied = (0..slots).map(|_| AtomicBool::new(false)).collect();
        // popped from the back, so slot 0 goes out first
        let free = (0..slots).rev().collect();

        tracing::debug!(capacity, "work arena created");

        Ok(Self {
            id,
            units,
            occupied,
            free: Mutex::new(free),
            live: AtomicUsize::new(0),
        })
    }

    pub fn id(&self) -> ArenaId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.units.len()
    }

    /// Slots currently handed out and not yet released.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Take a free slot and load `work` into it.
    pub fn allocate(&self, work: Work) -> Result<WorkHandle> {
        let slot = self.free.lock().pop().ok_or(Error::PoolExhausted {
            capacity: self.capacity(),
        })?;
        let unit = &self.units[slot as usize];
        self.occupied[slot as usize].store(true, Ordering::Release);
        self.live.fetch_add(1, Ordering::AcqRel);

        // stray callbacks registered on the idle slot must not leak into
        // the new work
        unit.clear();
        let handle = unit.initialize(work.action, work.sequence, work.flags);
        for callback in work.stop_callbacks {
            unit.on_stop_boxed(handle.generation(), callback);
        }
        tracing::trace!(?handle, "work unit allocated");
        Ok(handle)
    }

    /// Clear a slot and return it to the free list. Returns `false` if the
    /// slot was not allocated.
    pub fn release(&self, slot: u32) -> bool {
        let Some(occupied) = self.occupied.get(slot as usize) else {
            return false;
        };
        if !occupied.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.units[slot as usize].clear();
        self.free.lock().push(slot);
        self.live.fetch_sub(1, Ordering::AcqRel);
        true
    }

    /// Deliver a finished unit's stop callbacks and release its slot.
    pub fn retire(&self, slot: u32, dispatcher: &dyn StopDispatcher) -> bool {
        match self.units.get(slot as usize) {
            Some(unit) => {
                unit.dispatch_stop(dispatcher);
                self.release(slot)
            }
            None => false,
        }
    }

    pub fn unit(&self, slot: u32) -> Option<&WorkUnit> {
        self.units.get(slot as usize)
    }

    /// The unit `handle` points into, without checking its generation.
    /// Errors if the handle belongs to another arena.
    pub fn resolve(&self, handle: &WorkHandle) -> Result<&WorkUnit> {
        if handle.arena() != self.id {
            return Err(Error::ForeignHandle);
        }
        self.units
            .get(handle.slot() as usize)
            .ok_or(Error::ForeignHandle)
    }

    pub fn is_running(&self, handle: &WorkHandle) -> bool {
        self.resolve(handle)
            .map(|unit| unit.is_running(handle.generation()))
            .unwrap_or(false)
    }

    /// Cancel `handle` and, depth-first, every nested handle under it.
    /// Returns whether `handle` itself was current.
    pub fn cancel(&self, handle: &WorkHandle) -> bool {
        let Ok(unit) = self.resolve(handle) else {
            return false;
        };
        let Some(nested) = unit.try_cancel(handle.generation()) else {
            return false;
        };

        // nested lists come back last-first; the stack pops them in that
        // order and finishes each subtree before its older siblings
        let mut stack: Vec<WorkHandle> = nested.into_iter().rev().collect();
        while let Some(child) = stack.pop() {
            match self.resolve(&child) {
                Ok(unit) => {
                    if let Some(grandchildren) = unit.try_cancel(child.generation()) {
                        stack.extend(grandchildren.into_iter().rev());
                    }
                }
                Err(_) => tracing::warn!(?child, "nested handle from another arena skipped"),
            }
        }
        true
    }

    /// Register a stop callback on `handle`'s unit.
    ///
    /// A unit that is already done but not yet retired still accepts it and
    /// fires it on retirement. Returns `false` once the slot is back on the
    /// free list.
    pub fn on_stop<F>(&self, handle: &WorkHandle, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(unit) = self.resolve(handle) else {
            return false;
        };
        if !self.occupied[handle.slot() as usize].load(Ordering::Acquire) {
            return false;
        }
        unit.on_stop_callback(handle.generation(), callback)
    }

    /// Cancel `child` whenever `parent` is cancelled.
    pub fn nest(&self, parent: &WorkHandle, child: WorkHandle) -> Result<bool> {
        let unit = self.resolve(parent)?;
        if child.arena() != self.id {
            return Err(Error::ForeignHandle);
        }
        Ok(unit.add_nested(parent.generation(), child))
    }

    /// Handles of every allocated slot, at their current generation.
    pub fn live_handles(&self) -> Vec<WorkHandle> {
        self.units
            .iter()
            .zip(self.occupied.iter())
            .filter(|(_, occupied)| occupied.load(Ordering::Acquire))
            .map(|(unit, _)| unit.handle())
            .collect()
    }
}

impl std::fmt::Debug for WorkArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkArena")
            .field("id", &self.id)
            .field("capacity", &self.capacity())
            .field("live", &self.live())
            .finish()
    }
}

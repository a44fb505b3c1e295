//! The work unit state machine.
//!
//! A unit holds at most one pending action and one pending sequence. Its
//! [`Status`] bits track which phases are done; stepping advances exactly
//! one phase per call, action first. Every entry point that takes a
//! [`Generation`] silently ignores stale values.

use super::flags::AsyncFlags;
use super::generation::Generation;
use super::handle::{SlotKey, WorkHandle};
use super::lock::UnitLock;
use super::sequence::{dispose, Advance, BoxedSequence};
use super::status::{Status, StepResult};
use crate::dispatch::{StopCallback, StopChain, StopDispatcher};
use std::cell::RefCell;
use std::fmt;
use std::mem;

/// One-shot first phase of a unit.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

struct UnitState {
    status: Status,
    generation: Generation,
    action: Option<Action>,
    sequence: Option<BoxedSequence>,
    flags: AsyncFlags,
    nested: Vec<WorkHandle>,
    on_stop: Vec<StopCallback>,
    // an action or sequence of this unit is on the stack
    stepping: bool,
    cancelled: bool,
}

enum Phase {
    Action(Action),
    Sequence(BoxedSequence),
    Idle,
}

impl UnitState {
    fn idle() -> Self {
        Self {
            status: Status::ALL_COMPLETE,
            generation: Generation::NONE,
            action: None,
            sequence: None,
            flags: AsyncFlags::empty(),
            nested: Vec::new(),
            on_stop: Vec::new(),
            stepping: false,
            cancelled: false,
        }
    }

    fn begin_step(&mut self) -> Phase {
        // a step re-entered from the unit's own action or sequence
        if self.stepping {
            return Phase::Idle;
        }
        let phase = self.take_phase();
        if !matches!(phase, Phase::Idle) {
            self.stepping = true;
        }
        phase
    }

    fn take_phase(&mut self) -> Phase {
        if !self.status.contains(Status::ACTION_COMPLETE) {
            match self.action.take() {
                Some(action) => return Phase::Action(action),
                // action panicked on a previous step
                None => self.status.insert(Status::ACTION_COMPLETE),
            }
        } else if !self.status.contains(Status::SEQUENCE_COMPLETE) {
            match self.sequence.take() {
                Some(sequence) => return Phase::Sequence(sequence),
                None => self.status.insert(Status::SEQUENCE_COMPLETE),
            }
        }
        Phase::Idle
    }

    fn finish_action(&mut self, generation: Generation) {
        if self.generation == generation {
            self.status.insert(Status::ACTION_COMPLETE);
        }
    }

    /// Puts a still-running sequence back. Returns it instead when it must
    /// be released, so the caller can release it outside any borrow.
    fn finish_sequence(
        &mut self,
        generation: Generation,
        sequence: BoxedSequence,
        advance: Advance,
    ) -> Option<BoxedSequence> {
        if self.generation != generation {
            return Some(sequence);
        }
        if advance.is_exhausted() || self.status.contains(Status::SEQUENCE_COMPLETE) {
            self.status.insert(Status::SEQUENCE_COMPLETE);
            return Some(sequence);
        }
        self.sequence = Some(sequence);
        None
    }

    /// Puts back a sequence whose step unwound. Returns it when the unit
    /// moved on and it must be released instead.
    fn restore_sequence(
        &mut self,
        generation: Generation,
        sequence: BoxedSequence,
    ) -> Option<BoxedSequence> {
        if self.generation == generation && !self.status.contains(Status::SEQUENCE_COMPLETE) {
            self.sequence = Some(sequence);
            None
        } else {
            Some(sequence)
        }
    }
}

/// Live for the duration of one phase. Clears the stepping marker and,
/// if the step unwinds, hands the taken sequence back so a later cancel
/// or clear still releases it.
struct StepGuard<'a> {
    cell: &'a RefCell<UnitState>,
    generation: Generation,
    sequence: Option<BoxedSequence>,
}

impl<'a> StepGuard<'a> {
    fn new(cell: &'a RefCell<UnitState>, generation: Generation) -> Self {
        Self {
            cell,
            generation,
            sequence: None,
        }
    }

    fn advance(&mut self, sequence: BoxedSequence) {
        let advance = self.sequence.insert(sequence).advance();
        if let Some(sequence) = self.sequence.take() {
            let mut finished = self
                .cell
                .borrow_mut()
                .finish_sequence(self.generation, sequence, advance);
            dispose(&mut finished);
        }
    }
}

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        let mut stray = self.sequence.take();
        if let Ok(mut state) = self.cell.try_borrow_mut() {
            state.stepping = false;
            if let Some(sequence) = stray.take() {
                stray = state.restore_sequence(self.generation, sequence);
            }
        }
        dispose(&mut stray);
    }
}

/// One phase of stepping, shared by the locked and unlocked entry points.
/// No `RefCell` borrow is held while user code runs.
fn step_cell(cell: &RefCell<UnitState>) -> StepResult {
    let (generation, phase) = {
        let mut state = cell.borrow_mut();
        (state.generation, state.begin_step())
    };
    match phase {
        Phase::Action(action) => {
            let _guard = StepGuard::new(cell, generation);
            action();
            cell.borrow_mut().finish_action(generation);
        }
        Phase::Sequence(sequence) => {
            StepGuard::new(cell, generation).advance(sequence);
        }
        Phase::Idle => {}
    }
    let status = cell.borrow().status;
    status.into()
}

/// A poolable slot that runs one action followed by one stepped sequence.
pub struct WorkUnit {
    key: SlotKey,
    state: UnitLock<UnitState>,
}

impl WorkUnit {
    /// A unit outside any arena. Its handles can only be checked against
    /// this unit directly.
    pub fn new() -> Self {
        Self::with_key(SlotKey::default())
    }

    pub(crate) fn with_key(key: SlotKey) -> Self {
        Self {
            key,
            state: UnitLock::new(UnitState::idle()),
        }
    }

    pub fn key(&self) -> SlotKey {
        self.key
    }

    /// Load new work and bump the generation, invalidating older handles.
    ///
    /// Nested handles and stop callbacks from a previous use are kept; the
    /// owning pool must [`clear`](Self::clear) the unit before reuse.
    pub fn initialize(
        &self,
        action: Option<Action>,
        sequence: Option<BoxedSequence>,
        flags: AsyncFlags,
    ) -> WorkHandle {
        let (handle, mut replaced) = self.state.with_mut(|state| {
            state.status = Status::pending(action.is_some(), sequence.is_some());
            state.action = action;
            let replaced = mem::replace(&mut state.sequence, sequence);
            state.flags = flags;
            state.cancelled = false;
            state.generation = state.generation.next();
            (WorkHandle::new(self.key, state.generation), replaced)
        });
        dispose(&mut replaced);
        handle
    }

    /// Advance one phase without locking. The exclusive borrow is the
    /// synchronization.
    pub fn step(&mut self) -> StepResult {
        step_cell(self.state.cell_mut())
    }

    /// Advance one phase with the unit lock held for the whole step.
    ///
    /// Called from the unit's own action or sequence, this is a no-op that
    /// reports the current status.
    pub fn threaded_step(&self) -> StepResult {
        self.state.with(step_cell)
    }

    /// Mark the unit done if `generation` is current.
    ///
    /// Drops the pending action, releases the pending sequence and drains
    /// the nested handles, returning them in the order they must be
    /// cancelled (last added first). Returns `None` for a stale generation.
    /// Stop callbacks are left for [`dispatch_stop`](Self::dispatch_stop).
    pub fn try_cancel(&self, generation: Generation) -> Option<Vec<WorkHandle>> {
        self.state.with(|cell| {
            let (action, mut sequence, mut nested) = {
                let mut state = cell.borrow_mut();
                if state.generation != generation {
                    return None;
                }
                state.status = Status::ALL_COMPLETE;
                state.cancelled = true;
                (
                    state.action.take(),
                    state.sequence.take(),
                    mem::take(&mut state.nested),
                )
            };
            drop(action);
            dispose(&mut sequence);
            nested.reverse();
            tracing::trace!(
                slot = self.key.slot,
                %generation,
                nested = nested.len(),
                "work unit cancelled"
            );
            Some(nested)
        })
    }

    /// Attach a child whose cancellation follows this unit's.
    pub fn add_nested(&self, generation: Generation, child: WorkHandle) -> bool {
        self.state.with_mut(|state| {
            if state.generation != generation {
                return false;
            }
            state.nested.push(child);
            true
        })
    }

    /// Register a callback for when the unit stops. Callbacks accumulate and
    /// fire in registration order.
    pub fn on_stop_callback<F>(&self, generation: Generation, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_stop_boxed(generation, Box::new(callback))
    }

    pub(crate) fn on_stop_boxed(&self, generation: Generation, callback: StopCallback) -> bool {
        self.state.with_mut(|state| {
            if state.generation != generation {
                return false;
            }
            state.on_stop.push(callback);
            true
        })
    }

    /// Hand registered stop callbacks to `dispatcher`, once. Never invokes
    /// them here.
    pub fn dispatch_stop(&self, dispatcher: &dyn StopDispatcher) -> bool {
        self.state.with(|cell| {
            let callbacks = mem::take(&mut cell.borrow_mut().on_stop);
            if callbacks.is_empty() {
                return false;
            }
            dispatcher.enqueue(StopChain::new(callbacks));
            true
        })
    }

    /// Reset to the idle, done state. The generation is untouched.
    pub fn clear(&self) {
        self.state.with(|cell| {
            let (action, mut sequence, nested, on_stop) = {
                let mut state = cell.borrow_mut();
                state.status = Status::ALL_COMPLETE;
                state.flags = AsyncFlags::empty();
                state.cancelled = false;
                (
                    state.action.take(),
                    state.sequence.take(),
                    mem::take(&mut state.nested),
                    mem::take(&mut state.on_stop),
                )
            };
            drop(action);
            dispose(&mut sequence);
            drop(nested);
            drop(on_stop);
        })
    }

    pub fn is_running(&self, generation: Generation) -> bool {
        self.state
            .with_mut(|state| state.generation == generation && !state.status.is_done())
    }

    /// Handle to the current generation.
    pub fn handle(&self) -> WorkHandle {
        WorkHandle::new(self.key, self.generation())
    }

    /// Whether `handle` was issued by this unit (same slot), regardless of
    /// generation.
    pub fn owns(&self, handle: &WorkHandle) -> bool {
        handle.arena() == self.key.arena && handle.slot() == self.key.slot
    }

    pub fn generation(&self) -> Generation {
        self.state.with_mut(|state| state.generation)
    }

    pub fn status(&self) -> Status {
        self.state.with_mut(|state| state.status)
    }

    pub fn is_done(&self) -> bool {
        self.status().is_done()
    }

    /// Whether the current generation ended through [`try_cancel`](Self::try_cancel)
    /// rather than by running out of work.
    pub fn is_cancelled(&self) -> bool {
        self.state.with_mut(|state| state.cancelled)
    }

    pub fn flags(&self) -> AsyncFlags {
        self.state.with_mut(|state| state.flags)
    }
}

impl Default for WorkUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (status, generation, flags) =
            self.state
                .with_mut(|state| (state.status, state.generation, state.flags));
        f.debug_struct("WorkUnit")
            .field("key", &self.key)
            .field("generation", &generation)
            .field("status", &status)
            .field("flags", &flags)
            .finish()
    }
}

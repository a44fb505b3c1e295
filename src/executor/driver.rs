//! Stepping a slot on behalf of a host: panic capture, metrics, retirement.

use super::panic_handler::PanicHandler;
use crate::dispatch::QueueDispatcher;
use crate::error::Error;
use crate::pool::WorkArena;
use crate::telemetry::Metrics;
use crate::unit::StepResult;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

/// Panics kept for the host to collect; older ones are dropped first.
const MAX_RETAINED_PANICS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotOutcome {
    /// Still has work; queue it again.
    Pending,
    /// Retired: stop callbacks dispatched, slot back in the arena.
    Finished(Finish),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Finish {
    Completed,
    Cancelled,
    Panicked,
}

#[derive(Debug)]
pub(crate) struct StepDriver {
    pub(crate) arena: WorkArena,
    pub(crate) dispatcher: Arc<QueueDispatcher>,
    pub(crate) panic_handler: PanicHandler,
    pub(crate) metrics: Metrics,
    panics: Mutex<VecDeque<Error>>,
}

impl StepDriver {
    pub(crate) fn new(arena: WorkArena, panic_handler: PanicHandler) -> Self {
        Self {
            arena,
            dispatcher: Arc::new(QueueDispatcher::new()),
            panic_handler,
            metrics: Metrics::new(),
            panics: Mutex::new(VecDeque::new()),
        }
    }

    /// Step `slot` once. The caller must be the only one holding `slot` in
    /// a run queue.
    pub(crate) fn step_slot(&self, slot: u32) -> SlotOutcome {
        let Some(unit) = self.arena.unit(slot) else {
            return SlotOutcome::Finished(Finish::Cancelled);
        };

        // cancelled from outside since the last step, or given no work
        if unit.is_done() {
            let finish = if unit.is_cancelled() {
                Finish::Cancelled
            } else {
                Finish::Completed
            };
            if self.retire(slot) {
                self.record_finish(finish);
            }
            return SlotOutcome::Finished(finish);
        }

        let start = Instant::now();
        let result = self.panic_handler.execute(|| unit.threaded_step());
        self.metrics
            .record_step(start.elapsed().as_nanos() as u64);

        match result {
            Ok(StepResult::Incomplete) => SlotOutcome::Pending,
            Ok(StepResult::Complete) => {
                if self.retire(slot) {
                    self.record_finish(Finish::Completed);
                }
                SlotOutcome::Finished(Finish::Completed)
            }
            Err(info) => {
                tracing::debug!(slot, message = %info.message, "cancelling panicked work unit");
                // nested units are counted when their own slots retire
                self.arena.cancel(&unit.handle());
                if self.retire(slot) {
                    self.record_finish(Finish::Panicked);
                }
                self.keep_panic(Error::from(info));
                SlotOutcome::Finished(Finish::Panicked)
            }
        }
    }

    /// Cancel whatever `slot` holds and retire it.
    pub(crate) fn abandon(&self, slot: u32) {
        if let Some(unit) = self.arena.unit(slot) {
            self.arena.cancel(&unit.handle());
        }
        if self.retire(slot) {
            self.record_finish(Finish::Cancelled);
        }
    }

    /// Panics captured since the last call, oldest first.
    pub(crate) fn take_panics(&self) -> Vec<Error> {
        self.panics.lock().drain(..).collect()
    }

    fn keep_panic(&self, error: Error) {
        let mut panics = self.panics.lock();
        if panics.len() == MAX_RETAINED_PANICS {
            panics.pop_front();
        }
        panics.push_back(error);
    }

    fn record_finish(&self, finish: Finish) {
        match finish {
            Finish::Completed => self.metrics.record_completion(),
            Finish::Cancelled => self.metrics.record_cancel(),
            Finish::Panicked => self.metrics.record_panic(),
        }
    }

    fn retire(&self, slot: u32) -> bool {
        self.arena.retire(slot, &*self.dispatcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::PanicStrategy;
    use crate::pool::Work;
    use crate::unit::sequence::from_iter;

    fn driver(capacity: usize) -> StepDriver {
        StepDriver::new(
            WorkArena::new(capacity).unwrap(),
            PanicHandler::new(PanicStrategy::Isolate),
        )
    }

    #[test]
    fn test_runs_to_completion_and_retires() {
        let driver = driver(1);
        let handle = driver
            .arena
            .allocate(Work::from_action(|| {}).sequence(from_iter(0..1)))
            .unwrap();
        driver.arena.on_stop(&handle, || {});

        assert_eq!(driver.step_slot(handle.slot()), SlotOutcome::Pending);
        assert_eq!(driver.step_slot(handle.slot()), SlotOutcome::Pending);
        assert_eq!(
            driver.step_slot(handle.slot()),
            SlotOutcome::Finished(Finish::Completed)
        );
        assert_eq!(driver.arena.live(), 0);
        assert_eq!(driver.dispatcher.pending(), 1);
    }

    #[test]
    fn test_panicking_unit_is_cancelled_with_children() {
        let driver = driver(2);
        let parent = driver
            .arena
            .allocate(Work::from_action(|| panic!("bad action")))
            .unwrap();
        let child = driver
            .arena
            .allocate(Work::from_sequence(from_iter(0..10)))
            .unwrap();
        driver.arena.nest(&parent, child).unwrap();

        assert_eq!(
            driver.step_slot(parent.slot()),
            SlotOutcome::Finished(Finish::Panicked)
        );
        assert!(!driver.arena.is_running(&child));
        assert_eq!(
            driver.step_slot(child.slot()),
            SlotOutcome::Finished(Finish::Cancelled)
        );
        assert_eq!(driver.arena.live(), 0);

        let panics = driver.take_panics();
        assert_eq!(panics.len(), 1);
        assert!(matches!(&panics[0], Error::WorkerPanic(msg) if msg == "bad action"));

        #[cfg(feature = "telemetry")]
        {
            let metrics = driver.metrics.snapshot();
            assert_eq!(metrics.units_panicked, 1);
            assert_eq!(metrics.units_cancelled, 1);
        }
    }

    #[test]
    fn test_retained_panics_are_bounded() {
        let driver = driver(1);
        for i in 0..MAX_RETAINED_PANICS + 6 {
            driver.keep_panic(Error::WorkerPanic(i.to_string()));
        }

        let panics = driver.take_panics();
        assert_eq!(panics.len(), MAX_RETAINED_PANICS);
        assert!(matches!(&panics[0], Error::WorkerPanic(msg) if msg == "6"));
    }

    #[test]
    fn test_abandon_cancels_and_retires() {
        let driver = driver(1);
        let handle = driver
            .arena
            .allocate(Work::from_sequence(from_iter(0..10)))
            .unwrap();

        driver.abandon(handle.slot());
        assert!(!driver.arena.is_running(&handle));
        assert_eq!(driver.arena.live(), 0);
    }
}

//! Tick-driven host scheduler.
//!
//! The [`Scheduler`] owns a [`WorkArena`] and decides where each unit is
//! stepped. Units flagged [`AsyncFlags::MAIN_THREAD_ONLY`], and every unit
//! when no workers are configured, sit in priority lanes that advance only
//! when the owner calls [`Scheduler::tick`]. Everything else goes to the
//! background worker pool.
//!
//! Stop callbacks are always delivered on the ticking thread, at the end
//! of each tick.

mod lanes;

use crate::config::Config;
use crate::dispatch::QueueDispatcher;
use crate::error::{Error, Result};
use crate::executor::{Finish, PanicHandler, SlotOutcome, StepDriver};
use crate::pool::{Work, WorkArena};
use crate::telemetry::MetricsSnapshot;
use crate::unit::{AsyncFlags, Priority, WorkHandle};
use crate::util::Backoff;
use lanes::Lanes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "threading")]
use crate::executor::WorkerPool;

/// What one call to [`Scheduler::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Units stepped once this tick.
    pub stepped: usize,
    /// Units retired this tick, by any cause.
    pub finished: usize,
    /// Of those, units whose action or sequence panicked.
    pub panicked: usize,
    /// Units left unstepped because the budget ran out.
    pub deferred: usize,
    /// Stop chains delivered.
    pub stop_chains: usize,
    pub elapsed: Duration,
}

pub struct Scheduler {
    config: Config,
    driver: Arc<StepDriver>,
    lanes: Mutex<Lanes>,
    #[cfg(feature = "threading")]
    workers: Option<WorkerPool>,
}

impl Scheduler {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let arena = WorkArena::new(config.capacity)?;
        let driver = Arc::new(StepDriver::new(
            arena,
            PanicHandler::new(config.panic_strategy),
        ));

        #[cfg(feature = "threading")]
        let workers = if config.worker_threads() > 0 {
            Some(WorkerPool::new(&config, driver.clone())?)
        } else {
            None
        };

        tracing::debug!(
            capacity = config.capacity,
            workers = config.worker_threads(),
            "scheduler created"
        );

        Ok(Self {
            config,
            driver,
            lanes: Mutex::new(Lanes::default()),
            #[cfg(feature = "threading")]
            workers,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn arena(&self) -> &WorkArena {
        &self.driver.arena
    }

    pub fn dispatcher(&self) -> &QueueDispatcher {
        &self.driver.dispatcher
    }

    /// Allocate a unit for `work` and queue it.
    pub fn spawn(&self, work: Work) -> Result<WorkHandle> {
        let flags = work.flags;
        let handle = self.driver.arena.allocate(work)?;
        self.driver.metrics.record_spawn();

        if self.runs_on_main(flags) {
            self.lanes.lock().push(flags.priority(), handle.slot());
        } else {
            self.submit_to_workers(handle.slot());
        }

        tracing::trace!(?handle, ?flags, "work spawned");
        Ok(handle)
    }

    #[cfg(feature = "threading")]
    fn runs_on_main(&self, flags: AsyncFlags) -> bool {
        self.workers.is_none() || flags.contains(AsyncFlags::MAIN_THREAD_ONLY)
    }

    #[cfg(not(feature = "threading"))]
    fn runs_on_main(&self, _flags: AsyncFlags) -> bool {
        true
    }

    #[cfg(feature = "threading")]
    fn submit_to_workers(&self, slot: u32) {
        if let Some(workers) = &self.workers {
            workers.submit(slot);
        }
    }

    #[cfg(not(feature = "threading"))]
    fn submit_to_workers(&self, _slot: u32) {}

    /// Step every queued main-thread unit at most once, highest priority
    /// first, until the tick budget runs out. Then deliver pending stop
    /// callbacks.
    pub fn tick(&self) -> TickReport {
        let start = Instant::now();
        let budget = self.config.tick_budget;
        let mut report = TickReport::default();

        // taken out so actions may spawn or cancel while we step
        let batch = self.lanes.lock().drain();
        let mut pending = Vec::with_capacity(batch.len());
        let mut batch = batch.into_iter();

        for (priority, slot) in batch.by_ref() {
            report.stepped += 1;
            match self.driver.step_slot(slot) {
                SlotOutcome::Pending => pending.push((priority, slot)),
                SlotOutcome::Finished(finish) => {
                    report.finished += 1;
                    if finish == Finish::Panicked {
                        report.panicked += 1;
                    }
                }
            }
            if start.elapsed() >= budget {
                break;
            }
        }

        let deferred: Vec<(Priority, u32)> = batch.collect();
        report.deferred = deferred.len();
        {
            let mut lanes = self.lanes.lock();
            lanes.restore_front(deferred);
            for (priority, slot) in pending {
                lanes.push(priority, slot);
            }
        }

        report.stop_chains = self.driver.dispatcher.dispatch_pending();
        self.driver.metrics.record_stop_chains(report.stop_chains);
        report.elapsed = start.elapsed();

        if report.deferred > 0 {
            tracing::trace!(deferred = report.deferred, "tick budget exhausted");
        }
        report
    }

    /// Tick until no units are live and no callbacks are pending, or
    /// `max_ticks` ticks have run. Returns whether everything finished.
    pub fn run_until_idle(&self, max_ticks: usize) -> bool {
        let backoff = Backoff::new();
        for _ in 0..max_ticks {
            let report = self.tick();
            if self.is_idle() {
                return true;
            }
            if report.stepped == 0 && report.stop_chains == 0 {
                // only background work left
                if backoff.is_completed() {
                    std::thread::sleep(Duration::from_micros(100));
                } else {
                    backoff.spin();
                }
            } else {
                backoff.reset();
            }
        }
        self.is_idle()
    }

    pub fn is_idle(&self) -> bool {
        self.driver.arena.live() == 0 && self.driver.dispatcher.pending() == 0
    }

    /// Cancel `handle` and its nested units. Their stop callbacks fire on a
    /// later tick.
    pub fn cancel(&self, handle: &WorkHandle) -> bool {
        self.driver.arena.cancel(handle)
    }

    pub fn is_running(&self, handle: &WorkHandle) -> bool {
        self.driver.arena.is_running(handle)
    }

    pub fn on_stop<F>(&self, handle: &WorkHandle, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.driver.arena.on_stop(handle, callback)
    }

    /// Cancel `child` whenever `parent` is cancelled.
    pub fn nest(&self, parent: &WorkHandle, child: WorkHandle) -> Result<bool> {
        self.driver.arena.nest(parent, child)
    }

    pub fn live(&self) -> usize {
        self.driver.arena.live()
    }

    /// Units waiting in the main-thread lanes.
    pub fn queued(&self) -> usize {
        self.lanes.lock().len()
    }

    /// Panics raised by actions or sequences since the last call, as
    /// [`Error::WorkerPanic`]. Only the most recent ones are kept.
    pub fn take_panics(&self) -> Vec<Error> {
        self.driver.take_panics()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.driver.metrics.snapshot()
    }

    /// Stop the workers, cancel everything still queued and deliver the
    /// remaining stop callbacks.
    pub fn shutdown(&mut self) {
        #[cfg(feature = "threading")]
        if let Some(mut workers) = self.workers.take() {
            workers.shutdown();
        }

        let leftover = self.lanes.lock().drain();
        for (_, slot) in &leftover {
            self.driver.abandon(*slot);
        }
        let chains = self.driver.dispatcher.dispatch_pending();
        self.driver.metrics.record_stop_chains(chains);

        if !leftover.is_empty() {
            tracing::debug!(abandoned = leftover.len(), "scheduler shut down with queued work");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("arena", &self.driver.arena)
            .field("queued", &self.queued())
            .finish()
    }
}

// background workers stepping units off the tick thread
use super::driver::{SlotOutcome, StepDriver};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::util::Backoff;
use crossbeam_deque::{Injector, Steal};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub type WorkerId = usize;

struct Worker {
    id: WorkerId,
    injector: Arc<Injector<u32>>,
    driver: Arc<StepDriver>,
    shutdown: Arc<AtomicBool>,
    steps_per_turn: usize,
}

impl Worker {
    // main loop
    fn run(&self) {
        let backoff = Backoff::new();
        tracing::debug!(worker = self.id, "worker started");

        loop {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }

            match steal_slot(&self.injector) {
                Some(slot) => {
                    backoff.reset();
                    self.run_turn(slot);
                }
                None if backoff.is_completed() => {
                    thread::park_timeout(Duration::from_micros(200));
                }
                None => backoff.spin(),
            }
        }

        tracing::debug!(worker = self.id, "worker stopped");
    }

    /// Step one unit a bounded number of times, then hand it back.
    fn run_turn(&self, slot: u32) {
        for _ in 0..self.steps_per_turn {
            if let SlotOutcome::Finished(finish) = self.driver.step_slot(slot) {
                tracing::trace!(worker = self.id, slot, ?finish, "unit finished");
                return;
            }
        }
        self.injector.push(slot);
    }
}

fn steal_slot(injector: &Injector<u32>) -> Option<u32> {
    loop {
        match injector.steal() {
            Steal::Success(slot) => return Some(slot),
            Steal::Empty => return None,
            Steal::Retry => continue,
        }
    }
}

struct WorkerHandle {
    thread: Option<JoinHandle<()>>,
    unparker: thread::Thread,
}

pub(crate) struct WorkerPool {
    workers: Vec<WorkerHandle>,
    injector: Arc<Injector<u32>>,
    driver: Arc<StepDriver>,
    shutdown: Arc<AtomicBool>,
    next_wake: AtomicUsize,
}

impl WorkerPool {
    pub(crate) fn new(config: &Config, driver: Arc<StepDriver>) -> Result<Self> {
        let num_threads = config.worker_threads();
        if num_threads == 0 {
            return Err(Error::config("worker pool needs at least 1 thread"));
        }

        let injector = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(num_threads);

        for id in 0..num_threads {
            let worker = Worker {
                id,
                injector: injector.clone(),
                driver: driver.clone(),
                shutdown: shutdown.clone(),
                steps_per_turn: config.steps_per_turn,
            };

            let mut builder =
                thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let thread = builder
                .spawn(move || worker.run())
                .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;

            let unparker = thread.thread().clone();
            workers.push(WorkerHandle {
                thread: Some(thread),
                unparker,
            });
        }

        tracing::debug!(workers = num_threads, "worker pool started");

        Ok(Self {
            workers,
            injector,
            driver,
            shutdown,
            next_wake: AtomicUsize::new(0),
        })
    }

    pub(crate) fn submit(&self, slot: u32) {
        self.injector.push(slot);

        let idx = self.next_wake.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        self.workers[idx].unparker.unpark();
    }

    #[cfg(test)]
    pub(crate) fn num_threads(&self) -> usize {
        self.workers.len()
    }

    #[cfg(test)]
    pub(crate) fn queued(&self) -> usize {
        self.injector.len()
    }

    /// Stop and join all workers, then cancel whatever is still queued.
    pub(crate) fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);

        for worker in &self.workers {
            worker.unparker.unpark();
        }

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    tracing::warn!("worker thread panicked outside a work unit");
                }
            }
        }

        let mut abandoned = 0usize;
        while let Some(slot) = steal_slot(&self.injector) {
            self.driver.abandon(slot);
            abandoned += 1;
        }
        if abandoned > 0 {
            tracing::debug!(abandoned, "queued units cancelled at shutdown");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{PanicHandler, PanicStrategy};
    use crate::pool::{Work, WorkArena};
    use crate::unit::sequence::{from_fn, from_iter};
    use std::time::Instant;

    fn pool(threads: usize, capacity: usize) -> (WorkerPool, Arc<StepDriver>) {
        let config = Config::builder()
            .worker_threads(threads)
            .capacity(capacity)
            .build()
            .unwrap();
        let driver = Arc::new(StepDriver::new(
            WorkArena::new(capacity).unwrap(),
            PanicHandler::new(PanicStrategy::Isolate),
        ));
        (WorkerPool::new(&config, driver.clone()).unwrap(), driver)
    }

    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_workers_drain_submitted_units() {
        let (pool, driver) = pool(2, 64);
        assert_eq!(pool.num_threads(), 2);

        for _ in 0..64 {
            let handle = driver
                .arena
                .allocate(Work::from_action(|| {}).sequence(from_iter(0..5)))
                .unwrap();
            driver.arena.on_stop(&handle, || {});
            pool.submit(handle.slot());
        }

        assert!(wait_until(|| driver.arena.live() == 0));
        assert_eq!(driver.dispatcher.dispatch_pending(), 64);
    }

    #[test]
    fn test_shutdown_cancels_queued_units() {
        let (mut pool, driver) = pool(1, 4);
        let handle = driver
            .arena
            .allocate(Work::from_sequence(from_fn(|| {
                thread::sleep(Duration::from_millis(1));
                true
            })))
            .unwrap();
        driver.arena.on_stop(&handle, || {});
        pool.submit(handle.slot());

        pool.shutdown();
        assert_eq!(pool.queued(), 0);
        assert!(!driver.arena.is_running(&handle));
        assert_eq!(driver.arena.live(), 0);
        assert_eq!(driver.dispatcher.dispatch_pending(), 1);
    }
}

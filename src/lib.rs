//! stepwork - pooled work units for cooperative step scheduling
//!
//! A fixed arena of reusable *work unit* slots. Each unit runs a one-shot
//! action followed by a stepped [`Sequence`], one phase per step, and can
//! be cancelled from any thread through a generation-checked
//! [`WorkHandle`]. Cancellation cascades to nested units; stop callbacks
//! are delivered once, out of band, through a [`StopDispatcher`].
//!
//! # Quick Start
//!
//! ```no_run
//! use stepwork::prelude::*;
//!
//! let config = Config::builder().main_thread_only().build().unwrap();
//! let scheduler = Scheduler::new(config).unwrap();
//!
//! let mut frames = 0;
//! let handle = scheduler
//!     .spawn(
//!         Work::from_action(|| println!("loading"))
//!             .sequence(sequence::from_fn(move || {
//!                 frames += 1;
//!                 frames < 3
//!             })),
//!     )
//!     .unwrap();
//! scheduler.on_stop(&handle, || println!("done"));
//!
//! while scheduler.is_running(&handle) {
//!     scheduler.tick();
//! }
//! ```
//!
//! # Layers
//!
//! - [`unit`]: the [`WorkUnit`] state machine, handles, generations and the
//!   [`Sequence`] trait. Usable on its own.
//! - [`pool`]: [`WorkArena`], which allocates, recycles and cancels units.
//! - [`dispatch`]: stop-callback delivery.
//! - [`scheduler`]: a tick-driven host with priority lanes, a time budget
//!   and, with the `threading` feature, background workers.
//!
//! # Features
//!
//! - `threading` (default): units are guarded by a reentrant mutex and the
//!   scheduler may run background workers. Without it units are confined to
//!   one thread and take no locks.
//! - `telemetry` (default): step counters and latency histogram.

#![warn(missing_debug_implementations)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod pool;
pub mod prelude;
pub mod scheduler;
pub mod telemetry;
pub mod unit;
pub mod util;

pub use config::{Config, ConfigBuilder};
pub use dispatch::{QueueDispatcher, StopChain, StopDispatcher};
pub use error::{Error, Result};
pub use pool::{Work, WorkArena};
pub use scheduler::{Scheduler, TickReport};
pub use unit::sequence;
pub use unit::{
    AsyncFlags, Generation, Sequence, StepResult, WorkHandle, WorkUnit,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_to_end_on_one_thread() {
        let config = Config::builder().main_thread_only().build().unwrap();
        let scheduler = Scheduler::new(config).unwrap();

        let log = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (a, b, c) = (log.clone(), log.clone(), log.clone());
        let mut remaining = 3;
        let handle = scheduler
            .spawn(
                Work::from_action(move || a.lock().push("action")).sequence(sequence::from_fn(
                    move || {
                        b.lock().push("step");
                        remaining -= 1;
                        remaining > 0
                    },
                )),
            )
            .unwrap();
        scheduler.on_stop(&handle, move || c.lock().push("stop"));

        let mut ticks = 0;
        while scheduler.is_running(&handle) {
            scheduler.tick();
            ticks += 1;
        }

        assert_eq!(ticks, 4);
        assert_eq!(*log.lock(), vec!["action", "step", "step", "step", "stop"]);
    }
}

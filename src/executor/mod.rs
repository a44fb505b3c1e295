//! Host-side execution of work units.
//!
//! The step driver wraps each step in panic capture and metrics and
//! retires finished slots. With the `threading` feature, a pool of worker
//! threads can drive units in the background.

pub(crate) mod driver;
pub mod panic_handler;

#[cfg(feature = "threading")]
pub(crate) mod worker;

pub use panic_handler::{PanicHandler, PanicInfo, PanicStrategy};

pub(crate) use driver::{Finish, SlotOutcome, StepDriver};

#[cfg(feature = "threading")]
pub(crate) use worker::WorkerPool;

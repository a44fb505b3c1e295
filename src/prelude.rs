pub use crate::config::{Config, ConfigBuilder};
pub use crate::dispatch::{QueueDispatcher, StopDispatcher};
pub use crate::error::{Error, Result};
pub use crate::executor::PanicStrategy;
pub use crate::pool::{Work, WorkArena};
pub use crate::scheduler::{Scheduler, TickReport};
pub use crate::unit::sequence::{self, Advance, Sequence, SequenceExt};
pub use crate::unit::{AsyncFlags, StepResult, WorkHandle, WorkUnit};

pub use crate::telemetry::MetricsSnapshot;

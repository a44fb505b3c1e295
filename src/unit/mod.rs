//! Work units and their identity.
//!
//! This module holds the core state machine ([`WorkUnit`]), the
//! generation-checked [`WorkHandle`], completion [`Status`] bits, and the
//! [`Sequence`] capability units step through.

pub mod flags;
pub mod generation;
pub mod handle;
pub(crate) mod lock;
pub mod sequence;
pub mod status;
pub mod work_unit;

pub use flags::{AsyncFlags, Priority};
pub use generation::Generation;
pub use handle::{ArenaId, SlotKey, WorkHandle};
pub use sequence::{dispose, Advance, BoxedSequence, Sequence, SequenceExt};
pub use status::{Status, StepResult};
pub use work_unit::{Action, WorkUnit};

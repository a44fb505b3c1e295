//! Deferred delivery of stop callbacks.
//!
//! Units never run their stop callbacks themselves. [`WorkUnit::dispatch_stop`]
//! packs them into a [`StopChain`] and hands it to a [`StopDispatcher`],
//! which decides where and when the chain runs.
//!
//! [`WorkUnit::dispatch_stop`]: crate::unit::WorkUnit::dispatch_stop

mod queue;

pub use queue::QueueDispatcher;

use std::fmt;

pub type StopCallback = Box<dyn FnOnce() + Send + 'static>;

/// Stop callbacks of one unit, invoked in registration order.
pub struct StopChain {
    callbacks: Vec<StopCallback>,
}

impl StopChain {
    pub fn new(callbacks: Vec<StopCallback>) -> Self {
        Self { callbacks }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn invoke(self) {
        for callback in self.callbacks {
            callback();
        }
    }
}

impl fmt::Debug for StopChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopChain")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Sink that accepts stop chains for later invocation.
pub trait StopDispatcher {
    fn enqueue(&self, chain: StopChain);
}

impl<D: StopDispatcher + ?Sized> StopDispatcher for std::sync::Arc<D> {
    fn enqueue(&self, chain: StopChain) {
        (**self).enqueue(chain)
    }
}

use super::{StopChain, StopDispatcher};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

/// FIFO dispatcher. Any thread may enqueue; chains run on whichever thread
/// calls [`QueueDispatcher::dispatch_pending`].
#[derive(Debug)]
pub struct QueueDispatcher {
    sender: Sender<StopChain>,
    receiver: Receiver<StopChain>,
}

impl QueueDispatcher {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Invoke every chain queued so far, oldest first. Chains enqueued by
    /// the callbacks themselves wait for the next call. Returns the number
    /// of chains invoked.
    pub fn dispatch_pending(&self) -> usize {
        let mut budget = self.receiver.len();
        let mut invoked = 0;
        while budget > 0 {
            match self.receiver.try_recv() {
                Ok(chain) => {
                    chain.invoke();
                    invoked += 1;
                    budget -= 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        if invoked > 0 {
            tracing::trace!(invoked, "stop chains dispatched");
        }
        invoked
    }
}

impl Default for QueueDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl StopDispatcher for QueueDispatcher {
    fn enqueue(&self, chain: StopChain) {
        // receiver lives as long as self, so the channel is never closed
        let _ = self.sender.send(chain);
    }
}

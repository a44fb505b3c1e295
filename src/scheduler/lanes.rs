use crate::unit::Priority;
use std::collections::VecDeque;

const LANES: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];

/// Run queues of slot indices, one per priority.
#[derive(Debug, Default)]
pub(crate) struct Lanes {
    queues: [VecDeque<u32>; 3],
}

impl Lanes {
    pub(crate) fn push(&mut self, priority: Priority, slot: u32) {
        self.queues[priority as usize].push_back(slot);
    }

    /// Put slots that were taken but not stepped back at the head of their
    /// lanes, keeping their relative order.
    pub(crate) fn restore_front(&mut self, deferred: Vec<(Priority, u32)>) {
        for (priority, slot) in deferred.into_iter().rev() {
            self.queues[priority as usize].push_front(slot);
        }
    }

    /// Take everything, highest priority first.
    pub(crate) fn drain(&mut self) -> Vec<(Priority, u32)> {
        let mut out = Vec::with_capacity(self.len());
        for priority in LANES {
            out.extend(
                self.queues[priority as usize]
                    .drain(..)
                    .map(|slot| (priority, slot)),
            );
        }
        out
    }

    pub(crate) fn len(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty)
    }

    #[cfg(test)]
    pub(crate) fn len_of(&self, priority: Priority) -> usize {
        self.queues[priority as usize].len()
    }
}

use bitflags::bitflags;

bitflags! {
    /// Scheduling affinity for a unit. The unit itself never interprets
    /// these; host schedulers do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AsyncFlags: u16 {
        const HIGH_PRIORITY = 0x01;
        const LOW_PRIORITY = 0x02;
        /// Never step on a background worker.
        const MAIN_THREAD_ONLY = 0x04;
    }
}

/// Lane a unit is queued on by the host scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    High = 0,
    Normal = 1,
    Low = 2,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl AsyncFlags {
    /// High wins when both priority bits are set.
    pub fn priority(self) -> Priority {
        if self.contains(AsyncFlags::HIGH_PRIORITY) {
            Priority::High
        } else if self.contains(AsyncFlags::LOW_PRIORITY) {
            Priority::Low
        } else {
            Priority::Normal
        }
    }
}

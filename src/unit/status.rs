use bitflags::bitflags;

bitflags! {
    /// Completion bits of a work unit. Both set means done.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u16 {
        const ACTION_COMPLETE = 0x01;
        const SEQUENCE_COMPLETE = 0x02;
        const ALL_COMPLETE = Self::ACTION_COMPLETE.bits() | Self::SEQUENCE_COMPLETE.bits();
    }
}

impl Status {
    /// Initial status for a unit given which phases it has work for.
    pub fn pending(has_action: bool, has_sequence: bool) -> Self {
        let mut status = Status::ALL_COMPLETE;
        if has_action {
            status.remove(Status::ACTION_COMPLETE);
        }
        if has_sequence {
            status.remove(Status::SEQUENCE_COMPLETE);
        }
        status
    }

    pub fn is_done(self) -> bool {
        self.contains(Status::ALL_COMPLETE)
    }
}

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepResult {
    Incomplete,
    Complete,
}

impl StepResult {
    pub fn is_complete(self) -> bool {
        self == StepResult::Complete
    }
}

impl From<Status> for StepResult {
    fn from(status: Status) -> Self {
        if status.is_done() {
            StepResult::Complete
        } else {
            StepResult::Incomplete
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_bits() {
        assert!(Status::pending(false, false).is_done());
        assert_eq!(Status::pending(true, false), Status::SEQUENCE_COMPLETE);
        assert_eq!(Status::pending(false, true), Status::ACTION_COMPLETE);
        assert!(Status::pending(true, true).is_empty());
    }

    #[test]
    fn test_step_result_from_status() {
        assert_eq!(StepResult::from(Status::ALL_COMPLETE), StepResult::Complete);
        assert_eq!(StepResult::from(Status::ACTION_COMPLETE), StepResult::Incomplete);
    }
}

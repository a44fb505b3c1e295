use std::panic::{catch_unwind, AssertUnwindSafe};

/// What to do when an action or sequence step panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicStrategy {
    /// Abort the process.
    Abort,
    /// Swallow the panic silently; the unit is cancelled.
    Isolate,
    /// Log the panic; the unit is cancelled.
    LogAndContinue,
}

impl Default for PanicStrategy {
    fn default() -> Self {
        PanicStrategy::LogAndContinue
    }
}

#[derive(Debug)]
pub struct PanicHandler {
    strategy: PanicStrategy,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self { strategy }
    }

    pub fn execute<F, R>(&self, f: F) -> Result<R, PanicInfo>
    where
        F: FnOnce() -> R,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Ok(result),
            Err(payload) => {
                let info = PanicInfo::from_payload(payload);

                match self.strategy {
                    PanicStrategy::Abort => {
                        tracing::error!(message = %info.message, "work unit panicked, aborting");
                        std::process::abort();
                    }
                    PanicStrategy::Isolate => {}
                    PanicStrategy::LogAndContinue => {
                        tracing::warn!(message = %info.message, "work unit panicked");
                    }
                }

                Err(info)
            }
        }
    }
}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(PanicStrategy::default())
    }
}

#[derive(Debug, Clone)]
pub struct PanicInfo {
    pub message: String,
}

impl PanicInfo {
    fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };

        Self { message }
    }
}

impl From<PanicInfo> for crate::error::Error {
    fn from(info: PanicInfo) -> Self {
        crate::error::Error::WorkerPanic(info.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_is_captured() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);

        let result = handler.execute(|| {
            panic!("step failed");
        });

        let info: PanicInfo = result.unwrap_err();
        assert_eq!(info.message, "step failed");
    }

    #[test]
    fn test_success_passes_through() {
        let handler = PanicHandler::new(PanicStrategy::LogAndContinue);

        assert_eq!(handler.execute(|| 42).unwrap(), 42);
    }

    #[test]
    fn test_formatted_payload() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);
        let err = handler
            .execute(|| {
                panic!("slot {}", 3);
            })
            .unwrap_err();
        assert_eq!(err.message, "slot 3");
        assert!(matches!(
            crate::error::Error::from(err),
            crate::error::Error::WorkerPanic(_)
        ));
    }
}

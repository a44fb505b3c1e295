//! Stepped sequences: generator-like work advanced one step at a time.
//!
//! A [`Sequence`] is the second phase of a work unit. Each call to
//! [`Sequence::advance`] performs one bounded slice of work and reports
//! whether more remains. When a sequence finishes, is cancelled, or its
//! unit is cleared, the owner calls [`Sequence::release`] exactly once
//! through [`dispose`].

/// Result of advancing a sequence by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Advance {
    /// A step was produced; call again for more.
    Yielded,
    /// Nothing left to do.
    Exhausted,
}

impl Advance {
    pub fn is_exhausted(self) -> bool {
        self == Advance::Exhausted
    }
}

impl From<bool> for Advance {
    /// `true` means "more remains".
    fn from(more: bool) -> Self {
        if more {
            Advance::Yielded
        } else {
            Advance::Exhausted
        }
    }
}

pub trait Sequence: Send {
    /// Perform one step of work.
    fn advance(&mut self) -> Advance;

    /// Tear down any held resources. Called at most once by the owning unit.
    fn release(&mut self) {}
}

pub type BoxedSequence = Box<dyn Sequence>;

impl<S: Sequence + ?Sized> Sequence for Box<S> {
    fn advance(&mut self) -> Advance {
        (**self).advance()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Release a sequence and clear the slot. Calling it on an empty slot is a
/// no-op.
pub fn dispose<S: Sequence + ?Sized>(slot: &mut Option<Box<S>>) {
    if let Some(mut sequence) = slot.take() {
        sequence.release();
    }
}

/// Sequence driven by a closure returning [`Advance`] (or a `bool`).
pub fn from_fn<F, R>(step: F) -> FnSequence<F>
where
    F: FnMut() -> R + Send,
    R: Into<Advance>,
{
    FnSequence { step }
}

/// Sequence that pulls one item per step from an iterator, discarding it.
pub fn from_iter<I>(iter: I) -> IterSequence<I::IntoIter>
where
    I: IntoIterator,
    I::IntoIter: Send,
{
    IterSequence {
        iter: iter.into_iter(),
    }
}

#[derive(Debug)]
pub struct FnSequence<F> {
    step: F,
}

impl<F, R> Sequence for FnSequence<F>
where
    F: FnMut() -> R + Send,
    R: Into<Advance>,
{
    fn advance(&mut self) -> Advance {
        (self.step)().into()
    }
}

#[derive(Debug)]
pub struct IterSequence<I> {
    iter: I,
}

impl<I: Iterator + Send> Sequence for IterSequence<I> {
    fn advance(&mut self) -> Advance {
        match self.iter.next() {
            Some(_) => Advance::Yielded,
            None => Advance::Exhausted,
        }
    }
}

/// Runs `first` to exhaustion, then `second`.
#[derive(Debug)]
pub struct Then<A, B> {
    first: Option<A>,
    second: B,
}

impl<A: Sequence, B: Sequence> Sequence for Then<A, B> {
    fn advance(&mut self) -> Advance {
        if let Some(first) = self.first.as_mut() {
            if first.advance() == Advance::Yielded {
                return Advance::Yielded;
            }
            if let Some(mut done) = self.first.take() {
                done.release();
            }
        }
        self.second.advance()
    }

    fn release(&mut self) {
        if let Some(mut first) = self.first.take() {
            first.release();
        }
        self.second.release();
    }
}

/// Wraps a sequence with a teardown hook run on release.
pub struct OnRelease<S, F> {
    inner: S,
    hook: Option<F>,
}

impl<S: Sequence, F: FnOnce() + Send> Sequence for OnRelease<S, F> {
    fn advance(&mut self) -> Advance {
        self.inner.advance()
    }

    fn release(&mut self) {
        self.inner.release();
        if let Some(hook) = self.hook.take() {
            hook();
        }
    }
}

impl<S: std::fmt::Debug, F> std::fmt::Debug for OnRelease<S, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnRelease")
            .field("inner", &self.inner)
            .field("released", &self.hook.is_none())
            .finish()
    }
}

pub trait SequenceExt: Sequence + Sized {
    fn then<B: Sequence>(self, second: B) -> Then<Self, B> {
        Then {
            first: Some(self),
            second,
        }
    }

    fn on_release<F: FnOnce() + Send>(self, hook: F) -> OnRelease<Self, F> {
        OnRelease {
            inner: self,
            hook: Some(hook),
        }
    }

    fn boxed(self) -> BoxedSequence
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<S: Sequence> SequenceExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_iter_sequence() {
        let mut seq = from_iter(0..2);
        assert_eq!(seq.advance(), Advance::Yielded);
        assert_eq!(seq.advance(), Advance::Yielded);
        assert_eq!(seq.advance(), Advance::Exhausted);
    }

    #[test]
    fn test_fn_sequence_accepts_bool() {
        let mut remaining = 2;
        let mut seq = from_fn(move || {
            remaining -= 1;
            remaining > 0
        });
        assert_eq!(seq.advance(), Advance::Yielded);
        assert_eq!(seq.advance(), Advance::Exhausted);
    }

    #[test]
    fn test_then_runs_in_order() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (a, b) = (log.clone(), log.clone());
        let mut seq = from_iter(0..1)
            .on_release(move || a.lock().push("first released"))
            .then(from_iter(0..1).on_release(move || b.lock().push("second released")));

        assert_eq!(seq.advance(), Advance::Yielded);
        assert_eq!(seq.advance(), Advance::Yielded);
        assert_eq!(*log.lock(), vec!["first released"]);
        assert_eq!(seq.advance(), Advance::Exhausted);

        seq.release();
        assert_eq!(*log.lock(), vec!["first released", "second released"]);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let mut slot: Option<BoxedSequence> = Some(
            from_iter(0..3)
                .on_release(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .boxed(),
        );

        dispose(&mut slot);
        dispose(&mut slot);

        assert!(slot.is_none());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}

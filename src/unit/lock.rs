//! Per-unit lock, chosen once at build time.
//!
//! With the `threading` feature a unit's state sits behind a reentrant
//! mutex, so the action or sequence running under [`UnitLock::with`] may
//! call back into its own unit. Without it the lock is a bare `RefCell`
//! and units are confined to one thread.
//!
//! Callers must drop any `RefCell` borrow before running user code.

use std::cell::RefCell;

#[cfg(feature = "threading")]
pub(crate) struct UnitLock<T> {
    inner: parking_lot::ReentrantMutex<RefCell<T>>,
}

#[cfg(feature = "threading")]
impl<T> UnitLock<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            inner: parking_lot::ReentrantMutex::new(RefCell::new(value)),
        }
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&RefCell<T>) -> R) -> R {
        let guard = self.inner.lock();
        f(&guard)
    }

    /// The cell without locking; the exclusive borrow is the guard.
    pub(crate) fn cell_mut(&mut self) -> &RefCell<T> {
        self.inner.get_mut()
    }
}

#[cfg(not(feature = "threading"))]
pub(crate) struct UnitLock<T> {
    inner: RefCell<T>,
}

#[cfg(not(feature = "threading"))]
impl<T> UnitLock<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
        }
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&RefCell<T>) -> R) -> R {
        f(&self.inner)
    }

    pub(crate) fn cell_mut(&mut self) -> &RefCell<T> {
        &self.inner
    }
}

impl<T> UnitLock<T> {
    /// Run `f` on the state with the lock held.
    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.with(|cell| f(&mut cell.borrow_mut()))
    }
}

//! [`TaskResult`]/[`TaskResultSupplier`]: a single-assignment future with
//! no OS-level blocking. Ported from the original's `shared_ptr`+`mutex`
//! pair to `Rc`+`RefCell`, since the core's concurrency model is
//! single-threaded cooperative: a supplier and its results always live on
//! the same logical executor.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use thiserror::Error;

/// The four states a [`TaskResult`] can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Ready,
    Error,
    Cancelled,
}

enum TaskState<R, E> {
    Pending,
    Ready(R),
    Error(E),
    Cancelled,
}

/// Failure unwrapping a [`TaskResult`] that isn't holding a value.
#[derive(Debug, Error)]
pub enum TaskError<E: fmt::Debug + fmt::Display> {
    #[error("task result is still pending")]
    Pending,
    #[error("task was cancelled")]
    Cancelled,
    #[error("{0}")]
    Failed(E),
}

/// Raised by [`TaskResultSupplier`] methods when the task has already left
/// the `Pending` state.
#[derive(Debug, Error)]
#[error("task result supplier has already been resolved")]
pub struct AlreadyResolved;

struct Inner<R, E> {
    state: TaskState<R, E>,
    next_listener_id: u64,
    listeners: Vec<(u64, Box<dyn FnOnce(&TaskResult<R, E>)>)>,
}

fn trigger<R, E>(inner_rc: &Rc<RefCell<Inner<R, E>>>) {
    let listeners = std::mem::take(&mut inner_rc.borrow_mut().listeners);
    let handle = TaskResult { inner: Rc::clone(inner_rc) };
    for (_, listener) in listeners {
        listener(&handle);
    }
}

/// A handle that detaches a [`TaskResult::notify`] registration. Detaching
/// after the task already resolved, or detaching twice, is a no-op.
pub struct NotifyHandle<R, E> {
    inner: Weak<RefCell<Inner<R, E>>>,
    id: u64,
}

impl<R, E> NotifyHandle<R, E> {
    pub fn detach(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.borrow_mut().listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

/// The read side of a single-assignment future.
pub struct TaskResult<R, E> {
    inner: Rc<RefCell<Inner<R, E>>>,
}

impl<R, E> Clone for TaskResult<R, E> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<R, E> TaskResult<R, E> {
    pub fn status(&self) -> TaskStatus {
        match self.inner.borrow().state {
            TaskState::Pending => TaskStatus::Pending,
            TaskState::Ready(_) => TaskStatus::Ready,
            TaskState::Error(_) => TaskStatus::Error,
            TaskState::Cancelled => TaskStatus::Cancelled,
        }
    }

    /// Report the current status. There is no other thread to make
    /// progress on this task while we hold the current one, so this
    /// cannot actually block — it reports whatever has been set so far.
    /// Callers driving a single-threaded executor should pump its
    /// `ActionQueue` between calls if they need the state to change.
    pub fn wait(&self) -> TaskStatus {
        self.status()
    }

    pub fn wait_for(&self, _timeout: Duration) -> TaskStatus {
        self.status()
    }

    /// Register `listener` to run once this resolves. If it's already
    /// resolved, `listener` runs synchronously before this returns.
    pub fn notify(&self, listener: impl FnOnce(&TaskResult<R, E>) + 'static) -> NotifyHandle<R, E> {
        let mut inner = self.inner.borrow_mut();
        if matches!(inner.state, TaskState::Pending) {
            let id = inner.next_listener_id;
            inner.next_listener_id += 1;
            inner.listeners.push((id, Box::new(listener)));
            drop(inner);
            NotifyHandle { inner: Rc::downgrade(&self.inner), id }
        } else {
            drop(inner);
            listener(self);
            NotifyHandle { inner: Weak::new(), id: 0 }
        }
    }
}

impl<R: Clone, E: Clone + fmt::Debug + fmt::Display> TaskResult<R, E> {
    /// The result, or the reason it isn't available.
    pub fn unwrap(&self) -> Result<R, TaskError<E>> {
        match &self.inner.borrow().state {
            TaskState::Pending => Err(TaskError::Pending),
            TaskState::Ready(value) => Ok(value.clone()),
            TaskState::Error(error) => Err(TaskError::Failed(error.clone())),
            TaskState::Cancelled => Err(TaskError::Cancelled),
        }
    }
}

/// The write side of a single-assignment future. `set_result`/`set_error`/
/// `cancel` each succeed exactly once, from the `Pending` state.
pub struct TaskResultSupplier<R, E> {
    inner: Rc<RefCell<Inner<R, E>>>,
}

impl<R, E> Default for TaskResultSupplier<R, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, E> TaskResultSupplier<R, E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: TaskState::Pending,
                next_listener_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn result(&self) -> TaskResult<R, E> {
        TaskResult { inner: Rc::clone(&self.inner) }
    }

    pub fn set_result(&self, value: R) -> Result<(), AlreadyResolved> {
        {
            let mut inner = self.inner.borrow_mut();
            match inner.state {
                TaskState::Pending => inner.state = TaskState::Ready(value),
                _ => return Err(AlreadyResolved),
            }
        }
        trigger(&self.inner);
        Ok(())
    }

    pub fn set_error(&self, error: E) -> Result<(), AlreadyResolved> {
        {
            let mut inner = self.inner.borrow_mut();
            match inner.state {
                TaskState::Pending => inner.state = TaskState::Error(error),
                _ => return Err(AlreadyResolved),
            }
        }
        trigger(&self.inner);
        Ok(())
    }

    pub fn cancel(&self) -> Result<(), AlreadyResolved> {
        {
            let mut inner = self.inner.borrow_mut();
            match inner.state {
                TaskState::Pending => inner.state = TaskState::Cancelled,
                _ => return Err(AlreadyResolved),
            }
        }
        trigger(&self.inner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn set_result_resolves_and_is_readable() {
        let supplier: TaskResultSupplier<i32, String> = TaskResultSupplier::new();
        let result = supplier.result();
        assert_eq!(result.status(), TaskStatus::Pending);
        supplier.set_result(42).unwrap();
        assert_eq!(result.status(), TaskStatus::Ready);
        assert_eq!(result.unwrap().unwrap(), 42);
    }

    #[test]
    fn setting_twice_fails() {
        let supplier: TaskResultSupplier<i32, String> = TaskResultSupplier::new();
        supplier.set_result(1).unwrap();
        assert!(supplier.set_result(2).is_err());
        assert!(supplier.cancel().is_err());
    }

    #[test]
    fn notify_fires_immediately_once_resolved() {
        let supplier: TaskResultSupplier<i32, String> = TaskResultSupplier::new();
        let result = supplier.result();
        let seen = Rc::new(Cell::new(0));
        let seen_clone = Rc::clone(&seen);
        result.notify(move |r| seen_clone.set(r.unwrap().unwrap()));
        assert_eq!(seen.get(), 0);
        supplier.set_result(7).unwrap();
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn notify_after_resolution_runs_synchronously() {
        let supplier: TaskResultSupplier<i32, String> = TaskResultSupplier::new();
        let result = supplier.result();
        supplier.set_result(9).unwrap();
        let seen = Rc::new(Cell::new(0));
        let seen_clone = Rc::clone(&seen);
        result.notify(move |r| seen_clone.set(r.unwrap().unwrap()));
        assert_eq!(seen.get(), 9);
    }

    #[test]
    fn detaching_a_listener_prevents_its_callback() {
        let supplier: TaskResultSupplier<i32, String> = TaskResultSupplier::new();
        let result = supplier.result();
        let seen = Rc::new(Cell::new(false));
        let seen_clone = Rc::clone(&seen);
        let handle = result.notify(move |_| seen_clone.set(true));
        handle.detach();
        supplier.set_result(1).unwrap();
        assert!(!seen.get());
    }

    #[test]
    fn cancel_resolves_waiters_as_cancelled() {
        let supplier: TaskResultSupplier<(), String> = TaskResultSupplier::new();
        let result = supplier.result();
        supplier.cancel().unwrap();
        assert_eq!(result.status(), TaskStatus::Cancelled);
        assert!(matches!(result.unwrap(), Err(TaskError::Cancelled)));
    }

    #[test]
    fn error_is_surfaced_through_unwrap() {
        let supplier: TaskResultSupplier<i32, String> = TaskResultSupplier::new();
        let result = supplier.result();
        supplier.set_error("boom".to_string()).unwrap();
        match result.unwrap() {
            Err(TaskError::Failed(message)) => assert_eq!(message, "boom"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}

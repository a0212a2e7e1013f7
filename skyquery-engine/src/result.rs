//! Shared, cancellable outcome of one submitted query.
//!
//! A [`QueryResult`] moves through `pending → executing → done` exactly once.
//! Whoever performs the final transition (the worker finishing the action,
//! or a caller cancelling) drains the registered callbacks under the lock
//! and invokes them after releasing it.
//!
//! The cancel closure of an executing query runs under the lock. The worker
//! needs that lock to finish the query, so it cannot start the next one
//! until the interrupt has been delivered to the store.

use std::{
    any::Any,
    fmt, mem,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Weak},
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

use crate::QueryError;

type Action<T> = Box<dyn FnOnce() -> Result<T, QueryError> + Send>;
type CancelFn = Box<dyn FnOnce() + Send>;
type Callback<T> = Box<dyn FnOnce(&QueryResult<T>) + Send>;
type Outcome<T> = Result<Arc<T>, QueryError>;

/// Observable lifecycle stage of a [`QueryResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// Queued; the action has not started.
    Pending,
    /// The worker is running the action.
    Executing,
    /// Finished with a value.
    Succeeded,
    /// Finished with an error, including cancellation.
    Failed,
}

enum State<T> {
    Pending { action: Action<T>, cancel: CancelFn },
    Executing { cancel: CancelFn },
    Done(Outcome<T>),
}

struct Inner<T> {
    state: State<T>,
    callbacks: Vec<(u64, Callback<T>)>,
    next_callback: u64,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    finished: Condvar,
}

/// Handle to the outcome of a query.
///
/// Clones share the same state. Dropping every caller handle does not stop
/// a queued query; use [`QueryResult::cancel`] or [`QueryResult::discard`].
pub struct QueryResult<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for QueryResult<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for QueryResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> QueryResult<T> {
    pub(crate) fn new<A, C>(action: A, cancel: C) -> Self
    where
        A: FnOnce() -> Result<T, QueryError> + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        Self::with_state(State::Pending {
            action: Box::new(action),
            cancel: Box::new(cancel),
        })
    }

    /// A result that is already done with `error`.
    pub(crate) fn failed(error: QueryError) -> Self {
        Self::with_state(State::Done(Err(error)))
    }

    fn with_state(state: State<T>) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state,
                    callbacks: Vec::new(),
                    next_callback: 0,
                }),
                finished: Condvar::new(),
            }),
        }
    }

    /// Current lifecycle stage.
    pub fn state(&self) -> QueryState {
        match &self.shared.inner.lock().state {
            State::Pending { .. } => QueryState::Pending,
            State::Executing { .. } => QueryState::Executing,
            State::Done(Ok(_)) => QueryState::Succeeded,
            State::Done(Err(_)) => QueryState::Failed,
        }
    }

    /// Return `true` once the query has finished, successfully or not.
    pub fn is_done(&self) -> bool {
        matches!(self.shared.inner.lock().state, State::Done(_))
    }

    /// Return `true` once the query has finished with an error.
    pub fn is_error(&self) -> bool {
        matches!(self.shared.inner.lock().state, State::Done(Err(_)))
    }

    /// The value, if the query succeeded.
    pub fn outcome(&self) -> Option<Arc<T>> {
        match &self.shared.inner.lock().state {
            State::Done(Ok(value)) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// The error, if the query failed.
    pub fn error(&self) -> Option<QueryError> {
        match &self.shared.inner.lock().state {
            State::Done(Err(error)) => Some(error.clone()),
            _ => None,
        }
    }

    /// Block until the query is done.
    pub fn wait(&self) -> Result<Arc<T>, QueryError> {
        let mut inner = self.shared.inner.lock();
        loop {
            if let State::Done(outcome) = &inner.state {
                return outcome.clone();
            }
            self.shared.finished.wait(&mut inner);
        }
    }

    /// Block until the query is done or `timeout` elapses.
    ///
    /// Returns `None` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<Arc<T>, QueryError>> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.wait());
        };
        let mut inner = self.shared.inner.lock();
        loop {
            if let State::Done(outcome) = &inner.state {
                return Some(outcome.clone());
            }
            if self.shared.finished.wait_until(&mut inner, deadline).timed_out() {
                return match &inner.state {
                    State::Done(outcome) => Some(outcome.clone()),
                    _ => None,
                };
            }
        }
    }

    /// Register `callback` to run once when the query is done.
    ///
    /// If the query is already done, `callback` runs immediately on the
    /// calling thread. Otherwise it runs on whichever thread completes or
    /// cancels the query.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
    /// use skyquery_engine::Engine;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let engine = Engine::builder().build()?;
    /// let result = engine.submit(|| Ok(42_u32), || {});
    /// result.wait()?;
    ///
    /// let calls = Arc::new(AtomicUsize::new(0));
    /// let seen = Arc::clone(&calls);
    /// let _connection = result.connect(move |done| {
    ///     assert_eq!(done.outcome().as_deref(), Some(&42));
    ///     seen.fetch_add(1, Ordering::SeqCst);
    /// });
    /// assert_eq!(calls.load(Ordering::SeqCst), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn connect<F>(&self, callback: F) -> Connection
    where
        F: FnOnce(&Self) + Send + 'static,
    {
        let mut inner = self.shared.inner.lock();
        if matches!(inner.state, State::Done(_)) {
            drop(inner);
            self.invoke(Box::new(callback));
            return Connection { slot: None };
        }
        let id = inner.next_callback;
        inner.next_callback += 1;
        inner.callbacks.push((id, Box::new(callback)));
        let shared: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        let registry: Weak<dyn CallbackRegistry> = shared;
        Connection {
            slot: Some((registry, id)),
        }
    }

    /// Cancel the query.
    ///
    /// A pending query is failed with [`QueryError::Cancelled`] without its
    /// action ever running. An executing query is failed immediately and its
    /// cancel closure is invoked to interrupt the store. Cancelling a query
    /// that is already done has no effect.
    ///
    /// The cancel closure runs while the query's lock is held and must not
    /// call back into this result.
    pub fn cancel(&self) {
        self.set_error(QueryError::Cancelled);
    }

    /// Disconnect every callback, then cancel.
    pub fn discard(self) {
        self.shared.inner.lock().callbacks.clear();
        self.cancel();
    }

    /// Fail the query with `error` unless it is already done.
    pub(crate) fn set_error(&self, error: QueryError) {
        if let Some(callbacks) = self.transition(Err(error), true) {
            self.invoke_all(callbacks);
        }
    }

    /// Run the action on the current thread. Only the worker calls this.
    pub(crate) fn execute(&self) {
        let action = {
            let mut inner = self.shared.inner.lock();
            match mem::replace(&mut inner.state, State::Done(Err(QueryError::Cancelled))) {
                State::Pending { action, cancel } => {
                    inner.state = State::Executing { cancel };
                    action
                }
                other => {
                    inner.state = other;
                    return;
                }
            }
        };

        let outcome = match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(outcome) => outcome.map(Arc::new),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("query action panicked: {message}");
                Err(QueryError::Panicked { message })
            }
        };

        if let Some(callbacks) = self.transition(outcome, false) {
            self.invoke_all(callbacks);
        }
    }

    /// Record the terminal state unless one is already recorded, returning
    /// the callbacks to invoke once the lock is released.
    ///
    /// With `interrupt` set, an in-flight action has its cancel closure run
    /// before the lock is released.
    fn transition(
        &self,
        outcome: Outcome<T>,
        interrupt: bool,
    ) -> Option<Vec<(u64, Callback<T>)>> {
        let mut inner = self.shared.inner.lock();
        match mem::replace(&mut inner.state, State::Done(outcome)) {
            State::Pending { .. } => {}
            State::Executing { cancel } => {
                if interrupt && panic::catch_unwind(AssertUnwindSafe(cancel)).is_err() {
                    log::error!("query cancel closure panicked");
                }
            }
            previous @ State::Done(_) => {
                inner.state = previous;
                return None;
            }
        }
        self.shared.finished.notify_all();
        Some(mem::take(&mut inner.callbacks))
    }

    fn invoke_all(&self, callbacks: Vec<(u64, Callback<T>)>) {
        for (_, callback) in callbacks {
            self.invoke(callback);
        }
    }

    fn invoke(&self, callback: Callback<T>) {
        if panic::catch_unwind(AssertUnwindSafe(|| callback(self))).is_err() {
            log::error!("query callback panicked");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("non-string panic payload"))
}

/// Type-erased queue entry driven by the worker.
pub(crate) trait Task: Send {
    fn run(&self);
    fn fail(&self, error: QueryError);
}

impl<T: Send + Sync + 'static> Task for QueryResult<T> {
    fn run(&self) {
        self.execute();
    }

    fn fail(&self, error: QueryError) {
        self.set_error(error);
    }
}

trait CallbackRegistry: Send + Sync {
    fn remove(&self, id: u64) -> bool;
    fn contains(&self, id: u64) -> bool;
}

impl<T: Send + Sync + 'static> CallbackRegistry for Shared<T> {
    fn remove(&self, id: u64) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.callbacks.len();
        inner.callbacks.retain(|(registered, _)| *registered != id);
        inner.callbacks.len() != before
    }

    fn contains(&self, id: u64) -> bool {
        self.inner
            .lock()
            .callbacks
            .iter()
            .any(|(registered, _)| *registered == id)
    }
}

/// Registration of one callback on a [`QueryResult`].
///
/// Dropping a connection leaves the callback registered.
#[derive(Debug)]
#[must_use = "dropping a Connection keeps the callback registered"]
pub struct Connection {
    slot: Option<(Weak<dyn CallbackRegistry>, u64)>,
}

impl Connection {
    /// Remove the callback if it has not fired yet.
    ///
    /// Returns `true` when the callback was still registered.
    pub fn disconnect(self) -> bool {
        self.slot
            .and_then(|(registry, id)| registry.upgrade().map(|registry| registry.remove(id)))
            .unwrap_or(false)
    }

    /// Return `true` while the callback is registered and has not fired.
    pub fn is_connected(&self) -> bool {
        self.slot.as_ref().is_some_and(|(registry, id)| {
            registry
                .upgrade()
                .is_some_and(|registry| registry.contains(*id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    use rstest::rstest;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce(&QueryResult<u32>) + Send + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        (calls, move |_: &QueryResult<u32>| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[rstest]
    fn execute_stores_value_and_fires_callbacks_once() {
        let result = QueryResult::new(|| Ok(7_u32), || {});
        let (calls, callback) = counter();
        let connection = result.connect(callback);
        assert!(connection.is_connected());
        assert_eq!(result.state(), QueryState::Pending);

        result.execute();
        result.execute();

        assert_eq!(result.state(), QueryState::Succeeded);
        assert_eq!(result.outcome().as_deref(), Some(&7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!connection.is_connected());
    }

    #[rstest]
    fn connect_after_completion_runs_synchronously() {
        let result = QueryResult::new(|| Ok(1_u32), || {});
        result.execute();
        let (calls, callback) = counter();
        let connection = result.connect(callback);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!connection.disconnect());
    }

    #[rstest]
    fn cancel_before_execution_skips_action() {
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_in_action = Arc::clone(&ran);
        let cancelled = Arc::new(AtomicUsize::new(0));
        let cancelled_in_closure = Arc::clone(&cancelled);
        let result = QueryResult::new(
            move || {
                ran_in_action.fetch_add(1, Ordering::SeqCst);
                Ok(0_u32)
            },
            move || {
                cancelled_in_closure.fetch_add(1, Ordering::SeqCst);
            },
        );
        let (calls, callback) = counter();
        let _connection = result.connect(callback);

        result.cancel();
        assert!(result.is_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        result.execute();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(cancelled.load(Ordering::SeqCst), 0);
        assert!(matches!(result.error(), Some(QueryError::Cancelled)));
    }

    #[rstest]
    fn second_cancel_and_late_error_change_nothing() {
        let result = QueryResult::new(|| Ok(0_u32), || {});
        let (calls, callback) = counter();
        let _connection = result.connect(callback);
        result.cancel();
        result.cancel();
        result.set_error(QueryError::Shutdown);
        assert!(matches!(result.error(), Some(QueryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn cancel_while_executing_invokes_cancel_closure() {
        let release = Arc::new(AtomicUsize::new(0));
        let interrupted = Arc::clone(&release);
        let started = Arc::new(AtomicUsize::new(0));
        let started_in_action = Arc::clone(&started);
        let waiting = Arc::clone(&release);
        let result = QueryResult::new(
            move || {
                started_in_action.store(1, Ordering::SeqCst);
                while waiting.load(Ordering::SeqCst) == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
                Ok(5_u32)
            },
            move || interrupted.store(1, Ordering::SeqCst),
        );
        let worker = {
            let result = result.clone();
            thread::spawn(move || result.execute())
        };
        while started.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(result.state(), QueryState::Executing);

        result.cancel();
        assert!(result.is_error());
        worker.join().expect("join executing thread");
        assert!(matches!(result.error(), Some(QueryError::Cancelled)));
        assert!(result.outcome().is_none());
    }

    #[rstest]
    fn execute_returns_only_after_interrupt_is_delivered() {
        let stop = Arc::new(AtomicBool::new(false));
        let delivered = Arc::new(AtomicBool::new(false));
        let started = Arc::new(AtomicBool::new(false));
        let result = QueryResult::new(
            {
                let (stop, started) = (Arc::clone(&stop), Arc::clone(&started));
                move || {
                    started.store(true, Ordering::SeqCst);
                    while !stop.load(Ordering::SeqCst) {
                        thread::sleep(Duration::from_millis(1));
                    }
                    Ok(0_u32)
                }
            },
            {
                let (stop, delivered) = (Arc::clone(&stop), Arc::clone(&delivered));
                move || {
                    stop.store(true, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    delivered.store(true, Ordering::SeqCst);
                }
            },
        );
        let worker = {
            let (result, delivered) = (result.clone(), Arc::clone(&delivered));
            thread::spawn(move || {
                result.execute();
                delivered.load(Ordering::SeqCst)
            })
        };
        while !started.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }

        result.cancel();
        assert!(worker.join().expect("join executing thread"));
        assert!(matches!(result.error(), Some(QueryError::Cancelled)));
    }

    #[rstest]
    fn action_errors_and_panics_become_failures() {
        let failing = QueryResult::<u32>::new(|| Err(QueryError::NoData), || {});
        failing.execute();
        assert!(matches!(failing.error(), Some(QueryError::NoData)));

        let panicking = QueryResult::<u32>::new(|| panic!("boom"), || {});
        panicking.execute();
        assert!(matches!(
            panicking.error(),
            Some(QueryError::Panicked { ref message }) if message == "boom"
        ));
    }

    #[rstest]
    fn panicking_callback_does_not_block_others() {
        let result = QueryResult::new(|| Ok(3_u32), || {});
        let _first = result.connect(|_| panic!("callback failure"));
        let (calls, callback) = counter();
        let _second = result.connect(callback);
        result.execute();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_done());
    }

    #[rstest]
    fn disconnected_callback_never_fires() {
        let result = QueryResult::new(|| Ok(3_u32), || {});
        let (calls, callback) = counter();
        let connection = result.connect(callback);
        assert!(connection.disconnect());
        result.execute();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[rstest]
    fn discard_drops_callbacks_and_cancels() {
        let result = QueryResult::new(|| Ok(3_u32), || {});
        let observer = result.clone();
        let (calls, callback) = counter();
        let _connection = result.connect(callback);
        result.discard();
        assert!(observer.is_error());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[rstest]
    fn wait_returns_after_completion_on_another_thread() {
        let result = QueryResult::new(
            || {
                thread::sleep(Duration::from_millis(20));
                Ok(11_u32)
            },
            || {},
        );
        assert!(result.wait_timeout(Duration::from_millis(1)).is_none());
        let worker = {
            let result = result.clone();
            thread::spawn(move || result.execute())
        };
        assert_eq!(*result.wait().expect("value"), 11);
        worker.join().expect("join worker");
    }

    #[rstest]
    fn wait_timeout_accepts_unbounded_durations() {
        let result = QueryResult::new(|| Ok(4_u32), || {});
        result.execute();
        let outcome = result.wait_timeout(Duration::MAX).expect("query is done");
        assert_eq!(*outcome.expect("value"), 4);

        let pending = QueryResult::new(|| Ok(6_u32), || {});
        let worker = {
            let pending = pending.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                pending.execute();
            })
        };
        let outcome = pending.wait_timeout(Duration::MAX).expect("query is done");
        assert_eq!(*outcome.expect("value"), 6);
        worker.join().expect("join worker");
    }

    #[rstest]
    fn failed_result_is_done_from_the_start() {
        let result = QueryResult::<u32>::failed(QueryError::Shutdown);
        assert_eq!(result.state(), QueryState::Failed);
        let (calls, callback) = counter();
        let _connection = result.connect(callback);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
